pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod sms;
pub mod store;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
