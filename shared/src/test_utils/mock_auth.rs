use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::auth::{AuthError, AuthVerifier};
use crate::models::AuthUser;

/// Token-to-user table standing in for the auth provider
#[derive(Default)]
pub struct MockAuthVerifier {
    users: Mutex<HashMap<String, AuthUser>>,
}

impl MockAuthVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, token: &str, user_id: &str) -> Self {
        self.add_user(token, user_id);
        self
    }

    pub fn add_user(&self, token: &str, user_id: &str) {
        self.users.lock().unwrap().insert(
            token.to_string(),
            AuthUser {
                id: user_id.to_string(),
                email: Some(format!("{}@example.com", user_id)),
                phone: None,
            },
        );
    }
}

#[async_trait]
impl AuthVerifier for MockAuthVerifier {
    async fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        self.users
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}
