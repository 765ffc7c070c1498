use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::config::SupabaseConfig;
use crate::error::AppError;
use crate::models::AuthUser;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Auth provider request failed: {0}")]
    Provider(String),
}

/// Resolves a bearer token to the user it was issued for
#[async_trait]
pub trait AuthVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<AuthUser, AuthError>;
}

/// Token returned by `Authorization: Bearer <token>`, if present
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Checks the request's bearer token against the configured cron secret
pub fn verify_cron_secret(headers: &HeaderMap, secret: &str) -> bool {
    match bearer_token(headers) {
        Some(token) => constant_time_eq(token.as_bytes(), secret.as_bytes()),
        None => false,
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
}

/// Verifies Supabase access tokens, locally when the project JWT secret is
/// configured and through `GET /auth/v1/user` otherwise.
#[derive(Clone)]
pub struct SupabaseAuthVerifier {
    client: Client,
    user_url: String,
    anon_key: String,
    jwt_secret: Option<String>,
}

impl SupabaseAuthVerifier {
    pub fn new(client: Client, config: &SupabaseConfig) -> Self {
        Self {
            client,
            user_url: format!("{}/auth/v1/user", config.url.trim_end_matches('/')),
            anon_key: config.anon_key.clone(),
            jwt_secret: config.jwt_secret.clone(),
        }
    }

    fn verify_locally(&self, token: &str, secret: &str) -> Result<AuthUser, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&["authenticated"]);

        let data = decode::<SupabaseClaims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            debug!("JWT validation failed: {}", e);
            AuthError::InvalidToken
        })?;

        Ok(AuthUser {
            id: data.claims.sub,
            email: data.claims.email,
            phone: data.claims.phone,
        })
    }
}

#[async_trait]
impl AuthVerifier for SupabaseAuthVerifier {
    async fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        if let Some(secret) = &self.jwt_secret {
            return self.verify_locally(token, secret);
        }

        let response = self
            .client
            .get(&self.user_url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            debug!("Auth provider rejected token with {}", response.status());
            return Err(AuthError::InvalidToken);
        }

        response
            .json::<AuthUser>()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))
    }
}

/// Middleware that requires a valid bearer token and exposes the caller as
/// `Extension<AuthUser>` to downstream handlers.
pub async fn auth_middleware(
    State(verifier): State<Arc<dyn AuthVerifier>>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = match bearer_token(req.headers()) {
        Some(token) => token.to_string(),
        None => {
            warn!("Missing bearer token for {} {}", req.method(), req.uri());
            return AppError::unauthorized("Unauthorized").into_response();
        }
    };

    match verifier.verify(&token).await {
        Ok(user) => {
            debug!("Authenticated user {}", user.id);
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(AuthError::Provider(e)) => {
            AppError::internal_server_error(format!("Failed to verify token: {}", e))
                .into_response()
        }
        Err(e) => {
            warn!("Rejected token for {} {}: {}", req.method(), req.uri(), e);
            AppError::unauthorized("Unauthorized").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn config(url: String, jwt_secret: Option<&str>) -> SupabaseConfig {
        SupabaseConfig {
            url,
            anon_key: "anon-key".into(),
            service_role_key: "service-key".into(),
            jwt_secret: jwt_secret.map(String::from),
        }
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&headers_with("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers_with("Basic abc")), None);
        assert_eq!(bearer_token(&headers_with("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_verify_cron_secret() {
        assert!(verify_cron_secret(&headers_with("Bearer s3cret"), "s3cret"));
        assert!(!verify_cron_secret(&headers_with("Bearer s3cre"), "s3cret"));
        assert!(!verify_cron_secret(&HeaderMap::new(), "s3cret"));
    }

    #[tokio::test]
    async fn test_remote_verification() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/auth/v1/user")
            .match_header("apikey", "anon-key")
            .match_header("authorization", "Bearer good-token")
            .with_status(200)
            .with_body(r#"{"id":"user-1","email":"host@example.com","aud":"authenticated"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/auth/v1/user")
            .match_header("authorization", "Bearer bad-token")
            .with_status(401)
            .with_body(r#"{"msg":"invalid JWT"}"#)
            .create_async()
            .await;

        let verifier = SupabaseAuthVerifier::new(Client::new(), &config(server.url(), None));

        let user = verifier.verify("good-token").await.unwrap();
        assert_eq!(user.id, "user-1");
        assert_eq!(user.email.as_deref(), Some("host@example.com"));

        assert!(matches!(
            verifier.verify("bad-token").await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_local_verification_with_jwt_secret() {
        let claims = serde_json::json!({
            "sub": "user-2",
            "aud": "authenticated",
            "exp": chrono::Utc::now().timestamp() + 3600,
            "phone": "+15551234567"
        });
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"jwt-secret"),
        )
        .unwrap();

        let verifier = SupabaseAuthVerifier::new(
            Client::new(),
            &config("http://127.0.0.1:9".into(), Some("jwt-secret")),
        );

        let user = verifier.verify(&token).await.unwrap();
        assert_eq!(user.id, "user-2");
        assert_eq!(user.phone.as_deref(), Some("+15551234567"));

        let forged = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"wrong-secret"),
        )
        .unwrap();
        assert!(matches!(
            verifier.verify(&forged).await,
            Err(AuthError::InvalidToken)
        ));
    }
}
