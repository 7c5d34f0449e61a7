use crate::error::{ApiError, ApiResult};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{async_trait, extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use baodao_core::store::TalkStore;
use baodao_core::tools::StudentProfile;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiry_hours: i64,
    pub issuer: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "default-secret-change-in-production".to_string(),
            token_expiry_hours: 24,
            issuer: "baodao-talk".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: Option<String>,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserInfo,
}

#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
}

/// JWT issue/verify plus argon2 credentials against the users table.
pub struct AuthService {
    config: AuthConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    store: TalkStore,
}

impl AuthService {
    pub fn new(config: AuthConfig, store: TalkStore) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
            store,
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> ApiResult<LoginResponse> {
        if request.email.trim().is_empty() || !request.email.contains('@') {
            return Err(ApiError::Validation("a valid email is required".to_string()));
        }
        if request.password.len() < 8 {
            return Err(ApiError::Validation(
                "password must be at least 8 characters".to_string(),
            ));
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(request.password.as_bytes(), &salt)
            .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))?
            .to_string();

        let id = self
            .store
            .create_user(request.name.as_deref(), &request.email, &password_hash)
            .await?;
        debug!("Registered user {}", id);

        self.issue_response(id, request.name, request.email)
    }

    pub async fn login(&self, request: LoginRequest) -> ApiResult<LoginResponse> {
        let user = self
            .store
            .get_user_by_email(&request.email)
            .await?
            .ok_or_else(|| ApiError::Authentication("invalid credentials".to_string()))?;

        let parsed = PasswordHash::new(&user.password_hash)
            .map_err(|e| ApiError::Internal(format!("stored hash unreadable: {}", e)))?;
        if Argon2::default()
            .verify_password(request.password.as_bytes(), &parsed)
            .is_err()
        {
            warn!("Failed login attempt for {}", request.email);
            return Err(ApiError::Authentication("invalid credentials".to_string()));
        }

        self.issue_response(user.id, user.name, user.email)
    }

    fn issue_response(
        &self,
        id: Uuid,
        name: Option<String>,
        email: String,
    ) -> ApiResult<LoginResponse> {
        let access_token = self.create_token(id, name.clone(), email.clone())?;
        Ok(LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.token_expiry_hours * 3600,
            user: UserInfo { id, name, email },
        })
    }

    fn create_token(&self, id: Uuid, name: Option<String>, email: String) -> ApiResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: id.to_string(),
            name,
            email,
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.config.token_expiry_hours)).timestamp(),
            iss: self.config.issuer.clone(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ApiError::Internal(format!("token creation failed: {}", e)))
    }

    pub fn verify_token(&self, token: &str) -> ApiResult<Claims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.config.issuer]);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| ApiError::Authentication(format!("invalid token: {}", e)))
    }
}

/// The verified principal for a request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
}

impl AuthenticatedUser {
    pub fn student_profile(&self) -> StudentProfile {
        StudentProfile {
            id: self.id,
            name: self.name.clone(),
            email: Some(self.email.clone()),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_service = parts
            .extensions
            .get::<Arc<AuthService>>()
            .cloned()
            .ok_or_else(|| ApiError::Internal("auth service not configured".to_string()))?;

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Authentication("missing bearer token".to_string()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Authentication("malformed authorization header".to_string()))?;

        let claims = auth_service.verify_token(token)?;
        let id = claims
            .sub
            .parse::<Uuid>()
            .map_err(|_| ApiError::Authentication("invalid subject claim".to_string()))?;

        Ok(AuthenticatedUser {
            id,
            name: claims.name,
            email: claims.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn service() -> (AuthService, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("auth.db").display());
        let store = TalkStore::connect(&url).await.unwrap();
        (AuthService::new(AuthConfig::default(), store), dir)
    }

    #[tokio::test]
    async fn test_register_then_login_roundtrip() {
        let (auth, _dir) = service().await;
        let registered = auth
            .register(RegisterRequest {
                name: Some("Alex".to_string()),
                email: "alex@example.com".to_string(),
                password: "correct-horse".to_string(),
            })
            .await
            .unwrap();

        let login = auth
            .login(LoginRequest {
                email: "alex@example.com".to_string(),
                password: "correct-horse".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(login.user.id, registered.user.id);

        let claims = auth.verify_token(&login.access_token).unwrap();
        assert_eq!(claims.email, "alex@example.com");
        assert_eq!(claims.sub, registered.user.id.to_string());
    }

    #[tokio::test]
    async fn test_wrong_password_is_rejected() {
        let (auth, _dir) = service().await;
        auth.register(RegisterRequest {
            name: None,
            email: "alex@example.com".to_string(),
            password: "correct-horse".to_string(),
        })
        .await
        .unwrap();

        let result = auth
            .login(LoginRequest {
                email: "alex@example.com".to_string(),
                password: "wrong-horse".to_string(),
            })
            .await;
        assert!(matches!(result, Err(ApiError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_weak_registration_is_rejected() {
        let (auth, _dir) = service().await;
        let bad_email = auth
            .register(RegisterRequest {
                name: None,
                email: "not-an-email".to_string(),
                password: "long-enough-password".to_string(),
            })
            .await;
        assert!(matches!(bad_email, Err(ApiError::Validation(_))));

        let short_password = auth
            .register(RegisterRequest {
                name: None,
                email: "alex@example.com".to_string(),
                password: "short".to_string(),
            })
            .await;
        assert!(matches!(short_password, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_tampered_token_is_rejected() {
        let (auth, _dir) = service().await;
        let response = auth
            .register(RegisterRequest {
                name: None,
                email: "alex@example.com".to_string(),
                password: "correct-horse".to_string(),
            })
            .await
            .unwrap();

        let mut token = response.access_token;
        token.push('x');
        assert!(auth.verify_token(&token).is_err());
    }
}
