use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AuthError;
use crate::models::user::Role;

/// JWT claims carried by every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies HS256 access tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    pub fn issue(&self, user_id: Uuid, email: &str, role: Role) -> Result<IssuedToken, AuthError> {
        self.issue_at(user_id, email, role, Utc::now())
    }

    pub fn issue_at(
        &self,
        user_id: Uuid,
        email: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        Ok(IssuedToken { token, expires_at })
    }

    /// Rejects bad signatures, expired tokens and unknown roles.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify() {
        let service = TokenService::new("secret", 60);
        let id = Uuid::new_v4();
        let issued = service.issue(id, "pm@syncem.io", Role::Pm).unwrap();
        let claims = service.verify(&issued.token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.role, Role::Pm);
        assert_eq!(claims.exp, issued.expires_at.timestamp());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issued = TokenService::new("one", 60)
            .issue(Uuid::new_v4(), "a@b.co", Role::Hr)
            .unwrap();
        assert!(TokenService::new("two", 60).verify(&issued.token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let service = TokenService::new("secret", 60);
        let issued = service
            .issue_at(
                Uuid::new_v4(),
                "a@b.co",
                Role::Employee,
                Utc::now() - Duration::days(2),
            )
            .unwrap();
        assert!(matches!(
            service.verify(&issued.token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_unknown_role_rejected() {
        let secret = "secret";
        let now = Utc::now().timestamp();
        let forged = encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({
                "sub": Uuid::new_v4(),
                "email": "x@y.co",
                "role": "superuser",
                "iat": now,
                "exp": now + 600,
            }),
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();
        assert!(TokenService::new(secret, 60).verify(&forged).is_err());
    }
}
