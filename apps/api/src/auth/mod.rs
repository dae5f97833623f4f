// Authentication and role checks.
// Passwords are Argon2 PHC strings; sessions are stateless HS256 JWTs.

pub mod accounts;
pub mod extractor;
pub mod handlers;
pub mod password;
pub mod token;

use thiserror::Error;

use crate::errors::AppError;

pub use extractor::AuthUser;
pub use token::TokenService;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Token signing failed: {0}")]
    Signing(String),
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MissingToken | AuthError::InvalidToken => {
                AppError::Unauthorized(e.to_string())
            }
            AuthError::Hashing(_) | AuthError::Signing(_) => {
                AppError::Internal(anyhow::anyhow!(e.to_string()))
            }
        }
    }
}
