use garde::Validate;
use serde::Deserialize;

use crate::error::{AppError, Result};

/// The request payload for parent registration.
#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[garde(email, length(max = 254))]
    pub email: String,
    #[garde(length(min = 8, max = 128))]
    pub password: String,
    #[garde(length(max = 100))]
    pub display_name: Option<String>,
}

/// The request payload for parent login.
#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[garde(length(min = 1, max = 254))]
    pub email: String,
    #[garde(length(min = 1, max = 128))]
    pub password: String,
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Runs `garde` validation and maps the report to a `Validation` error.
pub fn validate<T>(payload: &T) -> Result<()>
where
    T: Validate<Context = ()>,
{
    payload
        .validate()
        .map_err(|report| AppError::Validation(report.to_string().trim().to_string()))
}
