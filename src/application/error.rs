use crate::domain::validation::ValidationErrors;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not logged in")]
    Unauthenticated,
    #[error("This action is unauthorized.")]
    Forbidden,
    #[error("Item not found")]
    NotFound,
    #[error("CSRF token mismatch.")]
    TokenMismatch,
    #[error("{0}")]
    Validation(ValidationErrors),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

pub type AppResult<T> = Result<T, AppError>;
