use crate::accounts::dto::ErrorSet;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// User-correctable field errors; re-rendered, never treated as a fault.
    #[error("invalid registration: {0}")]
    Invalid(ErrorSet),
    #[error("identity store failure: {0}")]
    Store(#[source] StoreError),
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("session could not be established: {0}")]
    Session(#[source] SessionError),
}

impl From<StoreError> for RegistrationError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<SessionError> for RegistrationError {
    fn from(e: SessionError) -> Self {
        Self::Session(e)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}
