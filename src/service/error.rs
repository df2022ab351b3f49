use crate::probe::error::ProbeError;
use crate::repository::error::DatabaseError;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ServiceError {
    #[error("Code cannot be empty.")]
    EmptyCode,

    #[error("ProbeError: {0}")]
    ProbeError(#[from] ProbeError),

    #[error("DatabaseError: {0}")]
    DatabaseError(#[from] DatabaseError),
}
