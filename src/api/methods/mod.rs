use crate::error::AppError;

pub mod health;
pub mod pending;
pub mod snapshot;

pub use health::health;
pub use pending::submit_pending;
pub use snapshot::snapshot;

pub async fn not_found() -> AppError {
    AppError::NotFound
}
