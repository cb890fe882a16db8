//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles CRUD operations for a specific entity.

pub mod session;
pub mod transfer;
pub mod user;

pub use session::{SessionRepository, SqlxSessionRepository};
pub use transfer::{SqlxTransferRepository, TransferRepository};
pub use user::{SqlxUserRepository, UserRepository};
