//! Data models for the Tally service

pub mod session;
pub mod transfer;
pub mod user;

pub use session::Session;
pub use transfer::Transfer;
pub use user::{User, UserStatus};
