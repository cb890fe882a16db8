//! Services layer - Business logic
//!
//! This module contains all business logic services for the Tally service.
//! Services are responsible for:
//! - Implementing business rules
//! - Coordinating between repositories
//! - Handling validation and error cases

pub mod account;
pub mod login_guard;
pub mod password;
pub mod transfer;

pub use account::{AccountService, AccountServiceError, LoginInput, RegisterInput};
pub use login_guard::{Clock, LoginGuard, LoginOutcome, SystemClock};
pub use password::{hash_password, verify_password};
pub use transfer::{TransferService, TransferServiceError};
