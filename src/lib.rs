//! Tally - a small peer-to-peer transfer service
//!
//! This library provides the core functionality for the Tally service:
//! user accounts, credential-based login with attempt throttling, and
//! peer-to-peer value transfers between accounts.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
