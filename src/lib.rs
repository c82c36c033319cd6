#[cfg(test)]
#[macro_use]
mod test_utils;

// Core infrastructure modules
pub mod config;
pub mod core;

// Providers
pub mod sqlite;

pub use crate::core::db::*;
pub use crate::core::{DbError, DriverError, Result};
