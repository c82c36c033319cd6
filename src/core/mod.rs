/// Core Module for dbcontext
///
/// This module contains the provider-agnostic database layer: values and
/// parameters, command binding, scalar coercion, the provider boundary and
/// the connection/transaction lifecycle owned by [`db::DbContext`].

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{DbError, DriverError, Result};
