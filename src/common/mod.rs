//! Common types and utilities shared across chainstore.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and [`Config`]
//! - Error types
//! - Identifiers ([`BlockId`])

mod block_id;
pub mod config;
pub mod error;

pub use block_id::BlockId;
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
