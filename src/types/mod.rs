//! Bootstrap Token Types
//!
//! Type definitions for token text, stored records, and configuration.

pub mod config;
pub mod record;
pub mod token;

pub use config::*;
pub use record::*;
pub use token::*;
