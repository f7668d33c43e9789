//! `stockwise-core`: foundation building blocks shared by every stockwise crate.
//!
//! This crate contains **pure** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod version;

pub use error::{DomainError, DomainResult, ErrorKind};
pub use id::{ProductId, TenantId, UserId};
pub use version::ExpectedVersion;
