//! Domain model for organizations, memberships and security roles.
//!
//! # Responsibility
//! - Define records persisted through atomic operations.
//! - Keep storage string encodings next to the enums they encode.
//!
//! # Invariants
//! - Every record is identified by a stable UUID generated at creation time.

pub mod organization;
pub mod security_role;
