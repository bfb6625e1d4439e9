//! Use-case services.
//!
//! # Responsibility
//! - Compose repository calls into atomic operations.
//! - Express business-rule violations as conflicts before storage sees them.

pub mod organization_service;
pub mod security_role_service;
