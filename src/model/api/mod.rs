//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - Field names are camelCase.
//! - IDs are serialised as hex strings.
//! - Request bodies default missing fields so that validation can report
//!   every problem with a field-level message.

pub mod auth;
pub mod ballot;
pub mod event;
pub mod nomination;
pub mod otp;
pub mod results;
pub mod session;
pub mod validation;
pub mod verification;
