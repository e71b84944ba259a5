//! Shared utilities.

pub mod exec;
pub mod hash;
pub mod mime;
