//! Validation trait definition
//!
//! This module defines the core Validate trait used by all configuration structures.

/// Validation trait for configuration structures
pub trait Validate {
    /// Check the structure's invariants, describing the first violation
    fn validate(&self) -> Result<(), String>;
}
