//! Configuration validation
//!
//! Numeric invariants are enforced here. Unknown strategy names are not
//! rejected: they are reported and later replaced by the documented default
//! when components are built.

mod trait_def;
mod validators;


pub use trait_def::Validate;
