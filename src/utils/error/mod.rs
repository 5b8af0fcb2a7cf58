//! Error handling for the router
//!
//! This module defines the error type shared by every component.

mod error;


pub use error::*;
