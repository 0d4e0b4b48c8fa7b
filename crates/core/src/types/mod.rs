//! Core types for Emporium.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{MAX_AMOUNT, checked_subtotal, fits_amount, format_currency, round_money};
pub use status::*;
