//! Emporium Core - Domain types and business rules.
//!
//! This crate provides the types and pure logic shared by every Emporium
//! component:
//! - `api` - JSON REST backend used by the admin dashboard and the storefront
//! - `cli` - Command-line tools for migrations and staff management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP. Anything that can be decided without touching the database
//! (stock arithmetic, order lifecycle, coupon discounts, pagination math, CSV
//! encoding) lives here so it can be tested in isolation.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, money helpers and status enums
//! - [`pagination`] - Page/limit normalization and response metadata
//! - [`csv`] - RFC 4180 writer and parser used by exports and imports
//! - [`stock`] - Stock dispatch and adjustment planning
//! - [`coupon`] - Coupon eligibility and discount calculation
//! - [`slug`] - URL slug generation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod coupon;
pub mod csv;
pub mod pagination;
pub mod slug;
pub mod stock;
pub mod types;

pub use types::*;

pub use pagination::{Page, PageRequest, Pagination};
