//! Business services that sit between handlers and repositories.

pub mod auth;
pub mod email;
