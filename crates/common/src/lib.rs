//! Common utilities shared across the auth gateway crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (structural decoding, size limits, iat checks)
pub mod jwt;
