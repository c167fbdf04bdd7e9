//! Webhook authentication.
//!
//! This module provides signature verification for webhook payloads
//! (HMAC-SHA256 over the raw body).

pub mod signature;

pub use signature::{
    AuthError, Authenticator, MIN_SECRET_LEN, SIGNATURE_HEADER, format_signature_header,
    parse_signature_header,
};
