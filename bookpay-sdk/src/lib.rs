//! Shared wire types for the bookstore payment service.
//!
//! The storefront and the server both depend on this crate so that the
//! checkout payloads, response envelopes and signature scheme stay in sync.

#![forbid(unsafe_code)]

#[cfg(feature = "client")]
pub mod client;
pub mod objects;
pub mod signature;
