#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod entities;
pub mod error;
pub mod events;
pub mod framework;
pub mod processors;
pub mod store;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod utils;
