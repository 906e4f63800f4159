//! MNS client implementations.
//!
//! This module contains concrete implementations of the `MnsClient` trait:
//! a signed HTTP client for the real service and an in-memory emulation.

pub mod http;
pub mod memory;

pub use http::{Credentials, MnsHttpClient, MNS_API_VERSION};
pub use memory::{InMemoryConfig, InMemoryMnsClient};
