//! Test support: in-memory and mock implementations of the auth seams.
//!
//! Used by this crate's unit and integration tests and by the CLI crate's
//! tests. Nothing here touches the platform credential store or the
//! network.

pub mod jwt;
pub mod mocks;

pub use mocks::{MemoryTokenStore, MockOidcClient};
