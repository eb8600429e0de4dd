/// Software Development Kit (SDK) for Haven Store.
///
/// This module provides a typed client for external callers of the virtual
/// API and the wiring that opens a store and its router.
pub mod client;
/// Data directory resolution and stack initialization.
pub mod discovery;

pub use client::Client;
pub use discovery::{open, Haven};
