/// Virtual API surface for the file store.
///
/// This module provides the [`Router`], which answers HTTP-shaped requests
/// from the record operations, and the [`gateway`] that installs it in front
/// of a real transport exactly once per process.
pub mod gateway;
pub mod http;
pub mod router;

pub use gateway::{Interceptor, Transport};
pub use self::http::{ApiRequest, ApiResponse, API_KEY_HEADER};
pub use router::{Route, Router};
