//! HTTP plumbing for debhub: a shared blocking agent, streaming downloads that expose the
//! origin's entity tag, and paginated GitHub release listings.

pub mod error;
pub mod github;
pub mod http;
pub mod http_client;
pub mod platform;
pub mod traits;
