//! Upstream chat API
//!
//! Wire types for the provider's chat endpoint and the HTTP client that calls it.

pub mod client;
pub mod headers;
pub mod types;

pub use client::{ByteStream, UpstreamClient};
pub use headers::ClientIdentity;
pub use types::{
    Initiator, RoutingMetadata, UpstreamChatBody, UpstreamChoice, UpstreamMessage,
    UpstreamRequest, UpstreamResponse, UpstreamStreamChunk, UpstreamUsage,
};
