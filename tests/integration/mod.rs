//! Integration tests for the gateway
//!
//! These tests drive the real router against a mock upstream and verify the complete
//! request/response flow, including authentication, credential handling and translation.

mod chat_completions;
mod streaming;
