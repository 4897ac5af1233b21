//! Integration test entry point for stagecue-client.
//!
//! Each test runs a real WebSocket stub server in the same tokio runtime.
//! Run with: cargo test --test integration

mod harness;
mod session;
mod trigger;
