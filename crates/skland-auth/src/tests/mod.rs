//! Orchestrator-level tests over a scripted transport.
//!
//! All tests run on a paused tokio clock, so retry delays, debounce windows,
//! and freshness windows elapse instantly and deterministically.

mod harness;

mod lifecycle;
mod single_flight;
