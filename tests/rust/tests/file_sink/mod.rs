//! File sink integration tests
//!
//! Naming, rotation, compression and retention as seen through the engine.

mod naming;
mod retention;
