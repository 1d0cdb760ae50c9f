//! GridCrack controller — parses the target credential, listens for
//! workers, partitions the candidate space into chunks and collects the
//! first found result.
//!
//! The binary in `main.rs` is a thin CLI shell; the pieces live here so
//! integration tests can drive a controller in-process.

pub mod dispatch;
pub mod server;
pub mod shadow;
