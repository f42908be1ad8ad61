//! Shared type definitions for xbridge.
//!
//! Dependency-light configuration types that CLI parsing, config loaders and
//! the SSH runtime can all share without pulling in protocol code.

pub mod ssh;
