//! Deterministic, pure logic shared by the console engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod labels;
pub mod phase;
pub mod steps;
pub mod types;
