//! I/O helpers for the console engine.

pub mod api;
pub mod config;
pub mod http;
pub mod render;
