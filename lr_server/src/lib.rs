//! HTTP and WebSocket front end for the live ranking engine.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod tasks;
