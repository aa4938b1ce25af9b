// hueport-host library
// Async relay host using tokio: browser application <-> document store

// Core async modules
pub mod bridge;
pub mod port;
pub mod relay;

// Configuration
pub mod config;

// REST API
pub mod api;
