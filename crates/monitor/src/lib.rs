// Domain-driven module structure for the container log monitor.

// Core infrastructure
pub mod client;
pub mod docker;
pub mod filter;
pub mod metrics;
pub mod state;

// Domain modules
pub mod action;
pub mod conf;
pub mod logs;
pub mod notify;
pub mod rules;
pub mod throttle;

// Process lifecycle
pub mod runtime;
pub mod service;
