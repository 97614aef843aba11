//! Indicator screener bot.
//!
//! Subscribers register rule sets over technical indicators; a per-subscriber
//! screener walks the instrument universe through a rate-limited TTL cache
//! and notifies on every match transition.

pub mod cache;
pub mod commands;
pub mod config;
pub mod core;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod signals;
pub mod strategies;
