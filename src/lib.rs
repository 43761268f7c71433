//! smsrelay - notification dispatch for SMS, MMS and voice
//!
//! Accepts send, consent and validation requests over HTTP, enforces
//! recipient consent and a per-minute send quota, and hands messages to a
//! third-party messaging provider.
//!
//! # Features
//! - **server**: HTTP server mode (default)
//! - **cli**: Command-line interface
//!
//! # Architecture
//! - `services`: consent registry, send quota, delivery tracking, providers, dispatch
//! - `api`: HTTP services and middleware
//! - `config`: Configuration management
//! - `runtime`: Application lifecycle and execution modes
//! - `system`: Logging
//! - `utils`: Phone number and media URL validation

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod runtime;
pub mod services;
pub mod system;
pub mod utils;
