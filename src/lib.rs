//! shadowtraffic mirrors live HTTP requests to shadow hosts.
//!
//! It sits in front of an upstream service as a reverse proxy. Every
//! request is forwarded to the upstream as usual; requests that match the
//! configured inclusion rules are also captured and replayed, asynchronously
//! and on a sampled basis, against one or more shadow hosts. Shadow calls
//! never influence the response the client receives.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, init, validate, health).
//! - [`config`] -- Configuration loading, validation, and hot-reloading via the
//!   [`ConfigSource`](config::ConfigSource) trait.
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`health`] -- `GET /health` endpoint handler returning runtime diagnostics.
//! - [`logging`] -- Structured tracing setup and the per-task [`LogContext`](logging::LogContext).
//! - [`middleware`] -- The shadow filter placed in front of the forwarder.
//! - [`pool`] -- Bounded worker pools for dispatches and shadow calls.
//! - [`proxy`] -- Forwarding of the original request to the upstream.
//! - [`server`] -- Axum server setup, shared application state, HTTP client, and
//!   graceful shutdown.
//! - [`shadow`] -- The shadowing engine: inclusion policy, body capture, and
//!   the asynchronous dispatcher.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML config file support _(enabled by default)_ |
//! | `json` | JSON config file support |
//! | `toml` | TOML config file support |
//! | `sentry-integration` | Sentry error tracking |
//! | `file-backends` | All file format backends |
//! | `full` | All features |

// Public items are consumed by the binary and the integration tests only.
#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod pool;
pub mod proxy;
pub mod server;
pub mod shadow;

#[cfg(feature = "sentry-integration")]
pub mod sentry_integration;
