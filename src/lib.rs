//! Library crate for the quiz server, exposing modules for binaries and integration tests.

mod config;
/// Persistent records and the stores behind them.
pub mod dao;
mod dto;
mod error;
/// HTTP routes.
pub mod routes;
/// Operations behind the routes, plus the background media worker.
pub mod services;
/// Cached quiz and contest state and the gate serialising access to it.
pub mod state;
