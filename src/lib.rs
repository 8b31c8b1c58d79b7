//! # Content Pipeline Library
//!
//! Core of the content pipeline service: the state machine that moves
//! scraped items from intake to publication, the store client it writes
//! through, and the HTTP surface exposing it.

pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod repositories;
pub mod server;
pub mod store;
pub mod telemetry;
