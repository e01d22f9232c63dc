//! ShopiForm app library.
//!
//! Everything behind the `shopiform` binary: configuration, `PostgreSQL`
//! repositories, the Shopify Admin GraphQL client, the submission reconciler
//! and the axum routes. Exposed as a library so the CLI and the integration
//! tests can drive the same code.
//!
//! # Security
//!
//! This crate holds per-shop Admin API access tokens. Tokens are kept in
//! `SecretString`s and redacted from every `Debug` output.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod shopify;
pub mod state;
