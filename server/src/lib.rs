//! Fieldguide Server
//!
//! API backend for the companion wiki: accounts, community feedback, admin
//! review and per-tier rate limiting.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod ratelimit;
