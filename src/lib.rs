//! Slidegate - Per-Key Sliding-Window Rate Limiting
//!
//! This crate implements an in-process rate limiter that admits at most
//! `max_requests` events per key in any trailing window of `window_size`.
//! Time comes from an injected [`ratelimit::Clock`], and expired state is
//! reclaimed lazily when a key is next touched.

pub mod config;
pub mod demo;
pub mod error;
pub mod ratelimit;
