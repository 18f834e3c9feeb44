//! Uplift - Adaptive Markup Optimization Service
//!
//! This crate selects and evolves per-user A/B variants of embedded markup
//! fragments, driven by behavioral analytics and an LLM rewrite loop.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
