//! Slipforge - Betslip Analysis Service
//!
//! Accumulates betting selections into master slips, derives team form and
//! head-to-head statistics from historical results, and orchestrates slip
//! generation jobs against an external prediction engine.

pub mod db;
pub mod stats;
pub mod engine;
pub mod queue;
pub mod services;
pub mod api;
pub mod poll;
pub mod error;
pub mod config;
pub mod state;
