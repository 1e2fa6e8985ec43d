//! CLI command handlers

pub mod analyze;
pub mod clear;
pub mod config;
pub mod stats;
