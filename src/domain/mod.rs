//! Core domain types and logic.

pub mod analyzer;
pub mod config;
pub mod config_validation;
pub mod error;
pub mod indicator;
pub mod ohlcv;
pub mod registry;
pub mod scoring;
pub mod strategy;
pub mod universe;
pub mod verdict;
