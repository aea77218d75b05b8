//! Core Module
//!
//! 配置加载

pub mod config;

pub use config::{Config, CrawlConfig, StoreConfig};
