//! Configuration module for Furlong
//!
//! Service, retry, pacing and output settings come from an optional TOML
//! file; what to crawl (year, places, caps) comes from the command line as
//! a [`RunPlan`].
//!
//! # Example
//!
//! ```no_run
//! use furlong::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("furlong.toml")).unwrap();
//! println!("Pausing {}s between batches", config.crawler.inter_batch_pause_secs);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, OutputConfig, RetryConfig, RunPlan, ServiceConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{
    build_run_plan, compute_config_hash, load_config, load_config_with_hash, parse_config,
    parse_places,
};
pub use validation::{validate as validate_config, validate_plan};
