//! Configuration for boxctl.
//!
//! Every global command-line flag has a counterpart in the YAML config
//! file. Values are resolved with the precedence *command line > config
//! file > built-in default*; this crate covers the last two.
//!
//! # Quick start
//!
//! ```no_run
//! use boxctl_config::Config;
//!
//! let config = Config::load_or_default(Config::default_path()).unwrap();
//! println!("namespace: {}", config.namespace);
//! ```

mod config;
mod error;

pub use config::{CONFIG_ENV, Config, DEFAULT_CONFIG_PATH};
pub use error::{ConfigError, Result};
