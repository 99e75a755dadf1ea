//! Configuration module for modem-bridge.
//!
//! TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `MODEM_BRIDGE_CONFIG` environment variable (explicit path)
//! 2. `./config.toml` (current directory)
//! 3. `$XDG_CONFIG_HOME/modem-bridge/config.toml` (falls back to `~/.config`)
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is `MODEM_BRIDGE_<SECTION>_<KEY>`, for example
//! `MODEM_BRIDGE_SERIAL_BAUD_RATE=9600` or `MODEM_BRIDGE_MODEM_SMS_MODE=text`.
//!
//! # Example
//!
//! ```rust,no_run
//! use modem_bridge::config::ConfigLoader;
//!
//! let config = ConfigLoader::load()?.into_config();
//! println!("Baud: {}", config.serial.baud_rate);
//! # Ok::<(), modem_bridge::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{Config, EventsConfig, LogFormat, LoggingConfig, ModemConfig, SerialConfig};
