//! sockio command-line tooling
//!
//! ## Architecture
//!
//! - **sockio**: connection-lifecycle library (re-exported from workspace)
//! - **bin_common**: shared pieces of the binaries (config path, settings,
//!   logging, shutdown signal)
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use sockio_cli::bin_common::{load_config_from_env, ClientSettings, ConfigType};
//! ```

// Re-export workspace libraries for convenience
pub use sockio;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod logging;
    pub mod settings;
    pub mod shutdown;

    pub use cli::{load_config_from_env, parse_args, ConfigType};
    pub use logging::init_tracing;
    pub use settings::{ClientSettings, ConfigError, ReconnectSettings, StrategyKind};
    pub use shutdown::ShutdownManager;
}
