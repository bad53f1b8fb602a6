//! socket.io 0.9 client - main library
//!
//! ## Architecture
//!
//! - **socketio09**: protocol engine and client (re-exported from workspace)
//! - **bin_common**: shared utilities for binaries (environment config, logging)
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use socketio09_client::bin_common::{init_tracing, ListenConfig};
//! use socketio09_client::socketio09::SocketIoClient;
//! ```

// Re-export workspace libraries for convenience
pub use socketio09;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod logging;

    pub use cli::{load_setting_from_env, parse_args, ListenConfig, Setting};
    pub use logging::init_tracing;
}
