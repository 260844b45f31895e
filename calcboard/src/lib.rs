//! calcboard HTTP service
//!
//! The JSON API lives in [`server`]; the binaries in this crate only parse
//! arguments, load configuration and hand an [`server::AppState`] to it.

pub mod server;
