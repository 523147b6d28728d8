#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Host-facing facade wiring configuration, issuance, and the expiry sweeper.
//!
//! Layout: `plugin.rs` (`CredentialPlugin` and the periodic tick task),
//! `error.rs` (plugin error taxonomy).

pub mod error;
pub mod plugin;

pub use error::{PluginError, PluginResult};
pub use plugin::{CredentialPlugin, spawn_periodic};
