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

//! Key-value backed configuration facade for the credential plugin.
//!
//! Layout: `store.rs` (storage trait + in-memory store), `model.rs` (records
//! and patches), `defaults.rs` (storage keys and fallback values),
//! `validate.rs` (normalisation and validation), `service.rs`
//! (`ConfigService`).

pub mod defaults;
pub mod error;
pub mod model;
pub mod service;
pub mod store;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use model::{
    DynamicRole, DynamicRolePatch, GlobalConfig, GlobalConfigPatch, PredefinedRole,
    PredefinedRolePatch,
};
pub use service::ConfigService;
pub use store::{KvStore, MemoryStore};
