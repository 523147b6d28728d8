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

//! Ephemeral credential lifecycle: issuance and expiry reclamation.
//!
//! Layout: `minter.rs` (credential issuance), `sweep.rs` (one reclamation
//! pass and its report), `scheduler.rs` (drift-free sweep scheduling),
//! `error.rs` (engine error taxonomy).

pub mod error;
pub mod minter;
pub mod scheduler;
pub mod sweep;

pub use error::{EngineError, EngineResult};
pub use minter::{CredentialKind, CredentialMinter};
pub use scheduler::{ExpirySweeper, SweepSchedule, TickOutcome};
pub use sweep::{ReclaimFailure, ReclaimedIdentity, SweepReport};
