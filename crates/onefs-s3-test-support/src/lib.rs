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

//! Shared test helpers used across integration suites.
//! Layout: clock.rs (manually driven clock), mocks.rs (in-memory identity backend).

pub mod clock;
pub mod mocks;

pub use clock::ManualClock;
pub use mocks::{BackendCall, BackendOperation, MemoryIdentityBackend, MintedKey};
