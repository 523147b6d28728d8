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

//! Engine-agnostic building blocks for ephemeral `OneFS` S3 credentials.
//!
//! Layout: `ttl.rs` (TTL cascade + lease rounding), `naming.rs` (generated
//! identity names and the recognition pattern), `model.rs` (DTOs exchanged with
//! the identity backend), `backend.rs` (identity backend trait), `clock.rs`
//! (wall-clock abstraction), `error.rs` (codec errors).

pub mod backend;
pub mod clock;
pub mod error;
pub mod model;
pub mod naming;
pub mod ttl;

pub use backend::IdentityBackend;
pub use clock::{Clock, SystemClock};
pub use error::{NamingError, NamingResult};
pub use model::{Identity, IssuedCredential, KeyPair, NewIdentity};
pub use naming::{
    IdentityName, IdentityPattern, NAME_CORRELATION_LENGTH, NAME_SUFFIX_LENGTH,
    NAME_TIMESTAMP_FORMAT, NameStamp,
};
pub use ttl::{
    LeaseTerm, TTL_INHERIT, TTL_TIME_UNIT, TTL_UNLIMITED, cascade_ttl, max_ttl,
    resolve_effective_ttl, round_to_unit, tighter_ttl,
};
