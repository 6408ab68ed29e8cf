//! Client credentials: the identity archive and the pinned trust anchor.
//!
//! Both loaders are pure functions over bytes. They return immutable values
//! and never touch process-wide trust configuration, so loading is freely
//! repeatable and each credential can be retried independently.

pub mod anchor;
pub mod archive;

pub use anchor::{load_anchor, PinnedAnchor};
pub use archive::{load_identity, ClientIdentity};
