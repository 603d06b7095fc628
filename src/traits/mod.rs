//! Trait definitions for swappable backends
//!
//! Session storage lives here; the usage store and payment backend traits
//! sit next to their domain types in `usage` and `billing::payment`.

pub mod session;
