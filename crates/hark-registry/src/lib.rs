//! Hark registry crate - the adapter-facing operation surface.
//!
//! A [`SessionRegistry`] maps `SessionId`s to owned sessions and exposes
//! the named operations a host binding layer calls, plus the per-session
//! key/value side table hosts use to attach arbitrary user data.

pub mod registry;

pub use registry::{DrainOutcome, SessionRegistry};
