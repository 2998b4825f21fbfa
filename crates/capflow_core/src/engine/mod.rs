//! Recognition engine selection.
//!
//! Long media drifts on the fast engine, so the choice is driven by the
//! measured duration. See [`EngineSelector`].

mod selector;

pub use selector::{EngineSelection, EngineSelector};
