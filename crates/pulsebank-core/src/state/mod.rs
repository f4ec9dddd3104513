//! Control messages and persisted engine state.
//!
//! All changes to the sequencer flow through messages:
//!
//! - [`ControlRequest`] - What a user or host asks for
//! - [`LiveUpdate`] - A resolved, fixed-size change the realtime side applies
//! - [`EngineSnapshot`] - The persisted state of banks and IOI table

mod messages;
mod snapshot;

pub use messages::{ControlRequest, LiveUpdate};
pub use snapshot::EngineSnapshot;
