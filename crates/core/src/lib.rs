//! `statebus-core`: building blocks shared by the dispatcher crates.
//!
//! This crate contains the **vocabulary** of the bus (event type keys, identifiers, errors)
//! and no dispatch logic.

pub mod error;
pub mod event;
pub mod id;

pub use error::{BusError, BusResult, CallbackKind};
pub use event::EventType;
pub use id::{BusId, ObjectId};
