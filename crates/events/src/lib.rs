//! `statebus-events`: in-process publish/subscribe dispatch.
//!
//! Objects implement [`Subscriber`] to declare which event types they consume and which
//! they can produce on demand. An [`EventBus`] routes posted events to the registered
//! receivers of their type and, when an object is registered, synthesizes deliveries
//! between it and the producers/receivers already on the bus.
//!
//! - **Synchronous**: every call returns once all deliveries it triggered are done.
//! - **Reentrant**: callbacks may post/register/unregister; those calls are queued (FIFO)
//!   and run by the drain loop already on the stack.
//! - **Single owner**: a bus is `Send` but not `Sync`; see [`access`] for thread policies.

pub mod access;
pub mod bus;
pub mod cache;
pub mod config;
pub mod metadata;

mod registry;
mod task;

pub use access::{AccessAssertion, AccessPolicy, DesignatedThread, SameThread, Unchecked};
pub use bus::EventBus;
pub use config::{BusConfig, ConfigError};
pub use metadata::{Handlers, Subscriber, TypeMetadata};

pub use statebus_core::{BusError, BusId, BusResult, CallbackKind, EventType, ObjectId};
