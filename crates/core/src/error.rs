//! Bus error model.

use std::thread::ThreadId;

use thiserror::Error;

use crate::event::EventType;

/// Result type used across the bus crates.
pub type BusResult<T> = Result<T, BusError>;

/// Which side of a type's capabilities a callback belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CallbackKind {
    Consumer,
    Producer,
}

impl core::fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CallbackKind::Consumer => f.write_str("consumer"),
            CallbackKind::Producer => f.write_str("producer"),
        }
    }
}

/// Bus-level error.
///
/// Every variant is either a contract violation by the caller or a propagated callback
/// failure. None of them is transient; nothing in the bus retries.
#[derive(Debug, Error)]
pub enum BusError {
    /// A type declares two consumers (or two producers) for the same event type.
    #[error("`{object}` declares more than one {kind} callback for event `{event}`")]
    DuplicateCallback {
        object: &'static str,
        event: EventType,
        kind: CallbackKind,
    },

    /// The object is already registered (for `event`, when known).
    #[error("`{object}` is already registered{}", for_event(.event))]
    AlreadyRegistered {
        object: &'static str,
        event: Option<EventType>,
    },

    /// The object (or its producer slot for `event`) is not registered.
    #[error("`{object}` is not registered{}", for_event(.event))]
    NotRegistered {
        object: &'static str,
        event: Option<EventType>,
    },

    /// Another object already produces `event` on this bus.
    #[error("`{object}` cannot produce event `{event}`: `{existing}` is already its producer")]
    ProducerConflict {
        object: &'static str,
        event: EventType,
        existing: &'static str,
    },

    /// A consumer or producer callback failed during delivery.
    #[error("{kind} callback for event `{event}` failed: {source}")]
    Dispatch {
        event: EventType,
        kind: CallbackKind,
        #[source]
        source: anyhow::Error,
    },

    /// The bus was used from a thread its access policy does not allow.
    #[error("bus accessed from thread {actual:?}, expected {expected:?}")]
    AccessViolation { expected: ThreadId, actual: ThreadId },
}

fn for_event(event: &Option<EventType>) -> String {
    match event {
        Some(event) => format!(" for event `{event}`"),
        None => String::new(),
    }
}

impl BusError {
    pub fn duplicate_callback(object: &'static str, event: EventType, kind: CallbackKind) -> Self {
        Self::DuplicateCallback { object, event, kind }
    }

    pub fn already_registered(object: &'static str, event: Option<EventType>) -> Self {
        Self::AlreadyRegistered { object, event }
    }

    pub fn not_registered(object: &'static str, event: Option<EventType>) -> Self {
        Self::NotRegistered { object, event }
    }

    pub fn producer_conflict(object: &'static str, event: EventType, existing: &'static str) -> Self {
        Self::ProducerConflict {
            object,
            event,
            existing,
        }
    }

    pub fn dispatch(event: EventType, kind: CallbackKind, source: anyhow::Error) -> Self {
        Self::Dispatch { event, kind, source }
    }

    /// True when the error wraps a failing callback (as opposed to a contract violation).
    pub fn is_dispatch_failure(&self) -> bool {
        matches!(self, Self::Dispatch { .. })
    }
}
