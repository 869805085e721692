//! Event type keys.

use core::any::TypeId;
use core::hash::{Hash, Hasher};

/// Nominal identity of a class of events.
///
/// Every event value has exactly one event type: its concrete Rust type. There is no
/// hierarchy and no wildcard matching; a receiver of `Temperature` never sees a
/// `Pressure`, even if both wrap the same payload.
///
/// Equality and hashing only look at the [`TypeId`]. The type name is carried along for
/// logs and error messages.
#[derive(Debug, Copy, Clone)]
pub struct EventType {
    id: TypeId,
    name: &'static str,
}

impl EventType {
    /// Event type of values of type `E`.
    pub fn of<E: 'static>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: core::any::type_name::<E>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is<E: 'static>(&self) -> bool {
        self.id == TypeId::of::<E>()
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventType {}

impl Hash for EventType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl core::fmt::Display for EventType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name)
    }
}
