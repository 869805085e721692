//! Pending bus operations and the FIFO queue the drain loop consumes.

use std::any::TypeId;
use std::collections::VecDeque;
use std::sync::Arc;

use statebus_core::{BusResult, EventType, ObjectId};

use crate::cache;
use crate::metadata::{AnyEvent, AnyObject, Subscriber, TypeMetadata};

/// An object on its way into (or out of) the registries.
pub(crate) struct ObjectHandle {
    pub(crate) id: ObjectId,
    pub(crate) object: Arc<AnyObject>,
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    /// Builds (or fetches) the metadata of the concrete type.
    pub(crate) metadata: fn() -> BusResult<Arc<TypeMetadata>>,
}

impl ObjectHandle {
    pub(crate) fn new<T: Subscriber>(object: Arc<T>) -> Self {
        Self {
            id: ObjectId::of(&object),
            object,
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
            metadata: cache::metadata_for::<T>,
        }
    }
}

pub(crate) struct PostedEvent {
    pub(crate) event_type: EventType,
    pub(crate) value: Box<AnyEvent>,
}

impl PostedEvent {
    pub(crate) fn new<E: Send + 'static>(value: E) -> Self {
        Self {
            event_type: EventType::of::<E>(),
            value: Box::new(value),
        }
    }
}

pub(crate) enum Task {
    Register(ObjectHandle),
    Unregister(ObjectHandle),
    Post(PostedEvent),
}

impl core::fmt::Debug for Task {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Task::Register(handle) => write!(f, "register({} @ {})", handle.type_name, handle.id),
            Task::Unregister(handle) => write!(f, "unregister({} @ {})", handle.type_name, handle.id),
            Task::Post(event) => write!(f, "post({})", event.event_type),
        }
    }
}

/// Queue plus the idle/draining flag.
///
/// The flag is a reentrancy guard for a single owner, not a lock.
#[derive(Debug)]
pub(crate) struct TaskQueue {
    tasks: VecDeque<Task>,
    draining: bool,
}

impl TaskQueue {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            tasks: VecDeque::with_capacity(capacity),
            draining: false,
        }
    }

    pub(crate) fn push(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    pub(crate) fn pop(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    /// Switch to draining. Returns `false` if a drain is already running.
    pub(crate) fn begin_drain(&mut self) -> bool {
        if self.draining {
            return false;
        }
        self.draining = true;
        true
    }

    pub(crate) fn finish_drain(&mut self) {
        self.draining = false;
    }

    /// Drop every queued task, returning how many were dropped.
    pub(crate) fn discard(&mut self) -> usize {
        let dropped = self.tasks.len();
        self.tasks.clear();
        dropped
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    pub(crate) fn is_draining(&self) -> bool {
        self.draining
    }
}
