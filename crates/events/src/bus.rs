//! The dispatch engine.
//!
//! Every public operation is turned into a [`Task`] and appended to the queue. If no drain
//! is running, the caller becomes the drain loop and processes tasks until the queue is
//! empty; if a drain is running (the call comes from inside a callback), the task is only
//! queued and the running loop picks it up later. There is never more than one loop on the
//! stack.
//!
//! ## Synthetic delivery
//!
//! Registering an object triggers deliveries without any `post`:
//!
//! 1. for every event the object produces, existing receivers of that event get the
//!    object's current value;
//! 2. for every event the object consumes, the existing producer of that event (if any)
//!    is asked for its current value, which is delivered to the new object only.
//!
//! Direction 1 skips the new object itself, so an object that both produces and consumes
//! an event sees its own value once, through direction 2.
//!
//! ## Failures
//!
//! The first failing task stops the drain: its error is returned to the caller that
//! started the drain and every task still queued is discarded. The bus stays usable.

use std::cell::RefCell;
use std::sync::Arc;

use tracing::{debug, debug_span, trace, warn};

use statebus_core::{BusError, BusId, BusResult, EventType, ObjectId};

use crate::access::{AccessAssertion, Unchecked};
use crate::cache;
use crate::config::{BusConfig, DEFAULT_QUEUE_CAPACITY};
use crate::metadata::Subscriber;
use crate::registry::{Registered, Registries};
use crate::task::{ObjectHandle, PostedEvent, Task, TaskQueue};

/// In-process publish/subscribe bus.
///
/// Not `Sync`: a bus has a single owner at a time. Callbacks get `&EventBus` and may call
/// back into it.
pub struct EventBus {
    id: BusId,
    registries: RefCell<Registries>,
    queue: RefCell<TaskQueue>,
    access: Box<dyn AccessAssertion>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_access(Unchecked)
    }

    pub fn with_access(access: impl AccessAssertion + 'static) -> Self {
        Self::build(Box::new(access), DEFAULT_QUEUE_CAPACITY)
    }

    pub fn from_config(config: &BusConfig) -> Self {
        Self::build(config.access.into_assertion(), config.queue_capacity)
    }

    fn build(access: Box<dyn AccessAssertion>, queue_capacity: usize) -> Self {
        let id = BusId::new();
        debug!(bus = %id, queue_capacity, "bus created");
        Self {
            id,
            registries: RefCell::new(Registries::default()),
            queue: RefCell::new(TaskQueue::with_capacity(queue_capacity)),
            access,
        }
    }

    pub fn id(&self) -> BusId {
        self.id
    }

    /// Register `object` as receiver of the events it consumes and producer of the events
    /// it produces, then run synthetic delivery.
    pub fn register<T: Subscriber>(&self, object: Arc<T>) -> BusResult<()> {
        self.submit(Task::Register(ObjectHandle::new(object)))
    }

    /// Remove `object` from every receiver set and producer slot it holds.
    pub fn unregister<T: Subscriber>(&self, object: &Arc<T>) -> BusResult<()> {
        self.submit(Task::Unregister(ObjectHandle::new(Arc::clone(object))))
    }

    /// Deliver `event` to every receiver of its type. Without receivers it is dropped.
    pub fn post<E: Send + 'static>(&self, event: E) -> BusResult<()> {
        self.submit(Task::Post(PostedEvent::new(event)))
    }

    pub fn is_registered<T: ?Sized>(&self, object: &Arc<T>) -> bool {
        self.registries.borrow().contains(ObjectId::of(object))
    }

    pub fn receiver_count<E: 'static>(&self) -> usize {
        self.registries.borrow().receiver_count(EventType::of::<E>())
    }

    pub fn has_producer<E: 'static>(&self) -> bool {
        self.registries.borrow().has_producer(EventType::of::<E>())
    }

    /// True while a drain loop is running (i.e. when called from inside a callback).
    pub fn is_draining(&self) -> bool {
        self.queue.borrow().is_draining()
    }

    /// Tasks queued behind the one being processed.
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    fn submit(&self, task: Task) -> BusResult<()> {
        self.access.assert_access()?;

        let start = {
            let mut queue = self.queue.borrow_mut();
            trace!(bus = %self.id, ?task, draining = queue.is_draining(), "task queued");
            queue.push(task);
            queue.begin_drain()
        };
        if !start {
            return Ok(());
        }

        let _idle = DrainGuard { queue: &self.queue };
        let _span = debug_span!("drain", bus = %self.id).entered();
        self.drain()
    }

    fn drain(&self) -> BusResult<()> {
        loop {
            let next = self.queue.borrow_mut().pop();
            let Some(task) = next else {
                return Ok(());
            };

            if let Err(err) = self.process(task) {
                let discarded = self.queue.borrow_mut().discard();
                if discarded > 0 {
                    warn!(bus = %self.id, discarded, error = %err, "drain aborted, queued tasks discarded");
                }
                return Err(err);
            }
        }
    }

    fn process(&self, task: Task) -> BusResult<()> {
        match task {
            Task::Register(handle) => self.register_now(handle),
            Task::Unregister(handle) => self.unregister_now(handle),
            Task::Post(event) => self.post_now(event),
        }
    }

    fn register_now(&self, handle: ObjectHandle) -> BusResult<()> {
        let metadata = (handle.metadata)()?;
        let entry = Registered::new(handle.id, handle.object, metadata);

        self.registries.borrow_mut().register(&entry)?;
        debug!(bus = %self.id, object = entry.object_type(), id = %entry.id(), "registered");

        // New producer -> existing receivers.
        for event in entry.metadata().produced_events() {
            let receivers: Vec<Registered> = self
                .registries
                .borrow()
                .receivers_of(event)
                .into_iter()
                .filter(|receiver| receiver.id() != entry.id())
                .collect();
            if receivers.is_empty() {
                continue;
            }

            let Some(value) = entry.produce(event)? else {
                trace!(bus = %self.id, %event, producer = entry.object_type(), "producer has no value yet");
                continue;
            };
            for receiver in &receivers {
                trace!(bus = %self.id, %event, receiver = receiver.object_type(), "synthetic delivery");
                receiver.deliver(event, &*value, self)?;
            }
        }

        // Existing producers -> new receiver.
        for event in entry.metadata().consumed_events() {
            let producer = self.registries.borrow().producer_of(event);
            let Some(producer) = producer else {
                continue;
            };

            if let Some(value) = producer.produce(event)? {
                trace!(bus = %self.id, %event, producer = producer.object_type(), "synthetic delivery");
                entry.deliver(event, &*value, self)?;
            }
        }

        Ok(())
    }

    fn unregister_now(&self, handle: ObjectHandle) -> BusResult<()> {
        // A type that never went through `register` has no metadata, so it cannot be
        // registered on any bus.
        let metadata = cache::cached(handle.type_id)
            .ok_or_else(|| BusError::not_registered(handle.type_name, None))?;

        self.registries.borrow_mut().unregister(handle.id, &metadata)?;
        debug!(bus = %self.id, object = handle.type_name, id = %handle.id, "unregistered");
        Ok(())
    }

    fn post_now(&self, event: PostedEvent) -> BusResult<()> {
        let PostedEvent { event_type, value } = event;

        let receivers = self.registries.borrow().receivers_of(event_type);
        if receivers.is_empty() {
            trace!(bus = %self.id, event = %event_type, "no receivers, event dropped");
            return Ok(());
        }

        debug!(bus = %self.id, event = %event_type, receivers = receivers.len(), "posting");
        for receiver in &receivers {
            receiver.deliver(event_type, &*value, self)?;
        }
        Ok(())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventBus")
            .field("id", &self.id)
            .field("registries", &self.registries)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

/// Puts the bus back to idle when the drain loop exits, including by unwinding.
struct DrainGuard<'a> {
    queue: &'a RefCell<TaskQueue>,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut queue) = self.queue.try_borrow_mut() {
            queue.discard();
            queue.finish_drain();
        }
    }
}
