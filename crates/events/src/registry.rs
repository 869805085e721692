//! Bus-scoped registries: which objects receive and produce which event types.
//!
//! Every mutation validates all affected event types before touching anything, so a
//! failed register/unregister leaves the registries exactly as they were.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use statebus_core::{BusError, BusResult, EventType, ObjectId};

use crate::bus::EventBus;
use crate::metadata::{AnyEvent, AnyObject, TypeMetadata};

/// A registered object together with its type metadata.
#[derive(Clone)]
pub(crate) struct Registered {
    id: ObjectId,
    object: Arc<AnyObject>,
    metadata: Arc<TypeMetadata>,
}

impl Registered {
    pub(crate) fn new(id: ObjectId, object: Arc<AnyObject>, metadata: Arc<TypeMetadata>) -> Self {
        Self {
            id,
            object,
            metadata,
        }
    }

    pub(crate) fn id(&self) -> ObjectId {
        self.id
    }

    pub(crate) fn metadata(&self) -> &TypeMetadata {
        &self.metadata
    }

    pub(crate) fn object_type(&self) -> &'static str {
        self.metadata.object_type()
    }

    /// Deliver `value` if this object consumes `event`.
    pub(crate) fn deliver(&self, event: EventType, value: &AnyEvent, bus: &EventBus) -> BusResult<bool> {
        self.metadata.consume(event, &*self.object, value, bus)
    }

    pub(crate) fn produce(&self, event: EventType) -> BusResult<Option<Box<AnyEvent>>> {
        self.metadata.produce(event, &*self.object)
    }
}

impl core::fmt::Debug for Registered {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registered")
            .field("id", &self.id)
            .field("object", &self.object_type())
            .finish()
    }
}

#[derive(Debug, Default)]
pub(crate) struct Registries {
    objects: HashSet<ObjectId>,
    receivers: HashMap<EventType, HashMap<ObjectId, Registered>>,
    producers: HashMap<EventType, Registered>,
}

impl Registries {
    /// Register `entry` as receiver and producer, all or nothing.
    pub(crate) fn register(&mut self, entry: &Registered) -> BusResult<()> {
        if self.objects.contains(&entry.id) {
            return Err(BusError::already_registered(entry.object_type(), None));
        }

        self.check_receiver(entry)?;
        self.check_producer(entry)?;

        self.register_receiver(entry)?;
        self.register_producer(entry)?;
        self.objects.insert(entry.id);
        Ok(())
    }

    /// Remove the object from every receiver set and producer slot, all or nothing.
    pub(crate) fn unregister(&mut self, id: ObjectId, metadata: &TypeMetadata) -> BusResult<()> {
        if !self.objects.contains(&id) {
            return Err(BusError::not_registered(metadata.object_type(), None));
        }

        self.check_receiver_removal(id, metadata)?;
        self.check_producer_removal(id, metadata)?;

        self.unregister_receiver(id, metadata)?;
        self.unregister_producer(id, metadata)?;
        self.objects.remove(&id);
        Ok(())
    }

    pub(crate) fn register_receiver(&mut self, entry: &Registered) -> BusResult<()> {
        self.check_receiver(entry)?;
        for event in entry.metadata.consumed_events() {
            self.receivers
                .entry(event)
                .or_default()
                .insert(entry.id, entry.clone());
        }
        Ok(())
    }

    pub(crate) fn unregister_receiver(&mut self, id: ObjectId, metadata: &TypeMetadata) -> BusResult<()> {
        self.check_receiver_removal(id, metadata)?;
        for event in metadata.consumed_events() {
            if let Some(set) = self.receivers.get_mut(&event) {
                set.remove(&id);
                if set.is_empty() {
                    self.receivers.remove(&event);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn register_producer(&mut self, entry: &Registered) -> BusResult<()> {
        self.check_producer(entry)?;
        for event in entry.metadata.produced_events() {
            self.producers.insert(event, entry.clone());
        }
        Ok(())
    }

    pub(crate) fn unregister_producer(&mut self, id: ObjectId, metadata: &TypeMetadata) -> BusResult<()> {
        self.check_producer_removal(id, metadata)?;
        for event in metadata.produced_events() {
            self.producers.remove(&event);
        }
        Ok(())
    }

    pub(crate) fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains(&id)
    }

    /// Snapshot of the receivers of `event`.
    pub(crate) fn receivers_of(&self, event: EventType) -> Vec<Registered> {
        self.receivers
            .get(&event)
            .map(|set| set.values().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn producer_of(&self, event: EventType) -> Option<Registered> {
        self.producers.get(&event).cloned()
    }

    pub(crate) fn receiver_count(&self, event: EventType) -> usize {
        self.receivers.get(&event).map_or(0, HashMap::len)
    }

    pub(crate) fn has_producer(&self, event: EventType) -> bool {
        self.producers.contains_key(&event)
    }

    fn check_receiver(&self, entry: &Registered) -> BusResult<()> {
        for event in entry.metadata.consumed_events() {
            let present = self
                .receivers
                .get(&event)
                .is_some_and(|set| set.contains_key(&entry.id));
            if present {
                return Err(BusError::already_registered(entry.object_type(), Some(event)));
            }
        }
        Ok(())
    }

    fn check_producer(&self, entry: &Registered) -> BusResult<()> {
        for event in entry.metadata.produced_events() {
            match self.producers.get(&event) {
                None => {}
                Some(existing) if existing.id == entry.id => {
                    return Err(BusError::already_registered(entry.object_type(), Some(event)));
                }
                Some(existing) => {
                    return Err(BusError::producer_conflict(
                        entry.object_type(),
                        event,
                        existing.object_type(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_receiver_removal(&self, id: ObjectId, metadata: &TypeMetadata) -> BusResult<()> {
        for event in metadata.consumed_events() {
            let present = self
                .receivers
                .get(&event)
                .is_some_and(|set| set.contains_key(&id));
            if !present {
                return Err(BusError::not_registered(metadata.object_type(), Some(event)));
            }
        }
        Ok(())
    }

    fn check_producer_removal(&self, id: ObjectId, metadata: &TypeMetadata) -> BusResult<()> {
        for event in metadata.produced_events() {
            match self.producers.get(&event) {
                Some(existing) if existing.id == id => {}
                _ => return Err(BusError::not_registered(metadata.object_type(), Some(event))),
            }
        }
        Ok(())
    }
}
