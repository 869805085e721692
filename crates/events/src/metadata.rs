//! Per-type capability description (which events a type consumes and produces).
//!
//! A type opts into the bus by implementing [`Subscriber`] and listing its callbacks in
//! [`Subscriber::describe`]. The listing is turned into a [`TypeMetadata`] once per type
//! (see [`crate::cache`]) and shared by every bus in the process.
//!
//! ## Example
//!
//! ```ignore
//! struct Thermostat { target: AtomicI32 }
//!
//! impl Subscriber for Thermostat {
//!     fn describe(handlers: &mut Handlers<Self>) {
//!         handlers
//!             .subscribe(|t: &Thermostat, ev: &SetTarget, _bus: &EventBus| {
//!                 t.target.store(ev.0, Ordering::SeqCst);
//!                 Ok(())
//!             })
//!             .produce(|t: &Thermostat| Ok(Some(Target(t.target.load(Ordering::SeqCst)))));
//!     }
//! }
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::marker::PhantomData;
use std::sync::Arc;

use statebus_core::{BusError, BusResult, CallbackKind, EventType};

use crate::bus::EventBus;

/// A registered object, type-erased.
pub type AnyObject = dyn Any + Send + Sync;

/// An event value, type-erased.
pub type AnyEvent = dyn Any + Send;

type ConsumeFn = dyn Fn(&AnyObject, &AnyEvent, &EventBus) -> anyhow::Result<()> + Send + Sync;
type ProduceFn = dyn Fn(&AnyObject) -> anyhow::Result<Option<Box<AnyEvent>>> + Send + Sync;

/// A type that can be registered on an [`EventBus`].
///
/// `describe` must be deterministic: it is called once per type and the result is cached
/// for the lifetime of the process.
pub trait Subscriber: Sized + Send + Sync + 'static {
    fn describe(handlers: &mut Handlers<Self>);
}

/// Builder collecting the callbacks of one [`Subscriber`] type.
pub struct Handlers<T> {
    consumers: HashMap<EventType, Arc<ConsumeFn>>,
    producers: HashMap<EventType, Arc<ProduceFn>>,
    duplicate: Option<BusError>,
    _object: PhantomData<fn(&T)>,
}

impl<T: Subscriber> Handlers<T> {
    fn new() -> Self {
        Self {
            consumers: HashMap::new(),
            producers: HashMap::new(),
            duplicate: None,
            _object: PhantomData,
        }
    }

    /// Consume events of type `E`.
    ///
    /// The callback gets the bus performing the delivery, so it can post, register or
    /// unregister; those calls are queued and run after the current delivery.
    pub fn subscribe<E, F>(&mut self, callback: F) -> &mut Self
    where
        E: Send + 'static,
        F: Fn(&T, &E, &EventBus) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let event = EventType::of::<E>();
        match self.consumers.entry(event) {
            Entry::Occupied(_) => self.record_duplicate(event, CallbackKind::Consumer),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(
                    move |object: &AnyObject, value: &AnyEvent, bus: &EventBus| -> anyhow::Result<()> {
                        let object = downcast_object::<T>(object)?;
                        let value = value
                            .downcast_ref::<E>()
                            .ok_or_else(|| anyhow::anyhow!("event value is not a `{event}`"))?;
                        callback(object, value, bus)
                    },
                ));
            }
        }
        self
    }

    /// Produce the current value of `E` on demand. `Ok(None)` means "no value yet".
    pub fn produce<E, F>(&mut self, callback: F) -> &mut Self
    where
        E: Send + 'static,
        F: Fn(&T) -> anyhow::Result<Option<E>> + Send + Sync + 'static,
    {
        let event = EventType::of::<E>();
        match self.producers.entry(event) {
            Entry::Occupied(_) => self.record_duplicate(event, CallbackKind::Producer),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(
                    move |object: &AnyObject| -> anyhow::Result<Option<Box<AnyEvent>>> {
                        let object = downcast_object::<T>(object)?;
                        let value = callback(object)?;
                        Ok(value.map(|value| Box::new(value) as Box<AnyEvent>))
                    },
                ));
            }
        }
        self
    }

    fn record_duplicate(&mut self, event: EventType, kind: CallbackKind) {
        // Report the first duplicate only.
        if self.duplicate.is_none() {
            self.duplicate = Some(BusError::duplicate_callback(
                core::any::type_name::<T>(),
                event,
                kind,
            ));
        }
    }
}

fn downcast_object<T: 'static>(object: &AnyObject) -> anyhow::Result<&T> {
    object
        .downcast_ref::<T>()
        .ok_or_else(|| anyhow::anyhow!("object is not a `{}`", core::any::type_name::<T>()))
}

/// Immutable description of one object type: at most one consumer and at most one
/// producer per event type.
pub struct TypeMetadata {
    object: &'static str,
    consumers: HashMap<EventType, Arc<ConsumeFn>>,
    producers: HashMap<EventType, Arc<ProduceFn>>,
}

impl TypeMetadata {
    /// Build the metadata of `T` from its [`Subscriber::describe`] listing.
    ///
    /// Fails with [`BusError::DuplicateCallback`] when `T` lists two consumers (or two
    /// producers) for the same event type.
    pub fn build<T: Subscriber>() -> BusResult<Self> {
        let mut handlers = Handlers::<T>::new();
        T::describe(&mut handlers);

        if let Some(err) = handlers.duplicate {
            return Err(err);
        }

        Ok(Self {
            object: core::any::type_name::<T>(),
            consumers: handlers.consumers,
            producers: handlers.producers,
        })
    }

    pub fn object_type(&self) -> &'static str {
        self.object
    }

    pub fn consumed_events(&self) -> impl Iterator<Item = EventType> + '_ {
        self.consumers.keys().copied()
    }

    pub fn produced_events(&self) -> impl Iterator<Item = EventType> + '_ {
        self.producers.keys().copied()
    }

    pub fn consumes(&self, event: EventType) -> bool {
        self.consumers.contains_key(&event)
    }

    pub fn produces(&self, event: EventType) -> bool {
        self.producers.contains_key(&event)
    }

    /// Deliver `value` to `object`. Returns `false` if this type does not consume `event`.
    pub(crate) fn consume(
        &self,
        event: EventType,
        object: &AnyObject,
        value: &AnyEvent,
        bus: &EventBus,
    ) -> BusResult<bool> {
        let Some(consumer) = self.consumers.get(&event) else {
            return Ok(false);
        };
        consumer(object, value, bus)
            .map_err(|source| BusError::dispatch(event, CallbackKind::Consumer, source))?;
        Ok(true)
    }

    /// Ask `object` for its current value of `event`.
    pub(crate) fn produce(&self, event: EventType, object: &AnyObject) -> BusResult<Option<Box<AnyEvent>>> {
        let Some(producer) = self.producers.get(&event) else {
            return Ok(None);
        };
        producer(object).map_err(|source| BusError::dispatch(event, CallbackKind::Producer, source))
    }
}

impl core::fmt::Debug for TypeMetadata {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TypeMetadata")
            .field("object", &self.object)
            .field("consumers", &self.consumers.keys().collect::<Vec<_>>())
            .field("producers", &self.producers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct Temperature(i32);

    #[derive(Debug, Clone, PartialEq)]
    struct Humidity(u8);

    struct Station {
        temperature: i32,
        seen: Mutex<Vec<Humidity>>,
    }

    impl Subscriber for Station {
        fn describe(handlers: &mut Handlers<Self>) {
            handlers
                .produce(|s: &Station| Ok(Some(Temperature(s.temperature))))
                .subscribe(|s: &Station, h: &Humidity, _bus: &EventBus| {
                    s.seen.lock().unwrap().push(h.clone());
                    Ok(())
                });
        }
    }

    struct TwoConsumers;

    impl Subscriber for TwoConsumers {
        fn describe(handlers: &mut Handlers<Self>) {
            handlers
                .subscribe(|_: &TwoConsumers, _: &Temperature, _: &EventBus| Ok(()))
                .subscribe(|_: &TwoConsumers, _: &Temperature, _: &EventBus| Ok(()));
        }
    }

    struct TwoProducers;

    impl Subscriber for TwoProducers {
        fn describe(handlers: &mut Handlers<Self>) {
            handlers
                .produce(|_: &TwoProducers| Ok(Some(Temperature(1))))
                .produce(|_: &TwoProducers| Ok(Some(Temperature(2))));
        }
    }

    struct SelfFeeding;

    impl Subscriber for SelfFeeding {
        fn describe(handlers: &mut Handlers<Self>) {
            handlers
                .produce(|_: &SelfFeeding| Ok(None::<Temperature>))
                .subscribe(|_: &SelfFeeding, _: &Temperature, _: &EventBus| Ok(()));
        }
    }

    #[test]
    fn build_lists_consumers_and_producers() {
        let meta = TypeMetadata::build::<Station>().unwrap();

        assert!(meta.object_type().ends_with("Station"));
        assert!(meta.produces(EventType::of::<Temperature>()));
        assert!(meta.consumes(EventType::of::<Humidity>()));
        assert!(!meta.consumes(EventType::of::<Temperature>()));
        assert_eq!(meta.consumed_events().count(), 1);
        assert_eq!(meta.produced_events().count(), 1);
    }

    #[test]
    fn duplicate_consumer_fails_fast() {
        let err = TypeMetadata::build::<TwoConsumers>().unwrap_err();
        assert!(matches!(
            err,
            BusError::DuplicateCallback { kind: CallbackKind::Consumer, event, .. }
                if event == EventType::of::<Temperature>()
        ));
    }

    #[test]
    fn duplicate_producer_fails_fast() {
        let err = TypeMetadata::build::<TwoProducers>().unwrap_err();
        assert!(matches!(
            err,
            BusError::DuplicateCallback { kind: CallbackKind::Producer, .. }
        ));
    }

    #[test]
    fn consuming_and_producing_the_same_event_is_allowed() {
        let meta = TypeMetadata::build::<SelfFeeding>().unwrap();
        let event = EventType::of::<Temperature>();
        assert!(meta.consumes(event) && meta.produces(event));
    }

    #[test]
    fn erased_callbacks_reach_the_concrete_type() {
        let meta = TypeMetadata::build::<Station>().unwrap();
        let bus = EventBus::new();
        let station = Station {
            temperature: 21,
            seen: Mutex::new(Vec::new()),
        };

        let produced = meta
            .produce(EventType::of::<Temperature>(), &station)
            .unwrap()
            .unwrap();
        assert_eq!(produced.downcast_ref::<Temperature>(), Some(&Temperature(21)));

        let delivered = meta
            .consume(EventType::of::<Humidity>(), &station, &Humidity(40), &bus)
            .unwrap();
        assert!(delivered);
        assert_eq!(*station.seen.lock().unwrap(), vec![Humidity(40)]);

        let delivered = meta
            .consume(EventType::of::<Temperature>(), &station, &Temperature(3), &bus)
            .unwrap();
        assert!(!delivered);
    }

    #[test]
    fn mismatched_values_fail_instead_of_panicking() {
        let meta = TypeMetadata::build::<Station>().unwrap();
        let bus = EventBus::new();
        let station = Station {
            temperature: 0,
            seen: Mutex::new(Vec::new()),
        };

        let err = meta
            .consume(EventType::of::<Humidity>(), &station, &Temperature(1), &bus)
            .unwrap_err();
        assert!(err.is_dispatch_failure());
    }
}
