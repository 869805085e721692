//! Process-wide metadata cache.
//!
//! Metadata only depends on the static shape of a type, so it is built once per type on
//! first use, shared by every bus, and never evicted.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use tracing::debug;

use statebus_core::BusResult;

use crate::metadata::{Subscriber, TypeMetadata};

static METADATA: LazyLock<Mutex<HashMap<TypeId, Arc<TypeMetadata>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Metadata of `T`, built and cached on first request.
///
/// The lock is held across check, build and insert, so concurrent first requests for the
/// same type build it exactly once. A failed build is not cached.
pub fn metadata_for<T: Subscriber>() -> BusResult<Arc<TypeMetadata>> {
    // Entries are only inserted after a successful build, so a poisoned map is still
    // consistent.
    let mut cache = METADATA.lock().unwrap_or_else(PoisonError::into_inner);

    if let Some(metadata) = cache.get(&TypeId::of::<T>()) {
        return Ok(Arc::clone(metadata));
    }

    let metadata = Arc::new(TypeMetadata::build::<T>()?);
    debug!(
        object = metadata.object_type(),
        consumers = metadata.consumed_events().count(),
        producers = metadata.produced_events().count(),
        "type metadata built"
    );
    cache.insert(TypeId::of::<T>(), Arc::clone(&metadata));
    Ok(metadata)
}

/// Metadata for `type_id`, if it was built before. Never builds.
pub fn cached(type_id: TypeId) -> Option<Arc<TypeMetadata>> {
    METADATA
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&type_id)
        .cloned()
}
