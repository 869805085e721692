//! Access assertions: which thread may drive a bus.
//!
//! An [`EventBus`](crate::EventBus) is `Send` but not `Sync`: it can be handed to another
//! thread, but never used from two at once. These policies catch the first case when it
//! is not wanted.

use std::sync::OnceLock;
use std::thread::{self, ThreadId};

use serde::{Deserialize, Serialize};

use statebus_core::{BusError, BusResult};

/// Check run before every register/unregister/post.
pub trait AccessAssertion: Send {
    fn assert_access(&self) -> BusResult<()>;
}

/// No check at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unchecked;

impl AccessAssertion for Unchecked {
    fn assert_access(&self) -> BusResult<()> {
        Ok(())
    }
}

/// The first thread that uses the bus owns it.
#[derive(Debug, Default)]
pub struct SameThread {
    owner: OnceLock<ThreadId>,
}

impl SameThread {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(&self) -> Option<ThreadId> {
        self.owner.get().copied()
    }
}

impl AccessAssertion for SameThread {
    fn assert_access(&self) -> BusResult<()> {
        let actual = thread::current().id();
        let expected = *self.owner.get_or_init(|| actual);
        check(expected, actual)
    }
}

/// Only one designated thread may use the bus.
#[derive(Debug, Clone, Copy)]
pub struct DesignatedThread {
    thread: ThreadId,
}

impl DesignatedThread {
    pub fn new(thread: ThreadId) -> Self {
        Self { thread }
    }

    /// Designate the calling thread.
    pub fn current() -> Self {
        Self::new(thread::current().id())
    }
}

impl AccessAssertion for DesignatedThread {
    fn assert_access(&self) -> BusResult<()> {
        check(self.thread, thread::current().id())
    }
}

fn check(expected: ThreadId, actual: ThreadId) -> BusResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(BusError::AccessViolation { expected, actual })
    }
}

/// Serializable choice of access assertion.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPolicy {
    #[default]
    Unchecked,
    /// First caller wins ([`SameThread`]).
    SameThread,
    /// The thread that builds the bus ([`DesignatedThread::current`]).
    CurrentThread,
}

impl AccessPolicy {
    pub fn into_assertion(self) -> Box<dyn AccessAssertion> {
        match self {
            AccessPolicy::Unchecked => Box::new(Unchecked),
            AccessPolicy::SameThread => Box::new(SameThread::new()),
            AccessPolicy::CurrentThread => Box::new(DesignatedThread::current()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchecked_always_passes() {
        let assertion = Unchecked;
        assert!(assertion.assert_access().is_ok());
        let result = thread::spawn(move || assertion.assert_access()).join().unwrap();
        assert!(result.is_ok());
    }

    #[test]
    fn same_thread_pins_the_first_caller() {
        let assertion = SameThread::new();
        assert!(assertion.owner().is_none());
        assertion.assert_access().unwrap();
        assert_eq!(assertion.owner(), Some(thread::current().id()));
        assertion.assert_access().unwrap();

        let result = thread::spawn(move || assertion.assert_access()).join().unwrap();
        assert!(matches!(result, Err(BusError::AccessViolation { .. })));
    }

    #[test]
    fn same_thread_accepts_a_first_caller_elsewhere() {
        let assertion = SameThread::new();
        let result = thread::spawn(move || {
            assertion.assert_access()?;
            assertion.assert_access()
        })
        .join()
        .unwrap();
        assert!(result.is_ok());
    }

    #[test]
    fn designated_thread_rejects_everyone_else() {
        let worker = thread::spawn(|| thread::current().id());
        let worker_id = worker.thread().id();
        worker.join().unwrap();

        let assertion = DesignatedThread::new(worker_id);
        let err = assertion.assert_access().unwrap_err();
        assert!(matches!(
            err,
            BusError::AccessViolation { expected, actual }
                if expected == worker_id && actual == thread::current().id()
        ));

        assert!(DesignatedThread::current().assert_access().is_ok());
    }

    #[test]
    fn policies_build_their_assertion() {
        for policy in [
            AccessPolicy::Unchecked,
            AccessPolicy::SameThread,
            AccessPolicy::CurrentThread,
        ] {
            assert!(policy.into_assertion().assert_access().is_ok());
        }
    }
}
