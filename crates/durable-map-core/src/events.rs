// crates/durable-map-core/src/events.rs
// ============================================================================
// Module: Monitorable
// Description: Observer registration contract and a reusable registry.
// Purpose: Let collaborating subsystems broadcast lifecycle events.
// Dependencies: std
// ============================================================================

//! ## Overview
//! [`Monitorable`] fixes how listeners are registered and counted. How and on
//! which thread events are emitted is left to each implementor; the durable
//! map emits [`MapEvent`] values synchronously on the calling thread, after
//! the change has committed.
//!
//! Invariants:
//! - Listener identity is the listener's own `PartialEq`.
//! - Registering an already-registered listener is a no-op.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

// ============================================================================
// SECTION: Monitorable
// ============================================================================

/// Observer registration surface.
pub trait Monitorable<L: PartialEq> {
    /// Registers `listener` unless an equal listener is already registered.
    fn add_listener(&self, listener: L);

    /// Removes the registered listener equal to `listener`, if any.
    fn delete_listener(&self, listener: &L);

    /// Removes every registered listener.
    fn delete_listeners(&self);

    /// Returns the number of registered listeners.
    fn count_listeners(&self) -> usize;
}

// ============================================================================
// SECTION: Listener Registry
// ============================================================================

/// Thread-safe listener list backing [`Monitorable`] implementations.
pub struct ListenerRegistry<L> {
    /// Registered listeners in registration order.
    listeners: RwLock<Vec<L>>,
}

impl<L> Default for ListenerRegistry<L> {
    fn default() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }
}

impl<L> fmt::Debug for ListenerRegistry<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.listeners.read().unwrap_or_else(PoisonError::into_inner).len();
        f.debug_struct("ListenerRegistry").field("listeners", &count).finish()
    }
}

impl<L: PartialEq + Clone> ListenerRegistry<L> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls `deliver` for each listener registered at the time of the call.
    ///
    /// The list is snapshotted first so listeners may (de)register from inside
    /// `deliver` without deadlocking.
    pub fn notify(&self, mut deliver: impl FnMut(&L)) {
        let snapshot = self.listeners.read().unwrap_or_else(PoisonError::into_inner).clone();
        for listener in &snapshot {
            deliver(listener);
        }
    }
}

impl<L: PartialEq + Clone> Monitorable<L> for ListenerRegistry<L> {
    fn add_listener(&self, listener: L) {
        let mut guard = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        if !guard.contains(&listener) {
            guard.push(listener);
        }
    }

    fn delete_listener(&self, listener: &L) {
        let mut guard = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        guard.retain(|registered| registered != listener);
    }

    fn delete_listeners(&self) {
        self.listeners.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn count_listeners(&self) -> usize {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

// ============================================================================
// SECTION: Map Events
// ============================================================================

/// Committed change observed on a durable map.
#[derive(Debug, PartialEq)]
pub enum MapEvent<'a, K, V> {
    /// `key` now maps to `value` (insert, update, or upsert).
    Written {
        /// Affected key.
        key: &'a K,
        /// Committed value.
        value: &'a V,
    },
    /// `key` no longer has a row.
    Removed {
        /// Affected key.
        key: &'a K,
    },
    /// Every row was deleted.
    Cleared,
}

/// Receives committed map changes.
pub trait MapListener<K, V>: Send + Sync {
    /// Handles one committed change.
    fn on_event(&self, event: &MapEvent<'_, K, V>);
}

/// Shared listener handle compared by pointer identity.
pub struct SharedListener<K, V>(Arc<dyn MapListener<K, V>>);

impl<K, V> SharedListener<K, V> {
    /// Wraps a listener for registration.
    #[must_use]
    pub fn new(listener: Arc<dyn MapListener<K, V>>) -> Self {
        Self(listener)
    }

    /// Delivers `event` to the wrapped listener.
    pub fn deliver(&self, event: &MapEvent<'_, K, V>) {
        self.0.on_event(event);
    }
}

impl<K, V> Clone for SharedListener<K, V> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<K, V> PartialEq for SharedListener<K, V> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<K, V> fmt::Debug for SharedListener<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedListener").field(&Arc::as_ptr(&self.0).cast::<()>()).finish()
    }
}
