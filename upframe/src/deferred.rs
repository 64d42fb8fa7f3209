//! Deferred actions and dynamic-state overlays.
//!
//! Everything registered here is appended to a frame's deferred list and runs,
//! in registration order, when that frame pops. The release of an overlay is
//! therefore tied to an arbitrary ancestor frame rather than to the scope that
//! installed it.

use crate::error::ScopeError;
use crate::handle::Handle;
use crate::stack::FrameStack;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;
use tracing::trace;

/// Action run exactly once when its frame pops.
pub type ExitAction = Box<dyn FnOnce(&mut FrameStack) -> Result<(), ScopeError>>;

pub(crate) enum Deferred {
    /// Client callback
    Action(ExitAction),
    /// Restore record of a localized target
    Restore {
        target: Overlay,
        undo: Box<dyn FnOnce()>,
    },
}

/// Identifies what a restore record puts back: a shared cell, or one element
/// of a shared container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Overlay {
    address: usize,
    key: Option<String>,
}

impl Overlay {
    fn of<T: ?Sized>(target: &Rc<T>, key: Option<String>) -> Self {
        Self {
            address: Rc::as_ptr(target) as *const () as usize,
            key,
        }
    }
}

impl fmt::Display for Overlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "element {key}"),
            None => write!(f, "localized value"),
        }
    }
}

impl Deferred {
    /// Runs this entry against the stack the frame was popped from.
    pub(crate) fn run(self, stack: &mut FrameStack) -> Result<(), ScopeError> {
        match self {
            Deferred::Action(action) => {
                trace!("Running exit action");
                action(stack)
            }
            Deferred::Restore { target, undo } => {
                trace!("Restoring {target}");
                undo();
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deferred::Action(_) => write!(f, "Action"),
            Deferred::Restore { target, .. } => write!(f, "Restore({target})"),
        }
    }
}

/// Keyed or indexed storage whose elements can be localized.
///
/// Implementations use interior mutability, since overlays are torn down from
/// a deferred action that only holds a shared reference.
pub trait Container {
    type Key: Clone + fmt::Debug + 'static;
    type Value: Clone + 'static;
    /// State of one element, captured before an overlay is installed.
    type Snapshot: 'static;

    /// Returns a copy of the element, or `None` if it does not exist.
    fn fetch(&self, key: &Self::Key) -> Option<Self::Value>;

    /// Creates or overwrites the element.
    fn store(&self, key: Self::Key, value: Self::Value);

    /// Removes the element, returning what it held.
    fn remove(&self, key: &Self::Key) -> Option<Self::Value>;

    fn snapshot(&self, key: &Self::Key) -> Self::Snapshot;

    /// Puts the element back the way [`Container::snapshot`] found it.
    fn restore(&self, key: Self::Key, snapshot: Self::Snapshot);
}

/// An element of a vector together with the vector's length at the time.
#[derive(Debug, Clone)]
pub struct VecSlot<T> {
    value: Option<T>,
    len: usize,
}

/// Vectors grow with default elements when a store lands past the end.
impl<T: Clone + Default + 'static> Container for RefCell<Vec<T>> {
    type Key = usize;
    type Value = T;
    type Snapshot = VecSlot<T>;

    fn fetch(&self, key: &usize) -> Option<T> {
        self.borrow().get(*key).cloned()
    }

    fn store(&self, key: usize, value: T) {
        let mut items = self.borrow_mut();
        if key >= items.len() {
            items.resize(key + 1, T::default());
        }
        items[key] = value;
    }

    /// Removing the last element shrinks the vector; removing any other one
    /// leaves a default element in its slot.
    fn remove(&self, key: &usize) -> Option<T> {
        let mut items = self.borrow_mut();
        if *key >= items.len() {
            None
        } else if *key + 1 == items.len() {
            items.pop()
        } else {
            Some(std::mem::take(&mut items[*key]))
        }
    }

    fn snapshot(&self, key: &usize) -> VecSlot<T> {
        VecSlot {
            value: self.fetch(key),
            len: self.borrow().len(),
        }
    }

    /// An element that did not exist is dropped along with any padding
    /// added after the old end.
    fn restore(&self, key: usize, snapshot: VecSlot<T>) {
        match snapshot.value {
            Some(value) => self.store(key, value),
            None => self.borrow_mut().truncate(snapshot.len),
        }
    }
}

impl<K, V> Container for RefCell<HashMap<K, V>>
where
    K: Clone + Eq + Hash + fmt::Debug + 'static,
    V: Clone + 'static,
{
    type Key = K;
    type Value = V;
    type Snapshot = Option<V>;

    fn fetch(&self, key: &K) -> Option<V> {
        self.borrow().get(key).cloned()
    }

    fn store(&self, key: K, value: V) {
        self.borrow_mut().insert(key, value);
    }

    fn remove(&self, key: &K) -> Option<V> {
        self.borrow_mut().remove(key)
    }

    fn snapshot(&self, key: &K) -> Option<V> {
        self.fetch(key)
    }

    fn restore(&self, key: K, snapshot: Option<V>) {
        restore_entry(self, key, snapshot)
    }
}

impl<K, V> Container for RefCell<BTreeMap<K, V>>
where
    K: Clone + Ord + fmt::Debug + 'static,
    V: Clone + 'static,
{
    type Key = K;
    type Value = V;
    type Snapshot = Option<V>;

    fn fetch(&self, key: &K) -> Option<V> {
        self.borrow().get(key).cloned()
    }

    fn store(&self, key: K, value: V) {
        self.borrow_mut().insert(key, value);
    }

    fn remove(&self, key: &K) -> Option<V> {
        self.borrow_mut().remove(key)
    }

    fn snapshot(&self, key: &K) -> Option<V> {
        self.fetch(key)
    }

    fn restore(&self, key: K, snapshot: Option<V>) {
        restore_entry(self, key, snapshot)
    }
}

fn restore_entry<C: Container>(container: &C, key: C::Key, snapshot: Option<C::Value>) {
    match snapshot {
        Some(value) => container.store(key, value),
        None => {
            container.remove(&key);
        }
    }
}

impl FrameStack {
    /// Registers `action` to run when the frame referenced by `h` pops.
    pub fn on_exit<F>(&mut self, h: Handle, action: F) -> Result<(), ScopeError>
    where
        F: FnOnce(&mut FrameStack) -> Result<(), ScopeError> + 'static,
    {
        self.defer(h, Deferred::Action(Box::new(action)))
    }

    /// Sets `target` to `value` until the frame referenced by `h` pops.
    ///
    /// Localizing the same target again on the same frame replaces the value
    /// but keeps the first snapshot, so the pop restores the original.
    pub fn localize<T>(&mut self, h: Handle, target: &Rc<RefCell<T>>, value: T) -> Result<(), ScopeError>
    where
        T: 'static,
    {
        let overlay = Overlay::of(target, None);
        let overlaid = self.is_overlaid(h, &overlay)?;
        let snapshot = target.replace(value);
        if overlaid {
            return Ok(());
        }
        let target = Rc::clone(target);
        self.defer(
            h,
            Deferred::Restore {
                target: overlay,
                undo: Box::new(move || {
                    target.replace(snapshot);
                }),
            },
        )
    }

    /// Sets one element of `container` to `value` until the frame referenced
    /// by `h` pops. An element that did not exist before is removed again.
    pub fn localize_element<C>(
        &mut self,
        h: Handle,
        container: &Rc<C>,
        key: C::Key,
        value: C::Value,
    ) -> Result<(), ScopeError>
    where
        C: Container + 'static,
    {
        let overlay = Overlay::of(container, Some(format!("{key:?}")));
        let overlaid = self.is_overlaid(h, &overlay)?;
        let snapshot = container.snapshot(&key);
        container.store(key.clone(), value);
        if overlaid {
            return Ok(());
        }
        self.defer_element_restore(h, overlay, container, key, snapshot)
    }

    /// Removes one element of `container` until the frame referenced by `h`
    /// pops, after which the element is put back (or kept absent if it was).
    pub fn localize_delete<C>(&mut self, h: Handle, container: &Rc<C>, key: C::Key) -> Result<(), ScopeError>
    where
        C: Container + 'static,
    {
        let overlay = Overlay::of(container, Some(format!("{key:?}")));
        let overlaid = self.is_overlaid(h, &overlay)?;
        let snapshot = container.snapshot(&key);
        container.remove(&key);
        if overlaid {
            return Ok(());
        }
        self.defer_element_restore(h, overlay, container, key, snapshot)
    }

    fn defer_element_restore<C>(
        &mut self,
        h: Handle,
        overlay: Overlay,
        container: &Rc<C>,
        key: C::Key,
        snapshot: C::Snapshot,
    ) -> Result<(), ScopeError>
    where
        C: Container + 'static,
    {
        let container = Rc::clone(container);
        self.defer(
            h,
            Deferred::Restore {
                target: overlay,
                undo: Box::new(move || container.restore(key, snapshot)),
            },
        )
    }

    /// Whether the frame already holds a restore record for `overlay`.
    fn is_overlaid(&self, h: Handle, overlay: &Overlay) -> Result<bool, ScopeError> {
        Ok(self.frame(h)?.deferred.iter().any(|deferred| {
            matches!(deferred, Deferred::Restore { target, .. } if target == overlay)
        }))
    }

    fn defer(&mut self, h: Handle, deferred: Deferred) -> Result<(), ScopeError> {
        trace!(context = %h, ?deferred, "Deferring");
        self.frame_mut(h)?.deferred.push(deferred);
        Ok(())
    }
}
