use std::any::{Any, type_name};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::runtime::{InstanceId, RenderQueue};

/// Storage behind a state slot.
///
/// Writes land in `pending` and become `current` at the start of the next
/// render pass, so a pass never sees a value change half-way through.
pub(crate) struct StateCell<T> {
    current: T,
    pending: Option<T>,
}

impl<T> StateCell<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            current: value,
            pending: None,
        }
    }

    pub(crate) fn current(&self) -> &T {
        &self.current
    }

    fn latest(&self) -> &T {
        self.pending.as_ref().unwrap_or(&self.current)
    }
}

/// Type-erased view of a state slot, so the engine can commit writes without
/// knowing `T`.
pub(crate) trait ErasedState {
    /// Promotes a pending write. Returns whether anything changed.
    fn commit(&self) -> bool;
    fn value_type(&self) -> &'static str;
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: 'static> ErasedState for RefCell<StateCell<T>> {
    fn commit(&self) -> bool {
        let mut cell = self.borrow_mut();
        match cell.pending.take() {
            Some(next) => {
                cell.current = next;
                true
            }
            None => false,
        }
    }

    fn value_type(&self) -> &'static str {
        type_name::<T>()
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// Writes a state slot and requests a re-render of its instance.
///
/// Holds only weak references: once the instance is unmounted every call is
/// a silent no-op.
pub struct StateSetter<T> {
    instance: InstanceId,
    cell: Weak<RefCell<StateCell<T>>>,
    queue: Weak<RefCell<RenderQueue>>,
}

impl<T> Clone for StateSetter<T> {
    fn clone(&self) -> Self {
        Self {
            instance: self.instance,
            cell: self.cell.clone(),
            queue: self.queue.clone(),
        }
    }
}

impl<T> fmt::Debug for StateSetter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSetter")
            .field("instance", &self.instance)
            .field("live", &self.is_live())
            .finish()
    }
}

impl<T> StateSetter<T> {
    pub(crate) fn new(
        instance: InstanceId,
        cell: &Rc<RefCell<StateCell<T>>>,
        queue: &Rc<RefCell<RenderQueue>>,
    ) -> Self {
        Self {
            instance,
            cell: Rc::downgrade(cell),
            queue: Rc::downgrade(queue),
        }
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Whether the owning instance is still mounted.
    pub fn is_live(&self) -> bool {
        self.cell.strong_count() > 0
    }
}

impl<T: PartialEq + 'static> StateSetter<T> {
    /// Stores `value` and schedules a re-render, unless it equals the most
    /// recent value. Returns whether a render was requested.
    pub fn set(&self, value: T) -> bool {
        let Some(cell) = self.cell.upgrade() else {
            log::trace!("set on unmounted instance {:?} ignored", self.instance);
            return false;
        };
        {
            let mut cell = cell.borrow_mut();
            if *cell.latest() == value {
                return false;
            }
            cell.pending = Some(value);
        }
        if let Some(queue) = self.queue.upgrade() {
            queue.borrow_mut().request(self.instance);
        }
        true
    }

    /// Computes the next value from the most recent one, then behaves like [`set`](Self::set).
    ///
    /// `f` runs with the slot unborrowed, so it may write the slot itself.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> bool
    where
        T: Clone,
    {
        let Some(cell) = self.cell.upgrade() else {
            log::trace!("update on unmounted instance {:?} ignored", self.instance);
            return false;
        };
        let latest = cell.borrow().latest().clone();
        self.set(f(&latest))
    }
}
