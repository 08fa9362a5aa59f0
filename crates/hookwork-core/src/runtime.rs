use std::any::type_name;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use slotmap::{SlotMap, new_key_type};

use crate::config::EngineConfig;
use crate::deps::Deps;
use crate::effects::{Dispose, IntoCleanup};
use crate::error::{HookError, OrderViolation, SlotKind};
use crate::state::{ErasedState, StateCell, StateSetter};

new_key_type! {
    /// Handle to a mounted component instance.
    pub struct InstanceId;
}

/// Re-render requests, in the order setters produced them.
#[derive(Default)]
pub(crate) struct RenderQueue {
    requests: VecDeque<InstanceId>,
}

impl RenderQueue {
    pub(crate) fn request(&mut self, id: InstanceId) {
        self.requests.push_back(id);
    }

    fn forget(&mut self, id: InstanceId) {
        self.requests.retain(|r| *r != id);
    }

    fn count_for(&self, id: InstanceId) -> usize {
        self.requests.iter().filter(|r| **r == id).count()
    }
}

enum Slot {
    State(Rc<dyn ErasedState>),
    Effect(EffectSlot),
}

impl Slot {
    fn kind(&self) -> SlotKind {
        match self {
            Slot::State(_) => SlotKind::State,
            Slot::Effect(_) => SlotKind::Effect,
        }
    }
}

#[derive(Default)]
struct EffectSlot {
    /// Deps of the last run; `None` until the effect has run once.
    deps: Option<Deps>,
    cleanup: Option<Dispose>,
}

struct PendingEffect {
    slot: usize,
    deps: Deps,
    run: Box<dyn FnOnce() -> anyhow::Result<Option<Dispose>>>,
}

struct Instance {
    name: String,
    slots: Vec<Slot>,
    /// Set once a pass has completed; from then on the slot count is fixed.
    committed: bool,
    poisoned: bool,
    passes: u64,
}

/// Owns every mounted instance and its slot sequence.
pub struct Engine {
    instances: SlotMap<InstanceId, Instance>,
    queue: Rc<RefCell<RenderQueue>>,
    config: EngineConfig,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            instances: SlotMap::with_key(),
            queue: Rc::new(RefCell::new(RenderQueue::default())),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn mount(&mut self, name: impl Into<String>) -> InstanceId {
        let name = name.into();
        let id = self.instances.insert(Instance {
            name,
            slots: Vec::with_capacity(self.config.slot_capacity),
            committed: false,
            poisoned: false,
            passes: 0,
        });
        log::debug!("mounted {:?} ({})", id, self.instances[id].name);
        id
    }

    pub fn is_mounted(&self, id: InstanceId) -> bool {
        self.instances.contains_key(id)
    }

    /// Number of completed render passes for `id`.
    pub fn passes(&self, id: InstanceId) -> Option<u64> {
        self.instances.get(id).map(|i| i.passes)
    }

    pub fn slot_count(&self, id: InstanceId) -> Option<usize> {
        self.instances.get(id).map(|i| i.slots.len())
    }

    /// Starts a render pass for `id`.
    ///
    /// Pending state writes are committed first, so every `use_state` in the
    /// pass observes the same snapshot.
    pub fn begin_render(&mut self, id: InstanceId) -> Result<RenderPass<'_>, HookError> {
        let instance = self
            .instances
            .get_mut(id)
            .ok_or(HookError::UnknownInstance(id))?;
        if instance.poisoned {
            return Err(HookError::Poisoned(id));
        }

        let mut committed = 0;
        for slot in &instance.slots {
            if let Slot::State(cell) = slot
                && cell.commit()
            {
                committed += 1;
            }
        }
        log::trace!(
            "begin render {:?} ({}) pass {}, {} state writes committed",
            id,
            instance.name,
            instance.passes + 1,
            committed
        );

        Ok(RenderPass {
            id,
            instance,
            queue: &self.queue,
            cursor: 0,
            pending: Vec::new(),
            finished: false,
        })
    }

    /// Tears an instance down: runs every active cleanup in slot order, then
    /// drops its slots, which silences any setter still held elsewhere.
    pub fn unmount(&mut self, id: InstanceId) -> Result<(), HookError> {
        let instance = self
            .instances
            .remove(id)
            .ok_or(HookError::UnknownInstance(id))?;

        let mut cleaned = 0;
        for slot in &instance.slots {
            if let Slot::Effect(effect) = slot
                && let Some(cleanup) = &effect.cleanup
            {
                cleanup.run();
                cleaned += 1;
            }
        }
        drop(instance.slots);
        // Cleanups may have called setters of this instance before the slots went away.
        self.queue.borrow_mut().forget(id);

        log::debug!(
            "unmounted {:?} ({}), {} cleanups run",
            id,
            instance.name,
            cleaned
        );
        Ok(())
    }

    /// Total re-render requests not yet drained.
    pub fn pending_requests(&self) -> usize {
        self.queue.borrow().requests.len()
    }

    pub fn requests_for(&self, id: InstanceId) -> usize {
        self.queue.borrow().count_for(id)
    }

    pub fn is_dirty(&self, id: InstanceId) -> bool {
        self.requests_for(id) > 0
    }

    /// Drains the queue: each mounted instance with at least one request,
    /// once, in first-request order.
    pub fn take_dirty(&mut self) -> Vec<InstanceId> {
        let requests = std::mem::take(&mut self.queue.borrow_mut().requests);
        let mut dirty: Vec<InstanceId> = Vec::new();
        for id in requests {
            if self.instances.contains_key(id) && !dirty.contains(&id) {
                dirty.push(id);
            }
        }
        dirty
    }

    /// Clears the requests of a single instance, returning whether there were any.
    pub fn take_requests_for(&mut self, id: InstanceId) -> bool {
        let mut queue = self.queue.borrow_mut();
        let before = queue.requests.len();
        queue.forget(id);
        before != queue.requests.len()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let ids: Vec<InstanceId> = self.instances.keys().collect();
        for id in ids {
            let _ = self.unmount(id);
        }
    }
}

/// One render pass over one instance.
///
/// Hooks are addressed by call order: the Nth hook call of a pass always
/// refers to the Nth slot. Effects queued during the pass run in
/// [`end_render`](Self::end_render), after the caller has committed its output.
pub struct RenderPass<'e> {
    id: InstanceId,
    instance: &'e mut Instance,
    queue: &'e Rc<RefCell<RenderQueue>>,
    cursor: usize,
    pending: Vec<PendingEffect>,
    finished: bool,
}

impl RenderPass<'_> {
    pub fn instance(&self) -> InstanceId {
        self.id
    }

    /// Whether this is the instance's first pass.
    pub fn is_first_pass(&self) -> bool {
        !self.instance.committed
    }

    fn violate(&mut self, violation: OrderViolation) -> HookError {
        log::error!(
            "{:?} ({}): {}; halting instance",
            self.id,
            self.instance.name,
            violation
        );
        self.instance.poisoned = true;
        self.pending.clear();
        HookError::HookOrderViolation {
            instance: self.id,
            violation,
        }
    }

    /// Claims the next slot index for a hook of `kind`; the flag is set when
    /// the slot does not exist yet and must be appended.
    fn claim(&mut self, kind: SlotKind) -> Result<(usize, bool), HookError> {
        if self.instance.poisoned {
            return Err(HookError::Poisoned(self.id));
        }
        let index = self.cursor;
        self.cursor += 1;

        match self.instance.slots.get(index).map(Slot::kind) {
            Some(expected) if expected != kind => Err(self.violate(OrderViolation::KindChanged {
                slot: index,
                expected,
                found: kind,
            })),
            Some(_) => Ok((index, false)),
            None if self.instance.committed => {
                let expected = self.instance.slots.len();
                Err(self.violate(OrderViolation::TooManyHooks {
                    slot: index,
                    expected,
                }))
            }
            None => Ok((index, true)),
        }
    }

    /// Order-indexed state.
    ///
    /// `init` runs only when this slot is first created. The returned value
    /// is the snapshot taken at `begin_render`; writes through the setter
    /// show up in the next pass.
    pub fn use_state<T>(
        &mut self,
        init: impl FnOnce() -> T,
    ) -> Result<(T, StateSetter<T>), HookError>
    where
        T: Clone + PartialEq + 'static,
    {
        let (index, fresh) = self.claim(SlotKind::State)?;

        let cell: Rc<RefCell<StateCell<T>>> = if fresh {
            let cell = Rc::new(RefCell::new(StateCell::new(init())));
            self.instance.slots.push(Slot::State(cell.clone()));
            log::trace!("{:?}: state slot {} created", self.id, index);
            cell
        } else {
            let Slot::State(erased) = &self.instance.slots[index] else {
                unreachable!("claim checked the slot kind");
            };
            let expected = erased.value_type();
            match erased.clone().into_any().downcast::<RefCell<StateCell<T>>>() {
                Ok(cell) => cell,
                Err(_) => {
                    return Err(self.violate(OrderViolation::TypeChanged {
                        slot: index,
                        expected,
                        found: type_name::<T>(),
                    }));
                }
            }
        };

        let value = cell.borrow().current().clone();
        Ok((value, StateSetter::new(self.id, &cell, self.queue)))
    }

    /// Order-indexed side effect.
    ///
    /// Runs after the pass commits when the slot is new, when `deps` is
    /// [`Deps::Always`], or when `deps` differs from the last run. A re-run
    /// first invokes the previous cleanup.
    pub fn use_effect<F, R>(&mut self, deps: Deps, effect: F) -> Result<(), HookError>
    where
        F: FnOnce() -> R + 'static,
        R: IntoCleanup,
    {
        let (index, fresh) = self.claim(SlotKind::Effect)?;

        let due = if fresh {
            self.instance
                .slots
                .push(Slot::Effect(EffectSlot::default()));
            true
        } else {
            match &self.instance.slots[index] {
                Slot::Effect(EffectSlot {
                    deps: Some(previous),
                    ..
                }) => deps.changed_from(previous),
                _ => true,
            }
        };

        if due {
            self.pending.push(PendingEffect {
                slot: index,
                deps,
                run: Box::new(move || effect().into_cleanup()),
            });
        }
        Ok(())
    }

    /// Ends the pass: checks the hook count against earlier passes, then runs
    /// due effects in slot order.
    ///
    /// The first failing effect stops the flush and is returned; effects
    /// after it keep their previous deps and are re-evaluated next pass.
    pub fn end_render(mut self) -> Result<(), HookError> {
        self.finished = true;
        if self.instance.poisoned {
            return Err(HookError::Poisoned(self.id));
        }
        if self.cursor != self.instance.slots.len() {
            let violation = OrderViolation::TooFewHooks {
                expected: self.instance.slots.len(),
                found: self.cursor,
            };
            return Err(self.violate(violation));
        }

        self.instance.committed = true;
        self.instance.passes += 1;

        let pending = std::mem::take(&mut self.pending);
        let due = pending.len();
        for (ran, effect) in pending.into_iter().enumerate() {
            let Slot::Effect(slot) = &mut self.instance.slots[effect.slot] else {
                unreachable!("pending effects point at effect slots");
            };
            if let Some(cleanup) = slot.cleanup.take() {
                cleanup.run();
            }
            slot.deps = Some(effect.deps);
            match (effect.run)() {
                Ok(cleanup) => slot.cleanup = cleanup,
                Err(source) => {
                    log::debug!(
                        "{:?}: effect in slot {} failed, {} effects left unrun",
                        self.id,
                        effect.slot,
                        due - ran - 1
                    );
                    return Err(HookError::Effect {
                        instance: self.id,
                        slot: effect.slot,
                        source,
                    });
                }
            }
        }

        log::trace!(
            "end render {:?} pass {}: {} hooks, {} effects run",
            self.id,
            self.instance.passes,
            self.cursor,
            due
        );
        Ok(())
    }
}

impl Drop for RenderPass<'_> {
    fn drop(&mut self) {
        if !self.finished && !self.pending.is_empty() {
            log::warn!(
                "{:?} ({}): render pass abandoned with {} effects due; they will be re-evaluated next pass",
                self.id,
                self.instance.name,
                self.pending.len()
            );
        }
    }
}
