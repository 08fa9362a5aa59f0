//! External value sources a component can subscribe to.
//!
//! Sources never touch slot internals: they push values into whatever
//! callback they were given (usually a [`StateSetter`](crate::StateSetter)),
//! and the [`Dispose`] they hand back stops them.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use slotmap::{SlotMap, new_key_type};

use crate::deps::Deps;
use crate::effects::Dispose;
use crate::error::HookError;
use crate::runtime::RenderPass;

/// Anything that produces values over time.
pub trait Subscribe {
    type Value;

    /// Starts delivering values to `on_value`. Running the returned handle
    /// must stop delivery synchronously.
    fn subscribe(&self, on_value: Box<dyn Fn(Self::Value)>) -> Dispose;
}

pub trait Clock: 'static {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock tests (and scripted demos) drive by hand.
pub struct ManualClock {
    now: Cell<Instant>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Cell::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

new_key_type! {
    struct TickId;
    struct FrameId;
}

struct TickSub {
    next_due: Instant,
    ticks: u64,
    on_tick: Rc<dyn Fn(u64)>,
}

/// Missed periods a single [`Ticker::poll`] delivers before realigning to the clock.
pub const MAX_CATCH_UP: u32 = 8;

/// Periodic timer. The host calls [`poll`](Self::poll); each subscriber gets
/// its running tick count (starting at 1) once per elapsed period, up to
/// [`MAX_CATCH_UP`] per poll after a stall.
#[derive(Clone)]
pub struct Ticker {
    clock: Rc<dyn Clock>,
    period: Duration,
    subs: Rc<RefCell<SlotMap<TickId, TickSub>>>,
}

impl Ticker {
    pub fn new(clock: Rc<dyn Clock>, period: Duration) -> Self {
        Self {
            clock,
            period: period.max(Duration::from_millis(1)),
            subs: Rc::new(RefCell::new(SlotMap::with_key())),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_idle(&self) -> bool {
        self.subs.borrow().is_empty()
    }

    /// Fires every tick that has come due. Returns how many callbacks ran.
    pub fn poll(&self) -> usize {
        let now = self.clock.now();
        let mut due: Vec<(TickId, u64, Rc<dyn Fn(u64)>)> = Vec::new();
        for (id, sub) in self.subs.borrow_mut().iter_mut() {
            let mut caught_up = 0;
            while sub.next_due <= now {
                if caught_up == MAX_CATCH_UP {
                    log::debug!(
                        "ticker subscription {:?} fell behind; skipping missed ticks",
                        id
                    );
                    sub.next_due = now + self.period;
                    break;
                }
                sub.ticks += 1;
                sub.next_due += self.period;
                caught_up += 1;
                due.push((id, sub.ticks, sub.on_tick.clone()));
            }
        }

        let mut fired = 0;
        for (id, tick, on_tick) in due {
            // An earlier callback may have cancelled this subscription.
            if self.subs.borrow().contains_key(id) {
                on_tick(tick);
                fired += 1;
            }
        }
        fired
    }
}

impl Subscribe for Ticker {
    type Value = u64;

    fn subscribe(&self, on_value: Box<dyn Fn(u64)>) -> Dispose {
        let id = self.subs.borrow_mut().insert(TickSub {
            next_due: self.clock.now() + self.period,
            ticks: 0,
            on_tick: Rc::from(on_value),
        });
        log::trace!("ticker subscription {:?} started", id);
        let subs = Rc::downgrade(&self.subs);
        Dispose::new(move || {
            if let Some(subs) = subs.upgrade()
                && subs.borrow_mut().remove(id).is_some()
            {
                log::trace!("ticker subscription {:?} cancelled", id);
            }
        })
    }
}

/// Position within a repeating animation.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct AnimationFrame {
    /// Completed cycles since the subscription started.
    pub cycle: u64,
    /// Fraction of the current cycle, in `[0, 1)`; runs backwards on odd
    /// cycles when the repeater reverses.
    pub progress: f32,
}

struct FrameSub {
    start: Instant,
    on_frame: Rc<dyn Fn(AnimationFrame)>,
}

/// Repeating animation source, sampled on every [`poll`](Self::poll).
#[derive(Clone)]
pub struct Repeater {
    clock: Rc<dyn Clock>,
    period: Duration,
    reverse: bool,
    subs: Rc<RefCell<SlotMap<FrameId, FrameSub>>>,
}

impl Repeater {
    pub fn new(clock: Rc<dyn Clock>, period: Duration) -> Self {
        Self {
            clock,
            period: period.max(Duration::from_millis(1)),
            reverse: false,
            subs: Rc::new(RefCell::new(SlotMap::with_key())),
        }
    }

    /// Play every other cycle backwards.
    pub fn reversing(mut self) -> Self {
        self.reverse = true;
        self
    }

    pub fn frame_at(&self, elapsed: Duration) -> AnimationFrame {
        let period = self.period.as_nanos();
        let elapsed = elapsed.as_nanos();
        let cycle = (elapsed / period) as u64;
        let fraction = ((elapsed % period) as f64 / period as f64) as f32;
        let progress = if self.reverse && cycle % 2 == 1 {
            1.0 - fraction
        } else {
            fraction
        };
        AnimationFrame { cycle, progress }
    }

    /// Delivers the current frame to every subscriber. Returns how many callbacks ran.
    pub fn poll(&self) -> usize {
        let now = self.clock.now();
        let frames: Vec<(FrameId, AnimationFrame, Rc<dyn Fn(AnimationFrame)>)> = self
            .subs
            .borrow()
            .iter()
            .map(|(id, sub)| {
                let frame = self.frame_at(now.saturating_duration_since(sub.start));
                (id, frame, sub.on_frame.clone())
            })
            .collect();

        let mut fired = 0;
        for (id, frame, on_frame) in frames {
            if self.subs.borrow().contains_key(id) {
                on_frame(frame);
                fired += 1;
            }
        }
        fired
    }
}

impl Subscribe for Repeater {
    type Value = AnimationFrame;

    fn subscribe(&self, on_value: Box<dyn Fn(AnimationFrame)>) -> Dispose {
        let id = self.subs.borrow_mut().insert(FrameSub {
            start: self.clock.now(),
            on_frame: Rc::from(on_value),
        });
        let subs = Rc::downgrade(&self.subs);
        Dispose::new(move || {
            if let Some(subs) = subs.upgrade() {
                subs.borrow_mut().remove(id);
            }
        })
    }
}

impl RenderPass<'_> {
    /// State fed by an external source for the lifetime of the instance.
    ///
    /// Subscribes on the first pass, pushes every value through the slot's
    /// setter, and unsubscribes at unmount. `source` is ignored on later
    /// passes.
    pub fn use_subscription<S>(
        &mut self,
        source: S,
        initial: impl FnOnce() -> S::Value,
    ) -> Result<S::Value, HookError>
    where
        S: Subscribe + 'static,
        S::Value: Clone + PartialEq + 'static,
    {
        let (value, set) = self.use_state(initial)?;
        self.use_effect(Deps::Once, move || {
            source.subscribe(Box::new(move |v: S::Value| {
                set.set(v);
            }))
        })?;
        Ok(value)
    }
}
