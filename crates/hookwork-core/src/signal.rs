use std::cell::RefCell;
use std::rc::Rc;

use slotmap::{SlotMap, new_key_type};

use crate::effects::Dispose;
use crate::source::Subscribe;

new_key_type! {
    pub struct SubId;
}

type Subscriber<T> = Rc<dyn Fn(&T)>;

/// Observable value: every write is pushed to the current subscribers.
///
/// This is the shape of a text-change notifier: the input side calls `set`,
/// a component subscribes through [`use_subscription`](crate::RenderPass::use_subscription).
pub struct Signal<T>(Rc<RefCell<Inner<T>>>);

struct Inner<T> {
    value: T,
    subs: SlotMap<SubId, Subscriber<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: 'static> Signal<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(RefCell::new(Inner {
            value,
            subs: SlotMap::with_key(),
        })))
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.0.borrow().value.clone()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.0.borrow().value)
    }

    pub fn set(&self, v: T)
    where
        T: Clone,
    {
        self.0.borrow_mut().value = v;
        self.notify();
    }

    pub fn update<F: FnOnce(&mut T)>(&self, f: F)
    where
        T: Clone,
    {
        f(&mut self.0.borrow_mut().value);
        self.notify();
    }

    pub fn subscriber_count(&self) -> usize {
        self.0.borrow().subs.len()
    }

    /// Registers `f`; running the returned handle removes it again.
    pub fn subscribe(&self, f: impl Fn(&T) + 'static) -> Dispose {
        let id = self.0.borrow_mut().subs.insert(Rc::new(f));
        let inner = Rc::downgrade(&self.0);
        Dispose::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.borrow_mut().subs.remove(id);
            }
        })
    }

    // Subscribers run outside the borrow so they may read, write or unsubscribe.
    fn notify(&self)
    where
        T: Clone,
    {
        let (value, subs): (T, Vec<(SubId, Subscriber<T>)>) = {
            let inner = self.0.borrow();
            let subs = inner.subs.iter().map(|(id, s)| (id, s.clone())).collect();
            (inner.value.clone(), subs)
        };
        for (id, sub) in subs {
            if self.0.borrow().subs.contains_key(id) {
                sub(&value);
            }
        }
    }
}

pub fn signal<T: 'static>(t: T) -> Signal<T> {
    Signal::new(t)
}

impl<T: Clone + 'static> Subscribe for Signal<T> {
    type Value = T;

    fn subscribe(&self, on_value: Box<dyn Fn(T)>) -> Dispose {
        Signal::subscribe(self, move |v: &T| on_value(v.clone()))
    }
}
