use std::any::Any;
use std::fmt;

use smallvec::SmallVec;

/// A single value in an effect's dependency list.
///
/// Implemented for every `PartialEq + Debug + 'static` type, so mixed lists
/// such as `deps![count, label.clone()]` compare element by element.
pub trait Dependency: Any + fmt::Debug {
    fn dyn_eq(&self, other: &dyn Dependency) -> bool;
    fn as_any(&self) -> &dyn Any;
}

impl<T: PartialEq + fmt::Debug + 'static> Dependency for T {
    fn dyn_eq(&self, other: &dyn Dependency) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub type DepList = SmallVec<[Box<dyn Dependency>; 2]>;

/// When an effect runs again.
#[derive(Debug, Default)]
pub enum Deps {
    /// After every render pass.
    #[default]
    Always,
    /// On the first pass only; cleaned up at unmount.
    Once,
    /// Whenever any element differs, by position, from the previous pass.
    OnChange(DepList),
}

impl Deps {
    pub fn on_change<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Box<dyn Dependency>>,
    {
        let list: DepList = values.into_iter().collect();
        if list.is_empty() {
            Deps::Once
        } else {
            Deps::OnChange(list)
        }
    }

    fn as_list(&self) -> Option<&[Box<dyn Dependency>]> {
        match self {
            Deps::Always => None,
            Deps::Once => Some(&[][..]),
            Deps::OnChange(list) => Some(list.as_slice()),
        }
    }

    /// Whether an effect last run with `previous` must run again under `self`.
    pub fn changed_from(&self, previous: &Deps) -> bool {
        let (Some(now), Some(before)) = (self.as_list(), previous.as_list()) else {
            return true;
        };
        now.len() != before.len() || now.iter().zip(before).any(|(a, b)| !a.dyn_eq(b.as_ref()))
    }
}

/// Builds a [`Deps`] list: `deps![]` is [`Deps::Once`], `deps![a, b]` is [`Deps::OnChange`].
#[macro_export]
macro_rules! deps {
    () => {
        $crate::deps::Deps::Once
    };
    ($($value:expr),+ $(,)?) => {
        $crate::deps::Deps::on_change([
            $(::std::boxed::Box::new($value) as ::std::boxed::Box<dyn $crate::deps::Dependency>),+
        ])
    };
}
