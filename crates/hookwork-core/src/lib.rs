//! # State, Effects, and Cleanup
//!
//! Hookwork is a small hooks runtime: a component is a render function that
//! asks for state and effects by call order, and the [`Engine`] keeps the
//! matching slots alive between passes.
//!
//! - `use_state` — order‑indexed state with a setter that requests a re‑render.
//! - `use_effect` — side‑effects that run after a pass, keyed by [`Deps`].
//! - [`Dispose`] — cleanup returned by an effect; run before the effect
//!   re‑runs and when the instance unmounts.
//!
//! ## A render pass
//!
//! ```rust
//! use hookwork_core::*;
//!
//! let mut engine = Engine::new();
//! let id = engine.mount("counter");
//!
//! let mut pass = engine.begin_render(id)?;
//! let (count, set_count) = pass.use_state(|| 0)?;
//! pass.use_effect(deps![count], move || {
//!     log::info!("count is {count}");
//!     on_unmount(|| log::info!("count changed or counter unmounted"))
//! })?;
//! pass.end_render()?;
//!
//! set_count.set(1);
//! assert_eq!(engine.take_dirty(), vec![id]);
//!
//! engine.unmount(id)?;
//! # Ok::<(), HookError>(())
//! ```
//!
//! - Hooks are order‑based: the Nth hook call of a pass always refers to the
//!   Nth slot. Calling a different number or kind of hooks than the previous
//!   pass is a [`HookError::HookOrderViolation`] and halts the instance.
//! - Setter writes are committed at the next `begin_render`, so one pass sees
//!   one consistent snapshot. Writing a value equal to the latest one is a
//!   no‑op.
//! - Effects run in slot order during `end_render`, after the host has taken
//!   the pass output.
//!
//! ## Dependencies
//!
//! | `Deps`                | runs                                   |
//! |-----------------------|----------------------------------------|
//! | `Deps::Always`        | after every pass                       |
//! | `Deps::Once` / `deps![]` | first pass only, cleaned up on unmount |
//! | `deps![a, b]`         | when any element changes by position   |
//!
//! ## External sources
//!
//! Timers, animation clocks and text notifiers implement [`Subscribe`]. Wire
//! them in with `use_subscription`, which subscribes on the first pass and
//! unsubscribes on unmount, so a torn‑down instance never hears from them
//! again. [`Host`] is a ready‑made render loop for a single root component.

pub mod config;
pub mod deps;
pub mod effects;
pub mod error;
pub mod host;
pub mod prelude;
pub mod runtime;
pub mod signal;
pub mod source;
pub mod state;
mod tests;

pub use config::*;
pub use deps::*;
pub use effects::*;
pub use error::*;
pub use host::*;
pub use runtime::*;
pub use signal::*;
pub use source::*;
pub use state::*;
