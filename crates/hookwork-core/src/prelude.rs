pub use crate::config::EngineConfig;
pub use crate::deps;
pub use crate::deps::{Dependency, Deps};
pub use crate::effects::{Dispose, IntoCleanup, on_unmount};
pub use crate::error::{HookError, OrderViolation, SlotKind};
pub use crate::host::{Component, Host};
pub use crate::runtime::{Engine, InstanceId, RenderPass};
pub use crate::signal::{Signal, signal};
pub use crate::source::{
    AnimationFrame, Clock, ManualClock, Repeater, Subscribe, SystemClock, Ticker,
};
pub use crate::state::StateSetter;
