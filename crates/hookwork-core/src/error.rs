use thiserror::Error;

use crate::runtime::InstanceId;

/// What kind of hook occupies a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotKind {
    State,
    Effect,
}

/// How a render pass diverged from the call order of earlier passes.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum OrderViolation {
    #[error("hook #{slot} called, but earlier passes registered only {expected} hooks")]
    TooManyHooks { slot: usize, expected: usize },
    #[error("pass ended after {found} hooks, earlier passes registered {expected}")]
    TooFewHooks { expected: usize, found: usize },
    #[error("slot {slot} holds a {expected:?} hook, this pass called a {found:?} hook")]
    KindChanged {
        slot: usize,
        expected: SlotKind,
        found: SlotKind,
    },
    #[error("state slot {slot} was created as `{expected}`, this pass asked for `{found}`")]
    TypeChanged {
        slot: usize,
        expected: &'static str,
        found: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum HookError {
    #[error("hook order violation in instance {instance:?}: {violation}")]
    HookOrderViolation {
        instance: InstanceId,
        violation: OrderViolation,
    },
    #[error("instance {0:?} was halted by an earlier hook order violation")]
    Poisoned(InstanceId),
    #[error("instance {0:?} is not mounted")]
    UnknownInstance(InstanceId),
    #[error("effect in slot {slot} of instance {instance:?} failed")]
    Effect {
        instance: InstanceId,
        slot: usize,
        #[source]
        source: anyhow::Error,
    },
    #[error("instance {instance:?} was still dirty after {passes} consecutive render passes")]
    RenderLoop { instance: InstanceId, passes: usize },
}

impl HookError {
    pub fn is_order_violation(&self) -> bool {
        matches!(self, HookError::HookOrderViolation { .. })
    }
}
