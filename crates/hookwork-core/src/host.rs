use crate::config::EngineConfig;
use crate::error::HookError;
use crate::runtime::{Engine, InstanceId, RenderPass};

/// A render function over hooks: reads its slots, returns an output tree.
pub trait Component {
    type Output;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn render(&self, hooks: &mut RenderPass<'_>) -> Result<Self::Output, HookError>;
}

/// Minimal render loop around a single root component.
///
/// Each pass renders, stores the output, and only then ends the pass, so
/// effects always observe a committed frame.
pub struct Host<C: Component> {
    engine: Engine,
    root: InstanceId,
    component: C,
    output: Option<C::Output>,
}

impl<C: Component> Host<C> {
    /// Mounts `component`, renders it and settles any writes its first
    /// effects made.
    pub fn mount(component: C, config: EngineConfig) -> Result<Self, HookError> {
        let mut engine = Engine::with_config(config);
        let root = engine.mount(component.name());
        let mut host = Self {
            engine,
            root,
            component,
            output: None,
        };
        host.render()?;
        host.settle()?;
        Ok(host)
    }

    pub fn root(&self) -> InstanceId {
        self.root
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn output(&self) -> Option<&C::Output> {
        self.output.as_ref()
    }

    pub fn component(&self) -> &C {
        &self.component
    }

    pub fn is_dirty(&self) -> bool {
        self.engine.is_dirty(self.root)
    }

    /// Runs one render pass unconditionally.
    pub fn render(&mut self) -> Result<(), HookError> {
        self.engine.take_requests_for(self.root);
        let mut pass = self.engine.begin_render(self.root)?;
        let output = self.component.render(&mut pass)?;
        self.output = Some(output);
        pass.end_render()
    }

    /// Re-renders while setters keep requesting it. Returns the number of
    /// passes run.
    pub fn settle(&mut self) -> Result<usize, HookError> {
        let limit = self.engine.config().max_settle_passes;
        let mut passes = 0;
        while self.is_dirty() {
            if passes == limit {
                log::error!(
                    "{:?} still dirty after {} passes; giving up",
                    self.root,
                    passes
                );
                return Err(HookError::RenderLoop {
                    instance: self.root,
                    passes,
                });
            }
            self.render()?;
            passes += 1;
        }
        if passes > 0 {
            log::trace!("{:?} settled after {} passes", self.root, passes);
        }
        Ok(passes)
    }

    /// Unmounts the root, running its cleanups, and hands back the last output.
    pub fn unmount(mut self) -> Result<Option<C::Output>, HookError> {
        self.engine.unmount(self.root)?;
        Ok(self.output.take())
    }
}
