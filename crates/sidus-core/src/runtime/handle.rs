//! Handle to a running agent.

use std::fmt;
use std::sync::{Arc, OnceLock, RwLock, Weak};

use sidus_types::error::ResolveError;
use sidus_types::ty::TypeKey;
use tokio_util::sync::CancellationToken;

use super::Application;
use crate::inject::{Component, Key, TypedRegistry};
use crate::plan::{SkillPlan, Slot};
use crate::task::TaskInstance;

/// A cloneable reference to an agent.
///
/// Registered as a component before any builder runs, so components can
/// depend on it. Everything except [`halt`](Self::halt) fails with
/// [`ResolveError::NotBuilt`] until the agent is built.
#[derive(Clone)]
pub struct AgentHandle {
    name: Arc<str>,
    app: Arc<OnceLock<Weak<Application>>>,
    halt: CancellationToken,
}

impl AgentHandle {
    pub(crate) fn new(name: &str, halt: CancellationToken) -> Self {
        Self {
            name: Arc::from(name),
            app: Arc::new(OnceLock::new()),
            halt,
        }
    }

    pub(crate) fn attach(&self, app: &Arc<Application>) {
        if self.app.set(Arc::downgrade(app)).is_err() {
            tracing::warn!(agent = %self.name, "agent handle already attached");
        }
    }

    pub(crate) fn application(&self) -> Result<Arc<Application>, ResolveError> {
        self.app
            .get()
            .and_then(Weak::upgrade)
            .ok_or(ResolveError::NotBuilt)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_built(&self) -> bool {
        self.application().is_ok()
    }

    /// Stop the scheduler after its current tick. Running bodies finish.
    pub fn halt(&self) {
        tracing::info!(agent = %self.name, "halt requested");
        self.halt.cancel();
    }

    pub fn is_halted(&self) -> bool {
        self.halt.is_cancelled()
    }

    /// True while the agent is built and not halted.
    pub fn is_enabled(&self) -> bool {
        self.is_built() && !self.is_halted()
    }

    /// Construct a fresh instance of a registered task, by name or by type.
    pub fn create_task<'k>(&self, key: impl Into<Key<'k>>) -> Result<TaskInstance, ResolveError> {
        self.application()?.create_task(key.into())
    }

    /// Execute a task in the background. Failures go to the exception routes.
    pub fn task_execute(&self, instance: TaskInstance) {
        match self.application() {
            Ok(app) => app.execute(instance),
            Err(err) => {
                tracing::warn!(agent = %self.name, task = %instance.label(), error = %err, "task dropped");
            }
        }
    }

    /// A built component by type or declared view.
    pub fn component<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveError> {
        let app = self.application()?;
        lookup::<T>(app.components())
    }

    // -----------------------------------------------------------------------
    // Skill-plan administration
    // -----------------------------------------------------------------------

    /// Skills the task would run next, in order.
    pub fn active_skills<'k>(&self, task: impl Into<Key<'k>>) -> Result<Vec<String>, ResolveError> {
        self.with_plan(task.into(), |plan| {
            Ok(plan.read().expect("skill plan lock poisoned").active_nodes()?)
        })
    }

    pub fn skill_weight<'k>(
        &self,
        task: impl Into<Key<'k>>,
        from: &Slot,
        to: &Slot,
    ) -> Result<u32, ResolveError> {
        self.with_plan(task.into(), |plan| {
            Ok(plan.read().expect("skill plan lock poisoned").skill_weight(from, to)?)
        })
    }

    pub fn set_skill_weight<'k>(
        &self,
        task: impl Into<Key<'k>>,
        from: &Slot,
        to: &Slot,
        weight: u32,
    ) -> Result<(), ResolveError> {
        self.with_plan(task.into(), |plan| {
            Ok(plan
                .write()
                .expect("skill plan lock poisoned")
                .set_skill_weight(from, to, weight)?)
        })
    }

    /// Skip one occurrence of `skill` on future runs of `task`.
    pub fn exclude_skill<'k>(
        &self,
        task: impl Into<Key<'k>>,
        skill: &str,
        repeat: usize,
    ) -> Result<(), ResolveError> {
        self.with_plan(task.into(), |plan| {
            Ok(plan
                .write()
                .expect("skill plan lock poisoned")
                .exclude_skill(skill, repeat)?)
        })
    }

    pub fn block_edge<'k>(
        &self,
        task: impl Into<Key<'k>>,
        from: &Slot,
        to: &Slot,
    ) -> Result<(), ResolveError> {
        self.with_plan(task.into(), |plan| {
            Ok(plan.write().expect("skill plan lock poisoned").block_edge(from, to)?)
        })
    }

    fn with_plan<R>(
        &self,
        task: Key<'_>,
        f: impl FnOnce(&RwLock<SkillPlan>) -> Result<R, ResolveError>,
    ) -> Result<R, ResolveError> {
        let app = self.application()?;
        let compiled = app.task(task)?;
        f(&compiled.plan)
    }
}

pub(crate) fn lookup<T: ?Sized + Send + Sync + 'static>(
    components: &TypedRegistry<Component>,
) -> Result<Arc<T>, ResolveError> {
    let ty = TypeKey::of::<T>();
    components
        .get(ty)?
        .and_then(|component| component.get::<T>())
        .ok_or_else(|| ResolveError::UnknownComponent(ty.short_name().to_string()))
}

impl fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentHandle")
            .field("name", &self.name)
            .field("built", &self.is_built())
            .field("halted", &self.is_halted())
            .finish()
    }
}
