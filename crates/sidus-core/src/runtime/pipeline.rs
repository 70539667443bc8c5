//! The three-phase task pipeline.

use std::sync::Arc;

use sidus_types::error::ResolveError;
use uuid::Uuid;

use super::Application;
use crate::context::CompiledTask;
use crate::error::{ExecError, InvocationError};
use crate::inject::{Key, Secondary};
use crate::task::TaskInstance;

impl Application {
    /// Construct a fresh instance of a registered task.
    pub(crate) fn create_task(&self, key: Key<'_>) -> Result<TaskInstance, ResolveError> {
        let (name, _, task) = self
            .tasks
            .get_entry(key)?
            .ok_or_else(|| ResolveError::UnknownTask(key.to_string()))?;

        let value = task
            .constructor
            .invoke(&self.components, None)
            .map_err(|err| ResolveError::Construction {
                task: name.to_string(),
                reason: format!("{err:#}"),
            })?;
        let instance = (task.instantiate)(value).map_err(|value| ResolveError::Construction {
            task: name.to_string(),
            reason: format!(
                "constructor produced {} instead of {}",
                value.type_key().short_name(),
                task.descriptor.ty.short_name()
            ),
        })?;
        Ok(instance.for_descriptor(name))
    }

    pub(crate) fn task(&self, key: Key<'_>) -> Result<&CompiledTask, ResolveError> {
        self.tasks
            .get(key)?
            .ok_or_else(|| ResolveError::UnknownTask(key.to_string()))
    }

    fn task_for(&self, instance: &TaskInstance) -> Result<&CompiledTask, ExecError> {
        let key = match instance.descriptor() {
            Some(name) => Key::Name(name),
            None => Key::Type(instance.type_key()),
        };
        Ok(self
            .tasks
            .get(key)?
            .ok_or_else(|| InvocationError::UnknownTask(instance.label()))?)
    }

    /// Produce, transform through the active skills, complete.
    ///
    /// Stops at the first error, which is returned unchanged.
    pub(crate) fn run_task(&self, instance: &TaskInstance) -> Result<(), ExecError> {
        let task = self.task_for(instance)?;
        let skills = {
            let plan = task.plan.read().expect("skill plan lock poisoned");
            plan.active_nodes()?
        };

        let mut value = instance.forward()?;
        for name in &skills {
            let skill = self
                .skills
                .get(name)
                .ok_or_else(|| InvocationError::UnknownSkill(name.clone()))?;
            tracing::trace!(skill = %name, "running skill");
            value = skill.invoke(&self.components, Some(Secondary::new().with_value("value", value)))?;
        }
        instance.on_complete(value)
    }

    /// Run `instance` on the worker pool. Errors are routed, never returned.
    pub(crate) fn execute(self: &Arc<Self>, instance: TaskInstance) {
        let execution_id = Uuid::now_v7();
        let label = instance.label();
        let span = tracing::info_span!("task", task = %label, %execution_id);

        let app = Arc::clone(self);
        let dispatched = span.in_scope(|| {
            self.pool.dispatch(&label, move || {
                tracing::debug!("task started");
                match app.run_task(&instance) {
                    Ok(()) => tracing::debug!("task completed"),
                    Err(err) => app.route_error(err),
                }
            })
        });
        if let Err(err) = dispatched {
            span.in_scope(|| self.route_error(err.into()));
        }
    }
}
