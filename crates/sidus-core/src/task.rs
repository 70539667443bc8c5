//! Tasks: a produced start value, a skill chain, and a completion step.
//!
//! The runtime drives every task through three phases:
//!
//! 1. **Produce**: [`Task::forward`] yields the start value.
//! 2. **Transform**: each skill on the task's active plan runs in order,
//!    receiving the previous value as its `value` argument.
//! 3. **Complete**: [`Task::on_complete`] receives the final value.
//!
//! An error in any phase stops the pipeline and is routed to the exception
//! handlers.

use std::any::Any;
use std::fmt;

use sidus_types::ty::TypeKey;

use crate::error::{ExecError, InvocationError};
use crate::inject::{Executable, Secondary, Value};
use crate::runtime::AgentHandle;

/// A unit of work run through a skill chain.
pub trait Task: Send + Sync + 'static {
    /// The value handed to the first skill.
    type Input: Send + Sync + 'static;
    /// The value produced by the last skill.
    type Output: Send + Sync + 'static;

    fn forward(&self) -> Result<Self::Input, ExecError>;

    fn on_complete(&self, output: Self::Output) -> Result<(), ExecError>;
}

/// Registration details of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDescriptor {
    pub name: String,
    pub ty: TypeKey,
    pub skills: Vec<String>,
}

trait ErasedTask: Send + Sync {
    fn forward(&self) -> Result<Value, ExecError>;
    fn on_complete(&self, output: Value) -> Result<(), ExecError>;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Task> ErasedTask for T {
    fn forward(&self) -> Result<Value, ExecError> {
        Task::forward(self).map(Value::new)
    }

    fn on_complete(&self, output: Value) -> Result<(), ExecError> {
        let output = output.downcast::<T::Output>().map_err(|actual| InvocationError::ValueType {
            expected: TypeKey::of::<T::Output>().short_name().to_string(),
            actual: actual.type_key().short_name().to_string(),
        })?;
        Task::on_complete(self, output)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A task ready to be executed.
///
/// Instances are resolved against the agent's task registrations by
/// descriptor name when one is set, otherwise by their type.
pub struct TaskInstance {
    ty: TypeKey,
    descriptor: Option<String>,
    task: Box<dyn ErasedTask>,
}

impl TaskInstance {
    pub fn new<T: Task>(task: T) -> Self {
        Self {
            ty: TypeKey::of::<T>(),
            descriptor: None,
            task: Box::new(task),
        }
    }

    /// Bind the instance to the task registered under `name`.
    pub fn for_descriptor(mut self, name: impl Into<String>) -> Self {
        self.descriptor = Some(name.into());
        self
    }

    pub fn descriptor(&self) -> Option<&str> {
        self.descriptor.as_deref()
    }

    pub fn type_key(&self) -> TypeKey {
        self.ty
    }

    /// Name used in log output.
    pub fn label(&self) -> String {
        self.descriptor
            .clone()
            .unwrap_or_else(|| self.ty.short_name().to_string())
    }

    /// Access the concrete task, e.g. to set its data before execution.
    pub fn get_mut<T: Task>(&mut self) -> Option<&mut T> {
        self.task.as_any_mut().downcast_mut::<T>()
    }

    pub(crate) fn forward(&self) -> Result<Value, ExecError> {
        self.task.forward()
    }

    pub(crate) fn on_complete(&self, output: Value) -> Result<(), ExecError> {
        self.task.on_complete(output)
    }
}

impl fmt::Debug for TaskInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskInstance")
            .field("type", &self.ty.short_name())
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

/// A task that starts from a stored value and hands the result to a handler.
///
/// The handler is an [`Executable`] invoked with the final value as its
/// `value` argument. Without a handler the result is dropped.
pub struct CompletedTask<V> {
    agent: AgentHandle,
    data: V,
    then: Option<Executable>,
}

impl<V> CompletedTask<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(agent: AgentHandle, data: V) -> Self {
        Self {
            agent,
            data,
            then: None,
        }
    }

    pub fn data(&self) -> &V {
        &self.data
    }

    pub fn set_data(&mut self, data: V) -> &mut Self {
        self.data = data;
        self
    }

    pub fn with_data(mut self, data: V) -> Self {
        self.data = data;
        self
    }

    /// Set the completion handler.
    pub fn then(mut self, handler: Executable) -> Self {
        self.then = Some(handler);
        self
    }

    pub fn set_then(&mut self, handler: Executable) -> &mut Self {
        self.then = Some(handler);
        self
    }
}

impl<V> Task for CompletedTask<V>
where
    V: Clone + Send + Sync + 'static,
{
    type Input = V;
    type Output = V;

    fn forward(&self) -> Result<V, ExecError> {
        Ok(self.data.clone())
    }

    fn on_complete(&self, output: V) -> Result<(), ExecError> {
        let Some(handler) = &self.then else {
            tracing::debug!("task completed without a handler");
            return Ok(());
        };
        let app = self.agent.application()?;
        handler.invoke(app.components(), Some(Secondary::new().with("value", output)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Doubling {
        start: i64,
        seen: Mutex<Option<i64>>,
    }

    impl Task for Doubling {
        type Input = i64;
        type Output = i64;

        fn forward(&self) -> Result<i64, ExecError> {
            Ok(self.start)
        }

        fn on_complete(&self, output: i64) -> Result<(), ExecError> {
            *self.seen.lock().expect("lock poisoned") = Some(output * 2);
            Ok(())
        }
    }

    fn doubling(start: i64) -> Doubling {
        Doubling {
            start,
            seen: Mutex::new(None),
        }
    }

    #[test]
    fn test_erased_phases() {
        let mut instance = TaskInstance::new(doubling(21)).for_descriptor("double");
        assert_eq!(instance.descriptor(), Some("double"));
        assert_eq!(instance.label(), "double");

        let start = instance.forward().unwrap();
        instance.on_complete(start).unwrap();

        let task = instance.get_mut::<Doubling>().unwrap();
        assert_eq!(*task.seen.lock().unwrap(), Some(42));
    }

    #[test]
    fn test_on_complete_rejects_wrong_type() {
        let instance = TaskInstance::new(doubling(1));
        let err = instance.on_complete(Value::new("text".to_string())).unwrap_err();
        assert!(err.is::<InvocationError>());
        assert!(err.to_string().contains("String"));
    }

    #[test]
    fn test_label_falls_back_to_type() {
        let instance = TaskInstance::new(doubling(1));
        assert_eq!(instance.label(), "Doubling");
        assert_eq!(instance.type_key(), TypeKey::of::<Doubling>());
    }
}
