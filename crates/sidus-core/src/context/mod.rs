//! The dependency container.
//!
//! [`Context`] collects every registration an agent is built from. Nothing
//! is constructed at registration time; [`Context::build`] turns the registrations
//! into a ready application in a fixed order:
//!
//! 1. build every component, resolving dependencies by type
//! 2. run configuration handlers, then post-processors, in ascending order
//! 3. materialize and validate skills
//! 4. compile one skill plan per task

pub(crate) mod build;

use std::sync::{Arc, RwLock};
use std::time::Duration;

use sidus_types::error::ConfigError;
use sidus_types::ty::TypeKey;

use crate::inject::{Executable, Typed, TypedRegistry, Value};
use crate::plan::SkillPlan;
use crate::runtime::ExceptionRoute;
use crate::task::{Task, TaskDescriptor, TaskInstance};

type Bind = Arc<dyn Fn(Value) -> Option<Executable> + Send + Sync>;
type Instantiate = fn(Value) -> Result<TaskInstance, Value>;

/// Where a skill's executable comes from.
#[derive(Clone)]
pub(crate) enum SkillSource {
    Function(Executable),
    /// A component-like object built at startup whose call executable is
    /// bound to the instance.
    Stateful { constructor: Executable, bind: Bind },
}

pub(crate) struct TaskRegistration {
    pub(crate) descriptor: TaskDescriptor,
    pub(crate) constructor: Executable,
    pub(crate) instantiate: Instantiate,
}

impl Typed for TaskRegistration {
    fn type_key(&self) -> Option<TypeKey> {
        Some(self.descriptor.ty)
    }
}

/// A task after startup: its constructor and its live skill plan.
pub(crate) struct CompiledTask {
    pub(crate) descriptor: TaskDescriptor,
    pub(crate) constructor: Executable,
    pub(crate) instantiate: Instantiate,
    pub(crate) plan: RwLock<SkillPlan>,
}

impl Typed for CompiledTask {
    fn type_key(&self) -> Option<TypeKey> {
        Some(self.descriptor.ty)
    }
}

pub(crate) struct LoopRegistration {
    pub(crate) executable: Executable,
    pub(crate) interval: Duration,
}

/// Registrations an agent is built from.
#[derive(Default)]
pub struct Context {
    builders: TypedRegistry<Executable>,
    configurations: Vec<Executable>,
    post_processors: Vec<Executable>,
    skills: Vec<(String, SkillSource)>,
    tasks: TypedRegistry<TaskRegistration>,
    loops: Vec<LoopRegistration>,
    routes: Vec<ExceptionRoute>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component builder.
    ///
    /// The builder must declare its produced type and have a name; the
    /// component is registered under both.
    pub fn add_component_builder(&mut self, builder: Executable) -> Result<(), ConfigError> {
        let name = required_name(&builder, "component builder")?;
        let ty = builder
            .produces()
            .ok_or_else(|| ConfigError::MissingProducedType(name.clone()))?;
        self.builders.put(builder, name.clone(), Some(ty))?;
        tracing::debug!(component = %name, "component builder registered");
        Ok(())
    }

    /// Register a stateless skill. Returns the name it is registered under.
    pub fn add_skill(&mut self, skill: Executable) -> Result<String, ConfigError> {
        let name = required_name(&skill, "skill")?;
        self.push_skill(name, SkillSource::Function(skill))
    }

    /// Register a skill backed by an object built at startup.
    ///
    /// `constructor` produces the object (its dependencies are injected like
    /// any component's) and `call` turns the built object into the skill's
    /// executable. The skill is named after the constructor.
    pub fn add_stateful_skill<T, F>(&mut self, constructor: Executable, call: F) -> Result<String, ConfigError>
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>) -> Executable + Send + Sync + 'static,
    {
        let name = required_name(&constructor, "stateful skill")?;
        let bind: Bind = Arc::new(move |value: Value| {
            value.downcast::<T>().ok().map(|object| call(Arc::new(object)))
        });
        self.push_skill(name, SkillSource::Stateful { constructor, bind })
    }

    fn push_skill(&mut self, name: String, source: SkillSource) -> Result<String, ConfigError> {
        if self.has_skill(&name) {
            return Err(ConfigError::DuplicateSkill(name));
        }
        tracing::debug!(skill = %name, "skill registered");
        self.skills.push((name.clone(), source));
        Ok(name)
    }

    /// Register a task type with its ordered skill sequence.
    ///
    /// The name defaults to the constructor's name. Skills may repeat.
    pub fn add_task<T, I, S>(
        &mut self,
        constructor: Executable,
        name: Option<&str>,
        skills: I,
    ) -> Result<String, ConfigError>
    where
        T: Task,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = match name {
            Some(name) => name.to_string(),
            None => required_name(&constructor, "task")?,
        };
        let ty = TypeKey::of::<T>();
        if constructor.produces() != Some(ty) {
            return Err(ConfigError::MissingProducedType(format!(
                "{name} (expected {})",
                ty.short_name()
            )));
        }
        let skills: Vec<String> = skills.into_iter().map(Into::into).collect();
        if skills.is_empty() {
            return Err(ConfigError::EmptyTask(name));
        }
        if self.tasks.contains(name.as_str()) {
            return Err(ConfigError::DuplicateTask(name));
        }

        let registration = TaskRegistration {
            descriptor: TaskDescriptor {
                name: name.clone(),
                ty,
                skills,
            },
            constructor,
            instantiate: instantiate::<T>,
        };
        self.tasks.put(registration, name.clone(), Some(ty))?;
        tracing::debug!(task = %name, "task registered");
        Ok(name)
    }

    pub fn add_configuration(&mut self, handler: Executable, order: i32) {
        self.configurations.push(handler.with_order(order));
    }

    pub fn add_post_processor(&mut self, handler: Executable, order: i32) {
        self.post_processors.push(handler.with_order(order));
    }

    /// Register a periodic loop. Loops run no more than once at a time.
    pub fn add_loop(&mut self, handler: Executable, interval: Duration, order: i32) -> Result<(), ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::InvalidLoopInterval(
                handler.name().unwrap_or("<unnamed>").to_string(),
            ));
        }
        self.loops.push(LoopRegistration {
            executable: handler.with_order(order),
            interval,
        });
        Ok(())
    }

    /// Register an exception route. An empty type list catches everything.
    pub fn add_exception_handler(&mut self, handler: Executable, error_types: Vec<TypeKey>, order: i32) {
        self.routes
            .push(ExceptionRoute::new(handler.with_order(order), error_types));
    }

    pub fn has_skill(&self, name: &str) -> bool {
        self.skills.iter().any(|(existing, _)| existing == name)
    }

    /// Registered skill names in registration order.
    pub fn skill_names(&self) -> Vec<String> {
        self.skills.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn task_descriptors(&self) -> Vec<TaskDescriptor> {
        self.tasks
            .iter()
            .map(|(_, _, registration)| registration.descriptor.clone())
            .collect()
    }
}

fn required_name(executable: &Executable, what: &str) -> Result<String, ConfigError> {
    executable
        .name()
        .map(str::to_string)
        .ok_or_else(|| ConfigError::MissingName(what.to_string()))
}

fn instantiate<T: Task>(value: Value) -> Result<TaskInstance, Value> {
    value.downcast::<T>().map(TaskInstance::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecError;

    #[derive(Clone)]
    struct Echo;

    impl Task for Echo {
        type Input = String;
        type Output = String;

        fn forward(&self) -> Result<String, ExecError> {
            Ok("hi".to_string())
        }

        fn on_complete(&self, _output: String) -> Result<(), ExecError> {
            Ok(())
        }
    }

    fn echo_ctor() -> Executable {
        Executable::constructor::<Echo>().build(|_| Ok(Echo))
    }

    fn upper() -> Executable {
        Executable::function()
            .named("upper")
            .returns::<String>()
            .value::<String>("value")
            .build(|args| Ok(args.take::<String>("value")?.to_uppercase()))
    }

    #[test]
    fn test_builder_requires_name_and_type() {
        let mut ctx = Context::new();
        let err = ctx
            .add_component_builder(Executable::function().named("nothing").build(|_| Ok(())))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingProducedType(_)));

        let err = ctx
            .add_component_builder(Executable::function().returns::<u8>().build(|_| Ok(1)))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingName(_)));
    }

    #[test]
    fn test_duplicate_skill_rejected() {
        let mut ctx = Context::new();
        assert_eq!(ctx.add_skill(upper()).unwrap(), "upper");
        let err = ctx.add_skill(upper()).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateSkill(name) if name == "upper"));
        assert_eq!(ctx.skill_names(), vec!["upper".to_string()]);
    }

    #[test]
    fn test_task_registration() {
        let mut ctx = Context::new();
        let name = ctx.add_task::<Echo, _, _>(echo_ctor(), None, ["upper", "upper"]).unwrap();
        assert_eq!(name, "echo");

        let descriptors = ctx.task_descriptors();
        assert_eq!(descriptors[0].skills, vec!["upper", "upper"]);
        assert_eq!(descriptors[0].ty, TypeKey::of::<Echo>());

        let err = ctx
            .add_task::<Echo, _, _>(echo_ctor(), None, ["upper"])
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTask(_)));
    }

    #[test]
    fn test_task_registration_errors() {
        let mut ctx = Context::new();
        let err = ctx
            .add_task::<Echo, _, &str>(echo_ctor(), Some("empty"), [])
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyTask(_)));

        let wrong = Executable::constructor::<String>().build(|_| Ok(String::new()));
        let err = ctx.add_task::<Echo, _, _>(wrong, None, ["upper"]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingProducedType(_)));
    }

    #[test]
    fn test_zero_loop_interval_rejected() {
        let mut ctx = Context::new();
        let err = ctx
            .add_loop(Executable::function().named("tick").build(|_| Ok(())), Duration::ZERO, 0)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLoopInterval(name) if name == "tick"));
    }
}
