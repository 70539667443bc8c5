//! The agent facade: registration, startup and the run loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sidus_types::config::RuntimeConfig;
use sidus_types::error::{ConfigError, ResolveError};
use sidus_types::ty::TypeKey;
use tokio_util::sync::CancellationToken;

use super::handle::{lookup, AgentHandle};
use super::pool::WorkerPool;
use super::scheduler::LoopEntry;
use super::Application;
use crate::context::Context;
use crate::inject::{Component, Executable, Key, TypedRegistry};
use crate::plugin::AgentPlugin;
use crate::task::{Task, TaskInstance};

/// Name the agent's own handle is registered under.
pub const AGENT_HANDLE_COMPONENT: &str = "agent_handle";

/// An agent application.
///
/// Register components, skills, tasks, loops and exception routes, then
/// [`build`](Self::build) (or [`run`](Self::run), which builds first).
/// Registration is closed once the agent is built.
pub struct Agent {
    config: RuntimeConfig,
    context: Context,
    halt: CancellationToken,
    handle: AgentHandle,
    app: Option<Arc<Application>>,
}

impl Agent {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(RuntimeConfig {
            agent_name: name.into(),
            ..RuntimeConfig::default()
        })
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let config = config.validate();
        let halt = CancellationToken::new();
        let handle = AgentHandle::new(&config.agent_name, halt.clone());
        Self {
            config,
            context: Context::new(),
            halt,
            handle,
            app: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.agent_name
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn handle(&self) -> AgentHandle {
        self.handle.clone()
    }

    pub fn is_built(&self) -> bool {
        self.app.is_some()
    }

    /// The registrations, while they can still change.
    pub fn context_mut(&mut self) -> Result<&mut Context, ConfigError> {
        if self.app.is_some() {
            return Err(ConfigError::AlreadyBuilt);
        }
        Ok(&mut self.context)
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    pub fn add_component_builder(&mut self, builder: Executable) -> Result<(), ConfigError> {
        self.context_mut()?.add_component_builder(builder)
    }

    pub fn add_skill(&mut self, skill: Executable) -> Result<String, ConfigError> {
        self.context_mut()?.add_skill(skill)
    }

    pub fn add_stateful_skill<T, F>(&mut self, constructor: Executable, call: F) -> Result<String, ConfigError>
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>) -> Executable + Send + Sync + 'static,
    {
        self.context_mut()?.add_stateful_skill(constructor, call)
    }

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
        self.context_mut()?.add_task::<T, I, S>(constructor, name, skills)
    }

    pub fn add_configuration(&mut self, handler: Executable, order: i32) -> Result<(), ConfigError> {
        self.context_mut()?.add_configuration(handler, order);
        Ok(())
    }

    pub fn add_post_processor(&mut self, handler: Executable, order: i32) -> Result<(), ConfigError> {
        self.context_mut()?.add_post_processor(handler, order);
        Ok(())
    }

    pub fn add_loop(&mut self, handler: Executable, interval: Duration, order: i32) -> Result<(), ConfigError> {
        self.context_mut()?.add_loop(handler, interval, order)
    }

    pub fn add_exception_handler(
        &mut self,
        handler: Executable,
        error_types: Vec<TypeKey>,
        order: i32,
    ) -> Result<(), ConfigError> {
        self.context_mut()?
            .add_exception_handler(handler, error_types, order);
        Ok(())
    }

    /// Let a plugin register whatever it contributes.
    pub fn apply_plugin(&mut self, plugin: &dyn AgentPlugin) -> Result<(), ConfigError> {
        self.context_mut()?;
        plugin.apply(self)?;
        tracing::debug!(agent = %self.config.agent_name, plugin = plugin.name(), "plugin applied");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Build every component, run startup handlers, materialize skills and
    /// compile task plans.
    ///
    /// Fails if already built. On failure nothing is kept and the
    /// registrations are unchanged.
    pub fn build(&mut self) -> Result<(), ConfigError> {
        self.assemble().map(|_| ())
    }

    fn assemble(&mut self) -> Result<Arc<Application>, ConfigError> {
        if self.app.is_some() {
            return Err(ConfigError::AlreadyBuilt);
        }

        let mut components = TypedRegistry::new();
        components.put(
            Component::new(Arc::new(self.handle.clone())),
            AGENT_HANDLE_COMPONENT,
            None,
        )?;
        let assembly = self.context.build(components, self.config.plan)?;

        let now = Utc::now();
        let loops = assembly
            .loops
            .into_iter()
            .map(|(name, executable, interval)| LoopEntry::new(name, executable, interval, now))
            .collect::<Result<Vec<_>, _>>()?;

        let app = Arc::new(Application {
            name: self.config.agent_name.clone(),
            components: assembly.components,
            skills: assembly.skills,
            tasks: assembly.tasks,
            loops,
            routes: assembly.routes,
            pool: WorkerPool::new(
                self.config.max_concurrent_executions,
                self.config.max_queued_executions,
            ),
            halt: self.halt.clone(),
        });
        self.handle.attach(&app);
        self.app = Some(Arc::clone(&app));
        tracing::info!(agent = %self.config.agent_name, "agent built");
        Ok(app)
    }

    /// Build if needed, then run the loop scheduler until [`halt`](Self::halt).
    pub async fn run(&mut self) -> Result<(), ConfigError> {
        let app = match self.app.clone() {
            Some(app) => app,
            None => self.assemble()?,
        };
        let tick = Duration::from_millis(self.config.tick_interval_ms);
        app.run_scheduler(tick).await;
        Ok(())
    }

    pub fn halt(&self) {
        self.handle.halt();
    }

    // -----------------------------------------------------------------------
    // Runtime operations
    // -----------------------------------------------------------------------

    pub fn create_task<'k>(&self, key: impl Into<Key<'k>>) -> Result<TaskInstance, ResolveError> {
        self.application()?.create_task(key.into())
    }

    /// Execute a task in the background. Failures go to the exception routes.
    pub fn task_execute(&self, instance: TaskInstance) {
        self.handle.task_execute(instance);
    }

    pub fn component<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveError> {
        lookup::<T>(self.application()?.components())
    }

    pub fn active_skills<'k>(&self, task: impl Into<Key<'k>>) -> Result<Vec<String>, ResolveError> {
        self.handle.active_skills(task)
    }

    /// Names of all materialized skills.
    pub fn skill_names(&self) -> Vec<String> {
        match &self.app {
            Some(app) => {
                let mut names: Vec<String> = app.skills.keys().cloned().collect();
                names.sort();
                names
            }
            None => self.context.skill_names(),
        }
    }

    fn application(&self) -> Result<&Arc<Application>, ResolveError> {
        self.app.as_ref().ok_or(ResolveError::NotBuilt)
    }
}
