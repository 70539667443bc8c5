use thiserror::Error;

/// Errors raised by the typed registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("name '{name}' is already bound to a different type than '{ty}'")]
    NameTypeMismatch { name: String, ty: String },

    #[error("name '{0}' is already registered for another type")]
    NameTaken(String),

    #[error("type '{ty}' is already registered under a different name than '{name}'")]
    TypeTaken { name: String, ty: String },

    #[error("'{name}' ({ty}) is already registered")]
    AlreadyRegistered { name: String, ty: String },

    #[error("no type given for '{0}' and none can be inferred")]
    MissingType(String),

    #[error("type '{ty}' is ambiguous: matched by {candidates:?}")]
    Ambiguous { ty: String, candidates: Vec<String> },
}

/// Errors raised while compiling or querying a skill plan.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("skill sequence is empty")]
    EmptySequence,

    #[error("skill '{0}' is not registered")]
    UnknownSkill(String),

    #[error("plan has no slot '{0}'")]
    UnknownSlot(String),

    #[error("no edge between '{from}' and '{to}'")]
    NoEdge { from: String, to: String },

    #[error("edge weight must be positive, got {0}")]
    InvalidWeight(u32),

    #[error("no path from 'in' to 'out' remains")]
    NoPath,
}

/// Fatal startup errors. Any of these aborts the build with no partial state.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("context already built")]
    AlreadyBuilt,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("'{0}' must declare its produced type")]
    MissingProducedType(String),

    #[error("a name is required for {0}")]
    MissingName(String),

    #[error("no builder registered for component type '{0}'")]
    MissingBuilder(String),

    #[error("circular component dependency: {0}")]
    DependencyCycle(String),

    #[error("component '{component}' failed to build: {reason}")]
    ComponentFailed { component: String, reason: String },

    #[error("{stage} '{handler}' failed: {reason}")]
    HandlerFailed {
        stage: &'static str,
        handler: String,
        reason: String,
    },

    #[error("skill '{0}' already exists")]
    DuplicateSkill(String),

    #[error("task '{0}' already exists")]
    DuplicateTask(String),

    #[error("task '{0}' has no skills")]
    EmptyTask(String),

    #[error("invalid skill '{skill}': {reason}")]
    InvalidSkill { skill: String, reason: String },

    #[error("loop '{0}' must have a non-zero interval")]
    InvalidLoopInterval(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(String),
}

/// Errors raised synchronously when looking up or instantiating a task.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("agent is not built")]
    NotBuilt,

    #[error("task '{0}' is not registered")]
    UnknownTask(String),

    #[error("no component of type '{0}'")]
    UnknownComponent(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("task '{task}' could not be constructed: {reason}")]
    Construction { task: String, reason: String },
}
