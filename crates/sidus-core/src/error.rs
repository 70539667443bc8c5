//! Execution-time errors.
//!
//! Startup failures are [`ConfigError`](sidus_types::error::ConfigError)s and
//! abort the build. Everything that fails once the agent is running (a task
//! phase, a skill, a loop body, a saturated pool) is an [`ExecError`] and is
//! routed to the registered exception handlers instead of propagating.

use std::fmt;

use sidus_types::error::PlanError;
use sidus_types::ty::TypeKey;

/// An error raised while executing a task, skill, loop or handler.
///
/// Carries the concrete error type plus any supertypes declared with
/// [`ExecError::subtype_of`]. Exception routes match against both, so a
/// handler registered for a broad marker type catches every error that
/// declared it.
pub struct ExecError {
    ty: TypeKey,
    lineage: Vec<TypeKey>,
    inner: anyhow::Error,
}

impl ExecError {
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            ty: TypeKey::of::<E>(),
            lineage: Vec::new(),
            inner: anyhow::Error::new(err),
        }
    }

    /// Declare that this error also counts as `S` for routing purposes.
    pub fn subtype_of<S: ?Sized + 'static>(mut self) -> Self {
        let key = TypeKey::of::<S>();
        if key != self.ty && !self.lineage.contains(&key) {
            self.lineage.push(key);
        }
        self
    }

    /// Attach context to the message without changing the routing type.
    pub fn context<C>(self, context: C) -> Self
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        Self {
            inner: self.inner.context(context),
            ..self
        }
    }

    /// The concrete error type.
    pub fn type_key(&self) -> TypeKey {
        self.ty
    }

    pub fn lineage(&self) -> &[TypeKey] {
        &self.lineage
    }

    /// True when the error is `ty` or declared `ty` as a supertype.
    pub fn is_a(&self, ty: TypeKey) -> bool {
        self.ty == ty || self.lineage.contains(&ty)
    }

    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.is_a(TypeKey::of::<T>())
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.inner.downcast_ref::<E>()
    }

    pub fn into_anyhow(self) -> anyhow::Error {
        self.inner
    }
}

impl<E> From<E> for ExecError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self::new(err)
    }
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl fmt::Debug for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecError")
            .field("type", &self.ty.short_name())
            .field("message", &format_args!("{:#}", self.inner))
            .finish()
    }
}

/// Failures of the runtime machinery itself, as opposed to errors raised by
/// user code.
#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    #[error("cannot resolve parameter '{param}' ({ty}) of '{executable}'")]
    Unresolved {
        executable: String,
        param: String,
        ty: String,
    },

    #[error("argument '{0}' was not declared or was already taken")]
    MissingArgument(String),

    #[error("argument '{param}' is not a {expected}")]
    ArgumentType { param: String, expected: String },

    #[error("expected a value of type {expected}, got {actual}")]
    ValueType { expected: String, actual: String },

    #[error("skill '{0}' is not registered")]
    UnknownSkill(String),

    #[error("task '{0}' is not registered")]
    UnknownTask(String),

    #[error("worker pool saturated, '{0}' was not started")]
    WorkerPoolSaturated(String),

    #[error("no async runtime available to run '{0}'")]
    NoRuntime(String),

    #[error(transparent)]
    Plan(#[from] PlanError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("division by zero")]
    struct DivisionByZero;

    /// Marker for arithmetic failures.
    struct ArithmeticFailure;

    #[test]
    fn test_from_keeps_concrete_type() {
        let err: ExecError = DivisionByZero.into();
        assert!(err.is::<DivisionByZero>());
        assert!(!err.is::<ArithmeticFailure>());
        assert_eq!(err.to_string(), "division by zero");
    }

    #[test]
    fn test_subtype_of_extends_lineage() {
        let err = ExecError::new(DivisionByZero)
            .subtype_of::<ArithmeticFailure>()
            .subtype_of::<ArithmeticFailure>();
        assert!(err.is::<ArithmeticFailure>());
        assert_eq!(err.lineage().len(), 1);
        assert_eq!(err.type_key(), TypeKey::of::<DivisionByZero>());
    }

    #[test]
    fn test_context_keeps_routing_type() {
        let err = ExecError::new(DivisionByZero).context("while adding");
        assert!(err.is::<DivisionByZero>());
        assert_eq!(err.to_string(), "while adding");
        assert!(err.downcast_ref::<DivisionByZero>().is_some());
    }

    #[test]
    fn test_invocation_error_converts() {
        fn fails() -> Result<(), ExecError> {
            Err(InvocationError::WorkerPoolSaturated("tick".to_string()))?
        }
        let err = fails().unwrap_err();
        assert!(err.is::<InvocationError>());
        assert!(err.to_string().contains("saturated"));
    }
}
