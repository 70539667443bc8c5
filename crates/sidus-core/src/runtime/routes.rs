//! Exception routing.
//!
//! Errors escaping a task or loop are offered to every route whose type set
//! matches, in ascending order. Each matching handler is invoked once with
//! the error as its `error` argument. Errors no route accepts are logged and
//! dropped.

use std::sync::Arc;

use sidus_types::ty::TypeKey;

use super::Application;
use crate::error::ExecError;
use crate::inject::{Executable, Secondary};

/// A handler plus the error types it accepts. No types means all errors.
#[derive(Clone)]
pub struct ExceptionRoute {
    executable: Executable,
    error_types: Vec<TypeKey>,
}

impl ExceptionRoute {
    pub(crate) fn new(executable: Executable, error_types: Vec<TypeKey>) -> Self {
        Self {
            executable,
            error_types,
        }
    }

    pub fn order(&self) -> i32 {
        self.executable.order()
    }

    pub fn matches(&self, err: &ExecError) -> bool {
        self.error_types.is_empty() || self.error_types.iter().any(|ty| err.is_a(*ty))
    }
}

impl Application {
    /// Hand `err` to every matching route.
    pub(crate) fn route_error(&self, err: ExecError) {
        let err = Arc::new(err);
        let mut routed = 0usize;
        for route in self.routes.iter().filter(|r| r.matches(&err)) {
            routed += 1;
            let secondary = Secondary::new().with("error", Arc::clone(&err));
            if let Err(handler_err) = route.executable.invoke(&self.components, Some(secondary)) {
                tracing::warn!(
                    handler = route.executable.display_name(),
                    error = %handler_err,
                    "exception handler failed"
                );
            }
        }
        if routed == 0 {
            tracing::warn!(
                error = %err,
                error_type = err.type_key().short_name(),
                "unhandled execution error"
            );
        } else {
            tracing::debug!(routes = routed, error = %err, "execution error routed");
        }
    }
}
