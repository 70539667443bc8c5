//! Executable units with declared injection metadata.
//!
//! An [`Executable`] wraps a constructor or a function body together with
//! everything needed to call it without inspecting it: its name, its
//! parameters (name, type, kind), its produced type and its ordering hint.
//! Arguments are resolved at invocation time from an optional secondary
//! container and then from the component registry.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use sidus_types::ty::TypeKey;

use super::component::{Component, Handle};
use super::naming::default_name_for;
use super::registry::{Key, Typed, TypedRegistry};
use crate::error::{ExecError, InvocationError};

/// A type-erased owned value.
pub type Object = Box<dyn Any + Send + Sync>;

// ---------------------------------------------------------------------------
// Values and the secondary container
// ---------------------------------------------------------------------------

/// An owned value tagged with its type.
///
/// This is what flows between task phases and skills.
pub struct Value {
    ty: TypeKey,
    object: Object,
}

impl Value {
    pub fn new<V: Send + Sync + 'static>(value: V) -> Self {
        Self {
            ty: TypeKey::of::<V>(),
            object: Box::new(value),
        }
    }

    pub fn type_key(&self) -> TypeKey {
        self.ty
    }

    /// Take the value back out as `V`, or get it back unchanged on mismatch.
    pub fn downcast<V: 'static>(self) -> Result<V, Self> {
        let ty = self.ty;
        match self.object.downcast::<V>() {
            Ok(value) => Ok(*value),
            Err(object) => Err(Self { ty, object }),
        }
    }

    pub fn downcast_ref<V: 'static>(&self) -> Option<&V> {
        self.object.downcast_ref::<V>()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({})", self.ty.short_name())
    }
}

/// Named values offered to an invocation ahead of the component registry.
///
/// A parameter takes the entry with its name, or failing that the first
/// entry whose type matches exactly. Each entry is consumed at most once.
#[derive(Debug, Default)]
pub struct Secondary {
    entries: Vec<(String, Value)>,
}

impl Secondary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<V: Send + Sync + 'static>(self, name: impl Into<String>, value: V) -> Self {
        self.with_value(name, Value::new(value))
    }

    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        self.entries.retain(|(existing, _)| *existing != name);
        self.entries.push((name, value));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn take(&mut self, name: &str, ty: TypeKey) -> Option<Value> {
        let position = self
            .entries
            .iter()
            .position(|(n, _)| n == name)
            .or_else(|| self.entries.iter().position(|(_, v)| v.ty == ty))?;
        Some(self.entries.remove(position).1)
    }
}

// ---------------------------------------------------------------------------
// Parameters and arguments
// ---------------------------------------------------------------------------

/// How a parameter is meant to be satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// A shared component, normally from the registry.
    Component,
    /// An owned value, normally from the secondary container.
    Value,
    /// The `Arc<ExecError>` handed to exception handlers.
    Error,
}

/// A declared parameter.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: TypeKey,
    pub kind: ParamKind,
}

enum Arg<'a> {
    Component(&'a Component),
    Value(Value),
}

/// Resolved arguments handed to an executable body.
pub struct Args<'a> {
    slots: HashMap<String, Arg<'a>>,
}

impl<'a> Args<'a> {
    fn resolve(
        executable: &Executable,
        primary: &'a TypedRegistry<Component>,
        mut secondary: Option<Secondary>,
    ) -> Result<Self, ExecError> {
        let mut slots = HashMap::with_capacity(executable.params.len());
        for param in &executable.params {
            if let Some(value) = secondary.as_mut().and_then(|s| s.take(&param.name, param.ty)) {
                slots.insert(param.name.clone(), Arg::Value(value));
                continue;
            }
            match primary.get(Key::Type(param.ty))? {
                Some(component) => {
                    slots.insert(param.name.clone(), Arg::Component(component));
                }
                None => {
                    return Err(InvocationError::Unresolved {
                        executable: executable.display_name().to_string(),
                        param: param.name.clone(),
                        ty: param.ty.short_name().to_string(),
                    }
                    .into());
                }
            }
        }
        Ok(Self { slots })
    }

    /// A shared argument as `Arc<T>`.
    ///
    /// Works for components (by concrete type or view) and for secondary
    /// values that were passed as `Arc<T>`.
    pub fn component<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Result<Arc<T>, ExecError> {
        let found = match self.slots.get(name) {
            Some(Arg::Component(component)) => component.get::<T>(),
            Some(Arg::Value(value)) => value.downcast_ref::<Arc<T>>().cloned(),
            None => return Err(InvocationError::MissingArgument(name.to_string()).into()),
        };
        found.ok_or_else(|| {
            InvocationError::ArgumentType {
                param: name.to_string(),
                expected: TypeKey::of::<T>().short_name().to_string(),
            }
            .into()
        })
    }

    /// Take an owned argument. Each value can be taken once.
    pub fn take<V: Send + Sync + 'static>(&mut self, name: &str) -> Result<V, ExecError> {
        match self.slots.remove(name) {
            Some(Arg::Value(value)) => value.downcast::<V>().map_err(|value| {
                InvocationError::ValueType {
                    expected: TypeKey::of::<V>().short_name().to_string(),
                    actual: value.type_key().short_name().to_string(),
                }
                .into()
            }),
            Some(Arg::Component(component)) => {
                // Components are shared; put it back so `component()` still works.
                self.slots.insert(name.to_string(), Arg::Component(component));
                Err(InvocationError::ArgumentType {
                    param: name.to_string(),
                    expected: TypeKey::of::<V>().short_name().to_string(),
                }
                .into())
            }
            None => Err(InvocationError::MissingArgument(name.to_string()).into()),
        }
    }

    /// The error handed to an exception handler.
    pub fn error(&self, name: &str) -> Result<Arc<ExecError>, ExecError> {
        self.component::<ExecError>(name)
    }
}

// ---------------------------------------------------------------------------
// Executable
// ---------------------------------------------------------------------------

type Body = Arc<dyn Fn(&mut Args<'_>) -> Result<Object, ExecError> + Send + Sync>;
type ViewCast = Arc<dyn Fn(&Handle) -> Option<Handle> + Send + Sync>;
type Share = fn(Object) -> Result<Handle, Object>;

/// Whether the unit produces a component instance or performs work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Constructor,
    Function,
}

/// A callable unit with its injection metadata.
#[derive(Clone)]
pub struct Executable {
    name: Option<String>,
    unit: UnitKind,
    params: Vec<Param>,
    produces: Option<TypeKey>,
    output: TypeKey,
    order: i32,
    body: Body,
    share: Share,
    views: Vec<(TypeKey, ViewCast)>,
}

impl Executable {
    /// Start declaring a constructor of `T`.
    ///
    /// The default name is the snake-cased type name.
    pub fn constructor<T: Send + Sync + 'static>() -> ExecutableBuilder<T> {
        ExecutableBuilder {
            unit: UnitKind::Constructor,
            name: default_name_for::<T>(),
            params: Vec::new(),
            produces: Some(TypeKey::of::<T>()),
            views: Vec::new(),
            _out: PhantomData,
        }
    }

    /// Start declaring a function. It produces nothing until
    /// [`returns`](ExecutableBuilder::returns) is called.
    pub fn function() -> ExecutableBuilder<()> {
        ExecutableBuilder {
            unit: UnitKind::Function,
            name: None,
            params: Vec::new(),
            produces: None,
            views: Vec::new(),
            _out: PhantomData,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }

    pub fn unit(&self) -> UnitKind {
        self.unit
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Declared produced type. `None` for functions without a return value.
    pub fn produces(&self) -> Option<TypeKey> {
        self.produces
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Types this unit's output can also be resolved by once it is a component.
    pub fn provided_types(&self) -> Vec<TypeKey> {
        self.views.iter().map(|(ty, _)| *ty).collect()
    }

    /// Resolve every parameter and run the body.
    ///
    /// Each parameter is looked up in `secondary` first (by name, then by
    /// exact type) and then in `primary` (by type or unique supertype).
    /// Errors from the body are returned unchanged.
    pub fn invoke(
        &self,
        primary: &TypedRegistry<Component>,
        secondary: Option<Secondary>,
    ) -> Result<Value, ExecError> {
        let mut args = Args::resolve(self, primary, secondary)?;
        let object = (self.body)(&mut args)?;
        Ok(Value {
            ty: self.output,
            object,
        })
    }

    /// Turn a value produced by this constructor into a component, views
    /// included.
    pub(crate) fn into_component(&self, value: Value) -> Result<Component, ExecError> {
        let mismatch = |actual: TypeKey| InvocationError::ValueType {
            expected: self.output.short_name().to_string(),
            actual: actual.short_name().to_string(),
        };
        let actual = value.ty;
        let handle = (self.share)(value.object).map_err(|_| mismatch(actual))?;
        let mut views = Vec::with_capacity(self.views.len());
        for (ty, cast) in &self.views {
            let view = cast(&handle).ok_or_else(|| mismatch(actual))?;
            views.push((*ty, view));
        }
        Ok(Component::from_parts(self.output, handle, views))
    }
}

impl Typed for Executable {
    fn type_key(&self) -> Option<TypeKey> {
        self.produces
    }

    fn supertypes(&self) -> Vec<TypeKey> {
        self.provided_types()
    }
}

impl fmt::Debug for Executable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executable")
            .field("name", &self.name)
            .field("unit", &self.unit)
            .field("params", &self.params)
            .field("produces", &self.produces)
            .field("order", &self.order)
            .finish()
    }
}

fn share<T: Send + Sync + 'static>(object: Object) -> Result<Handle, Object> {
    let value = object.downcast::<T>()?;
    let shared: Arc<T> = Arc::from(value);
    Ok(Box::new(shared))
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Declares an [`Executable`] producing `Out`.
pub struct ExecutableBuilder<Out> {
    unit: UnitKind,
    name: Option<String>,
    params: Vec<Param>,
    produces: Option<TypeKey>,
    views: Vec<(TypeKey, ViewCast)>,
    _out: PhantomData<fn() -> Out>,
}

impl ExecutableBuilder<()> {
    /// Declare the produced type of a function.
    pub fn returns<R: Send + Sync + 'static>(self) -> ExecutableBuilder<R> {
        ExecutableBuilder {
            unit: self.unit,
            name: self.name,
            params: self.params,
            produces: Some(TypeKey::of::<R>()),
            views: Vec::new(),
            _out: PhantomData,
        }
    }
}

impl<Out: Send + Sync + 'static> ExecutableBuilder<Out> {
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Declare a shared parameter resolved by type.
    pub fn component<T: ?Sized + 'static>(self, name: &str) -> Self {
        self.param(name, TypeKey::of::<T>(), ParamKind::Component)
    }

    /// Declare an owned value parameter.
    pub fn value<V: 'static>(self, name: &str) -> Self {
        self.param(name, TypeKey::of::<V>(), ParamKind::Value)
    }

    /// Declare the error parameter of an exception handler.
    pub fn error(self, name: &str) -> Self {
        self.param(name, TypeKey::of::<Arc<ExecError>>(), ParamKind::Error)
    }

    fn param(mut self, name: &str, ty: TypeKey, kind: ParamKind) -> Self {
        self.params.push(Param {
            name: name.to_string(),
            ty,
            kind,
        });
        self
    }

    /// Make the produced component resolvable as `S` too.
    ///
    /// `cast` is usually `|v| v`, coercing `Arc<Out>` to `Arc<dyn Trait>`.
    pub fn provides<S: ?Sized + Send + Sync + 'static>(mut self, cast: fn(Arc<Out>) -> Arc<S>) -> Self {
        let view: ViewCast = Arc::new(move |handle: &Handle| {
            handle
                .downcast_ref::<Arc<Out>>()
                .map(|out| Box::new(cast(Arc::clone(out))) as Handle)
        });
        self.views.push((TypeKey::of::<S>(), view));
        self
    }

    /// Finish the declaration with its body.
    ///
    /// Functions without an explicit name take the name of `F` when it is a
    /// named `fn` item. Closures stay unnamed.
    pub fn build<F>(self, body: F) -> Executable
    where
        F: Fn(&mut Args<'_>) -> Result<Out, ExecError> + Send + Sync + 'static,
    {
        let name = match (self.name, self.unit) {
            (Some(name), _) => Some(name),
            (None, UnitKind::Function) => default_name_for::<F>(),
            (None, UnitKind::Constructor) => None,
        };
        let body: Body = Arc::new(move |args: &mut Args<'_>| {
            body(args).map(|out| Box::new(out) as Object)
        });
        Executable {
            name,
            unit: self.unit,
            params: self.params,
            produces: self.produces,
            output: TypeKey::of::<Out>(),
            order: 0,
            body,
            share: share::<Out>,
            views: self.views,
        }
    }
}
