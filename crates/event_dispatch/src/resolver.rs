//! Listener declarations and their resolution into invocables.
//!
//! Registration normalizes a [`ListenerDeclaration`] into a [`ListenerTarget`]
//! and checks what can be checked up front: a call is present, a handle is
//! known to the [`HandleCatalog`], a method name is a string. Whether a handle
//! names a listener type and whether the bound method exists is only checked
//! when the listener is resolved during a fire.

use crate::error::{DispatchError, Result};
use crate::event::{json_type_name, Event};
use crate::listener::{Flow, Listener, ListenerFn, ListenerRecord, ListenerTarget, DEFAULT_HANDLE_METHOD};
use crate::subscriber::{normalize_args, BoundSubscriber, Subscriber, SubscriberDeclaration};
use compact_str::CompactString;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Constructor of a listener handle, given its constructor args
pub type ListenerFactory = dyn Fn(&[Value]) -> Result<Arc<dyn Listener>> + Send + Sync;

/// Constructor of a subscriber handle, given its constructor args
pub type SubscriberFactory = dyn Fn(&[Value]) -> Result<BoundSubscriber> + Send + Sync;

/// One positional or keyed element of a structured declaration
#[derive(Clone)]
pub enum DeclarationPart {
    Callable(Arc<ListenerFn>),
    Instance(Arc<dyn Listener>),
    Value(Value),
}

impl DeclarationPart {
    fn kind(&self) -> &'static str {
        match self {
            DeclarationPart::Callable(_) => "closure",
            DeclarationPart::Instance(_) => "listener instance",
            DeclarationPart::Value(value) => json_type_name(value),
        }
    }

    fn is_absent(&self) -> bool {
        matches!(self, DeclarationPart::Value(Value::Null))
    }
}

impl From<Value> for DeclarationPart {
    fn from(value: Value) -> Self {
        DeclarationPart::Value(value)
    }
}

impl From<&str> for DeclarationPart {
    fn from(value: &str) -> Self {
        DeclarationPart::Value(Value::String(value.to_string()))
    }
}

impl From<Arc<dyn Listener>> for DeclarationPart {
    fn from(instance: Arc<dyn Listener>) -> Self {
        DeclarationPart::Instance(instance)
    }
}

impl fmt::Debug for DeclarationPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclarationPart::Callable(_) => f.write_str("Callable"),
            DeclarationPart::Instance(instance) => write!(f, "Instance({})", instance.name()),
            DeclarationPart::Value(value) => write!(f, "Value({value})"),
        }
    }
}

/// Accepted shapes of a listener passed to
/// [`EventManager::add_listener`](crate::EventManager::add_listener).
#[derive(Clone)]
pub enum ListenerDeclaration {
    /// Anonymous callable
    Callable(Arc<ListenerFn>),
    /// Known handle invoked through its default method
    Handle(CompactString),
    /// Live instance invoked through its default method
    Instance(Arc<dyn Listener>),
    /// `[call, method?, args?]`
    Sequence(Vec<DeclarationPart>),
    /// `{call, method?, args?}`
    Mapping(Vec<(CompactString, DeclarationPart)>),
}

impl ListenerDeclaration {
    pub fn closure<F, R>(listener: F) -> Self
    where
        F: Fn(&mut Event) -> Result<R> + Send + Sync + 'static,
        R: Into<Flow>,
    {
        ListenerDeclaration::Callable(crate::listener::closure(listener))
    }

    pub fn handle(handle: impl Into<CompactString>) -> Self {
        ListenerDeclaration::Handle(handle.into())
    }

    pub fn instance<L: Listener>(instance: Arc<L>) -> Self {
        ListenerDeclaration::Instance(instance)
    }

    /// Live instance bound to a named method
    pub fn method<L: Listener>(instance: Arc<L>, method: &str) -> Self {
        let instance: Arc<dyn Listener> = instance;
        ListenerDeclaration::Sequence(vec![instance.into(), method.into()])
    }

    /// Known handle bound to a named method, constructed with `args`
    pub fn class(handle: &str, method: &str, args: Vec<Value>) -> Self {
        ListenerDeclaration::Mapping(vec![
            ("call".into(), handle.into()),
            ("method".into(), method.into()),
            ("args".into(), Value::Array(args).into()),
        ])
    }

    /// Builds a declaration from dynamic data: a handle string, a
    /// `[call, method?, args?]` sequence or a `{call, method?, args?}` mapping.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(handle) => Ok(ListenerDeclaration::Handle(CompactString::from(handle))),
            Value::Array(parts) => Ok(ListenerDeclaration::Sequence(
                parts.into_iter().map(DeclarationPart::Value).collect(),
            )),
            Value::Object(entries) => Ok(ListenerDeclaration::Mapping(
                entries
                    .into_iter()
                    .map(|(key, value)| (CompactString::from(key), DeclarationPart::Value(value)))
                    .collect(),
            )),
            other => Err(DispatchError::invalid(format!(
                "invalid listener argument type {}: expected handle, sequence, mapping, closure or listener instance",
                json_type_name(&other)
            ))),
        }
    }
}

impl fmt::Debug for ListenerDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerDeclaration::Callable(_) => f.write_str("Callable"),
            ListenerDeclaration::Handle(handle) => write!(f, "Handle({handle})"),
            ListenerDeclaration::Instance(instance) => write!(f, "Instance({})", instance.name()),
            ListenerDeclaration::Sequence(parts) => f.debug_tuple("Sequence").field(parts).finish(),
            ListenerDeclaration::Mapping(entries) => f.debug_tuple("Mapping").field(entries).finish(),
        }
    }
}

impl From<&str> for ListenerDeclaration {
    fn from(handle: &str) -> Self {
        ListenerDeclaration::handle(handle)
    }
}

impl From<Arc<dyn Listener>> for ListenerDeclaration {
    fn from(instance: Arc<dyn Listener>) -> Self {
        ListenerDeclaration::Instance(instance)
    }
}

impl From<Arc<ListenerFn>> for ListenerDeclaration {
    fn from(callable: Arc<ListenerFn>) -> Self {
        ListenerDeclaration::Callable(callable)
    }
}

#[derive(Clone)]
enum HandleKind {
    Listener(Arc<ListenerFactory>),
    Subscriber(Arc<SubscriberFactory>),
}

/// Registry of the handles declarations may refer to by name.
#[derive(Clone, Default)]
pub struct HandleCatalog {
    handles: HashMap<CompactString, HandleKind>,
}

impl HandleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener handle. Re-registering a name replaces it.
    pub fn register_listener<L, F>(&mut self, handle: &str, constructor: F)
    where
        L: Listener,
        F: Fn(&[Value]) -> Result<L> + Send + Sync + 'static,
    {
        let factory: Arc<ListenerFactory> = Arc::new(move |args: &[Value]| {
            let listener: Arc<dyn Listener> = Arc::new(constructor(args)?);
            Ok(listener)
        });
        self.handles
            .insert(CompactString::new(handle), HandleKind::Listener(factory));
    }

    /// Registers a subscriber handle. Re-registering a name replaces it.
    pub fn register_subscriber<S, F>(&mut self, handle: &str, constructor: F)
    where
        S: Subscriber,
        F: Fn(&[Value]) -> Result<S> + Send + Sync + 'static,
    {
        let factory: Arc<SubscriberFactory> = Arc::new(move |args: &[Value]| {
            Ok(BoundSubscriber::new(Arc::new(constructor(args)?)))
        });
        self.handles
            .insert(CompactString::new(handle), HandleKind::Subscriber(factory));
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.handles.contains_key(handle)
    }

    pub fn is_listener(&self, handle: &str) -> bool {
        matches!(self.handles.get(handle), Some(HandleKind::Listener(_)))
    }

    pub fn is_subscriber(&self, handle: &str) -> bool {
        matches!(self.handles.get(handle), Some(HandleKind::Subscriber(_)))
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl fmt::Debug for HandleCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.handles.keys().map(|name| name.as_str()).collect();
        names.sort_unstable();
        f.debug_struct("HandleCatalog").field("handles", &names).finish()
    }
}

/// A resolved listener, ready to be called with an event
#[derive(Clone)]
pub enum Invocable {
    Closure(Arc<ListenerFn>),
    Bound {
        instance: Arc<dyn Listener>,
        method: CompactString,
    },
}

impl Invocable {
    pub fn invoke(&self, event: &mut Event) -> Result<Flow> {
        match self {
            Invocable::Closure(callable) => callable(event),
            Invocable::Bound { instance, method } => instance.call(method, event),
        }
    }
}

impl fmt::Debug for Invocable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invocable::Closure(_) => f.write_str("Invocable::Closure"),
            Invocable::Bound { instance, method } => {
                write!(f, "Invocable::Bound({}::{method})", instance.name())
            }
        }
    }
}

/// Turns declarations into records and records into invocables.
///
/// Handle targets are instantiated lazily. With instance caching enabled,
/// one instance is kept per handle and constructor-args pair and reused by
/// every fire; otherwise each invocation gets a fresh instance.
pub struct ListenerResolver {
    catalog: HandleCatalog,
    instances: HashMap<String, Arc<dyn Listener>>,
    cache_instances: bool,
}

impl fmt::Debug for ListenerResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerResolver")
            .field("catalog", &self.catalog)
            .field("cached_instances", &self.instances.len())
            .field("cache_instances", &self.cache_instances)
            .finish()
    }
}

impl ListenerResolver {
    pub fn new(cache_instances: bool) -> Self {
        Self {
            catalog: HandleCatalog::new(),
            instances: HashMap::new(),
            cache_instances,
        }
    }

    pub fn catalog(&self) -> &HandleCatalog {
        &self.catalog
    }

    /// Registers a listener handle and drops instances cached for it.
    pub fn register_listener<L, F>(&mut self, handle: &str, constructor: F)
    where
        L: Listener,
        F: Fn(&[Value]) -> Result<L> + Send + Sync + 'static,
    {
        self.catalog.register_listener(handle, constructor);
        self.forget_instances(handle);
    }

    /// Registers a subscriber handle and drops instances cached for it.
    pub fn register_subscriber<S, F>(&mut self, handle: &str, constructor: F)
    where
        S: Subscriber,
        F: Fn(&[Value]) -> Result<S> + Send + Sync + 'static,
    {
        self.catalog.register_subscriber(handle, constructor);
        self.forget_instances(handle);
    }

    fn forget_instances(&mut self, handle: &str) {
        let prefix = format!("{handle}#");
        self.instances.retain(|key, _| !key.starts_with(&prefix));
    }

    pub fn caches_instances(&self) -> bool {
        self.cache_instances
    }

    /// Number of memoized handle instances
    pub fn cached_instances(&self) -> usize {
        self.instances.len()
    }

    /// Validates a declaration and builds its record.
    pub fn normalize(
        &self,
        event_name: &str,
        declaration: ListenerDeclaration,
        priority: i32,
    ) -> Result<ListenerRecord> {
        let target = match declaration {
            ListenerDeclaration::Callable(callable) => ListenerTarget::Closure(callable),
            ListenerDeclaration::Instance(instance) => ListenerTarget::Instance(instance),
            ListenerDeclaration::Handle(handle) => {
                self.ensure_known(&handle)?;
                ListenerTarget::Class {
                    handle,
                    method: CompactString::new(DEFAULT_HANDLE_METHOD),
                    args: None,
                }
            }
            ListenerDeclaration::Sequence(parts) => {
                let mut parts = parts.into_iter();
                let call = parts.next();
                let method = parts.next();
                let args = parts.next();
                self.normalize_parts(call, method, args)?
            }
            ListenerDeclaration::Mapping(entries) => {
                let mut call = None;
                let mut method = None;
                let mut args = None;
                for (key, part) in entries {
                    match key.as_str() {
                        "call" => call = Some(part),
                        "method" => method = Some(part),
                        "args" => args = Some(part),
                        _ => {}
                    }
                }
                self.normalize_parts(call, method, args)?
            }
        };

        Ok(ListenerRecord::new(event_name, target, priority))
    }

    fn normalize_parts(
        &self,
        call: Option<DeclarationPart>,
        method: Option<DeclarationPart>,
        args: Option<DeclarationPart>,
    ) -> Result<ListenerTarget> {
        let call = call
            .filter(|part| !part.is_absent())
            .ok_or_else(|| DispatchError::invalid("invalid listener argument: undefined call"))?;

        if let DeclarationPart::Value(Value::String(handle)) = &call {
            self.ensure_known(handle)?;
        }

        let method = match method.filter(|part| !part.is_absent()) {
            None => None,
            Some(DeclarationPart::Value(Value::String(method))) => Some(CompactString::from(method)),
            Some(other) => {
                return Err(DispatchError::invalid(format!(
                    "invalid listener method type {}: expected string",
                    other.kind()
                )))
            }
        };

        let args = match args.filter(|part| !part.is_absent()) {
            None => None,
            Some(DeclarationPart::Value(value)) => normalize_args(Some(&value)),
            Some(other) => {
                return Err(DispatchError::invalid(format!(
                    "invalid listener args type {}: expected value or sequence of values",
                    other.kind()
                )))
            }
        };

        match call {
            DeclarationPart::Callable(callable) => {
                if method.is_some() || args.is_some() {
                    return Err(DispatchError::invalid(
                        "invalid listener: closures take neither a method nor constructor args",
                    ));
                }
                Ok(ListenerTarget::Closure(callable))
            }
            DeclarationPart::Instance(instance) => {
                if args.is_some() {
                    return Err(DispatchError::invalid(format!(
                        "invalid listener: constructor args given for live instance {}",
                        instance.name()
                    )));
                }
                Ok(match method {
                    Some(method) => ListenerTarget::Method { instance, method },
                    None => ListenerTarget::Instance(instance),
                })
            }
            DeclarationPart::Value(Value::String(handle)) => Ok(ListenerTarget::Class {
                handle: CompactString::from(handle),
                method: method.unwrap_or_else(|| CompactString::new(DEFAULT_HANDLE_METHOD)),
                args,
            }),
            DeclarationPart::Value(other) => Err(DispatchError::invalid(format!(
                "invalid listener call type {}: expected handle, closure or listener instance",
                json_type_name(&other)
            ))),
        }
    }

    fn ensure_known(&self, handle: &str) -> Result<()> {
        if self.catalog.contains(handle) {
            Ok(())
        } else {
            Err(DispatchError::invalid(format!(
                "invalid listener call: handle {handle} does not exist"
            )))
        }
    }

    /// Resolves a record's target into something callable.
    ///
    /// Fails when a handle does not name a listener type or when the bound
    /// method does not exist on the resolved instance.
    pub fn resolve(&mut self, target: &ListenerTarget) -> Result<Invocable> {
        let (instance, method) = match target {
            ListenerTarget::Closure(callable) => return Ok(Invocable::Closure(callable.clone())),
            ListenerTarget::Class { handle, method, args } => {
                (self.instantiate(handle, args.as_deref())?, method.clone())
            }
            ListenerTarget::Method { instance, method } => (instance.clone(), method.clone()),
            ListenerTarget::Instance(instance) => {
                (instance.clone(), CompactString::new(DEFAULT_HANDLE_METHOD))
            }
        };

        if !instance.responds_to(&method) {
            return Err(DispatchError::invalid(format!(
                "method {method} doesn't exist in listener {}",
                instance.name()
            )));
        }

        Ok(Invocable::Bound { instance, method })
    }

    fn instantiate(&mut self, handle: &str, args: Option<&[Value]>) -> Result<Arc<dyn Listener>> {
        let factory = match self.catalog.handles.get(handle) {
            Some(HandleKind::Listener(factory)) => factory.clone(),
            Some(HandleKind::Subscriber(_)) => {
                return Err(DispatchError::invalid(format!(
                    "invalid listener {handle}: expected a listener handle, found a subscriber"
                )))
            }
            None => {
                return Err(DispatchError::invalid(format!(
                    "invalid listener {handle}: unknown handle"
                )))
            }
        };
        let args = args.unwrap_or_default();

        if !self.cache_instances {
            return construct(factory.as_ref(), handle, args);
        }

        let key = format!("{handle}#{}", serde_json::to_string(args)?);
        if let Some(cached) = self.instances.get(&key) {
            return Ok(cached.clone());
        }

        let instance = construct(factory.as_ref(), handle, args)?;
        debug!("🧩 Instantiated listener handle {}", key);
        self.instances.insert(key, instance.clone());
        Ok(instance)
    }

    /// Turns a subscriber declaration into a live subscriber with its bindings.
    pub fn resolve_subscriber(&self, declaration: SubscriberDeclaration) -> Result<BoundSubscriber> {
        match declaration {
            SubscriberDeclaration::Instance(bound) => Ok(bound),
            SubscriberDeclaration::Handle { class, args } => match self.catalog.handles.get(&class) {
                Some(HandleKind::Subscriber(factory)) => factory(args.as_deref().unwrap_or_default())
                    .map_err(|err| {
                        DispatchError::invalid(format!(
                            "subscriber {class} could not be constructed: {err}"
                        ))
                    }),
                _ => Err(DispatchError::invalid(format!(
                    "invalid subscriber handle {class}: expected a known subscriber"
                ))),
            },
        }
    }
}

impl Default for ListenerResolver {
    fn default() -> Self {
        Self::new(true)
    }
}

fn construct(factory: &ListenerFactory, handle: &str, args: &[Value]) -> Result<Arc<dyn Listener>> {
    factory(args).map_err(|err| {
        DispatchError::invalid(format!("listener {handle} could not be constructed: {err}"))
    })
}
