//! The dispatch engine.
//!
//! [`EventManager`] owns the listener registry and runs the fire algorithm:
//! normalize the target into an [`Event`], merge parameters, record the fire,
//! check the enable gates, select listeners by hierarchical name, order them
//! by priority (stable, highest first), then invoke them one by one until the
//! chain ends or a listener stops propagation.

use crate::bench::{self, BenchManager, InstantBenchManager};
use crate::config::ManagerConfig;
use crate::error::{DispatchError, Result};
use crate::event::{json_type_name, Event, FireCounts, ParamKey};
use crate::listener::{Flow, ListenerInfo, ListenerRecord};
use crate::log::{DispatchLog, EventLogEntry, ListenerLogEntry};
use crate::matcher;
use crate::resolver::{ListenerDeclaration, ListenerResolver};
use crate::subscriber::{Subscriber, SubscriberDeclaration};
use compact_str::CompactString;
use serde_json::Value;
use smallvec::SmallVec;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// What [`EventManager::fire`] accepts: an event name or a prepared event.
#[derive(Debug, Clone)]
pub enum FireTarget {
    Name(CompactString),
    Event(Event),
}

impl FireTarget {
    /// Converts dynamic data into a fire target; only strings are accepted.
    pub fn try_from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(name) => Ok(FireTarget::Name(CompactString::new(name))),
            other => Err(DispatchError::invalid(format!(
                "invalid event argument type {}: expected event name or event",
                json_type_name(other)
            ))),
        }
    }

    fn into_event(self) -> Event {
        match self {
            FireTarget::Name(name) => Event::new(name),
            FireTarget::Event(event) => event,
        }
    }
}

impl From<&str> for FireTarget {
    fn from(name: &str) -> Self {
        FireTarget::Name(CompactString::new(name))
    }
}

impl From<String> for FireTarget {
    fn from(name: String) -> Self {
        FireTarget::Name(CompactString::from(name))
    }
}

impl From<Event> for FireTarget {
    fn from(event: Event) -> Self {
        FireTarget::Event(event)
    }
}

/// One event name or several, for the enable/disable toggles.
pub trait EventNames {
    fn into_names(self) -> Vec<CompactString>;
}

impl EventNames for &str {
    fn into_names(self) -> Vec<CompactString> {
        vec![CompactString::new(self)]
    }
}

impl EventNames for String {
    fn into_names(self) -> Vec<CompactString> {
        vec![CompactString::from(self)]
    }
}

impl EventNames for &[&str] {
    fn into_names(self) -> Vec<CompactString> {
        self.iter().map(CompactString::new).collect()
    }
}

impl<const N: usize> EventNames for [&str; N] {
    fn into_names(self) -> Vec<CompactString> {
        self.iter().map(CompactString::new).collect()
    }
}

impl EventNames for Vec<&str> {
    fn into_names(self) -> Vec<CompactString> {
        self.into_iter().map(CompactString::new).collect()
    }
}

impl EventNames for Vec<String> {
    fn into_names(self) -> Vec<CompactString> {
        self.into_iter().map(CompactString::from).collect()
    }
}

/// In-process event dispatcher.
///
/// Managers are fully independent: each owns its registry, gates, fire
/// counts and log. All mutation goes through `&mut self`, so sharing one
/// across threads means wrapping it in a single lock, which keeps
/// registration and the select-sort-invoke pass of `fire` consistent.
pub struct EventManager {
    /// Insertion-ordered registry; the order breaks priority ties
    registry: Vec<ListenerRecord>,
    resolver: ListenerResolver,
    disabled: bool,
    disabled_events: HashMap<CompactString, bool>,
    fire_counts: FireCounts,
    log_active: bool,
    log: DispatchLog,
    bench_manager: Arc<dyn BenchManager>,
    default_priority: i32,
}

impl fmt::Debug for EventManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventManager")
            .field("listeners", &self.registry.len())
            .field("resolver", &self.resolver)
            .field("disabled", &self.disabled)
            .field("disabled_events", &self.disabled_events)
            .field("log_active", &self.log_active)
            .field("default_priority", &self.default_priority)
            .finish()
    }
}

impl EventManager {
    /// Creates a manager with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ManagerConfig::default())
    }

    pub fn with_config(config: ManagerConfig) -> Self {
        Self {
            registry: Vec::new(),
            resolver: ListenerResolver::new(config.cache_listener_instances),
            disabled: false,
            disabled_events: HashMap::new(),
            fire_counts: FireCounts::new(),
            log_active: config.log_enabled,
            log: DispatchLog::default(),
            bench_manager: Arc::new(InstantBenchManager),
            default_priority: config.default_priority,
        }
    }

    pub fn default_priority(&self) -> i32 {
        self.default_priority
    }

    /// Replaces the timing collaborator used while logging is active
    pub fn set_bench_manager(&mut self, bench_manager: Arc<dyn BenchManager>) {
        self.bench_manager = bench_manager;
    }

    pub fn resolver(&self) -> &ListenerResolver {
        &self.resolver
    }

    // === Handles ===

    /// Makes `handle` usable as a listener call in declarations.
    pub fn register_listener_class<L, F>(&mut self, handle: &str, constructor: F)
    where
        L: crate::listener::Listener,
        F: Fn(&[Value]) -> Result<L> + Send + Sync + 'static,
    {
        self.resolver.register_listener(handle, constructor);
        debug!("📝 Registered listener handle {}", handle);
    }

    /// Makes `handle` usable in subscriber declarations.
    pub fn register_subscriber_class<S, F>(&mut self, handle: &str, constructor: F)
    where
        S: Subscriber,
        F: Fn(&[Value]) -> Result<S> + Send + Sync + 'static,
    {
        self.resolver.register_subscriber(handle, constructor);
        debug!("📝 Registered subscriber handle {}", handle);
    }

    // === Registration ===

    /// Registers a listener for `event_name` and everything below it.
    ///
    /// `priority` defaults to the manager's default priority. Declarations
    /// are validated here; handle kind and method existence are checked when
    /// the listener is first resolved during a fire.
    pub fn add_listener(
        &mut self,
        event_name: &str,
        declaration: impl Into<ListenerDeclaration>,
        priority: impl Into<Option<i32>>,
    ) -> Result<()> {
        let priority = priority.into().unwrap_or(self.default_priority);
        let record = self
            .resolver
            .normalize(event_name, declaration.into(), priority)?;
        debug!(
            "📝 Registered listener {} on {} (priority {})",
            record.target().describe(),
            event_name,
            priority
        );
        self.registry.push(record);
        Ok(())
    }

    /// Registers a closure returning `()`, `bool` or [`Flow`].
    pub fn add_closure<F, R>(
        &mut self,
        event_name: &str,
        priority: impl Into<Option<i32>>,
        listener: F,
    ) -> Result<()>
    where
        F: Fn(&mut Event) -> Result<R> + Send + Sync + 'static,
        R: Into<Flow>,
    {
        self.add_listener(event_name, ListenerDeclaration::closure(listener), priority)
    }

    /// Expands a subscriber into one listener per declared binding.
    ///
    /// Bindings are registered in declaration order, each bound to the same
    /// subscriber instance. Nothing is registered if any binding is invalid.
    pub fn add_subscriber(&mut self, declaration: impl Into<SubscriberDeclaration>) -> Result<()> {
        let bound = self.resolver.resolve_subscriber(declaration.into())?;

        if bound.binding_count() == 0 {
            warn!("⚠️ Subscriber {} declares no listeners", bound.listener().name());
            return Ok(());
        }

        let mut records = Vec::with_capacity(bound.binding_count());
        for (event_name, bindings) in bound.subscriptions() {
            for binding in bindings {
                let declaration = ListenerDeclaration::Sequence(vec![
                    bound.listener().clone().into(),
                    binding.method.as_str().into(),
                ]);
                let priority = binding.priority.unwrap_or(self.default_priority);
                records.push(self.resolver.normalize(event_name, declaration, priority)?);
            }
        }

        debug!(
            "📝 Registered subscriber {} with {} listener(s)",
            bound.listener().name(),
            records.len()
        );
        self.registry.extend(records);
        Ok(())
    }

    /// Removes every listener registered under exactly `event_name`.
    ///
    /// Listeners on parent or child names are kept. Returns how many were removed.
    pub fn remove_event_listeners(&mut self, event_name: &str) -> usize {
        let before = self.registry.len();
        self.registry.retain(|record| record.event_name() != event_name);
        let removed = before - self.registry.len();
        debug!("🗑️ Removed {} listener(s) from {}", removed, event_name);
        removed
    }

    // === Dispatch ===

    /// Fires an event without extra parameters.
    pub fn fire(&mut self, target: impl Into<FireTarget>) -> Result<Event> {
        self.fire_with(target, std::iter::empty::<(ParamKey, Value)>())
    }

    /// Fires an event after merging `params` into it.
    ///
    /// The fire is counted before the enable gates are checked, so disabled
    /// fires and fires aborted by a listener error are counted too. A
    /// listener error or a resolution failure aborts the fire; listeners that
    /// already ran keep their effects.
    pub fn fire_with<I, K, V>(&mut self, target: impl Into<FireTarget>, params: I) -> Result<Event>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<ParamKey>,
        V: Into<Value>,
    {
        let mut event = target.into().into_event();
        for (key, value) in params {
            event.set_param(key, value);
        }
        event.attach(self.fire_counts.clone());
        let fire_number = self.fire_counts.increment(event.name());

        if !self.is_event_enabled(event.name()) {
            debug!("🚫 Event {} is disabled, skipping listeners", event.name());
            return Ok(event);
        }

        let mut event_bench = self
            .log_active
            .then(|| bench::start(self.bench_manager.as_ref()));

        let selected = self.select(event.name());
        trace!(
            "📤 Firing {} (#{}) to {} listener(s)",
            event.name(),
            fire_number,
            selected.len()
        );

        let mut invoked = 0;
        for index in selected {
            let invocable = self.resolver.resolve(self.registry[index].target())?;

            let mut listener_bench = self
                .log_active
                .then(|| bench::start(self.bench_manager.as_ref()));
            let flow = invocable.invoke(&mut event)?;

            let record = &mut self.registry[index];
            record.invocation_count += 1;
            invoked += 1;
            trace!("✅ {} handled {}", record.target().describe(), event.name());

            if let Some(bench) = listener_bench.as_mut() {
                bench.stop();
                self.log.record_listener(&event, record, bench.elapsed());
            }

            if flow.is_halt() {
                event.stop_propagation();
            }
            if event.is_propagation_stopped() {
                debug!(
                    "🛑 Propagation of {} stopped by {}",
                    event.name(),
                    self.registry[index].target().describe()
                );
                break;
            }
        }

        if let Some(bench) = event_bench.as_mut() {
            bench.stop();
            self.log.record_event(&event, invoked, bench.elapsed());
        }

        Ok(event)
    }

    /// Fires from dynamic data: `target` must be a string, `params` an
    /// object, an array (positional) or null.
    ///
    /// Object entries are merged in document order. Keys that are canonical
    /// integers (`"0"`, `"7"`) become positional keys.
    pub fn fire_value(&mut self, target: &Value, params: &Value) -> Result<Event> {
        let target = FireTarget::try_from_value(target)?;
        match params {
            Value::Null => self.fire(target),
            Value::Object(entries) => self.fire_with(
                target,
                entries
                    .iter()
                    .map(|(key, value)| (ParamKey::from_object_key(key), value.clone())),
            ),
            Value::Array(values) => self.fire_with(
                target,
                values
                    .iter()
                    .enumerate()
                    .map(|(index, value)| (ParamKey::from(index), value.clone())),
            ),
            other => Err(DispatchError::invalid(format!(
                "invalid params type {}: expected object or array",
                json_type_name(other)
            ))),
        }
    }

    /// Indices of the listeners matching `event_name`, highest priority
    /// first, registration order among equal priorities.
    fn select(&self, event_name: &str) -> SmallVec<[usize; 8]> {
        let mut selected: SmallVec<[usize; 8]> = self
            .registry
            .iter()
            .enumerate()
            .filter(|(_, record)| matcher::matches(record.event_name(), event_name))
            .map(|(index, _)| index)
            .collect();
        // slice::sort_by_key is stable
        selected.sort_by_key(|&index| Reverse(self.registry[index].priority()));
        selected
    }

    // === Enable / disable ===

    /// Disables every event, regardless of per-event settings.
    pub fn disable_all_events(&mut self) {
        self.disabled = true;
        debug!("🚫 All events disabled");
    }

    /// Re-enables every event and clears per-event overrides.
    pub fn enable_all_events(&mut self) {
        self.disabled = false;
        self.disabled_events.clear();
        debug!("✅ All events enabled");
    }

    /// Disables one or several event names (exact names, not hierarchical).
    pub fn disable_event(&mut self, names: impl EventNames) {
        for name in names.into_names() {
            self.disabled_events.insert(name, true);
        }
    }

    pub fn enable_event(&mut self, names: impl EventNames) {
        for name in names.into_names() {
            self.disabled_events.insert(name, false);
        }
    }

    /// True unless everything is disabled or this exact name is.
    pub fn is_event_enabled(&self, event_name: &str) -> bool {
        !self.disabled && !self.disabled_events.get(event_name).copied().unwrap_or(false)
    }

    // === Dispatch log ===

    pub fn enable_log(&mut self) {
        self.log_active = true;
    }

    pub fn disable_log(&mut self) {
        self.log_active = false;
    }

    pub fn is_log_active(&self) -> bool {
        self.log_active
    }

    /// Completed fires, `None` while logging is inactive
    pub fn event_log(&self) -> Option<&[EventLogEntry]> {
        self.log_active.then(|| self.log.events())
    }

    /// Listener invocations, `None` while logging is inactive
    pub fn listener_log(&self) -> Option<&[ListenerLogEntry]> {
        self.log_active.then(|| self.log.listeners())
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    // === Introspection ===

    /// How many times `event_name` was fired, 0 if never
    pub fn fire_count(&self, event_name: &str) -> u64 {
        self.fire_counts.get(event_name)
    }

    pub fn fire_counts(&self) -> &FireCounts {
        &self.fire_counts
    }

    /// Listeners that would receive `event_name`, in registration order
    pub fn listeners_infos(&self, event_name: &str) -> Vec<ListenerInfo> {
        self.registry
            .iter()
            .filter(|record| matcher::matches(record.event_name(), event_name))
            .map(ListenerRecord::info)
            .collect()
    }

    /// Every registered listener, in registration order
    pub fn all_listeners_infos(&self) -> Vec<ListenerInfo> {
        self.registry.iter().map(ListenerRecord::info).collect()
    }

    /// Number of listeners that would receive `event_name`
    pub fn listener_count(&self, event_name: &str) -> usize {
        self.registry
            .iter()
            .filter(|record| matcher::matches(record.event_name(), event_name))
            .count()
    }

    pub fn total_listeners(&self) -> usize {
        self.registry.len()
    }
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new()
    }
}
