//! Listener contract and registered listener records

use crate::error::{DispatchError, Result};
use crate::event::Event;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Method invoked when a listener is declared without one
pub const DEFAULT_HANDLE_METHOD: &str = "handle";

/// Call description reported for anonymous listeners
pub const CLOSURE_DESCRIPTION: &str = "closure";

/// What a listener asks the dispatcher to do after it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    /// Keep invoking the remaining listeners
    #[default]
    Continue,
    /// Stop the dispatch chain; the event is marked as stopped
    Halt,
}

impl Flow {
    pub fn is_halt(self) -> bool {
        self == Flow::Halt
    }
}

impl From<()> for Flow {
    fn from(_: ()) -> Self {
        Flow::Continue
    }
}

/// `false` halts the chain, `true` continues it.
impl From<bool> for Flow {
    fn from(proceed: bool) -> Self {
        if proceed {
            Flow::Continue
        } else {
            Flow::Halt
        }
    }
}

/// Signature of anonymous listeners once boxed by the dispatcher
pub type ListenerFn = dyn Fn(&mut Event) -> Result<Flow> + Send + Sync;

/// Wraps a closure returning `()`, `bool` or [`Flow`] into a [`ListenerFn`].
pub fn closure<F, R>(listener: F) -> Arc<ListenerFn>
where
    F: Fn(&mut Event) -> Result<R> + Send + Sync + 'static,
    R: Into<Flow>,
{
    Arc::new(move |event: &mut Event| listener(event).map(Into::into))
}

/// Contract for listener types exposing named methods.
///
/// Implementors dispatch on the method name in [`Listener::call`] and report
/// the names they understand through [`Listener::responds_to`]; the resolver
/// refuses to bind a method the listener does not respond to.
///
/// ```rust
/// use event_dispatch::{Event, Flow, Listener, Result, unknown_method};
///
/// struct AuditListener;
///
/// impl Listener for AuditListener {
///     fn responds_to(&self, method: &str) -> bool {
///         matches!(method, "handle" | "on_delete")
///     }
///
///     fn call(&self, method: &str, event: &mut Event) -> Result<Flow> {
///         match method {
///             "handle" => event.set_param("audited", true),
///             "on_delete" => event.set_param("deleted", true),
///             _ => return Err(unknown_method(self, method)),
///         }
///         Ok(Flow::Continue)
///     }
/// }
/// ```
pub trait Listener: Send + Sync + 'static {
    /// Type name used in call descriptions (`Name::method`)
    fn name(&self) -> &str {
        crate::utils::short_type_name(std::any::type_name::<Self>())
    }

    fn responds_to(&self, method: &str) -> bool {
        method == DEFAULT_HANDLE_METHOD
    }

    /// Invokes `method` with the event
    fn call(&self, method: &str, event: &mut Event) -> Result<Flow>;
}

/// Error for a method name a listener does not expose
pub fn unknown_method<L: Listener + ?Sized>(listener: &L, method: &str) -> DispatchError {
    DispatchError::invalid(format!(
        "method {method} doesn't exist in listener {}",
        listener.name()
    ))
}

/// Normalized invocation target of a registered listener.
#[derive(Clone)]
pub enum ListenerTarget {
    /// Anonymous callable
    Closure(Arc<ListenerFn>),
    /// Known handle instantiated on demand with optional constructor args
    Class {
        handle: CompactString,
        method: CompactString,
        args: Option<Vec<Value>>,
    },
    /// Live instance bound to a named method
    Method {
        instance: Arc<dyn Listener>,
        method: CompactString,
    },
    /// Live instance invoked through its default method
    Instance(Arc<dyn Listener>),
}

impl ListenerTarget {
    /// Stable description: `Name::method` for typed targets, `closure` otherwise
    pub fn describe(&self) -> String {
        match self {
            ListenerTarget::Closure(_) => CLOSURE_DESCRIPTION.to_string(),
            ListenerTarget::Class { handle, method, .. } => format!("{handle}::{method}"),
            ListenerTarget::Method { instance, method } => {
                format!("{}::{method}", instance.name())
            }
            ListenerTarget::Instance(instance) => {
                format!("{}::{DEFAULT_HANDLE_METHOD}", instance.name())
            }
        }
    }
}

impl fmt::Debug for ListenerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerTarget::Class { args, .. } => f
                .debug_struct("Class")
                .field("call", &self.describe())
                .field("args", args)
                .finish(),
            _ => f.debug_tuple("ListenerTarget").field(&self.describe()).finish(),
        }
    }
}

/// One registered binding of an event name to a target.
#[derive(Debug, Clone)]
pub struct ListenerRecord {
    pub(crate) event_name: CompactString,
    pub(crate) target: ListenerTarget,
    pub(crate) priority: i32,
    pub(crate) invocation_count: u64,
}

impl ListenerRecord {
    pub fn new(event_name: impl Into<CompactString>, target: ListenerTarget, priority: i32) -> Self {
        Self {
            event_name: event_name.into(),
            target,
            priority,
            invocation_count: 0,
        }
    }

    /// Name the listener was registered under
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn target(&self) -> &ListenerTarget {
        &self.target
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Number of successful invocations
    pub fn invocation_count(&self) -> u64 {
        self.invocation_count
    }

    pub fn info(&self) -> ListenerInfo {
        ListenerInfo {
            event: self.event_name.to_string(),
            call: self.target.describe(),
            priority: self.priority,
            invocation_count: self.invocation_count,
        }
    }
}

/// Introspection summary of a listener record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerInfo {
    pub event: String,
    pub call: String,
    pub priority: i32,
    pub invocation_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Greeter;

    impl Listener for Greeter {
        fn call(&self, method: &str, event: &mut Event) -> Result<Flow> {
            match method {
                DEFAULT_HANDLE_METHOD => {
                    event.set_param("greeted", true);
                    Ok(Flow::Continue)
                }
                _ => Err(unknown_method(self, method)),
            }
        }
    }

    #[test]
    fn test_flow_conversions() {
        assert_eq!(Flow::from(()), Flow::Continue);
        assert_eq!(Flow::from(true), Flow::Continue);
        assert_eq!(Flow::from(false), Flow::Halt);
        assert!(Flow::Halt.is_halt());
    }

    #[test]
    fn test_closure_wrapping() {
        let stop = closure(|_event: &mut Event| Ok(false));
        let proceed = closure(|event: &mut Event| {
            event.set_param("ran", true);
            Ok(())
        });

        let mut event = Event::new("test");
        assert_eq!(stop(&mut event).unwrap(), Flow::Halt);
        assert_eq!(proceed(&mut event).unwrap(), Flow::Continue);
        assert!(event.has_param("ran"));
    }

    #[test]
    fn test_default_name_is_short_type_name() {
        assert_eq!(Greeter.name(), "Greeter");
        assert!(Greeter.responds_to("handle"));
        assert!(!Greeter.responds_to("other"));
    }

    #[test]
    fn test_unknown_method_error() {
        let mut event = Event::new("test");
        let err = Greeter.call("missing", &mut event).unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(err.to_string().contains("missing"));
        assert!(err.to_string().contains("Greeter"));
    }

    #[test]
    fn test_describe_targets() {
        let greeter: Arc<dyn Listener> = Arc::new(Greeter);

        let closure_target = ListenerTarget::Closure(closure(|_: &mut Event| Ok(())));
        let class_target = ListenerTarget::Class {
            handle: "AuditListener".into(),
            method: "on_save".into(),
            args: None,
        };
        let method_target = ListenerTarget::Method {
            instance: greeter.clone(),
            method: "greet".into(),
        };
        let instance_target = ListenerTarget::Instance(greeter);

        assert_eq!(closure_target.describe(), "closure");
        assert_eq!(class_target.describe(), "AuditListener::on_save");
        assert_eq!(method_target.describe(), "Greeter::greet");
        assert_eq!(instance_target.describe(), "Greeter::handle");
    }

    #[test]
    fn test_record_info() {
        let record = ListenerRecord::new(
            "order",
            ListenerTarget::Closure(closure(|_: &mut Event| Ok(()))),
            10,
        );
        assert_eq!(
            record.info(),
            ListenerInfo {
                event: "order".to_string(),
                call: "closure".to_string(),
                priority: 10,
                invocation_count: 0,
            }
        );
    }
}
