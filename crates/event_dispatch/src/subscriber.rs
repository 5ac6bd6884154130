//! Subscribers: bundles of listener bindings declared by one type.
//!
//! A [`Subscriber`] lists, per event name, the methods it wants invoked. The
//! manager expands that list into one listener record per binding, all bound
//! to the same subscriber instance, in declaration order.

use crate::error::{DispatchError, Result};
use crate::event::json_type_name;
use crate::listener::Listener;
use compact_str::CompactString;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// One method binding of a subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberBinding {
    pub method: CompactString,
    /// `None` falls back to the manager's default priority
    pub priority: Option<i32>,
}

impl SubscriberBinding {
    pub fn new(method: impl Into<CompactString>) -> Self {
        Self {
            method: method.into(),
            priority: None,
        }
    }

    pub fn with_priority(method: impl Into<CompactString>, priority: i32) -> Self {
        Self {
            method: method.into(),
            priority: Some(priority),
        }
    }
}

impl From<&str> for SubscriberBinding {
    fn from(method: &str) -> Self {
        SubscriberBinding::new(method)
    }
}

impl From<(&str, i32)> for SubscriberBinding {
    fn from((method, priority): (&str, i32)) -> Self {
        SubscriberBinding::with_priority(method, priority)
    }
}

/// Ordered event name → bindings mapping declared by a subscriber
pub type Subscriptions = Vec<(CompactString, Vec<SubscriberBinding>)>;

/// Contract for subscriber types.
///
/// The subscriber is also the [`Listener`] its bindings are invoked on, so it
/// must respond to every method it declares.
pub trait Subscriber: Listener {
    fn subscribed_events(&self) -> Subscriptions;
}

/// A live subscriber paired with the bindings it declared
#[derive(Clone)]
pub struct BoundSubscriber {
    listener: Arc<dyn Listener>,
    subscriptions: Subscriptions,
}

impl BoundSubscriber {
    pub fn new<S: Subscriber>(subscriber: Arc<S>) -> Self {
        let subscriptions = subscriber.subscribed_events();
        Self {
            listener: subscriber,
            subscriptions,
        }
    }

    pub fn listener(&self) -> &Arc<dyn Listener> {
        &self.listener
    }

    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    pub fn binding_count(&self) -> usize {
        self.subscriptions.iter().map(|(_, bindings)| bindings.len()).sum()
    }
}

impl fmt::Debug for BoundSubscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundSubscriber")
            .field("listener", &self.listener.name())
            .field("subscriptions", &self.subscriptions)
            .finish()
    }
}

/// Accepted shapes of a subscriber passed to
/// [`EventManager::add_subscriber`](crate::EventManager::add_subscriber).
#[derive(Debug, Clone)]
pub enum SubscriberDeclaration {
    /// Known subscriber handle constructed with optional args
    Handle {
        class: CompactString,
        args: Option<Vec<Value>>,
    },
    /// Already constructed subscriber
    Instance(BoundSubscriber),
}

impl SubscriberDeclaration {
    pub fn handle(class: impl Into<CompactString>) -> Self {
        SubscriberDeclaration::Handle {
            class: class.into(),
            args: None,
        }
    }

    pub fn with_args(class: impl Into<CompactString>, args: Vec<Value>) -> Self {
        SubscriberDeclaration::Handle {
            class: class.into(),
            args: Some(args),
        }
    }

    pub fn instance<S: Subscriber>(subscriber: Arc<S>) -> Self {
        SubscriberDeclaration::Instance(BoundSubscriber::new(subscriber))
    }

    /// Builds a declaration from dynamic data.
    ///
    /// Accepts a handle string, a `[call, args?]` sequence or a
    /// `{call, args?}` mapping. Scalar args are wrapped into a one-element
    /// sequence.
    pub fn from_value(value: &Value) -> Result<Self> {
        let (call, args) = match value {
            Value::String(class) => return Ok(SubscriberDeclaration::handle(class.as_str())),
            Value::Array(parts) => (parts.first(), parts.get(1)),
            Value::Object(entries) => (entries.get("call"), entries.get("args")),
            other => {
                return Err(DispatchError::invalid(format!(
                    "invalid subscriber argument type {}: expected handle, sequence or mapping",
                    json_type_name(other)
                )))
            }
        };

        let class = match call {
            None | Some(Value::Null) => {
                return Err(DispatchError::invalid("invalid subscriber argument: undefined call"))
            }
            Some(Value::String(class)) => CompactString::new(class),
            Some(other) => {
                return Err(DispatchError::invalid(format!(
                    "invalid subscriber call type {}: expected handle string",
                    json_type_name(other)
                )))
            }
        };

        Ok(SubscriberDeclaration::Handle {
            class,
            args: normalize_args(args),
        })
    }
}

impl From<&str> for SubscriberDeclaration {
    fn from(class: &str) -> Self {
        SubscriberDeclaration::handle(class)
    }
}

impl From<BoundSubscriber> for SubscriberDeclaration {
    fn from(bound: BoundSubscriber) -> Self {
        SubscriberDeclaration::Instance(bound)
    }
}

/// Missing or null args mean "none", a sequence is used as is and any other
/// value becomes a single argument.
pub(crate) fn normalize_args(args: Option<&Value>) -> Option<Vec<Value>> {
    match args {
        None | Some(Value::Null) => None,
        Some(Value::Array(values)) => Some(values.clone()),
        Some(scalar) => Some(vec![scalar.clone()]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::listener::{unknown_method, Flow};
    use serde_json::json;

    struct OrderSubscriber;

    impl Listener for OrderSubscriber {
        fn responds_to(&self, method: &str) -> bool {
            matches!(method, "on_created" | "on_paid")
        }

        fn call(&self, method: &str, event: &mut Event) -> Result<Flow> {
            match method {
                "on_created" | "on_paid" => {
                    event.set_param(method, true);
                    Ok(Flow::Continue)
                }
                _ => Err(unknown_method(self, method)),
            }
        }
    }

    impl Subscriber for OrderSubscriber {
        fn subscribed_events(&self) -> Subscriptions {
            vec![
                ("order.created".into(), vec!["on_created".into()]),
                ("order.paid".into(), vec![("on_paid", 70).into(), "on_created".into()]),
            ]
        }
    }

    #[test]
    fn test_bindings() {
        assert_eq!(SubscriberBinding::from("m").priority, None);
        assert_eq!(SubscriberBinding::from(("m", 3)).priority, Some(3));
    }

    #[test]
    fn test_bound_subscriber_keeps_declaration_order() {
        let bound = BoundSubscriber::new(Arc::new(OrderSubscriber));
        assert_eq!(bound.binding_count(), 3);
        assert_eq!(bound.listener().name(), "OrderSubscriber");

        let names: Vec<&str> = bound.subscriptions().iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["order.created", "order.paid"]);
        assert_eq!(bound.subscriptions()[1].1[0], SubscriberBinding::with_priority("on_paid", 70));
    }

    #[test]
    fn test_from_value_shapes() {
        match SubscriberDeclaration::from_value(&json!("Orders")).unwrap() {
            SubscriberDeclaration::Handle { class, args } => {
                assert_eq!(class, "Orders");
                assert_eq!(args, None);
            }
            other => panic!("unexpected declaration {other:?}"),
        }

        match SubscriberDeclaration::from_value(&json!(["Orders", "single"])).unwrap() {
            SubscriberDeclaration::Handle { args, .. } => assert_eq!(args, Some(vec![json!("single")])),
            other => panic!("unexpected declaration {other:?}"),
        }

        match SubscriberDeclaration::from_value(&json!({"call": "Orders", "args": [1, 2]})).unwrap() {
            SubscriberDeclaration::Handle { args, .. } => {
                assert_eq!(args, Some(vec![json!(1), json!(2)]))
            }
            other => panic!("unexpected declaration {other:?}"),
        }
    }

    #[test]
    fn test_from_value_rejects_invalid_shapes() {
        for value in [json!(3), json!(null), json!({"args": [1]}), json!([]), json!([42])] {
            let err = SubscriberDeclaration::from_value(&value).unwrap_err();
            assert!(err.is_invalid_argument(), "{value} should be rejected");
        }
    }
}
