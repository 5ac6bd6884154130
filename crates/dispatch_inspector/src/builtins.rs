//! Built-in listener and subscriber handles scenarios can refer to by name.
//!
//! | Handle           | Kind       | Constructor args   | Effect                                   |
//! |------------------|------------|--------------------|------------------------------------------|
//! | `Audit`          | listener   | none               | sets `audited = true`                    |
//! | `SetParam`       | listener   | `[key, value?]`    | sets `key` to `value` (default `true`)   |
//! | `StopPropagation`| listener   | none               | stops propagation                        |
//! | `Halt`           | listener   | none               | returns [`Flow::Halt`]                   |
//! | `SessionTracker` | subscriber | `["strict"]?`      | opens and closes a `session` parameter   |

use event_dispatch::{
    unknown_method, DispatchError, Event, EventManager, Flow, Listener, Result, Subscriber,
    Subscriptions, PRIORITY_VERY_HIGH, PRIORITY_VERY_LOW,
};
use serde_json::Value;

/// Registers every built-in handle on `manager`.
pub fn register_builtins(manager: &mut EventManager) {
    manager.register_listener_class("Audit", |_args: &[Value]| Ok(Audit));
    manager.register_listener_class("SetParam", SetParam::from_args);
    manager.register_listener_class("StopPropagation", |_args: &[Value]| Ok(StopPropagation));
    manager.register_listener_class("Halt", |_args: &[Value]| Ok(Halt));
    manager.register_subscriber_class("SessionTracker", SessionTracker::from_args);
}

pub struct Audit;

impl Listener for Audit {
    fn call(&self, method: &str, event: &mut Event) -> Result<Flow> {
        match method {
            "handle" => {
                event.set_param("audited", true);
                Ok(Flow::Continue)
            }
            _ => Err(unknown_method(self, method)),
        }
    }
}

pub struct SetParam {
    key: String,
    value: Value,
}

impl SetParam {
    fn from_args(args: &[Value]) -> Result<Self> {
        match args {
            [Value::String(key)] => Ok(Self {
                key: key.clone(),
                value: Value::Bool(true),
            }),
            [Value::String(key), value] => Ok(Self {
                key: key.clone(),
                value: value.clone(),
            }),
            _ => Err(DispatchError::invalid(
                "SetParam expects [key] or [key, value] with a string key",
            )),
        }
    }
}

impl Listener for SetParam {
    fn call(&self, method: &str, event: &mut Event) -> Result<Flow> {
        match method {
            "handle" => {
                event.set_param(self.key.as_str(), self.value.clone());
                Ok(Flow::Continue)
            }
            _ => Err(unknown_method(self, method)),
        }
    }
}

pub struct StopPropagation;

impl Listener for StopPropagation {
    fn call(&self, method: &str, event: &mut Event) -> Result<Flow> {
        match method {
            "handle" => {
                event.stop_propagation();
                Ok(Flow::Continue)
            }
            _ => Err(unknown_method(self, method)),
        }
    }
}

pub struct Halt;

impl Listener for Halt {
    fn call(&self, method: &str, _event: &mut Event) -> Result<Flow> {
        match method {
            "handle" => Ok(Flow::Halt),
            _ => Err(unknown_method(self, method)),
        }
    }
}

/// Tracks a session through login and logout.
///
/// In strict mode a login without a `name` parameter halts the chain.
pub struct SessionTracker {
    strict: bool,
}

impl SessionTracker {
    fn from_args(args: &[Value]) -> Result<Self> {
        match args {
            [] => Ok(Self { strict: false }),
            [Value::String(mode)] if mode == "strict" => Ok(Self { strict: true }),
            _ => Err(DispatchError::invalid("SessionTracker accepts only [\"strict\"]")),
        }
    }
}

impl Listener for SessionTracker {
    fn responds_to(&self, method: &str) -> bool {
        matches!(method, "on_login" | "on_logout" | "close_session")
    }

    fn call(&self, method: &str, event: &mut Event) -> Result<Flow> {
        match method {
            "on_login" => {
                if self.strict && !event.has_param("name") {
                    return Ok(Flow::Halt);
                }
                event.set_param("session", "open");
                Ok(Flow::Continue)
            }
            "on_logout" => {
                event.set_param("session", "closing");
                Ok(Flow::Continue)
            }
            "close_session" => {
                event.set_param("session", "closed");
                Ok(Flow::Continue)
            }
            _ => Err(unknown_method(self, method)),
        }
    }
}

impl Subscriber for SessionTracker {
    fn subscribed_events(&self) -> Subscriptions {
        vec![
            ("user.login".into(), vec![("on_login", PRIORITY_VERY_HIGH).into()]),
            (
                "user.logout".into(),
                vec!["on_logout".into(), ("close_session", PRIORITY_VERY_LOW).into()],
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_dispatch::{ListenerDeclaration, SubscriberDeclaration};
    use serde_json::json;

    fn manager() -> EventManager {
        let mut manager = EventManager::new();
        register_builtins(&mut manager);
        manager
    }

    #[test]
    fn test_all_handles_are_registered() {
        let manager = manager();
        let catalog = manager.resolver().catalog();
        for handle in ["Audit", "SetParam", "StopPropagation", "Halt"] {
            assert!(catalog.is_listener(handle), "{handle} should be a listener");
        }
        assert!(catalog.is_subscriber("SessionTracker"));
    }

    #[test]
    fn test_set_param_args() {
        let mut manager = manager();
        let declaration = ListenerDeclaration::from_value(json!(["SetParam", "handle", ["flag"]])).unwrap();
        manager.add_listener("e", declaration, 0).unwrap();
        let declaration = ListenerDeclaration::from_value(json!({"call": "SetParam", "args": ["n", 3]})).unwrap();
        manager.add_listener("e", declaration, 0).unwrap();

        let event = manager.fire("e").unwrap();
        assert_eq!(event.param("flag"), Some(&json!(true)));
        assert_eq!(event.param("n"), Some(&json!(3)));
    }

    #[test]
    fn test_set_param_rejects_bad_args() {
        let mut manager = manager();
        let declaration = ListenerDeclaration::from_value(json!(["SetParam", "handle", [1, 2]])).unwrap();
        manager.add_listener("e", declaration, 0).unwrap();

        assert!(manager.fire("e").unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_stopping_handles() {
        for handle in ["StopPropagation", "Halt"] {
            let mut manager = manager();
            manager.add_listener("e", handle, 10).unwrap();
            manager.add_listener("e", "Audit", 0).unwrap();

            let event = manager.fire("e").unwrap();
            assert!(event.is_propagation_stopped(), "{handle} should stop the chain");
            assert!(!event.has_param("audited"));
        }
    }

    #[test]
    fn test_session_tracker() {
        let mut manager = manager();
        manager.add_subscriber("SessionTracker").unwrap();
        assert_eq!(manager.total_listeners(), 3);

        let event = manager.fire("user.login").unwrap();
        assert_eq!(event.param("session"), Some(&json!("open")));

        let event = manager.fire("user.logout").unwrap();
        assert_eq!(event.param("session"), Some(&json!("closed")));
    }

    #[test]
    fn test_strict_session_tracker() {
        let mut manager = manager();
        manager
            .add_subscriber(SubscriberDeclaration::with_args("SessionTracker", vec![json!("strict")]))
            .unwrap();
        manager.add_listener("user.login", "Audit", 0).unwrap();

        let event = manager.fire("user.login").unwrap();
        assert!(event.is_propagation_stopped());
        assert!(!event.has_param("audited"));

        let event = manager.fire_with("user.login", [("name", "ada")]).unwrap();
        assert_eq!(event.param("session"), Some(&json!("open")));
        assert!(event.has_param("audited"));

        let err = manager
            .add_subscriber(SubscriberDeclaration::with_args("SessionTracker", vec![json!("lax")]))
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }
}
