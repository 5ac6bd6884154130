//! # Event Dispatch
//!
//! An in-process, synchronous publish/subscribe dispatcher with hierarchical
//! event names, priority ordering and propagation control.
//!
//! ## Core Features
//!
//! - **Hierarchical names**: a listener on `"user"` also receives `"user.login"`
//!   and `"user.login.failed"`, but never `"username"`
//! - **Priority ordering**: higher priorities run first, equal priorities run in
//!   registration order
//! - **Propagation control**: a listener stops the chain by calling
//!   [`Event::stop_propagation`] or by returning `false` / [`Flow::Halt`]
//! - **Flexible declarations**: closures, live [`Listener`] instances, instances
//!   bound to a method, or handles resolved through a [`HandleCatalog`]
//! - **Subscribers**: one object declaring many bindings at once
//! - **Introspection**: fire counts, listener summaries and an optional timed
//!   dispatch log
//!
//! ## Quick Start Example
//!
//! ```rust
//! use event_dispatch::*;
//!
//! fn main() -> Result<()> {
//!     let mut events = EventManager::new();
//!
//!     events.add_closure("user", PRIORITY_LOW, |event: &mut Event| {
//!         event.set_param("audited", true);
//!         Ok(())
//!     })?;
//!     events.add_closure("user.login", PRIORITY_HIGH, |event: &mut Event| {
//!         Ok(event.has_param("name"))
//!     })?;
//!
//!     let event = events.fire_with("user.login", [("name", "ada")])?;
//!     assert!(event.has_param("audited"));
//!     assert_eq!(events.fire_count("user.login"), 1);
//!     Ok(())
//! }
//! ```
//!
//! ## Thread Safety
//!
//! [`EventManager`] is `Send` and mutated through `&mut self`. Listeners run
//! on the calling thread, one after the other. To share a manager, wrap it in
//! a single `Mutex` so registration and dispatch observe a consistent registry.
//! Listeners cannot fire through the manager that is currently dispatching
//! to them.

pub mod bench;
pub mod config;
pub mod error;
pub mod event;
pub mod listener;
pub mod log;
pub mod manager;
pub mod matcher;
pub mod resolver;
pub mod subscriber;
pub mod utils;


pub use bench::{BenchManager, Benchmark, InstantBench, InstantBenchManager};
pub use config::{
    ManagerConfig, PRIORITY_HIGH, PRIORITY_LOW, PRIORITY_MEDIUM, PRIORITY_VERY_HIGH,
    PRIORITY_VERY_LOW,
};
pub use error::{DispatchError, Result};
pub use event::{Event, FireCounts, ParamKey};
pub use listener::{
    closure, unknown_method, Flow, Listener, ListenerFn, ListenerInfo, ListenerRecord,
    ListenerTarget, CLOSURE_DESCRIPTION, DEFAULT_HANDLE_METHOD,
};
pub use log::{EventLogEntry, ListenerLogEntry};
pub use manager::{EventManager, EventNames, FireTarget};
pub use resolver::{DeclarationPart, HandleCatalog, Invocable, ListenerDeclaration, ListenerResolver};
pub use subscriber::{
    BoundSubscriber, Subscriber, SubscriberBinding, SubscriberDeclaration, Subscriptions,
};
pub use utils::current_timestamp;

/// Version of the dispatch crate, reported by tooling
pub const DISPATCH_VERSION: &str = env!("CARGO_PKG_VERSION");
