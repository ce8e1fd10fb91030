//! IoT method dispatcher (spec §4.5/§6 "IoT collaborator contract"): the
//! trait boundary the downlink handler and local intent matcher both call
//! into, synchronously, on the task serializer.
//!
//! One trait per invokable device ([`Thing`]) plus a registry
//! ([`IotDispatcher`]) that looks one up by name, with a deny-list policy
//! gate instead of an interactive approval surface, since the device has
//! no UI to approve a risky invocation through.

use std::sync::Mutex;

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ThingError {
    #[error("no method {0:?} on this thing")]
    UnknownMethod(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// An invokable virtual device (spec's "IoT Thing"): `Speaker`, `Screen`,
/// etc. `invoke` is synchronous — the serializer calls it directly, never
/// spawning it onto another task (spec §4.5).
pub trait Thing: Send {
    fn name(&self) -> &str;

    /// Invokes `method` with `parameters`, mutating internal state.
    fn invoke(&mut self, method: &str, parameters: &Value) -> Result<(), ThingError>;

    /// A JSON snapshot of the thing's current state, included verbatim in
    /// downlink ACKs (spec §4.5) and IoT state publishes (spec §4.6).
    fn state(&self) -> Value;
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no thing named {0:?}")]
    UnknownThing(String),
    #[error("{name}.{method} is denied by policy")]
    Denied { name: String, method: String },
    #[error(transparent)]
    Thing(#[from] ThingError),
}

/// Deny-list policy (spec §6 Additions): entries are either a bare thing
/// name (`"Speaker"`, denying every method) or `"Thing.Method"`.
#[derive(Debug, Clone, Default)]
pub struct IotPolicy {
    denylist: Vec<String>,
}

impl IotPolicy {
    pub fn new(denylist: Vec<String>) -> Self {
        Self { denylist }
    }

    pub fn is_denied(&self, name: &str, method: &str) -> bool {
        let qualified = format!("{name}.{method}");
        self.denylist.iter().any(|entry| entry == name || entry == &qualified)
    }
}

/// A downlink `iot.commands[]` entry (spec §6).
#[derive(Debug, Clone, serde::Deserialize)]
pub struct IotCommand {
    pub name: String,
    pub method: String,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default)]
    pub request_id: Option<Value>,
}

pub struct IotDispatcher {
    things: Mutex<Vec<Box<dyn Thing>>>,
    policy: IotPolicy,
}

impl IotDispatcher {
    pub fn new(policy: IotPolicy) -> Self {
        Self {
            things: Mutex::new(Vec::new()),
            policy,
        }
    }

    pub fn register(&self, thing: Box<dyn Thing>) {
        self.things.lock().expect("iot registry mutex poisoned").push(thing);
    }

    /// Synchronously invokes a single command (spec §4.5/§6
    /// `invoke_sync`).
    pub fn invoke_sync(&self, command: &IotCommand) -> Result<(), DispatchError> {
        if self.policy.is_denied(&command.name, &command.method) {
            return Err(DispatchError::Denied {
                name: command.name.clone(),
                method: command.method.clone(),
            });
        }
        let mut things = self.things.lock().expect("iot registry mutex poisoned");
        let thing = things
            .iter_mut()
            .find(|t| t.name() == command.name)
            .ok_or_else(|| DispatchError::UnknownThing(command.name.clone()))?;
        thing.invoke(&command.method, &command.parameters)?;
        Ok(())
    }

    /// Current-state snapshot of every registered thing (spec §6
    /// `get_states_json`): `"[]"` when empty.
    pub fn get_states_json(&self) -> String {
        let things = self.things.lock().expect("iot registry mutex poisoned");
        let states: Vec<Value> = things
            .iter()
            .map(|t| serde_json::json!({"name": t.name(), "state": t.state()}))
            .collect();
        serde_json::to_string(&states).unwrap_or_else(|err| {
            warn!(?err, "failed to serialize iot states, falling back to []");
            "[]".to_string()
        })
    }

    /// Descriptors (just the registered names) published on connect (spec
    /// §4.6 `send_iot_descriptors`) — richer per-method metadata lives with
    /// each `Thing` if a future caller needs it; the downlink handler only
    /// needs to know a name is routable.
    pub fn descriptor_names(&self) -> Vec<String> {
        self.things
            .lock()
            .expect("iot registry mutex poisoned")
            .iter()
            .map(|t| t.name().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CounterThing {
        name: String,
        count: i64,
    }

    impl Thing for CounterThing {
        fn name(&self) -> &str {
            &self.name
        }

        fn invoke(&mut self, method: &str, parameters: &Value) -> Result<(), ThingError> {
            match method {
                "Increment" => {
                    self.count += 1;
                    Ok(())
                }
                "SetValue" => {
                    let value = parameters
                        .get("value")
                        .and_then(Value::as_i64)
                        .ok_or_else(|| ThingError::InvalidParameter("value".to_string()))?;
                    self.count = value;
                    Ok(())
                }
                other => Err(ThingError::UnknownMethod(other.to_string())),
            }
        }

        fn state(&self) -> Value {
            serde_json::json!({"count": self.count})
        }
    }

    fn dispatcher() -> IotDispatcher {
        let dispatcher = IotDispatcher::new(IotPolicy::default());
        dispatcher.register(Box::new(CounterThing { name: "Counter".to_string(), count: 0 }));
        dispatcher
    }

    #[test]
    fn invokes_known_method_and_reflects_in_states() {
        let dispatcher = dispatcher();
        dispatcher
            .invoke_sync(&IotCommand {
                name: "Counter".to_string(),
                method: "SetValue".to_string(),
                parameters: serde_json::json!({"value": 7}),
                request_id: None,
            })
            .unwrap();
        assert_eq!(dispatcher.get_states_json(), r#"[{"name":"Counter","state":{"count":7}}]"#);
    }

    #[test]
    fn unknown_thing_is_an_error() {
        let dispatcher = dispatcher();
        let err = dispatcher
            .invoke_sync(&IotCommand {
                name: "Nope".to_string(),
                method: "X".to_string(),
                parameters: Value::Null,
                request_id: None,
            })
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnknownThing(_)));
    }

    #[test]
    fn unknown_method_is_an_error() {
        let dispatcher = dispatcher();
        let err = dispatcher
            .invoke_sync(&IotCommand {
                name: "Counter".to_string(),
                method: "Nope".to_string(),
                parameters: Value::Null,
                request_id: None,
            })
            .unwrap_err();
        assert!(matches!(err, DispatchError::Thing(ThingError::UnknownMethod(_))));
    }

    #[test]
    fn denylist_blocks_invocation() {
        let dispatcher = IotDispatcher::new(IotPolicy::new(vec!["Counter.SetValue".to_string()]));
        dispatcher.register(Box::new(CounterThing { name: "Counter".to_string(), count: 0 }));
        let err = dispatcher
            .invoke_sync(&IotCommand {
                name: "Counter".to_string(),
                method: "SetValue".to_string(),
                parameters: serde_json::json!({"value": 1}),
                request_id: None,
            })
            .unwrap_err();
        assert!(matches!(err, DispatchError::Denied { .. }));
    }

    #[test]
    fn empty_registry_states_is_empty_array() {
        let dispatcher = IotDispatcher::new(IotPolicy::default());
        assert_eq!(dispatcher.get_states_json(), "[]");
    }
}
