//! Downlink Handler (spec §4.5/§6, C5): parses server-initiated commands
//! and builds the ACK envelope. IoT commands are dispatched synchronously
//! through [`kestrel_iot::IotDispatcher`] (spec §4.5 "each command is
//! parsed and executed synchronously on the serializer"); `system`/`notify`
//! side effects (reboot, on-screen notice) are driven by the caller in
//! [`crate::orchestrator::Orchestrator`], which owns the collaborators this
//! module does not.

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use kestrel_iot::{IotCommand, IotDispatcher};

#[derive(Debug, Error)]
pub enum DownlinkError {
    #[error("downlink payload did not parse as json: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub enum ParsedDownlink {
    Reboot { delay_ms: u64 },
    UnsupportedSystemAction { action: String },
    Notify { title: Option<String>, body: Option<String> },
    Iot { commands: Vec<IotCommand> },
    /// Recognized `type` but nothing actionable to do — caller should
    /// silently drop (spec §4.5 "Any unknown type -> no ACK").
    Unknown { kind: String },
}

fn request_id(value: &Value) -> Option<Value> {
    value.get("request_id").cloned().filter(|v| !v.is_null())
}

/// Parses one downlink envelope (spec §6 schema). Returns the envelope's
/// `request_id` alongside the parsed body; per-command `request_id`s (for
/// `iot`) are read separately by the caller from each [`IotCommand`].
pub fn parse(value: &Value) -> (ParsedDownlink, Option<Value>) {
    let envelope_request_id = request_id(value);
    let kind = value.get("type").and_then(Value::as_str).unwrap_or("");

    let parsed = match kind {
        "system" => match value.get("action").and_then(Value::as_str) {
            Some("reboot") => {
                let delay_ms = value
                    .get("delay_ms")
                    .and_then(Value::as_u64)
                    .unwrap_or(0)
                    .clamp(0, 10_000);
                ParsedDownlink::Reboot { delay_ms }
            }
            Some(other) => ParsedDownlink::UnsupportedSystemAction { action: other.to_string() },
            None => ParsedDownlink::UnsupportedSystemAction { action: String::new() },
        },
        "notify" => ParsedDownlink::Notify {
            title: value.get("title").and_then(Value::as_str).map(str::to_string),
            body: value.get("body").and_then(Value::as_str).map(str::to_string),
        },
        "iot" => {
            let commands = value
                .get("commands")
                .and_then(Value::as_array)
                .map(|array| {
                    array
                        .iter()
                        .filter_map(|entry| serde_json::from_value::<IotCommand>(entry.clone()).ok())
                        .collect()
                })
                .unwrap_or_default();
            ParsedDownlink::Iot { commands }
        }
        other => ParsedDownlink::Unknown { kind: other.to_string() },
    };
    (parsed, envelope_request_id)
}

pub fn ack_reboot(delay_ms: u64, request_id: Option<Value>) -> Value {
    let mut ack = serde_json::json!({
        "type": "ack",
        "target": "system",
        "action": "reboot",
        "status": "ok",
        "delay_ms": delay_ms,
    });
    if let Some(id) = request_id {
        ack["request_id"] = id;
    }
    ack
}

pub fn ack_unsupported_action(request_id: Option<Value>) -> Value {
    let mut ack = serde_json::json!({
        "type": "ack",
        "target": "system",
        "status": "error",
        "error": "unsupported action",
    });
    if let Some(id) = request_id {
        ack["request_id"] = id;
    }
    ack
}

pub fn ack_notify(ok: bool, request_id: Option<Value>) -> Value {
    let mut ack = serde_json::json!({
        "type": "ack",
        "target": "notify",
        "status": if ok { "ok" } else { "error" },
    });
    if !ok {
        ack["error"] = Value::String("empty notification".to_string());
    }
    if let Some(id) = request_id {
        ack["request_id"] = id;
    }
    ack
}

/// Dispatches every `iot.commands[]` entry in array order (spec §5
/// "dispatched in array order ... ACKs therefore appear in order"),
/// producing one ACK per command. A command-level `request_id` takes
/// precedence over the envelope's (spec §4.5).
pub fn handle_iot_commands(
    dispatcher: &IotDispatcher,
    commands: &[IotCommand],
    envelope_request_id: Option<Value>,
) -> Vec<Value> {
    commands
        .iter()
        .map(|command| {
            let request_id = command.request_id.clone().or_else(|| envelope_request_id.clone());
            let mut ack = serde_json::json!({
                "type": "ack",
                "target": "iot",
                "command": serde_json::json!({"name": command.name, "method": command.method}),
            });
            match dispatcher.invoke_sync(command) {
                Ok(()) => {
                    ack["status"] = Value::String("ok".to_string());
                    ack["states"] = serde_json::from_str(&dispatcher.get_states_json())
                        .unwrap_or_else(|_| Value::Array(Vec::new()));
                }
                Err(err) => {
                    warn!(%err, name = %command.name, method = %command.method, "iot dispatch failed");
                    ack["status"] = Value::String("error".to_string());
                    ack["error"] = Value::String(err.to_string());
                }
            }
            if let Some(id) = request_id {
                ack["request_id"] = id;
            }
            ack
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_iot::{IotPolicy, Thing, ThingError};

    struct EchoThing;
    impl Thing for EchoThing {
        fn name(&self) -> &str {
            "Speaker"
        }
        fn invoke(&mut self, method: &str, _parameters: &Value) -> Result<(), ThingError> {
            if method == "Explode" {
                return Err(ThingError::UnknownMethod(method.to_string()));
            }
            Ok(())
        }
        fn state(&self) -> Value {
            serde_json::json!({"volume": 50})
        }
    }

    #[test]
    fn parses_reboot_with_clamped_delay() {
        let (parsed, _) = parse(&serde_json::json!({"type": "system", "action": "reboot", "delay_ms": 99999}));
        assert!(matches!(parsed, ParsedDownlink::Reboot { delay_ms: 10_000 }));
    }

    #[test]
    fn unsupported_system_action_is_recognized() {
        let (parsed, _) = parse(&serde_json::json!({"type": "system", "action": "shutdown"}));
        assert!(matches!(parsed, ParsedDownlink::UnsupportedSystemAction { .. }));
    }

    #[test]
    fn empty_notify_acks_error() {
        assert_eq!(ack_notify(false, None)["status"], "error");
    }

    #[test]
    fn unknown_type_has_no_ack_builder_path() {
        let (parsed, _) = parse(&serde_json::json!({"type": "mystery"}));
        assert!(matches!(parsed, ParsedDownlink::Unknown { .. }));
    }

    #[test]
    fn iot_commands_dispatch_in_order_with_per_command_request_id() {
        let dispatcher = IotDispatcher::new(IotPolicy::default());
        dispatcher.register(Box::new(EchoThing));
        let commands: Vec<IotCommand> = serde_json::from_value(serde_json::json!([
            {"name": "Speaker", "method": "SetVolume", "parameters": {"volume": 10}, "request_id": "a"},
            {"name": "Speaker", "method": "Explode", "parameters": {}},
        ]))
        .unwrap();

        let acks = handle_iot_commands(&dispatcher, &commands, Some(Value::String("envelope".to_string())));
        assert_eq!(acks.len(), 2);
        assert_eq!(acks[0]["status"], "ok");
        assert_eq!(acks[0]["request_id"], "a");
        assert_eq!(acks[1]["status"], "error");
        assert_eq!(acks[1]["request_id"], "envelope");
    }
}
