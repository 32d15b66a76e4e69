//! JSON-lines command interface on stdin/stdout.
//!
//! Each input line is one command object:
//!
//! ```text
//! {"id": 7, "command": "write", "params": {"handle": 1, "data": "go\n"}}
//! ```
//!
//! Each reply is one line, `{"status":"ok","result":...}` or
//! `{"status":"error","error":{"type":...,"message":...}}`, carrying the
//! request's `id` when it had one. `wait` replies arrive whenever the wait
//! finishes, so other commands (including `cancel`) keep flowing meanwhile.

use crate::bridge::{LineEvent, Side};
use crate::error::{AppError, AppResult};
use crate::port::LineConfig;
use crate::service::{decode_hex, BridgeService};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub const COMMANDS: &[&str] = &[
    "help",
    "open",
    "close",
    "write",
    "read",
    "room",
    "get_modem",
    "set_modem",
    "wait",
    "cancel",
    "counts",
    "serial_info",
    "get_line",
    "set_line",
    "inject",
    "discard_history",
    "status",
    "listing",
    "exit",
];

/// A blocking status wait to be run off the command loop.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitRequest {
    pub id: Option<Value>,
    pub handle: u64,
    pub mask: Vec<String>,
    pub wait_id: String,
}

/// What the loop should do with a parsed command.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Reply(Value),
    Wait(WaitRequest),
    Exit(Value),
}

fn with_id(mut response: Value, id: Option<&Value>) -> Value {
    if let (Some(id), Some(obj)) = (id, response.as_object_mut()) {
        obj.insert("id".to_string(), id.clone());
    }
    response
}

pub fn ok_response<T: Serialize>(id: Option<&Value>, result: T) -> Value {
    match serde_json::to_value(result) {
        Ok(result) => with_id(json!({ "status": "ok", "result": result }), id),
        Err(e) => error_response(id, &e.into()),
    }
}

pub fn error_response(id: Option<&Value>, err: &AppError) -> Value {
    with_id(
        json!({
            "status": "error",
            "error": { "type": err.kind(), "message": err.to_string() }
        }),
        id,
    )
}

fn to_response<T: Serialize>(id: Option<&Value>, result: AppResult<T>) -> Value {
    match result {
        Ok(value) => ok_response(id, value),
        Err(e) => error_response(id, &e),
    }
}

// ========== Parameter helpers ==========

fn missing(key: &str) -> AppError {
    AppError::InvalidPayload(format!("missing or invalid '{key}'"))
}

fn param_u64(params: &Value, key: &str) -> AppResult<u64> {
    params.get(key).and_then(Value::as_u64).ok_or_else(|| missing(key))
}

fn param_str<'a>(params: &'a Value, key: &str) -> AppResult<&'a str> {
    params.get(key).and_then(Value::as_str).ok_or_else(|| missing(key))
}

fn param_names(params: &Value, key: &str) -> AppResult<Vec<String>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(name)) => Ok(vec![name.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(|| missing(key)))
            .collect(),
        Some(_) => Err(missing(key)),
    }
}

fn param_as<T: serde::de::DeserializeOwned>(params: &Value, key: &str) -> AppResult<T> {
    let value = params.get(key).cloned().ok_or_else(|| missing(key))?;
    Ok(serde_json::from_value(value)?)
}

fn write_payload(params: &Value) -> AppResult<Vec<u8>> {
    if let Some(hex) = params.get("hex").and_then(Value::as_str) {
        return decode_hex(hex);
    }
    Ok(param_str(params, "data")?.as_bytes().to_vec())
}

// ========== Command processing ==========

fn value<T: Serialize>(result: T) -> AppResult<Value> {
    Ok(serde_json::to_value(result)?)
}

/// Run every command that answers immediately.
fn execute(service: &BridgeService, command: &str, params: &Value) -> AppResult<Value> {
    match command {
        "help" => Ok(json!({
            "commands": COMMANDS,
            "sides": ["device", "commander"],
            "modem_lines": ["dtr", "rts", "cts", "cd", "ri", "dsr", "loop"],
        })),
        "open" => {
            let slot = param_u64(params, "slot")? as usize;
            let side: Side = param_str(params, "side")?
                .parse()
                .map_err(AppError::InvalidPayload)?;
            value(service.open(slot, side)?)
        }
        "close" => value(service.close(param_u64(params, "handle")?)?),
        "write" => {
            let handle = param_u64(params, "handle")?;
            value(service.write(handle, &write_payload(params)?)?)
        }
        "read" => {
            let handle = param_u64(params, "handle")?;
            let max = params.get("max").and_then(Value::as_u64).map(|m| m as usize);
            value(service.read(handle, max)?)
        }
        "room" => {
            let room = service.room(param_u64(params, "handle")?)?;
            Ok(json!({ "room": room }))
        }
        "get_modem" => value(service.get_modem(param_u64(params, "handle")?)?),
        "set_modem" => {
            let handle = param_u64(params, "handle")?;
            let set = param_names(params, "set")?;
            let clear = param_names(params, "clear")?;
            value(service.set_modem(handle, &set, &clear)?)
        }
        "cancel" => {
            let wait_id = param_str(params, "wait_id")?;
            service.cancel(wait_id)?;
            Ok(json!({ "cancelled": wait_id }))
        }
        "counts" => value(service.counts(param_u64(params, "handle")?)?),
        "serial_info" => value(service.serial_info(param_u64(params, "handle")?)?),
        "get_line" => value(service.get_line(param_u64(params, "handle")?)?),
        "set_line" => {
            let handle = param_u64(params, "handle")?;
            let config: LineConfig = param_as(params, "config")?;
            value(service.set_line(handle, config)?)
        }
        "inject" => {
            let handle = param_u64(params, "handle")?;
            let event: LineEvent = param_as(params, "event")?;
            value(service.inject(handle, event)?)
        }
        "discard_history" => {
            let discarded = service.discard_history(param_u64(params, "handle")?)?;
            Ok(json!({ "discarded": discarded }))
        }
        "status" => value(service.status()?),
        "listing" => Ok(json!({ "listing": service.listing() })),
        _ => Err(AppError::InvalidPayload(format!(
            "Unknown command: '{}'",
            command
        ))),
    }
}

fn wait_request(id: Option<&Value>, params: &Value) -> AppResult<WaitRequest> {
    Ok(WaitRequest {
        id: id.cloned(),
        handle: param_u64(params, "handle")?,
        mask: param_names(params, "mask")?,
        wait_id: param_str(params, "wait_id")?.to_string(),
    })
}

/// Handle one parsed command. Never blocks; `wait` is handed back as [`Dispatch::Wait`].
pub fn process_command(service: &BridgeService, input: &Value) -> Dispatch {
    let id = input.get("id");
    let command = input
        .get("command")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_lowercase();
    let null = Value::Null;
    let params = input.get("params").unwrap_or(&null);
    debug!("stdio command '{}'", command);

    match command.as_str() {
        "wait" => match wait_request(id, params) {
            Ok(request) => Dispatch::Wait(request),
            Err(e) => Dispatch::Reply(error_response(id, &e)),
        },
        "exit" => Dispatch::Exit(ok_response(id, json!({ "message": "bye" }))),
        _ => Dispatch::Reply(to_response(id, execute(service, &command, params))),
    }
}

/// Run a wait to completion. Blocks the calling thread.
pub fn run_wait(service: &BridgeService, request: &WaitRequest) -> Value {
    let result = service
        .wait(request.handle, &request.mask, &request.wait_id)
        .map(|()| json!({ "wait_id": request.wait_id, "changed": true }));
    match result {
        Ok(value) => ok_response(request.id.as_ref(), value),
        Err(e) => {
            let mut response = error_response(request.id.as_ref(), &e);
            response["wait_id"] = json!(request.wait_id);
            response
        }
    }
}

/// Serve commands from stdin until EOF or `exit`, then shut the bridge down.
pub async fn run_stdio_interface(service: BridgeService) -> AppResult<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Value>();

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(response) = rx.recv().await {
            let mut line = response.to_string();
            line.push('\n');
            if stdout.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    info!("stdio interface ready");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let dispatch = match serde_json::from_str::<Value>(&line) {
            Ok(input) => process_command(&service, &input),
            Err(e) => Dispatch::Reply(error_response(None, &e.into())),
        };

        match dispatch {
            Dispatch::Reply(response) => {
                let _ = tx.send(response);
            }
            Dispatch::Wait(request) => {
                let service = service.clone();
                let tx = tx.clone();
                tokio::task::spawn_blocking(move || {
                    let _ = tx.send(run_wait(&service, &request));
                });
            }
            Dispatch::Exit(response) => {
                let _ = tx.send(response);
                break;
            }
        }
    }

    let released = service.shutdown();
    info!("stdio interface closed, {} open references released", released);
    drop(tx);
    if writer.await.is_err() {
        warn!("stdout writer task panicked");
    }
    Ok(())
}
