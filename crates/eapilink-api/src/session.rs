// Command-execution session.
//
// Speaks the device's JSON-RPC `runCmds` protocol over any [`Channel`]:
// one RPC per batch, strict in-order execution, stop at first failure.
// The session returns per-command results uninterpreted -- reading meaning
// into them is the resource layer's job.

use secrecy::{ExposeSecret, SecretString};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::{CommandError, Error};
use crate::transport::{Channel, Credentials, TransportConfig, TransportKind};

/// One command in a batch: the command text plus an optional out-of-band
/// input line (used to supply the privilege-mode secret).
#[derive(Debug, Clone)]
pub struct Command {
    pub cmd: String,
    pub input: Option<SecretString>,
}

impl Command {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            input: None,
        }
    }

    pub fn with_input(cmd: impl Into<String>, input: SecretString) -> Self {
        Self {
            cmd: cmd.into(),
            input: Some(input),
        }
    }
}

impl From<&str> for Command {
    fn from(cmd: &str) -> Self {
        Self::new(cmd)
    }
}

impl From<String> for Command {
    fn from(cmd: String) -> Self {
        Self::new(cmd)
    }
}

// Wire shape: a bare string when there is no input, an object otherwise.
impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.input {
            None => serializer.serialize_str(&self.cmd),
            Some(input) => {
                let mut obj = serializer.serialize_struct("Command", 2)?;
                obj.serialize_field("cmd", &self.cmd)?;
                obj.serialize_field("input", input.expose_secret())?;
                obj.end()
            }
        }
    }
}

/// An ordered command batch. Order is semantically significant: a later
/// command may depend on context established by an earlier one.
#[derive(Debug, Clone, Default)]
pub struct Batch(Vec<Command>);

impl Batch {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.0
    }
}

impl From<&str> for Batch {
    fn from(cmd: &str) -> Self {
        Self(vec![Command::new(cmd)])
    }
}

impl From<String> for Batch {
    fn from(cmd: String) -> Self {
        Self(vec![Command::new(cmd)])
    }
}

impl From<Command> for Batch {
    fn from(cmd: Command) -> Self {
        Self(vec![cmd])
    }
}

impl From<Vec<Command>> for Batch {
    fn from(cmds: Vec<Command>) -> Self {
        Self(cmds)
    }
}

impl From<Vec<String>> for Batch {
    fn from(cmds: Vec<String>) -> Self {
        Self(cmds.into_iter().map(Command::new).collect())
    }
}

impl From<Vec<&str>> for Batch {
    fn from(cmds: Vec<&str>) -> Self {
        Self(cmds.into_iter().map(Command::new).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Batch {
    fn from(cmds: [&str; N]) -> Self {
        Self(cmds.into_iter().map(Command::new).collect())
    }
}

/// Reply encoding requested from the device.
///
/// `Json` yields structured per-command results for programmatic use;
/// `Text` yields the raw terminal output under an `output` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Json,
    Text,
}

// ── JSON-RPC envelope ───────────────────────────────────────────────

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'static str,
    params: RpcParams<'a>,
    id: String,
}

#[derive(Serialize)]
struct RpcParams<'a> {
    version: u32,
    cmds: &'a [Command],
    format: Encoding,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Vec<Value>>,
    error: Option<RpcFault>,
}

#[derive(Deserialize)]
struct RpcFault {
    code: i64,
    message: String,
    data: Option<Vec<Value>>,
}

/// A client session against one device endpoint.
///
/// Owns the channel plus credentials; immutable once built. Each `execute`
/// is one synchronous round trip -- callers await it, and batches are never
/// pipelined or reordered within a session.
#[derive(Debug)]
pub struct Session {
    channel: Channel,
    kind: TransportKind,
}

impl Session {
    /// Build a session from a symbolic transport name and endpoint
    /// parameters. Unknown transport names fail here, not at first use.
    pub fn new(
        transport: &str,
        host: &str,
        port: Option<u16>,
        credentials: Option<Credentials>,
    ) -> Result<Self, Error> {
        let kind = TransportKind::from_name(transport)?;
        let config = TransportConfig::new(kind, host).with_port(port);
        Self::from_config(&config, credentials)
    }

    /// Build a session from an explicit [`TransportConfig`].
    pub fn from_config(
        config: &TransportConfig,
        credentials: Option<Credentials>,
    ) -> Result<Self, Error> {
        let channel = config.build_channel(credentials)?;
        Ok(Self {
            channel,
            kind: config.kind,
        })
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.kind
    }

    /// Execute an ordered command batch and return one result per command.
    ///
    /// The device applies commands strictly in sequence and stops at the
    /// first failure; a fault surfaces as [`Error::Command`] carrying the
    /// failing index, its literal text, and the results obtained before it.
    /// Transport-level failures keep their own error kinds so callers can
    /// tell a rejected command from an unreachable device.
    pub async fn execute(
        &self,
        commands: &[Command],
        encoding: Encoding,
    ) -> Result<Vec<Value>, Error> {
        if commands.is_empty() {
            return Err(Error::InvalidArgument {
                message: "command batch must not be empty".into(),
            });
        }

        let request = RpcRequest {
            jsonrpc: "2.0",
            method: "runCmds",
            params: RpcParams {
                version: 1,
                cmds: commands,
                format: encoding,
            },
            id: Uuid::new_v4().to_string(),
        };
        let body = serde_json::to_string(&request).map_err(|e| Error::Protocol {
            message: format!("failed to encode request: {e}"),
            body: String::new(),
        })?;

        debug!(count = commands.len(), transport = %self.kind, "executing command batch");
        let reply = self.channel.roundtrip(body).await?;
        trace!(bytes = reply.len(), "reply received");

        let envelope: RpcResponse = serde_json::from_str(&reply).map_err(|e| Error::Protocol {
            message: format!("malformed response envelope: {e}"),
            body: preview(&reply),
        })?;

        if let Some(fault) = envelope.error {
            return Err(interpret_fault(commands, fault));
        }

        let results = envelope.result.ok_or_else(|| Error::Protocol {
            message: "response envelope has neither result nor error".into(),
            body: preview(&reply),
        })?;
        if results.len() != commands.len() {
            return Err(Error::Protocol {
                message: format!(
                    "expected {} results, device returned {}",
                    commands.len(),
                    results.len()
                ),
                body: preview(&reply),
            });
        }
        Ok(results)
    }
}

/// Map a JSON-RPC fault to a typed error.
///
/// A command fault carries a `data` array with one entry per executed
/// command, the last of which describes the failure. Anything else (no
/// data) is a request-level problem, reported as a protocol error.
fn interpret_fault(commands: &[Command], fault: RpcFault) -> Error {
    match fault.data {
        Some(data) if !data.is_empty() => {
            let index = data.len() - 1;
            let command = commands
                .get(index)
                .map_or_else(String::new, |c| c.cmd.clone());
            let message = data[index]
                .get("errors")
                .and_then(Value::as_array)
                .map(|errors| {
                    errors
                        .iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join("; ")
                })
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| fault.message.clone());
            let mut partial = data;
            partial.truncate(index);
            Error::Command(CommandError {
                index,
                command,
                message,
                code: fault.code,
                partial,
            })
        }
        _ => Error::Protocol {
            message: format!("device fault {}: {}", fault.code, fault.message),
            body: String::new(),
        },
    }
}

fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}
