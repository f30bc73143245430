// Device handle with execution-mode handling.
//
// `Node` wraps a `Session` and owns the privilege/configuration-context
// plumbing: callers supply only their semantic commands, and the implicit
// wrapper commands never show up in results or error indices. The node
// also caches the most recently fetched running-config text.

use std::sync::{Arc, RwLock};

use eapilink_api::{Batch, Command, CommandError, Encoding, Error, Session};
use secrecy::SecretString;
use serde_json::Value;
use tracing::debug;

/// The user-facing handle for one device.
///
/// Cheap to share behind an `Arc`; all methods take `&self`. The cached
/// running-config text is replaced wholesale on refresh, never mutated, so
/// a reader holding an `Arc<str>` keeps a consistent (if stale) snapshot.
#[derive(Debug)]
pub struct Node {
    session: Session,
    enable_secret: RwLock<Option<SecretString>>,
    autorefresh: bool,
    running_config: RwLock<Option<Arc<str>>>,
}

impl Node {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            enable_secret: RwLock::new(None),
            autorefresh: false,
            running_config: RwLock::new(None),
        }
    }

    /// When set, every `running_config()` access re-fetches from the
    /// device instead of serving the cached copy.
    pub fn with_autorefresh(mut self, autorefresh: bool) -> Self {
        self.autorefresh = autorefresh;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Execute a batch with the implicit read-only privilege upgrade.
    ///
    /// Most `show` commands require the elevated (non-configuring)
    /// privilege level; the upgrade command is prepended on the wire and
    /// stripped from the results before the caller sees them.
    pub async fn enable(&self, commands: impl Into<Batch>) -> Result<Vec<Value>, Error> {
        self.run(commands.into(), Encoding::Json).await
    }

    /// Execute a batch inside the configuration context.
    ///
    /// The privilege upgrade and the context entry/exit wrap the caller's
    /// commands on the wire; results and failing indices are re-based to
    /// the caller's frame, so a wrapper command never shows up in either.
    /// A failure in a leading wrapper means the account lacks privilege
    /// and is reported as an authentication error; a failure in the
    /// trailing context exit is reported as a protocol error.
    pub async fn config(&self, commands: impl Into<Batch>) -> Result<Vec<Value>, Error> {
        let batch = commands.into();
        if batch.is_empty() {
            return Err(Error::InvalidArgument {
                message: "config batch must not be empty".into(),
            });
        }
        let caller_len = batch.len();

        let mut cmds = Vec::with_capacity(caller_len + 3);
        cmds.push(self.privilege_command());
        cmds.push(Command::new("configure"));
        cmds.extend(batch.into_commands());
        cmds.push(Command::new("end"));

        debug!(count = caller_len, "entering configuration context");
        match self.session.execute(&cmds, Encoding::Json).await {
            Ok(results) => Ok(results.into_iter().skip(2).take(caller_len).collect()),
            Err(err) => Err(rebase_failure(err, 2, caller_len)),
        }
    }

    /// Perform the elevated-privilege handshake with an explicit secret.
    ///
    /// Stores the secret for all later `enable`/`config` calls and
    /// validates it with an immediate round trip. Required before
    /// `config()` when the account's default privilege is insufficient.
    pub async fn exec_authentication(&self, secret: SecretString) -> Result<(), Error> {
        *self
            .enable_secret
            .write()
            .expect("enable secret lock poisoned") = Some(secret);

        let probe = vec![self.privilege_command()];
        match self.session.execute(&probe, Encoding::Json).await {
            Ok(_) => Ok(()),
            Err(Error::Command(e)) => Err(Error::Authentication { message: e.message }),
            Err(other) => Err(other),
        }
    }

    /// The device's full running configuration as text.
    ///
    /// Served from cache unless the node was built with autorefresh or
    /// nothing has been fetched yet.
    pub async fn running_config(&self) -> Result<Arc<str>, Error> {
        if !self.autorefresh {
            let cached = self
                .running_config
                .read()
                .expect("running-config lock poisoned")
                .clone();
            if let Some(text) = cached {
                return Ok(text);
            }
        }
        self.refresh_running_config().await
    }

    /// Fetch the running configuration and replace the cached copy.
    pub async fn refresh_running_config(&self) -> Result<Arc<str>, Error> {
        let text: Arc<str> = Arc::from(self.get_config("running-config", Some("all")).await?);
        *self
            .running_config
            .write()
            .expect("running-config lock poisoned") = Some(Arc::clone(&text));
        Ok(text)
    }

    /// Fetch a named configuration as plain text (e.g. `running-config`,
    /// `startup-config`), with optional trailing parameters.
    pub async fn get_config(&self, name: &str, params: Option<&str>) -> Result<String, Error> {
        let mut command = format!("show {name}");
        if let Some(params) = params {
            command.push(' ');
            command.push_str(params);
        }

        let results = self.run(Batch::from(command), Encoding::Text).await?;
        let output = results
            .first()
            .and_then(|r| r.get("output"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Protocol {
                message: "text reply is missing the 'output' field".into(),
                body: String::new(),
            })?;
        Ok(output.trim().to_owned())
    }

    // ── Internal plumbing ────────────────────────────────────────────

    async fn run(&self, batch: Batch, encoding: Encoding) -> Result<Vec<Value>, Error> {
        if batch.is_empty() {
            return Err(Error::InvalidArgument {
                message: "command batch must not be empty".into(),
            });
        }
        let caller_len = batch.len();

        let mut cmds = Vec::with_capacity(caller_len + 1);
        cmds.push(self.privilege_command());
        cmds.extend(batch.into_commands());

        match self.session.execute(&cmds, encoding).await {
            Ok(mut results) => {
                results.remove(0);
                Ok(results)
            }
            Err(err) => Err(rebase_failure(err, 1, caller_len)),
        }
    }

    /// The privilege-upgrade command. The input line carries the stored
    /// enable secret, or an empty string when none is configured.
    fn privilege_command(&self) -> Command {
        let secret = self
            .enable_secret
            .read()
            .expect("enable secret lock poisoned")
            .clone()
            .unwrap_or_else(|| SecretString::from(String::new()));
        Command::with_input("enable", secret)
    }
}

/// Shift a command fault from the wire frame to the caller's frame.
///
/// `offset` implicit wrapper commands precede the caller's `caller_len`
/// commands on the wire. The wrappers are never part of the caller's
/// frame: a fault in a leading wrapper can only mean insufficient
/// privilege and surfaces as an authentication error, while a fault in a
/// trailing wrapper (the context exit) is a device-side anomaly the
/// caller did not cause and surfaces as a protocol error.
fn rebase_failure(err: Error, offset: usize, caller_len: usize) -> Error {
    match err {
        Error::Command(e) if e.index < offset => Error::Authentication { message: e.message },
        Error::Command(e) if e.index >= offset + caller_len => Error::Protocol {
            message: format!("wrapper command {:?} was rejected: {}", e.command, e.message),
            body: String::new(),
        },
        Error::Command(CommandError {
            index,
            command,
            message,
            code,
            mut partial,
        }) => {
            partial.drain(..offset);
            Error::Command(CommandError {
                index: index - offset,
                command,
                message,
                code,
                partial,
            })
        }
        other => other,
    }
}
