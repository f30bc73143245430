// Connection profile registry.
//
// An explicit registry object with a defined lifecycle: a collaborator
// (config-file loader, inventory tool, test fixture) constructs it once,
// fills it with profiles, and hands it to whatever builds nodes. There is
// no process-wide state; parsing profile files is out of scope here.

use std::collections::HashMap;

use eapilink_api::{Credentials, Error, Session};
use secrecy::SecretString;

use crate::node::Node;

/// Everything needed to reach one device, accepted as-is from the
/// profile loader. The transport is kept as its symbolic name so an
/// unknown kind surfaces at connect time with the configuration error
/// kind, matching direct session construction.
#[derive(Debug, Clone)]
pub struct ConnectionProfile {
    pub transport: String,
    pub host: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    /// Privileged-mode secret, applied via the explicit handshake right
    /// after the node is built.
    pub enable_secret: Option<SecretString>,
}

impl Default for ConnectionProfile {
    fn default() -> Self {
        Self {
            transport: "http".into(),
            host: "localhost".into(),
            port: None,
            username: Some("admin".into()),
            password: Some(SecretString::from(String::new())),
            enable_secret: None,
        }
    }
}

/// Name-keyed connection profiles.
#[derive(Debug, Default)]
pub struct ProfileRegistry {
    profiles: HashMap<String, ConnectionProfile>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, profile: ConnectionProfile) {
        self.profiles.insert(name.into(), profile);
    }

    pub fn get(&self, name: &str) -> Option<&ConnectionProfile> {
        self.profiles.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Build a node for a named profile.
    ///
    /// Performs the privileged-mode handshake when the profile carries an
    /// enable secret, so the returned node is ready for `config()` calls.
    pub async fn connect(&self, name: &str) -> Result<Node, Error> {
        let profile = self.get(name).ok_or_else(|| Error::Configuration {
            message: format!("no connection profile named {name:?}"),
        })?;

        let credentials = profile.username.as_ref().map(|username| Credentials {
            username: username.clone(),
            password: profile
                .password
                .clone()
                .unwrap_or_else(|| SecretString::from(String::new())),
        });

        let session = Session::new(&profile.transport, &profile.host, profile.port, credentials)?;
        let node = Node::new(session);

        if let Some(secret) = &profile.enable_secret {
            node.exec_authentication(secret.clone()).await?;
        }
        Ok(node)
    }
}
