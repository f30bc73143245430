// Generic resource contract.
//
// Concrete resource modules (vlans, interfaces, ...) translate attribute
// intents into command batches and validate success from the reply shape.
// `ResourceBase` carries the shared machinery: the node binding, the
// boolean `configure` idiom, last-error storage, and the sub-resource
// property map. The `Entity`/`Collection` traits are the two explicit
// capability surfaces a concrete resource implements.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use eapilink_api::{Batch, CommandError, Error};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::warn;

use crate::config::get_block;
use crate::node::Node;

/// Every result in the batch is an empty-data success marker.
///
/// Configuration commands reply with `{}` on success; this named predicate
/// exists so resource code never compares against the literal `[{}]` shape,
/// which would silently break for commands that legitimately return data.
pub fn is_empty_success(results: &[Value]) -> bool {
    results
        .iter()
        .all(|r| r.as_object().is_some_and(serde_json::Map::is_empty))
}

/// Shared state for a concrete resource, bound to exactly one node.
#[derive(Debug)]
pub struct ResourceBase {
    node: Arc<Node>,
    autorefresh: bool,
    last_error: RwLock<Option<CommandError>>,
    properties: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl ResourceBase {
    pub fn new(node: Arc<Node>) -> Self {
        Self {
            node,
            autorefresh: false,
            last_error: RwLock::new(None),
            properties: RwLock::new(HashMap::new()),
        }
    }

    /// When set, every config read through this resource re-fetches the
    /// running configuration instead of using the node's cached copy.
    pub fn with_autorefresh(mut self, autorefresh: bool) -> Self {
        self.autorefresh = autorefresh;
        self
    }

    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    /// The running configuration this resource reads its state from.
    pub async fn running_config(&self) -> Result<Arc<str>, Error> {
        if self.autorefresh {
            self.node.refresh_running_config().await
        } else {
            self.node.running_config().await
        }
    }

    /// The config block for a top-level statement, or `None` when the
    /// statement is absent from the running configuration.
    pub async fn config_block(&self, statement: &str) -> Result<Option<String>, Error> {
        let config = self.running_config().await?;
        Ok(get_block(&config, statement)?.map(str::to_owned))
    }

    /// Send a batch to the node in config mode, reporting success as a
    /// boolean.
    ///
    /// Returns `Ok(true)` when the device accepts every command. A command
    /// fault is swallowed into `Ok(false)` with the detail stored for
    /// [`last_error`](Self::last_error) -- the uniform boolean contract
    /// every concrete operation shares. Every other error kind propagates
    /// unmodified: it means the system, not the command, is unusable.
    pub async fn configure(&self, commands: impl Into<Batch>) -> Result<bool, Error> {
        *self.last_error.write().expect("last-error lock poisoned") = None;

        match self.node.config(commands).await {
            Ok(results) => {
                if !is_empty_success(&results) {
                    warn!("config batch succeeded with unexpected result data");
                }
                Ok(true)
            }
            Err(Error::Command(fault)) => {
                *self.last_error.write().expect("last-error lock poisoned") = Some(fault);
                Ok(false)
            }
            Err(other) => Err(other),
        }
    }

    /// The command fault behind the most recent `configure(..) == false`,
    /// if any. Cleared at the start of every `configure` call.
    pub fn last_error(&self) -> Option<CommandError> {
        self.last_error
            .read()
            .expect("last-error lock poisoned")
            .clone()
    }

    // ── Sub-resource properties ──────────────────────────────────────

    /// Attach a sub-resource handle under `name` (e.g. a VLAN helper on an
    /// interface resource). Composition, not inheritance: the handle is an
    /// ordinary value in a key-to-handle map.
    pub fn add_property(&self, name: impl Into<String>, handle: Arc<dyn Any + Send + Sync>) {
        self.properties
            .write()
            .expect("properties lock poisoned")
            .insert(name.into(), handle);
    }

    /// Look up a previously attached sub-resource handle by name and type.
    pub fn property<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.properties
            .read()
            .expect("properties lock poisoned")
            .get(name)
            .cloned()
            .and_then(|handle| handle.downcast::<T>().ok())
    }
}

/// A resource addressing a single entity.
#[allow(async_fn_in_trait)]
pub trait Entity {
    type Repr;

    /// The entity's current representation, or `None` when it does not
    /// exist on the device.
    async fn get(&self) -> Result<Option<Self::Repr>, Error>;
}

/// A resource exposing a homogeneous, name-keyed collection.
///
/// Only `get` and `getall` are abstract; the collection semantics are
/// derived entirely from `getall()`, never from an independently
/// maintained index -- every enumeration re-derives from the device.
#[allow(async_fn_in_trait)]
pub trait Collection {
    type Repr;

    /// One member by identifier, or `None` when absent.
    async fn get(&self, name: &str) -> Result<Option<Self::Repr>, Error>;

    /// Every member, keyed by identifier.
    async fn getall(&self) -> Result<IndexMap<String, Self::Repr>, Error>;

    async fn len(&self) -> Result<usize, Error> {
        Ok(self.getall().await?.len())
    }

    async fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.getall().await?.is_empty())
    }

    async fn contains(&self, name: &str) -> Result<bool, Error> {
        Ok(self.getall().await?.contains_key(name))
    }

    async fn names(&self) -> Result<Vec<String>, Error> {
        Ok(self.getall().await?.keys().cloned().collect())
    }
}
