// VLAN resource.
//
// Translates VLAN attribute intents into config-mode command batches and
// reads state back out of the running configuration. Serves as the model
// for further per-resource modules built on `ResourceBase`/`Collection`.

use std::sync::{Arc, LazyLock};

use eapilink_api::{CommandError, Error};
use indexmap::IndexMap;
use regex::Regex;

use crate::config::get_block;
use crate::node::Node;
use crate::resource::{Collection, ResourceBase};

static VLAN_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^vlan\s(\d+)$").expect("static pattern"));
static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)name\s(.*)$").expect("static pattern"));
static STATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)state\s(.*)$").expect("static pattern"));
static TRUNK_GROUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)trunk\sgroup\s(.*)$").expect("static pattern"));

const VALID_STATES: [&str; 2] = ["active", "suspend"];

/// One VLAN as read from the running configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vlan {
    pub vlan_id: String,
    pub name: Option<String>,
    pub state: Option<String>,
    pub trunk_groups: Vec<String>,
}

/// The VLAN collection of one node.
pub struct Vlans {
    base: ResourceBase,
}

impl Vlans {
    pub fn new(node: Arc<Node>) -> Self {
        Self {
            base: ResourceBase::new(node),
        }
    }

    pub fn with_autorefresh(node: Arc<Node>, autorefresh: bool) -> Self {
        Self {
            base: ResourceBase::new(node).with_autorefresh(autorefresh),
        }
    }

    /// The command fault behind the most recent failed operation, if any.
    pub fn last_error(&self) -> Option<CommandError> {
        self.base.last_error()
    }

    /// Create a VLAN. Creating an already existing VLAN is a no-op the
    /// device accepts, so this returns `true` in that case too.
    pub async fn create(&self, vid: &str) -> Result<bool, Error> {
        self.base.configure(format!("vlan {vid}")).await
    }

    /// Remove a VLAN from the running configuration.
    pub async fn delete(&self, vid: &str) -> Result<bool, Error> {
        self.base.configure(format!("no vlan {vid}")).await
    }

    /// Revert a VLAN to its default configuration.
    pub async fn default_vlan(&self, vid: &str) -> Result<bool, Error> {
        self.base.configure(format!("default vlan {vid}")).await
    }

    /// Configure the VLAN name: `Some(name)` sets it, `None` negates it,
    /// `default` reverts it.
    pub async fn set_name(
        &self,
        vid: &str,
        name: Option<&str>,
        default: bool,
    ) -> Result<bool, Error> {
        let attribute = match (default, name) {
            (true, _) => "default name".to_owned(),
            (false, Some(name)) => format!("name {name}"),
            (false, None) => "no name".to_owned(),
        };
        self.base.configure(vec![format!("vlan {vid}"), attribute]).await
    }

    /// Configure the VLAN state (`active` or `suspend`).
    pub async fn set_state(
        &self,
        vid: &str,
        value: Option<&str>,
        default: bool,
    ) -> Result<bool, Error> {
        if let Some(value) = value {
            if !VALID_STATES.contains(&value) {
                return Err(Error::InvalidArgument {
                    message: format!("invalid vlan state {value:?}"),
                });
            }
        }
        let attribute = match (default, value) {
            (true, _) => "default state".to_owned(),
            (false, Some(value)) => format!("state {value}"),
            (false, None) => "no state".to_owned(),
        };
        self.base.configure(vec![format!("vlan {vid}"), attribute]).await
    }

    /// Add a trunk group to the VLAN.
    pub async fn add_trunk_group(&self, vid: &str, name: &str) -> Result<bool, Error> {
        self.base
            .configure(vec![format!("vlan {vid}"), format!("trunk group {name}")])
            .await
    }

    /// Remove a trunk group from the VLAN.
    pub async fn remove_trunk_group(&self, vid: &str, name: &str) -> Result<bool, Error> {
        self.base
            .configure(vec![format!("vlan {vid}"), format!("no trunk group {name}")])
            .await
    }

    fn parse_block(vid: &str, block: &str) -> Vlan {
        let capture = |re: &Regex| {
            re.captures(block)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_owned())
        };
        Vlan {
            vlan_id: vid.to_owned(),
            name: capture(&NAME_RE),
            state: capture(&STATE_RE),
            trunk_groups: TRUNK_GROUP_RE
                .captures_iter(block)
                .filter_map(|c| c.get(1))
                .map(|m| m.as_str().trim().to_owned())
                .collect(),
        }
    }
}

impl Collection for Vlans {
    type Repr = Vlan;

    async fn get(&self, vid: &str) -> Result<Option<Vlan>, Error> {
        let block = self.base.config_block(&format!("vlan {vid}")).await?;
        Ok(block.map(|block| Self::parse_block(vid, &block)))
    }

    async fn getall(&self) -> Result<IndexMap<String, Vlan>, Error> {
        // One config fetch for the whole enumeration, so every block is
        // parsed out of the same snapshot.
        let config = self.base.running_config().await?;

        let mut vlans = IndexMap::new();
        for vid in VLAN_ID_RE
            .captures_iter(&config)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
        {
            if let Some(block) = get_block(&config, &format!("vlan {vid}"))? {
                vlans.insert(vid.to_owned(), Self::parse_block(vid, block));
            }
        }
        Ok(vlans)
    }
}
