// eapilink-core: device handle, running-config parsing, and the generic
// resource layer built on top of the eapilink-api session.

pub mod config;
pub mod node;
pub mod registry;
pub mod resource;
pub mod vlans;

pub use eapilink_api as api;

pub use config::get_block;
pub use node::Node;
pub use registry::{ConnectionProfile, ProfileRegistry};
pub use resource::{Collection, Entity, ResourceBase, is_empty_success};
pub use vlans::{Vlan, Vlans};
