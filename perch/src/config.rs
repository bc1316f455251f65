//! # System Configuration
//!
//! Plain configuration struct for [`ActorSystem`](crate::system::ActorSystem)
//! with builder-style setters. Validation runs when the system is built.
//!
//! ## Examples
//! ```rust
//! use perch::config::SystemConfig;
//!
//! let config = SystemConfig::default()
//!     .with_name("orders")
//!     .with_first_actor_id(100)
//!     .with_register_on_spawn(true);
//! assert!(config.validate().is_ok());
//! ```

use perch_api::errors::SystemError;
use perch_api::identity::{ActorId, INVALID_ACTOR_ID, NodeId};

/// First actor id handed out when the configuration does not say otherwise.
pub const DEFAULT_FIRST_ACTOR_ID: ActorId = 1;
/// Default label of a system in the log output.
pub const DEFAULT_SYSTEM_NAME: &str = "perch";

/// Configuration for an `ActorSystem`.
#[derive(Clone, Debug)]
pub struct SystemConfig {
    /// Label used in the log output of this system.
    pub name: String,

    /// Node identifier of this runtime instance. A random one is generated
    /// when `None`.
    pub node: Option<NodeId>,

    /// First id handed out by `spawn`. Must not be the invalid id 0.
    pub first_actor_id: ActorId,

    /// Whether `spawn` adds actors to the local registry right away. When
    /// disabled, actors become loadable the first time a handle to them is
    /// saved.
    pub register_on_spawn: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_SYSTEM_NAME.to_string(),
            node: None,
            first_actor_id: DEFAULT_FIRST_ACTOR_ID,
            register_on_spawn: false,
        }
    }
}

impl SystemConfig {
    /// Pins the node id instead of generating a random one.
    pub fn with_node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the first id handed out by `spawn`.
    pub fn with_first_actor_id(mut self, id: ActorId) -> Self {
        self.first_actor_id = id;
        self
    }

    pub fn with_register_on_spawn(mut self, enabled: bool) -> Self {
        self.register_on_spawn = enabled;
        self
    }

    /// Checks the configuration.
    ///
    /// # Returns
    /// `SystemError::InvalidConfig` if the first actor id is 0, the name is
    /// empty or the pinned node id is the invalid node.
    pub fn validate(&self) -> Result<(), SystemError> {
        if self.first_actor_id == INVALID_ACTOR_ID {
            return Err(SystemError::InvalidConfig(
                "first_actor_id must not be the invalid actor id 0".to_string(),
            ));
        }
        if self.name.is_empty() {
            return Err(SystemError::InvalidConfig("name must not be empty".to_string()));
        }
        if self.node.is_some_and(|node| !node.is_valid()) {
            return Err(SystemError::InvalidConfig(
                "node must not be the invalid node".to_string(),
            ));
        }
        Ok(())
    }
}
