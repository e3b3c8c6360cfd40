use serde::{Deserialize, Serialize};

use crate::error::{LockError, Result};

/// Default pool capacity shared by all namespaces.
pub const DEFAULT_MAX_NODES: u32 = 150;

/// Default number of independent locking domains.
pub const DEFAULT_MAX_NAMESPACES: u32 = 32;

/// How the tree is maintained after a granted node is removed.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalBalance {
    /// Refresh heights and rotate from the deepest touched node up to the
    /// root, keeping the AVL property after every release.
    #[default]
    Retrace,
    /// Structural unlink only. Heights are not refreshed and no rotation runs,
    /// so the tree may drift out of balance across releases.
    Legacy,
}

/// Configuration supplied when constructing a [`super::LockManager`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockManagerOptions {
    /// Total number of lock nodes, shared across namespaces.
    pub max_nodes: u32,
    /// Number of namespaces; valid ids are `0..max_namespaces`.
    pub max_namespaces: u32,
    /// Tree maintenance policy on release.
    pub removal_balance: RemovalBalance,
}

impl Default for LockManagerOptions {
    fn default() -> Self {
        Self {
            max_nodes: DEFAULT_MAX_NODES,
            max_namespaces: DEFAULT_MAX_NAMESPACES,
            removal_balance: RemovalBalance::default(),
        }
    }
}

impl LockManagerOptions {
    /// Sets the pool capacity.
    pub fn max_nodes(mut self, nodes: u32) -> Self {
        self.max_nodes = nodes;
        self
    }

    /// Sets the number of namespaces.
    pub fn max_namespaces(mut self, namespaces: u32) -> Self {
        self.max_namespaces = namespaces;
        self
    }

    /// Sets the removal maintenance policy.
    pub fn removal_balance(mut self, balance: RemovalBalance) -> Self {
        self.removal_balance = balance;
        self
    }

    /// Checks that the options describe a usable manager.
    pub fn validate(&self) -> Result<()> {
        if self.max_nodes == 0 || self.max_nodes == u32::MAX {
            return Err(LockError::Config(format!(
                "max_nodes must be in 1..{}, got {}",
                u32::MAX,
                self.max_nodes
            )));
        }
        if self.max_namespaces == 0 {
            return Err(LockError::Config("max_namespaces must be at least 1".into()));
        }
        Ok(())
    }

    /// Parses options from TOML. Missing keys keep their defaults.
    ///
    /// ```
    /// use lbalock::{LockManagerOptions, RemovalBalance};
    ///
    /// let opts = LockManagerOptions::from_toml_str(
    ///     "max_nodes = 64\nremoval_balance = \"legacy\"\n",
    /// )
    /// .unwrap();
    /// assert_eq!(opts.max_nodes, 64);
    /// assert_eq!(opts.max_namespaces, 32);
    /// assert_eq!(opts.removal_balance, RemovalBalance::Legacy);
    /// ```
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let options: Self = toml::from_str(input).map_err(|err| LockError::Config(err.to_string()))?;
        options.validate()?;
        Ok(options)
    }
}
