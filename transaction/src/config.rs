//! Manager configuration.

/// Settings for a [`TransactionManager`](crate::TransactionManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Label attached to every log record of the manager.
    pub name: String,
}

impl ManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the manager name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            name: "baton".to_string(),
        }
    }
}
