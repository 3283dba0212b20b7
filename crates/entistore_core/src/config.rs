//! Unit of work configuration.

/// Configuration shared by every unit of work a factory creates.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether `new_entity` asks the store up front if the identity is
    /// taken. The check at commit happens regardless.
    pub precheck_new_identity: bool,

    /// Usecase name for units of work opened without one.
    pub default_usecase: String,

    /// Whether dropping an open unit of work discards it, running
    /// callbacks. When off the unit is dropped silently.
    pub discard_on_drop: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            precheck_new_identity: false,
            default_usecase: "default".to_string(),
            discard_on_drop: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether new identities are checked against the store.
    #[must_use]
    pub fn precheck_new_identity(mut self, value: bool) -> Self {
        self.precheck_new_identity = value;
        self
    }

    /// Sets the default usecase name.
    #[must_use]
    pub fn default_usecase(mut self, name: impl Into<String>) -> Self {
        self.default_usecase = name.into();
        self
    }

    /// Sets whether dropping an open unit of work discards it.
    #[must_use]
    pub fn discard_on_drop(mut self, value: bool) -> Self {
        self.discard_on_drop = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(!config.precheck_new_identity);
        assert_eq!(config.default_usecase, "default");
        assert!(config.discard_on_drop);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .precheck_new_identity(true)
            .default_usecase("import")
            .discard_on_drop(false);

        assert!(config.precheck_new_identity);
        assert_eq!(config.default_usecase, "import");
        assert!(!config.discard_on_drop);
    }
}
