//! Usecases label units of work.

use std::fmt;
use std::sync::Arc;

/// Label describing what a unit of work is for.
///
/// Passed through to the store when a transaction begins and shown in logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Usecase {
    name: Arc<str>,
}

impl Usecase {
    /// Creates a usecase with the given name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
        }
    }

    /// The usecase name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for Usecase {
    fn default() -> Self {
        Self::new("default")
    }
}

impl fmt::Display for Usecase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for Usecase {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}
