//! Instrumentation configuration.

use serde::{Deserialize, Serialize};

/// Directory name under a component whose modules are never instrumented.
pub const DEFAULT_DEPS_DIR: &str = "deps";

/// Configuration for one instrumentation session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    /// Component whose modules are covered (key prefix before the first `/`)
    pub component: String,
    /// Global name for the recorder; generated when `None`
    pub recorder_name: Option<String>,
    /// Dependency directory excluded from coverage
    pub deps_dir: String,
}

impl InstrumentConfig {
    /// Create a configuration for `component` with defaults elsewhere.
    #[must_use]
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            ..Self::default()
        }
    }

    /// Create a builder for instrumentation config
    #[must_use]
    pub fn builder() -> InstrumentConfigBuilder {
        InstrumentConfigBuilder::default()
    }
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            component: String::new(),
            recorder_name: None,
            deps_dir: DEFAULT_DEPS_DIR.to_string(),
        }
    }
}

/// Builder for [`InstrumentConfig`]
#[derive(Debug, Default)]
pub struct InstrumentConfigBuilder {
    component: String,
    recorder_name: Option<String>,
    deps_dir: Option<String>,
}

impl InstrumentConfigBuilder {
    /// Set the component to cover
    #[must_use]
    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.component = component.into();
        self
    }

    /// Use a fixed recorder name instead of a generated one
    #[must_use]
    pub fn recorder_name(mut self, name: impl Into<String>) -> Self {
        self.recorder_name = Some(name.into());
        self
    }

    /// Set the excluded dependency directory
    #[must_use]
    pub fn deps_dir(mut self, dir: impl Into<String>) -> Self {
        self.deps_dir = Some(dir.into());
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> InstrumentConfig {
        InstrumentConfig {
            component: self.component,
            recorder_name: self.recorder_name,
            deps_dir: self
                .deps_dir
                .filter(|dir| !dir.is_empty())
                .unwrap_or_else(|| DEFAULT_DEPS_DIR.to_string()),
        }
    }
}
