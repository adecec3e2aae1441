//! Platform component models

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A platform component together with its deployed version
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct VersionedComponent {
    /// Component name (e.g. "console")
    pub component: String,

    /// Deployed version, if known
    #[serde(default)]
    pub version: Option<String>,
}

impl VersionedComponent {
    pub fn new(component: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            version: Some(version.into()),
        }
    }

    pub fn unversioned(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            version: None,
        }
    }

    /// Parse "name=version" or a bare "name"
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        match s.split_once('=') {
            Some((name, _)) if name.trim().is_empty() => None,
            Some((name, version)) if version.trim().is_empty() => {
                Some(Self::unversioned(name.trim()))
            }
            Some((name, version)) => Some(Self::new(name.trim(), version.trim())),
            None => Some(Self::unversioned(s)),
        }
    }
}

impl fmt::Display for VersionedComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}={}", self.component, version),
            None => f.write_str(&self.component),
        }
    }
}

/// Resolve the versioned components a test touches.
///
/// Returns the platform components named by `declared` (in platform order)
/// and the main component: the first declared name found on the platform.
/// With no platform list at all the first declared name is used as-is.
pub fn resolve_components(
    declared: &[String],
    platform: &[VersionedComponent],
) -> (Vec<VersionedComponent>, Option<String>) {
    let components: Vec<VersionedComponent> = platform
        .iter()
        .filter(|p| declared.contains(&p.component))
        .cloned()
        .collect();

    let main_component = if platform.is_empty() {
        declared.first().cloned()
    } else {
        declared
            .iter()
            .find(|name| platform.iter().any(|p| &p.component == *name))
            .cloned()
    };

    (components, main_component)
}
