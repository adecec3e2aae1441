//! Test identity models
//!
//! Describes the test (or fixture pseudo-test) a result record belongs to.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Test priority
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    #[default]
    Low,
}

impl Priority {
    pub fn name(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "critical" => Some(Priority::Critical),
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether an identity names a real test or a failing fixture
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    #[default]
    Test,
    Fixture,
}

/// Identity and static metadata of one test
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestIdentity {
    /// Fully qualified name (e.g. "suite.module.Class.test_method")
    pub full_name: String,

    /// Owning class or group
    pub class_name: String,

    /// First docstring line
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub priority: Priority,

    /// Declared component tags
    #[serde(default)]
    pub components: Vec<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Known-bug references
    #[serde(default)]
    pub defects: Vec<String>,

    /// Member of an ordered incremental group
    #[serde(default)]
    pub incremental: bool,

    #[serde(default)]
    pub kind: TestKind,
}

impl TestIdentity {
    /// Identity of `method` in `class_name`
    pub fn new(class_name: impl Into<String>, method: &str) -> Self {
        let class_name = class_name.into();
        Self {
            full_name: format!("{class_name}.{method}"),
            class_name,
            description: None,
            priority: Priority::default(),
            components: Vec::new(),
            tags: Vec::new(),
            defects: Vec::new(),
            incremental: false,
            kind: TestKind::Test,
        }
    }

    /// Pseudo-test standing for a failing fixture.
    ///
    /// `setUpClass` alone is named after the fixture; a per-test fixture is
    /// named `(tearDown, test_pass)`.
    pub fn fixture(fixture: &str, class_name: impl Into<String>, test: Option<&str>) -> Self {
        let full_name = match test {
            Some(test) => format!("({fixture}, {test})"),
            None => fixture.to_string(),
        };
        Self {
            full_name,
            class_name: class_name.into(),
            description: None,
            priority: Priority::default(),
            components: Vec::new(),
            tags: Vec::new(),
            defects: Vec::new(),
            incremental: false,
            kind: TestKind::Fixture,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_components<I, T>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.components = components.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_defects<I, T>(mut self, defects: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.defects = defects.into_iter().map(Into::into).collect();
        self
    }

    /// Mark as a member of the class's incremental group
    pub fn incremental(mut self) -> Self {
        self.incremental = true;
        self
    }

    pub fn is_fixture(&self) -> bool {
        self.kind == TestKind::Fixture
    }

    /// Incremental group this test belongs to, if any
    pub fn group_id(&self) -> Option<&str> {
        (self.incremental && !self.is_fixture()).then_some(self.class_name.as_str())
    }

    /// Name to re-run when this test fails.
    ///
    /// Incremental members and fixtures need the whole class.
    pub fn rerun_target(&self) -> &str {
        if self.incremental || self.is_fixture() {
            &self.class_name
        } else {
            &self.full_name
        }
    }
}

impl fmt::Display for TestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}
