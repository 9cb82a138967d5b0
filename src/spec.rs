//! Declarative YAML test specification

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;

/// A complete test specification parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSpec {
    /// Unique name for this test
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering tests
    #[serde(default)]
    pub tags: Vec<String>,

    /// Viewport size for the browser
    #[serde(default = "default_viewport")]
    pub viewport: Viewport,

    /// Steps to execute in order
    pub steps: Vec<TestStep>,

    /// Fail the test if the page raised an uncaught error or opened a
    /// dialog at any point during the run
    #[serde(default = "default_true")]
    pub fail_on_page_error: bool,

    /// Whether this test includes visual regression
    #[serde(default)]
    pub visual_regression: bool,

    /// Threshold for visual diff (0.0 - 100.0 percent)
    #[serde(default = "default_threshold")]
    pub visual_threshold: f64,
}

fn default_viewport() -> Viewport {
    Viewport {
        width: 1280,
        height: 720,
    }
}

fn default_threshold() -> f64 {
    0.5 // 0.5% pixel difference allowed by default
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// A single step in a test
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Navigate to a URL (relative to base) and wait for the page to settle
    Navigate {
        url: String,
        #[serde(default)]
        wait_for: Option<Locator>,
    },

    /// Click an element
    Click {
        locator: Locator,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Double-click an element (opens Gradio listboxes)
    #[serde(rename = "dblclick")]
    DblClick { locator: Locator },

    /// Fill an input field
    Fill {
        locator: Locator,
        value: String,
        #[serde(default)]
        clear_first: bool,
    },

    /// Type text with keyboard simulation; without a locator the text goes
    /// to whatever currently has focus
    Type {
        #[serde(default)]
        locator: Option<Locator>,
        text: String,
        #[serde(default)]
        delay_ms: Option<u64>,
    },

    /// Press a key
    Press {
        #[serde(default)]
        locator: Option<Locator>,
        key: String,
    },

    /// Wait for an element to reach a state
    Wait {
        locator: Locator,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
        #[serde(default)]
        state: WaitState,
    },

    /// Wait for a fixed amount of time (use sparingly)
    Sleep { ms: u64 },

    /// Assert something about an element
    Assert {
        locator: Locator,
        #[serde(default)]
        visible: Option<bool>,
        #[serde(default)]
        enabled: Option<bool>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        text_contains: Option<String>,
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        count: Option<usize>,
    },

    /// Take a screenshot
    Screenshot {
        name: String,
        #[serde(default)]
        locator: Option<Locator>,
        #[serde(default)]
        full_page: bool,
    },

    /// Hover over an element
    Hover { locator: Locator },

    /// Focus an element
    Focus { locator: Locator },

    /// Open a Gradio dropdown and pick an option by its accessible name
    Select { locator: Locator, option: String },

    /// Check a checkbox
    Check { locator: Locator },

    /// Uncheck a checkbox
    Uncheck { locator: Locator },

    /// Log a message (for debugging)
    Log { message: String },
}

fn default_wait_timeout() -> u64 {
    5000 // 5 seconds default
}

impl TestStep {
    /// Short name for logs and step results
    pub fn name(&self) -> String {
        match self {
            TestStep::Navigate { url, .. } => format!("navigate:{}", url),
            TestStep::Click { locator, .. } => format!("click:{}", locator.describe()),
            TestStep::DblClick { locator } => format!("dblclick:{}", locator.describe()),
            TestStep::Fill { locator, .. } => format!("fill:{}", locator.describe()),
            TestStep::Type { locator, .. } => match locator {
                Some(l) => format!("type:{}", l.describe()),
                None => "type:keyboard".to_string(),
            },
            TestStep::Press { key, .. } => format!("press:{}", key),
            TestStep::Wait { locator, .. } => format!("wait:{}", locator.describe()),
            TestStep::Sleep { ms } => format!("sleep:{}ms", ms),
            TestStep::Assert { locator, .. } => format!("assert:{}", locator.describe()),
            TestStep::Screenshot { name, .. } => format!("screenshot:{}", name),
            TestStep::Hover { locator } => format!("hover:{}", locator.describe()),
            TestStep::Focus { locator } => format!("focus:{}", locator.describe()),
            TestStep::Select { option, .. } => format!("select:{}", option),
            TestStep::Check { locator } => format!("check:{}", locator.describe()),
            TestStep::Uncheck { locator } => format!("uncheck:{}", locator.describe()),
            TestStep::Log { message } => format!("log:{}", &message[..message.len().min(30)]),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl WaitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
        }
    }
}

impl TestSpec {
    /// Parse a test spec from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse a test spec from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::Spec(format!("{}: {}", path.display(), e)))
    }

    fn validate(&self) -> E2eResult<()> {
        if self.name.trim().is_empty() {
            return Err(E2eError::Spec("spec name must not be empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(E2eError::Spec(format!(
                "spec '{}' has no steps",
                self.name
            )));
        }
        Ok(())
    }

    /// Load all test specs from a directory. Duplicate names are rejected:
    /// two specs with the same name would race on screenshot files and make
    /// reports ambiguous.
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut specs = Vec::new();
        let mut seen = HashSet::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            let spec = Self::from_file(entry.path())?;
            if !seen.insert(spec.name.clone()) {
                return Err(E2eError::Spec(format!(
                    "duplicate spec name '{}' (second copy in {})",
                    spec.name,
                    entry.path().display()
                )));
            }
            specs.push(spec);
        }

        Ok(specs)
    }

    /// Filter specs by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs
            .iter()
            .filter(|s| s.tags.contains(&tag.to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_spec() {
        let yaml = r#"
name: page-load
description: The landing page shows the app heading
tags:
  - smoke
steps:
  - action: navigate
    url: /
  - action: assert
    locator: { text: Airbnb Apartment Search }
    visible: true
  - action: screenshot
    name: landing
"#;
        let spec = TestSpec::from_yaml(yaml).unwrap();
        assert_eq!(spec.name, "page-load");
        assert_eq!(spec.steps.len(), 3);
        assert!(spec.fail_on_page_error);
    }

    #[test]
    fn test_parse_select_step() {
        let yaml = r#"
name: pick-model
steps:
  - action: select
    locator: { role: listbox, name: Ollama Model (used only if no }
    option: "codegemma:latest"
"#;
        let spec = TestSpec::from_yaml(yaml).unwrap();
        match &spec.steps[0] {
            TestStep::Select { option, .. } => assert_eq!(option, "codegemma:latest"),
            other => panic!("unexpected step: {:?}", other),
        }
    }

    #[test]
    fn test_parse_assert_value() {
        let yaml = r#"
name: value-check
steps:
  - action: assert
    locator: { label: Search Query }
    value: ""
"#;
        let spec = TestSpec::from_yaml(yaml).unwrap();
        match &spec.steps[0] {
            TestStep::Assert { value, .. } => assert_eq!(value.as_deref(), Some("")),
            other => panic!("unexpected step: {:?}", other),
        }
    }

    #[test]
    fn test_empty_steps_rejected() {
        let yaml = "name: empty\nsteps: []\n";
        assert!(TestSpec::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let body = "name: same\nsteps:\n  - action: navigate\n    url: /\n";
        std::fs::write(dir.path().join("a.yaml"), body).unwrap();
        std::fs::write(dir.path().join("b.yaml"), body).unwrap();

        let err = TestSpec::load_all(dir.path()).unwrap_err();
        assert!(err.to_string().contains("duplicate spec name"));
    }

    #[test]
    fn test_filter_by_tag() {
        let smoke = TestSpec::from_yaml(
            "name: a\ntags: [smoke]\nsteps:\n  - action: navigate\n    url: /\n",
        )
        .unwrap();
        let slow = TestSpec::from_yaml(
            "name: b\ntags: [slow]\nsteps:\n  - action: navigate\n    url: /\n",
        )
        .unwrap();

        let all = vec![smoke, slow];
        let filtered = TestSpec::filter_by_tag(&all, "smoke");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "a");
    }
}
