//! Accessible element locators
//!
//! The search UI is addressed the way its recorded flows address it: by
//! accessible label ("Search Query"), by ARIA role ("button" named
//! "Submit", "option" named "codegemma:latest"), or by visible text.
//! Raw CSS remains available for Gradio internals that expose no label.

use serde::{Deserialize, Serialize};

/// How a test step finds an element on the rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Locator {
    /// ARIA role plus accessible name, e.g. `{ role: button, name: Submit }`.
    Role { role: String, name: String },

    /// Form control found by its label text.
    Label { label: String },

    /// Element containing the given visible text.
    Text { text: String },

    /// Input found by its placeholder text.
    Placeholder { placeholder: String },

    /// Raw CSS selector escape hatch.
    Css { css: String },
}

impl Locator {
    /// Render this locator as a Playwright page expression.
    pub fn to_js(&self) -> String {
        match self {
            Locator::Role { role, name } => format!(
                "page.getByRole('{}', {{ name: '{}' }})",
                js_escape(role),
                js_escape(name)
            ),
            Locator::Label { label } => format!("page.getByLabel('{}')", js_escape(label)),
            Locator::Text { text } => format!("page.getByText('{}')", js_escape(text)),
            Locator::Placeholder { placeholder } => {
                format!("page.getByPlaceholder('{}')", js_escape(placeholder))
            }
            Locator::Css { css } => format!("page.locator('{}')", js_escape(css)),
        }
    }

    /// Short form used in step names and logs.
    pub fn describe(&self) -> String {
        match self {
            Locator::Role { role, name } => format!("role={}[{}]", role, name),
            Locator::Label { label } => format!("label={}", label),
            Locator::Text { text } => format!("text={}", text),
            Locator::Placeholder { placeholder } => format!("placeholder={}", placeholder),
            Locator::Css { css } => css.clone(),
        }
    }
}

/// Escape a string for embedding in a single-quoted JavaScript literal.
pub fn js_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}
