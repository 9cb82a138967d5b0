//! Sanity checks over the bundled YAML specs
//!
//! These run without a browser: they guarantee the shipped specs parse,
//! carry unique names, and still encode the recorded flows correctly.

use std::path::PathBuf;

use airbnb_search_e2e::locator::Locator;
use airbnb_search_e2e::spec::{TestSpec, TestStep};

fn specs_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("specs")
}

fn load_all() -> Vec<TestSpec> {
    TestSpec::load_all(&specs_dir()).expect("bundled specs must parse")
}

fn by_name(name: &str) -> TestSpec {
    load_all()
        .into_iter()
        .find(|s| s.name == name)
        .unwrap_or_else(|| panic!("missing bundled spec: {}", name))
}

#[test]
fn all_bundled_specs_parse_with_unique_names() {
    let specs = load_all();
    assert_eq!(specs.len(), 9);

    for spec in &specs {
        assert!(!spec.steps.is_empty(), "{} has no steps", spec.name);
        assert!(
            matches!(spec.steps[0], TestStep::Navigate { .. }),
            "{} must start by navigating",
            spec.name
        );
    }
}

#[test]
fn page_load_checks_app_heading() {
    let spec = by_name("page-load");

    let has_heading_assert = spec.steps.iter().any(|s| {
        matches!(
            s,
            TestStep::Assert {
                locator: Locator::Role { role, name },
                visible: Some(true),
                ..
            } if role == "heading" && name == "Airbnb Apartment Search"
        )
    });
    assert!(has_heading_assert);
}

#[test]
fn ui_elements_covers_all_recorded_controls() {
    let spec = by_name("ui-elements");

    let mut labels = Vec::new();
    let mut buttons = Vec::new();
    for step in &spec.steps {
        if let TestStep::Assert { locator, .. } = step {
            match locator {
                Locator::Label { label } => labels.push(label.clone()),
                Locator::Role { role, name } if role == "button" => buttons.push(name.clone()),
                _ => {}
            }
        }
    }

    assert!(labels.contains(&"Search Query".to_string()));
    assert!(labels.contains(&"Ollama Model (used only if no OpenAI API key)".to_string()));
    for button in ["Submit", "Clear", "Flag"] {
        assert!(buttons.contains(&button.to_string()), "missing {}", button);
    }
}

#[test]
fn model_dropdown_lists_required_models() {
    let spec = by_name("model-dropdown");

    let options: Vec<String> = spec
        .steps
        .iter()
        .filter_map(|s| match s {
            TestStep::Assert {
                locator: Locator::Role { role, name },
                ..
            } if role == "option" => Some(name.clone()),
            _ => None,
        })
        .collect();

    // The three models every deployment must offer
    for model in ["llama3.1:8b", "qwen3:latest", "codegemma:latest"] {
        assert!(options.contains(&model.to_string()), "missing {}", model);
    }
}

#[test]
fn search_submit_clicks_submit_exactly_once() {
    let spec = by_name("search-submit");

    let submit_clicks = spec
        .steps
        .iter()
        .filter(|s| {
            matches!(
                s,
                TestStep::Click {
                    locator: Locator::Role { role, name },
                    ..
                } if role == "button" && name == "Submit"
            )
        })
        .count();

    assert_eq!(submit_clicks, 1, "the recorded double-submit was dropped on purpose");
    assert!(spec.fail_on_page_error);
}

#[test]
fn search_submit_selects_a_model_before_submitting() {
    let spec = by_name("search-submit");

    let select_pos = spec
        .steps
        .iter()
        .position(|s| matches!(s, TestStep::Select { .. }))
        .expect("search-submit must pick a model");
    let submit_pos = spec
        .steps
        .iter()
        .position(|s| {
            matches!(
                s,
                TestStep::Click {
                    locator: Locator::Role { role, name },
                    ..
                } if role == "button" && name == "Submit"
            )
        })
        .unwrap();

    assert!(select_pos < submit_pos);
}

#[test]
fn clear_button_round_trips_the_textbox_value() {
    let spec = by_name("clear-button");

    let values: Vec<Option<String>> = spec
        .steps
        .iter()
        .filter_map(|s| match s {
            TestStep::Assert { value, .. } => Some(value.clone()),
            _ => None,
        })
        .collect();

    assert_eq!(
        values,
        vec![
            Some("Test text to clear".to_string()),
            Some(String::new())
        ]
    );
}

#[test]
fn edge_case_specs_keep_the_page_alive() {
    for name in ["empty-query", "special-characters", "long-query"] {
        let spec = by_name(name);

        let survives = spec.steps.iter().any(|s| {
            matches!(
                s,
                TestStep::Assert {
                    locator: Locator::Role { role, .. },
                    visible: Some(true),
                    ..
                } if role == "heading"
            )
        });
        assert!(survives, "{} must assert the page survived", name);
        assert!(spec.fail_on_page_error, "{} must watch for page errors", name);
    }
}

#[test]
fn keyboard_navigation_preserves_typed_text() {
    let spec = by_name("keyboard-navigation");

    let typed = spec.steps.iter().find_map(|s| match s {
        TestStep::Type { text, .. } => Some(text.clone()),
        _ => None,
    });
    let asserted = spec.steps.iter().find_map(|s| match s {
        TestStep::Assert { value, .. } => value.clone(),
        _ => None,
    });

    assert_eq!(typed, asserted);
}
