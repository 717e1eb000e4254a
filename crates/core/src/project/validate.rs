use chrono::DateTime;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    parts::PartState,
    tempo::{MAX_BPM, MIN_BPM},
};

/// Outcome of [`validate_project`]. `errors` holds every violation in the
/// order the checks ran.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Structural and range checks for a candidate project document. Never fails;
/// every problem found is reported rather than only the first.
pub fn validate_project(candidate: &Value) -> ValidationReport {
    let Some(project) = candidate.as_object() else {
        return ValidationReport::from_errors(vec!["Project must be an object".to_string()]);
    };

    let mut errors = Vec::new();
    check_metadata(project, &mut errors);
    check_code(project, &mut errors);
    check_settings(project, &mut errors);
    check_part_states(project, &mut errors);

    ValidationReport::from_errors(errors)
}

/// Treats JSON `null` the same as an absent field.
fn field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    object.get(key).filter(|value| !value.is_null())
}

fn check_metadata(project: &Map<String, Value>, errors: &mut Vec<String>) {
    let Some(metadata) = field(project, "metadata") else {
        errors.push("Missing 'metadata' field".to_string());
        return;
    };

    let name = metadata.get("name").and_then(Value::as_str);
    if name.map_or(true, str::is_empty) {
        errors.push("Missing 'metadata.name'".to_string());
    }

    let Some(metadata) = metadata.as_object() else {
        return;
    };
    for key in ["version", "generator"] {
        match field(metadata, key) {
            None => errors.push(format!("Missing 'metadata.{key}'")),
            Some(value) if !value.is_string() => {
                errors.push(format!("'metadata.{key}' must be a string"))
            }
            Some(_) => {}
        }
    }
    for key in ["created", "modified"] {
        let parses = field(metadata, key)
            .and_then(Value::as_str)
            .is_some_and(|text| DateTime::parse_from_rfc3339(text).is_ok());
        if !parses {
            errors.push(format!("'metadata.{key}' must be an ISO-8601 timestamp"));
        }
    }
}

fn check_code(project: &Map<String, Value>, errors: &mut Vec<String>) {
    let Some(code) = field(project, "code") else {
        errors.push("Missing 'code' field".to_string());
        return;
    };

    let raw = code.get("raw").filter(|value| !value.is_null());
    if !raw.is_some_and(Value::is_string) {
        errors.push("'code.raw' must be a string".to_string());
    }
    let blank = match raw {
        None => true,
        Some(value) => value.as_str().is_some_and(|text| text.trim().is_empty()),
    };
    if blank {
        errors.push("'code.raw' cannot be empty".to_string());
    }

    if code
        .get("parts")
        .is_some_and(|parts| !parts.is_null() && !parts.is_array())
    {
        errors.push("'code.parts' must be an array".to_string());
    }
}

fn check_settings(project: &Map<String, Value>, errors: &mut Vec<String>) {
    let Some(settings) = field(project, "settings") else {
        errors.push("Missing 'settings' field".to_string());
        return;
    };

    match settings.get("bpm") {
        Some(Value::Number(number)) => {
            let in_range = number
                .as_f64()
                .is_some_and(|bpm| (MIN_BPM..=MAX_BPM).contains(&bpm));
            if !in_range {
                errors.push(format!("BPM out of valid range (20-300): {number}"));
            }
        }
        _ => errors.push("'settings.bpm' must be a number".to_string()),
    }
}

fn check_part_states(project: &Map<String, Value>, errors: &mut Vec<String>) {
    let Some(states) = field(project, "partStates").and_then(Value::as_object) else {
        errors.push("Missing or invalid 'partStates' field".to_string());
        return;
    };

    for (name, state) in states {
        let known = state
            .as_str()
            .is_some_and(|text| PartState::ALL.iter().any(|s| s.as_str() == text));
        if !known {
            let shown = match state {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            errors.push(format!(
                "Invalid state for part '{name}': {shown} (must be 'on', 'hush', or 'solo')"
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn valid_document() -> Value {
        json!({
            "metadata": {
                "name": "Night Drive",
                "version": "1.0",
                "created": "2026-10-18T09:30:00.000Z",
                "modified": "2026-10-18T09:45:12.250Z",
                "generator": "Strudel Music Coder"
            },
            "settings": { "bpm": 120 },
            "code": {
                "raw": "<part:bass>note(\"c2\")</part:bass>",
                "parts": [{ "name": "bass", "lineCount": 1, "preview": "note(\"c2\")" }]
            },
            "partStates": { "bass": "on" }
        })
    }

    #[test]
    fn accepts_well_formed_document() {
        let report = validate_project(&valid_document());
        assert!(report.valid, "{:?}", report.errors);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn non_object_short_circuits() {
        for candidate in [json!(null), json!(42), json!("project"), json!([1, 2])] {
            let report = validate_project(&candidate);
            assert!(!report.valid);
            assert_eq!(report.errors, vec!["Project must be an object"]);
        }
    }

    #[test]
    fn reports_every_violation() {
        let mut document = valid_document();
        document["metadata"].as_object_mut().unwrap().remove("name");
        document["settings"]["bpm"] = json!(500);
        document["partStates"]["bass"] = json!("loud");

        let report = validate_project(&document);

        assert!(!report.valid);
        assert_eq!(
            report.errors,
            vec![
                "Missing 'metadata.name'",
                "BPM out of valid range (20-300): 500",
                "Invalid state for part 'bass': loud (must be 'on', 'hush', or 'solo')",
            ]
        );
    }

    #[test]
    fn reports_missing_sections_in_order() {
        let report = validate_project(&json!({}));

        assert_eq!(
            report.errors,
            vec![
                "Missing 'metadata' field",
                "Missing 'code' field",
                "Missing 'settings' field",
                "Missing or invalid 'partStates' field",
            ]
        );
    }

    #[test]
    fn code_checks() {
        let mut document = valid_document();
        document["code"]["raw"] = json!("   \n");
        assert_eq!(
            validate_project(&document).errors,
            vec!["'code.raw' cannot be empty"]
        );

        document["code"]["raw"] = json!(7);
        assert_eq!(
            validate_project(&document).errors,
            vec!["'code.raw' must be a string"]
        );

        document["code"] = json!({});
        assert_eq!(
            validate_project(&document).errors,
            vec!["'code.raw' must be a string", "'code.raw' cannot be empty"]
        );
    }

    #[test]
    fn bpm_must_be_numeric() {
        let mut document = valid_document();
        document["settings"]["bpm"] = json!("fast");
        assert_eq!(
            validate_project(&document).errors,
            vec!["'settings.bpm' must be a number"]
        );

        document["settings"]["bpm"] = json!(19.5);
        assert_eq!(
            validate_project(&document).errors,
            vec!["BPM out of valid range (20-300): 19.5"]
        );
    }

    #[test]
    fn metadata_fields_are_typed() {
        let mut document = valid_document();
        document["metadata"]["created"] = json!("yesterday");
        document["metadata"]["version"] = json!(2);
        document["metadata"].as_object_mut().unwrap().remove("generator");

        assert_eq!(
            validate_project(&document).errors,
            vec![
                "'metadata.version' must be a string",
                "Missing 'metadata.generator'",
                "'metadata.created' must be an ISO-8601 timestamp",
            ]
        );
    }

    #[test]
    fn non_string_states_are_shown_as_json() {
        let mut document = valid_document();
        document["partStates"] = json!({ "arp": 3 });

        assert_eq!(
            validate_project(&document).errors,
            vec!["Invalid state for part 'arp': 3 (must be 'on', 'hush', or 'solo')"]
        );
    }
}
