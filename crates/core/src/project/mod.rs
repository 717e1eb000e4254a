mod io;
mod validate;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    config::ProjectDefaults,
    parts::{scan, PartState, PartStates},
};

pub use io::{
    export_project_json, import_project_json, load_project_from_file, sanitize_file_name,
    save_project_to_file, DirectorySink, DownloadSink, PROJECT_EXTENSION, PROJECT_MIME_TYPE,
};
pub use validate::{validate_project, ValidationReport};

const PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub metadata: ProjectMetadata,
    pub settings: ProjectSettings,
    pub code: ProjectCode,
    #[serde(rename = "partStates")]
    pub part_states: PartStates,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub name: String,
    pub version: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub generator: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSettings {
    pub bpm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectCode {
    pub raw: String,
    /// Display-only summary of the blocks in `raw`.
    #[serde(default)]
    pub parts: Vec<PartPreview>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartPreview {
    pub name: String,
    pub line_count: usize,
    pub preview: String,
}

/// Wall-clock time at the millisecond precision stored in project files.
pub(crate) fn timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Builds a fresh project from the current arrangement using the stock
/// defaults for everything not passed in.
pub fn create_project(code: &str, part_states: &PartStates, bpm: f64, name: &str) -> Project {
    create_project_with(&ProjectDefaults::default(), code, part_states, bpm, name)
}

/// Like [`create_project`] but with explicit defaults. A blank `name` falls
/// back to `defaults.name`.
pub fn create_project_with(
    defaults: &ProjectDefaults,
    code: &str,
    part_states: &PartStates,
    bpm: f64,
    name: &str,
) -> Project {
    let now = timestamp();
    let name = if name.trim().is_empty() {
        defaults.name.clone()
    } else {
        name.to_string()
    };

    Project {
        metadata: ProjectMetadata {
            name,
            version: defaults.format_version.clone(),
            created: now,
            modified: now,
            generator: defaults.generator.clone(),
        },
        settings: ProjectSettings { bpm },
        code: ProjectCode {
            raw: code.to_string(),
            parts: part_previews(code),
        },
        part_states: part_states.clone(),
    }
}

/// Name, line count and a short preview of every block in `code`.
pub fn part_previews(code: &str) -> Vec<PartPreview> {
    scan(code)
        .into_iter()
        .map(|span| {
            let content = span.content(code).trim();
            let mut preview: String = content.chars().take(PREVIEW_CHARS).collect();
            if content.chars().count() > PREVIEW_CHARS {
                preview.push_str("...");
            }
            PartPreview {
                name: span.name.to_string(),
                line_count: content.split('\n').count(),
                preview,
            }
        })
        .collect()
}

/// Condensed view of a project for listings.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSummary {
    pub name: String,
    pub bpm: f64,
    pub part_count: usize,
    /// Parts that are `on` or `solo`.
    pub active_part_count: usize,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl From<&Project> for ProjectSummary {
    fn from(project: &Project) -> Self {
        let active_part_count = project
            .part_states
            .values()
            .filter(|state| matches!(state, PartState::On | PartState::Solo))
            .count();

        Self {
            name: project.metadata.name.clone(),
            bpm: project.settings.bpm,
            part_count: project.part_states.len(),
            active_part_count,
            created: project.metadata.created,
            modified: project.metadata.modified,
        }
    }
}
