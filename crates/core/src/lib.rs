//! Core library for the Strudel arranger.
//!
//! Tunes are split into named parts with `<part:NAME>...</part:NAME>`
//! markers. This crate finds those parts, rewrites the tune according to each
//! part's playback state and the master volume, and reads and writes the JSON
//! project files that persist an arrangement. It never plays sound itself;
//! processed text is handed to a [`PlaybackEngine`] supplied by the caller.

pub mod config;
pub mod error;
pub mod parts;
pub mod playback;
pub mod preprocess;
pub mod project;
pub mod tempo;

pub use config::{ArrangerConfig, MixerDefaults, ProjectDefaults};
pub use error::{ArrangerError, Result};
pub use parts::{detect_parts, solo_active, sync_part_states, Part, PartState, PartStates};
pub use playback::{Arrangement, PlaybackEngine};
pub use preprocess::{normalize_volume, preprocess, DEFAULT_VOLUME, MAX_VOLUME, MIN_VOLUME};
pub use project::{
    create_project, create_project_with, export_project_json, import_project_json,
    load_project_from_file, part_previews, sanitize_file_name, save_project_to_file,
    validate_project, DirectorySink, DownloadSink, PartPreview, Project, ProjectCode,
    ProjectMetadata, ProjectSettings, ProjectSummary, ValidationReport,
};
pub use tempo::{apply_bpm, bpm_to_cps, clamp_bpm, cps_to_bpm, extract_bpm, MAX_BPM, MIN_BPM};
