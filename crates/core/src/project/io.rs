use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::{ArrangerError, Result};

use super::{timestamp, validate_project, Project};

pub const PROJECT_EXTENSION: &str = ".json";
pub const PROJECT_MIME_TYPE: &str = "application/json";

const MAX_FILE_STEM: usize = 50;
const FALLBACK_FILE_STEM: &str = "untitled";

/// Receives a finished file for the user, such as a browser download or a
/// write into an output directory.
pub trait DownloadSink {
    fn deliver(&mut self, bytes: &[u8], file_name: &str, mime_type: &str) -> Result<()>;
}

/// Writes delivered files into a directory on disk.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadSink for DirectorySink {
    fn deliver(&mut self, bytes: &[u8], file_name: &str, mime_type: &str) -> Result<()> {
        let path = self.dir.join(file_name);
        std::fs::write(&path, bytes)?;
        tracing::debug!(?path, mime_type, "wrote download");
        Ok(())
    }
}

/// Serialises a project, compact or pretty-printed.
pub fn export_project_json(project: &Project, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(project)
    } else {
        serde_json::to_string(project)
    };
    json.map_err(|err| ArrangerError::msg(format!("failed to serialise project: {err}")))
}

/// Parses and validates a project document.
pub fn import_project_json(json: &str) -> Result<Project> {
    let document: Value = serde_json::from_str(json)?;

    let report = validate_project(&document);
    if !report.valid {
        return Err(ArrangerError::Validation(report.errors));
    }

    serde_json::from_value(document).map_err(|err| ArrangerError::Validation(vec![err.to_string()]))
}

/// Reads a project from disk. Only `.json` files are accepted; timestamps are
/// returned exactly as stored.
pub async fn load_project_from_file(path: impl AsRef<Path>) -> Result<Project> {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !file_name.ends_with(PROJECT_EXTENSION) {
        return Err(ArrangerError::InvalidFileType(file_name));
    }

    let contents = tokio::fs::read_to_string(path).await?;
    let project = import_project_json(&contents)?;
    tracing::info!(name = %project.metadata.name, ?path, "project loaded");
    Ok(project)
}

/// Stamps `modified`, serialises the project and hands it to `sink`. The file
/// name comes from `file_name` when given, otherwise from the project name.
/// Returns the file name that was delivered.
pub fn save_project_to_file<S: DownloadSink + ?Sized>(
    project: &mut Project,
    file_name: Option<&str>,
    sink: &mut S,
) -> Result<String> {
    project.metadata.modified = timestamp();

    let json = export_project_json(project, true)?;
    let stem = sanitize_file_name(file_name.unwrap_or(&project.metadata.name));
    let file_name = format!("{stem}{PROJECT_EXTENSION}");

    sink.deliver(json.as_bytes(), &file_name, PROJECT_MIME_TYPE)?;
    tracing::info!(file_name = %file_name, "project saved");
    Ok(file_name)
}

/// Makes a name safe for use as a file stem: only ASCII letters, digits,
/// `-`, `_` and whitespace survive, whitespace runs become `_`, the result is
/// lower-cased and capped at 50 characters.
pub fn sanitize_file_name(name: &str) -> String {
    let mut stem = String::with_capacity(name.len());
    let mut pending_space = false;

    for c in name.chars() {
        if c.is_whitespace() {
            pending_space = true;
        } else if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            if pending_space {
                stem.push('_');
                pending_space = false;
            }
            stem.push(c.to_ascii_lowercase());
        }
    }
    if pending_space {
        stem.push('_');
    }

    stem.truncate(MAX_FILE_STEM);
    if stem.is_empty() {
        FALLBACK_FILE_STEM.to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parts::{PartState, PartStates};
    use crate::project::create_project;

    #[derive(Default)]
    struct MemorySink {
        deliveries: Vec<(Vec<u8>, String, String)>,
    }

    impl DownloadSink for MemorySink {
        fn deliver(&mut self, bytes: &[u8], file_name: &str, mime_type: &str) -> Result<()> {
            self.deliveries
                .push((bytes.to_vec(), file_name.to_string(), mime_type.to_string()));
            Ok(())
        }
    }

    fn sample_project() -> Project {
        let states = PartStates::from([
            ("bass".to_string(), PartState::Hush),
            ("arp".to_string(), PartState::Solo),
        ]);
        create_project(
            "setcps(120/60/4)\n<part:bass>$: note(\"c2\").s(\"saw\")</part:bass>\n<part:arp>$: n(\"0 2 4\").s(\"piano\")</part:arp>",
            &states,
            120.0,
            "Night Drive",
        )
    }

    #[test]
    fn export_import_round_trip() {
        let project = sample_project();

        for pretty in [false, true] {
            let json = export_project_json(&project, pretty).unwrap();
            assert_eq!(json.contains('\n'), pretty);
            assert_eq!(import_project_json(&json).unwrap(), project);
        }
    }

    #[test]
    fn import_rejects_malformed_json() {
        let err = import_project_json("{ \"metadata\": ").unwrap_err();
        assert!(matches!(err, ArrangerError::Parse(_)));
    }

    #[test]
    fn import_reports_validation_errors() {
        let err = import_project_json(r#"{"settings": {"bpm": 10}}"#).unwrap_err();
        let errors = err.validation_errors().unwrap();

        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&"BPM out of valid range (20-300): 10".to_string()));
    }

    #[test]
    fn import_reports_shape_errors_validation_misses() {
        let mut document = serde_json::to_value(sample_project()).unwrap();
        document["code"]["parts"] = serde_json::json!([{ "name": "bass" }]);

        let err = import_project_json(&document.to_string()).unwrap_err();
        assert_eq!(err.validation_errors().unwrap().len(), 1);
    }

    #[test]
    fn save_stamps_modified_and_delivers_json() {
        let mut project = sample_project();
        let earlier = chrono::DateTime::parse_from_rfc3339("2020-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        project.metadata.modified = earlier;

        let mut sink = MemorySink::default();
        let file_name = save_project_to_file(&mut project, None, &mut sink).unwrap();

        assert_eq!(file_name, "night_drive.json");
        assert!(project.metadata.modified > earlier);

        let (bytes, delivered_name, mime) = &sink.deliveries[0];
        assert_eq!(delivered_name, "night_drive.json");
        assert_eq!(mime, "application/json");
        let saved = import_project_json(std::str::from_utf8(bytes).unwrap()).unwrap();
        assert_eq!(saved, project);
    }

    #[test]
    fn explicit_file_name_wins() {
        let mut project = sample_project();
        let mut sink = MemorySink::default();

        let file_name = save_project_to_file(&mut project, Some("Take #2!"), &mut sink).unwrap();
        assert_eq!(file_name, "take_2.json");
    }

    #[test]
    fn directory_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(dir.path());
        let mut project = sample_project();

        let file_name = save_project_to_file(&mut project, None, &mut sink).unwrap();
        let written = std::fs::read_to_string(dir.path().join(file_name)).unwrap();
        assert!(written.contains("\"partStates\""));
    }

    #[test]
    fn sanitises_file_names() {
        assert_eq!(sanitize_file_name("My  Cool\tTune"), "my_cool_tune");
        assert_eq!(sanitize_file_name("a ! b"), "a_b");
        assert_eq!(sanitize_file_name(" lead-in_2 "), "_lead-in_2_");
        assert_eq!(sanitize_file_name("Ünïcödé"), "ncd");
        assert_eq!(sanitize_file_name("!!!"), "untitled");
        assert_eq!(sanitize_file_name(&"x".repeat(80)).len(), 50);
    }

    #[tokio::test]
    async fn loads_project_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("night.json");
        let project = sample_project();
        std::fs::write(&path, export_project_json(&project, true).unwrap()).unwrap();

        let loaded = load_project_from_file(&path).await.unwrap();
        assert_eq!(loaded, project);
    }

    #[tokio::test]
    async fn load_rejects_other_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("night.txt");
        std::fs::write(&path, "{}").unwrap();

        let err = load_project_from_file(&path).await.unwrap_err();
        assert!(matches!(err, ArrangerError::InvalidFileType(ref name) if name == "night.txt"));
    }

    #[tokio::test]
    async fn load_classifies_bad_content() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "not json").unwrap();
        let invalid = dir.path().join("invalid.json");
        std::fs::write(&invalid, "[]").unwrap();

        assert!(matches!(
            load_project_from_file(&broken).await.unwrap_err(),
            ArrangerError::Parse(_)
        ));
        let err = load_project_from_file(&invalid).await.unwrap_err();
        assert_eq!(
            err.validation_errors().unwrap(),
            ["Project must be an object".to_string()]
        );
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_project_from_file(dir.path().join("absent.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, ArrangerError::Io(_)));
    }
}
