use crate::{
    config::{ArrangerConfig, ProjectDefaults},
    parts::{detect_parts, sync_part_states, Part, PartState, PartStates},
    preprocess::{normalize_volume, preprocess},
    project::{create_project_with, Project},
    tempo::{apply_bpm, clamp_bpm, extract_bpm},
    Result,
};

/// Anything that can run tune text. Handles are passed explicitly to the
/// code that needs them.
pub trait PlaybackEngine {
    fn set_code(&mut self, code: &str);
    fn evaluate(&mut self) -> Result<()>;
    fn stop(&mut self);
    fn is_started(&self) -> bool;
    fn has_code(&self) -> bool;
}

/// Caller-owned editing state. Parts are re-detected whenever the source
/// changes and the state mapping follows them.
#[derive(Debug, Clone, PartialEq)]
pub struct Arrangement {
    config: ArrangerConfig,
    source: String,
    parts: Vec<Part>,
    part_states: PartStates,
    volume: f64,
    bpm: f64,
    /// Set once the tempo was chosen explicitly rather than read from the tune.
    bpm_overridden: bool,
}

impl Default for Arrangement {
    fn default() -> Self {
        Self::new(ArrangerConfig::default())
    }
}

impl Arrangement {
    pub fn new(config: ArrangerConfig) -> Self {
        let volume = normalize_volume(config.mixer.volume);
        let bpm = clamp_bpm(config.project.bpm).unwrap_or(ProjectDefaults::default().bpm);
        Self {
            config,
            source: String::new(),
            parts: Vec::new(),
            part_states: PartStates::new(),
            volume,
            bpm,
            bpm_overridden: false,
        }
    }

    /// Rebuilds an arrangement from a loaded project. States for parts that
    /// are no longer in the code are dropped.
    pub fn from_project(config: ArrangerConfig, project: &Project) -> Self {
        let mut arrangement = Self::new(config);
        arrangement.part_states = project.part_states.clone();
        arrangement.set_source(project.code.raw.clone());
        arrangement.set_bpm(project.settings.bpm);
        arrangement
    }

    /// The tune text as last set, without any processing.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parts detected in the current source, in source order.
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// One state per detected part name.
    pub fn part_states(&self) -> &PartStates {
        &self.part_states
    }

    /// Master volume multiplier, already sanitised.
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Current tempo, either read from the tune or set explicitly.
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Replaces the tune text. The tempo follows the tune's own `setcps`
    /// call unless one was set explicitly.
    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
        self.parts = detect_parts(&self.source);
        self.part_states = sync_part_states(&self.parts, &self.part_states);

        if !self.bpm_overridden {
            if let Some(bpm) = extract_bpm(&self.source).and_then(clamp_bpm) {
                self.bpm = bpm;
            }
        }
    }

    /// Sets the state of a detected part. Returns `false` and changes nothing
    /// when no part of that name exists in the current source.
    pub fn set_part_state(&mut self, name: &str, state: PartState) -> bool {
        match self.part_states.get_mut(name) {
            Some(slot) => {
                *slot = state;
                true
            }
            None => {
                tracing::debug!(name, "ignoring state for unknown part");
                false
            }
        }
    }

    /// Sets the master volume. Invalid values are sanitised as in
    /// [`normalize_volume`].
    pub fn set_volume(&mut self, volume: f64) {
        self.volume = normalize_volume(volume);
    }

    /// Sets the tempo explicitly, clamped to the supported range. From then
    /// on the tune's own `setcps` no longer drives the tempo and is rewritten
    /// in the processed text. A non-finite tempo is ignored.
    pub fn set_bpm(&mut self, bpm: f64) {
        if let Some(bpm) = clamp_bpm(bpm) {
            self.bpm = bpm;
            self.bpm_overridden = true;
        }
    }

    /// The text to hand to the playback engine. The tune's own `setcps` is
    /// only rewritten once a tempo was set explicitly.
    pub fn processed(&self) -> String {
        let source = if self.bpm_overridden {
            apply_bpm(&self.source, self.bpm)
        } else {
            self.source.clone()
        };
        preprocess(&source, &self.part_states, self.volume)
    }

    /// Sends the processed tune to `engine`. The engine is (re)evaluated when
    /// `play` is set or when it is already running, so edits are heard live.
    pub fn push_to<E: PlaybackEngine + ?Sized>(&self, engine: &mut E, play: bool) -> Result<()> {
        let code = self.processed();
        engine.set_code(&code);
        if play || engine.is_started() {
            engine.evaluate()?;
        }
        tracing::debug!(play, bytes = code.len(), "pushed tune to playback engine");
        Ok(())
    }

    /// Snapshot of the arrangement as a project document.
    pub fn to_project(&self, name: &str) -> Project {
        create_project_with(
            &self.config.project,
            &self.source,
            &self.part_states,
            self.bpm,
            name,
        )
    }
}
