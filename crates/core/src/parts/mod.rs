use std::{collections::BTreeMap, fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ArrangerError;

static OPEN_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<part:([A-Za-z0-9_]+)>").expect("open marker pattern"));

/// A named, contiguous region of tune source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    /// The whole block including both markers.
    pub full_match: String,
    /// Text between the markers, verbatim.
    pub content: String,
}

/// Mapping of part name to playback state. Ordered so that serialised
/// projects are stable.
pub type PartStates = BTreeMap<String, PartState>;

/// Playback state of a single part.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartState {
    /// Plays normally.
    #[default]
    On,
    /// Muted.
    Hush,
    /// Plays exclusively, muting every part that is not soloed.
    Solo,
}

impl PartState {
    /// Every state, in the order a front-end cycles through them.
    pub const ALL: [PartState; 3] = [PartState::On, PartState::Hush, PartState::Solo];

    /// The lower-case name used in project files and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            PartState::On => "on",
            PartState::Hush => "hush",
            PartState::Solo => "solo",
        }
    }

    /// Whether a part in this state is heard, given whether any part is
    /// currently soloed.
    pub fn is_audible(self, solo_mode: bool) -> bool {
        if solo_mode {
            self == PartState::Solo
        } else {
            self != PartState::Hush
        }
    }
}

impl fmt::Display for PartState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartState {
    type Err = ArrangerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PartState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| {
                ArrangerError::msg(format!(
                    "invalid part state `{s}` (must be 'on', 'hush', or 'solo')"
                ))
            })
    }
}

/// Returns true when at least one part is soloed.
pub fn solo_active(states: &PartStates) -> bool {
    states.values().any(|state| *state == PartState::Solo)
}

/// Byte offsets of one matched block inside the scanned source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PartSpan<'a> {
    pub name: &'a str,
    pub start: usize,
    pub content_start: usize,
    pub content_end: usize,
    pub end: usize,
}

impl<'a> PartSpan<'a> {
    pub fn content(&self, source: &'a str) -> &'a str {
        &source[self.content_start..self.content_end]
    }
}

/// Locates every complete block, left to right. An open marker with no
/// matching close is skipped. When a name is opened twice before it closes,
/// the innermost open marker pairs with the close. Blocks never overlap, so
/// scanning resumes after each close marker.
pub(crate) fn scan(source: &str) -> Vec<PartSpan<'_>> {
    let mut spans = Vec::new();
    let mut cursor = 0;

    while let Some(captures) = OPEN_MARKER.captures_at(source, cursor) {
        let (Some(open), Some(name)) = (captures.get(0), captures.get(1)) else {
            break;
        };
        let name = name.as_str();
        let close_marker = format!("</part:{name}>");

        let Some(close_offset) = source[open.end()..].find(&close_marker) else {
            cursor = open.end();
            continue;
        };
        let content_end = open.end() + close_offset;

        let open_marker = open.as_str();
        let (start, content_start) = match source[open.end()..content_end].rfind(open_marker) {
            Some(inner) => {
                let start = open.end() + inner;
                (start, start + open_marker.len())
            }
            None => (open.start(), open.end()),
        };

        let end = content_end + close_marker.len();
        spans.push(PartSpan {
            name,
            start,
            content_start,
            content_end,
            end,
        });
        cursor = end;
    }

    spans
}

/// Scans `source` for part blocks and returns them in source order.
pub fn detect_parts(source: &str) -> Vec<Part> {
    let parts: Vec<Part> = scan(source)
        .into_iter()
        .map(|span| Part {
            name: span.name.to_string(),
            full_match: source[span.start..span.end].to_string(),
            content: span.content(source).to_string(),
        })
        .collect();

    tracing::debug!(count = parts.len(), "detected parts");
    parts
}

/// Builds the state mapping for a fresh set of parts: known parts keep their
/// previous state, new parts start as [`PartState::On`], and entries for parts
/// that no longer exist are dropped.
pub fn sync_part_states(parts: &[Part], previous: &PartStates) -> PartStates {
    parts
        .iter()
        .map(|part| {
            let state = previous.get(&part.name).copied().unwrap_or_default();
            (part.name.clone(), state)
        })
        .collect()
}
