use std::sync::LazyLock;

use regex::Regex;

use crate::parts::{scan, solo_active, PartStates};

pub const DEFAULT_VOLUME: f64 = 1.0;
pub const MIN_VOLUME: f64 = 0.0;
pub const MAX_VOLUME: f64 = 2.0;

const VOLUME_EPSILON: f64 = 1e-6;
const COMMENT_MARKER: &str = "//";
const GAIN_CALL: &str = ".gain(";
const VOLUME_HEADER_PREFIX: &str = "// Master volume:";

static METHOD_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.[A-Za-z_][A-Za-z0-9_]*\s*\(").expect("method call pattern"));

/// Sanitises a requested volume multiplier. Non-finite input falls back to
/// [`DEFAULT_VOLUME`], everything else is clamped to
/// [`MIN_VOLUME`]..=[`MAX_VOLUME`].
pub fn normalize_volume(volume: f64) -> f64 {
    if !volume.is_finite() {
        tracing::warn!(volume, "invalid volume, using default");
        return DEFAULT_VOLUME;
    }

    let clamped = volume.clamp(MIN_VOLUME, MAX_VOLUME);
    if clamped != volume {
        tracing::warn!(volume, clamped, "volume out of range, clamping");
    }
    clamped
}

/// Produces the text the playback engine should run.
///
/// Every block whose name appears in `states` is either muted (each line
/// commented out) or passed through with the volume gain applied. When any part
/// is soloed, only soloed parts stay audible. Blocks for parts missing from
/// `states` and all text outside blocks are copied unchanged.
///
/// Markers stay in the output and running the result through again with the
/// same states and volume changes nothing. A gain argument already written as
/// `(x) * 0.500` or `0.500` counts as scaled at volume 0.5, so a tune that
/// spells its own gain that way at that volume is not scaled again.
pub fn preprocess(source: &str, states: &PartStates, volume: f64) -> String {
    let volume = normalize_volume(volume);
    let solo_mode = solo_active(states);
    let gain = ((volume - DEFAULT_VOLUME).abs() > VOLUME_EPSILON).then_some(volume);

    let mut output = String::with_capacity(source.len());
    let mut cursor = 0;
    let mut rewritten = 0usize;

    for span in scan(source) {
        let Some(state) = states.get(span.name) else {
            continue;
        };

        output.push_str(&source[cursor..span.content_start]);
        let content = span.content(source);
        if state.is_audible(solo_mode) {
            match gain {
                Some(factor) => output.push_str(&apply_gain(content, factor)),
                None => output.push_str(content),
            }
        } else {
            output.push_str(&mute(content));
        }
        cursor = span.content_end;
        rewritten += 1;
    }
    output.push_str(&source[cursor..]);

    tracing::debug!(rewritten, solo_mode, volume, "preprocessed tune");

    match gain {
        Some(factor) => with_volume_header(&output, factor),
        None => output,
    }
}

/// Comments out every line that carries code.
fn mute(content: &str) -> String {
    map_lines(content, |line| {
        if is_passthrough(line) {
            line.to_string()
        } else {
            format!("{COMMENT_MARKER} {line}")
        }
    })
}

/// Applies `factor` to each code line: existing gain calls get multiplied,
/// pattern statements without one get a gain call appended.
fn apply_gain(content: &str, factor: f64) -> String {
    map_lines(content, |line| {
        if is_passthrough(line) {
            line.to_string()
        } else if line.contains(GAIN_CALL) {
            scale_gain_calls(line, factor)
        } else if is_pattern_statement(line) {
            append_gain_call(line, factor)
        } else {
            line.to_string()
        }
    })
}

fn map_lines(content: &str, f: impl Fn(&str) -> String) -> String {
    content.split('\n').map(f).collect::<Vec<_>>().join("\n")
}

fn is_passthrough(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.trim_end().is_empty() || trimmed.starts_with(COMMENT_MARKER)
}

fn is_pattern_statement(line: &str) -> bool {
    line.contains(':') && METHOD_CALL.is_match(line)
}

fn format_factor(factor: f64) -> String {
    format!("{factor:.3}")
}

/// Two factors are the same if they print the same at the precision the
/// multiplier is written with.
fn same_factor(a: f64, b: f64) -> bool {
    format_factor(a) == format_factor(b) || (a - b).abs() <= VOLUME_EPSILON
}

fn append_gain_call(line: &str, factor: f64) -> String {
    let body = line.trim_end();
    let trailing = &line[body.len()..];
    let (code, terminator) = match body.strip_suffix(|c: char| c == ';' || c == ',') {
        Some(code) => (code, &body[code.len()..]),
        None => (body, ""),
    };
    format!("{code}.gain({}){terminator}{trailing}", format_factor(factor))
}

fn scale_gain_calls(line: &str, factor: f64) -> String {
    let mut output = String::with_capacity(line.len() + 16);
    let mut rest = line;

    while let Some(index) = rest.find(GAIN_CALL) {
        let arg_start = index + GAIN_CALL.len();
        let Some(arg_len) = closing_paren(&rest[arg_start..]) else {
            break;
        };
        let argument = &rest[arg_start..arg_start + arg_len];

        output.push_str(&rest[..arg_start]);
        output.push_str(&scale_argument(argument, factor));
        output.push(')');
        rest = &rest[arg_start + arg_len + 1..];
    }

    output.push_str(rest);
    output
}

/// Wraps `argument` in a multiplication by `factor` unless it already carries
/// exactly that multiplier. Any other argument, including one scaled by a
/// different factor, is treated as user code and wrapped.
fn scale_argument(argument: &str, factor: f64) -> String {
    let trimmed = argument.trim();
    if carries_factor(trimmed, factor) {
        return argument.to_string();
    }
    format!("({trimmed}) * {}", format_factor(factor))
}

/// Recognises `(<inner>) * <factor>` and a bare `<factor>`, the two shapes a
/// gain argument has after a pass at `factor`.
fn carries_factor(argument: &str, factor: f64) -> bool {
    let written = match argument.strip_prefix('(') {
        Some(after_open) => match closing_paren(after_open) {
            Some(inner_len) => after_open[inner_len + 1..]
                .trim_start()
                .strip_prefix('*')
                .map(str::trim),
            None => None,
        },
        None => Some(argument),
    };
    written
        .and_then(parse_written_factor)
        .is_some_and(|value| same_factor(value, factor))
}

/// Parses a literal in the exact form [`format_factor`] writes: digits, a
/// point, three decimals. Anything else is user code.
fn parse_written_factor(text: &str) -> Option<f64> {
    let (whole, fraction) = text.split_once('.')?;
    let digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if digits(whole) && digits(fraction) && fraction.len() == 3 {
        text.parse().ok()
    } else {
        None
    }
}

/// Returns the offset of the parenthesis closing an already opened one,
/// skipping over quoted strings.
fn closing_paren(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (index, c) in text.char_indices() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == open {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '(' => depth += 1,
            ')' if depth == 0 => return Some(index),
            ')' => depth -= 1,
            _ => {}
        }
    }

    None
}

fn volume_header(factor: f64) -> String {
    format!("{VOLUME_HEADER_PREFIX} {:.0}%", factor * 100.0)
}

fn with_volume_header(text: &str, factor: f64) -> String {
    let body = match text.split_once('\n') {
        Some((first, rest)) if first.starts_with(VOLUME_HEADER_PREFIX) => rest,
        None if text.starts_with(VOLUME_HEADER_PREFIX) => "",
        _ => text,
    };
    format!("{}\n{body}", volume_header(factor))
}
