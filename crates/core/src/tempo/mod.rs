use std::sync::LazyLock;

use regex::{Captures, Regex};

pub const MIN_BPM: f64 = 20.0;
pub const MAX_BPM: f64 = 300.0;

/// Seconds per minute times beats per cycle.
const BPM_PER_CPS: f64 = 60.0 * 4.0;
const MAX_TERMS: usize = 3;

static SETCPS_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"setcps\(\s*([^()]*?)\s*\)").expect("setcps pattern"));

/// Cycles per second for a tempo in beats per minute, four beats a cycle.
pub fn bpm_to_cps(bpm: f64) -> f64 {
    bpm / BPM_PER_CPS
}

/// Inverse of [`bpm_to_cps`].
pub fn cps_to_bpm(cps: f64) -> f64 {
    cps * BPM_PER_CPS
}

/// Clamps a tempo into the supported range. Non-finite values are rejected.
pub fn clamp_bpm(bpm: f64) -> Option<f64> {
    if !bpm.is_finite() {
        tracing::warn!(bpm, "ignoring non-finite tempo");
        return None;
    }

    let clamped = bpm.clamp(MIN_BPM, MAX_BPM);
    if clamped != bpm {
        tracing::warn!(bpm, clamped, "tempo out of range, clamping");
    }
    Some(clamped)
}

/// Reads the tempo from the first `setcps(...)` call in `source` that is not
/// on a commented-out line.
pub fn extract_bpm(source: &str) -> Option<f64> {
    let captures = live_setcps(source)?;
    let cps = evaluate_quotient(captures.get(1)?.as_str())?;
    Some(cps_to_bpm(cps))
}

fn live_setcps(source: &str) -> Option<Captures<'_>> {
    SETCPS_CALL
        .captures_iter(source)
        .find(|captures| {
            captures
                .get(0)
                .is_some_and(|call| !is_commented(source, call.start()))
        })
}

/// Whether the line holding byte `at` starts with a `//` comment before it.
fn is_commented(source: &str, at: usize) -> bool {
    let line_start = source[..at].rfind('\n').map_or(0, |index| index + 1);
    source[line_start..at].trim_start().starts_with("//")
}

/// Evaluates `a`, `a/b` or `a/b/c` where every term is a plain decimal
/// literal. Returns `None` for anything else, including division by zero.
fn evaluate_quotient(expression: &str) -> Option<f64> {
    let terms: Vec<&str> = expression.split('/').map(str::trim).collect();
    if terms.len() > MAX_TERMS {
        return None;
    }

    let mut values = terms.into_iter().map(parse_number);
    let mut result = values.next()??;
    for divisor in values {
        let divisor = divisor?;
        if divisor == 0.0 {
            return None;
        }
        result /= divisor;
    }

    (result.is_finite() && result > 0.0).then_some(result)
}

fn parse_number(term: &str) -> Option<f64> {
    let (whole, fraction) = term.split_once('.').unwrap_or((term, ""));
    let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if digits(whole) && digits(fraction) && !term.ends_with('.') {
        term.parse().ok()
    } else {
        None
    }
}

fn format_bpm(bpm: f64) -> String {
    let rounded = (bpm * 100.0).round() / 100.0;
    format!("{rounded}")
}

/// Rewrites the first live `setcps(...)` call to run at `bpm`, or prepends one
/// when the tune has none. Commented-out calls are left as they are. Returns the source unchanged for a non-finite tempo.
pub fn apply_bpm(source: &str, bpm: f64) -> String {
    let Some(bpm) = clamp_bpm(bpm) else {
        return source.to_string();
    };
    let call = format!("setcps({}/60/4)", format_bpm(bpm));

    match live_setcps(source).and_then(|captures| captures.get(0)) {
        Some(existing) => format!(
            "{}{call}{}",
            &source[..existing.start()],
            &source[existing.end()..]
        ),
        None => format!("{call}\n{source}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_between_units() {
        assert_eq!(bpm_to_cps(120.0), 0.5);
        assert_eq!(cps_to_bpm(0.5), 120.0);
    }

    #[test]
    fn extracts_tempo_from_quotient() {
        let bpm = extract_bpm("setcps(140/60/4)\n$: s(\"bd*4\")").unwrap();
        assert!((bpm - 140.0).abs() < 1e-9);

        let bpm = extract_bpm("setcps( 0.5 )").unwrap();
        assert!((bpm - 120.0).abs() < 1e-9);
    }

    #[test]
    fn refuses_anything_but_literal_division() {
        assert_eq!(extract_bpm("setcps(fetch('x')/60/4)"), None);
        assert_eq!(extract_bpm("setcps(120*2/60/4)"), None);
        assert_eq!(extract_bpm("setcps(120/0/4)"), None);
        assert_eq!(extract_bpm("setcps(1/2/3/4)"), None);
        assert_eq!(extract_bpm("setcps(1e3/60/4)"), None);
        assert_eq!(extract_bpm("setcps()"), None);
        assert_eq!(extract_bpm("s(\"bd\")"), None);
    }

    #[test]
    fn rewrites_existing_call() {
        let source = "setcps(140/60/4)\n$: s(\"bd\")";
        assert_eq!(apply_bpm(source, 90.0), "setcps(90/60/4)\n$: s(\"bd\")");
    }

    #[test]
    fn prepends_call_when_missing() {
        assert_eq!(apply_bpm("$: s(\"hh\")", 92.5), "setcps(92.5/60/4)\n$: s(\"hh\")");
    }

    #[test]
    fn commented_calls_are_not_the_tempo() {
        let source = "// setcps(1)\n  // setcps(2/60/4)\nsetcps(90/60/4)\n$: s(\"bd\")";
        let bpm = extract_bpm(source).unwrap();
        assert!((bpm - 90.0).abs() < 1e-9);

        assert_eq!(extract_bpm("// setcps(1)\n$: s(\"bd\")"), None);
        assert_eq!(
            apply_bpm(source, 120.0),
            "// setcps(1)\n  // setcps(2/60/4)\nsetcps(120/60/4)\n$: s(\"bd\")"
        );
        assert_eq!(
            apply_bpm("// setcps(1)\n$: s(\"bd\")", 120.0),
            "setcps(120/60/4)\n// setcps(1)\n$: s(\"bd\")"
        );
    }

    #[test]
    fn clamps_tempo() {
        assert_eq!(apply_bpm("setcps(1)", 500.0), "setcps(300/60/4)");
        assert_eq!(apply_bpm("setcps(1)", 5.0), "setcps(20/60/4)");
        assert_eq!(apply_bpm("setcps(1)", f64::NAN), "setcps(1)");
    }
}
