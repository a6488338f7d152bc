use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;

use crate::errors::AnnotateError;
use crate::types::{Annotation, BuildOutcome, BuildRecord, Completion, Metadata, Step};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

static ANNOTATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^INFO:(\d{4}-\d\d-\d\dT\d\d:\d\d:\d\dZ):root:(.*)$")
        .expect("annotation regex is valid")
});

/// Markers written by bots that predate timestamps.
static LEGACY_ANNOTATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^INFO:root:").expect("legacy annotation regex is valid"));

/// Find every timestamped annotation in `log`, in log order.
pub fn find_annotations(log: &str) -> Result<Vec<Annotation>, AnnotateError> {
    ANNOTATION_RE
        .captures_iter(log)
        .map(|caps| {
            let whole = caps.get_match();
            let timestamp_str = &caps[1];
            let timestamp = NaiveDateTime::parse_from_str(timestamp_str, TIMESTAMP_FORMAT)
                .map_err(|source| AnnotateError::MalformedTimestamp {
                    timestamp: timestamp_str.to_string(),
                    source,
                })?
                .and_utc();
            Ok(Annotation {
                name: caps[2].to_string(),
                timestamp_str: timestamp_str.to_string(),
                timestamp,
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

/// Parse a build log and its optional metadata into a `BuildRecord`.
///
/// Any inconsistency between the annotations, the log layout and the
/// metadata is an error; there is no best-effort result.
pub fn parse_output(log: &str, meta: Option<Metadata>) -> Result<BuildRecord, AnnotateError> {
    let meta = meta.unwrap_or_default();

    let legacy = LEGACY_ANNOTATION_RE.find_iter(log).count();
    if legacy > 0 {
        return Err(AnnotateError::MissingTimestamps { count: legacy });
    }

    let mut annotations = find_annotations(log)?;
    let Some(last) = annotations.last() else {
        return Err(AnnotateError::NoAnnotations);
    };

    let completion = Completion::classify(&last.name);
    let exit_code = meta.exit_code()?;
    let total_elapsed = meta.elapsed_s()?;

    match (completion, exit_code) {
        (Completion::NoOpPoll, _) => {
            return Ok(BuildRecord {
                meta,
                outcome: BuildOutcome::NoCommits,
            });
        }
        (Completion::Clean, Some(code)) if code != 0 => {
            return Err(AnnotateError::ExitCodeMismatch {
                exit_code: code,
                completion: completion.to_string(),
            });
        }
        (Completion::Abnormal, Some(0)) => {
            return Err(AnnotateError::ExitCodeMismatch {
                exit_code: 0,
                completion: completion.to_string(),
            });
        }
        _ => {}
    }

    let mut elapsed: Vec<Option<f64>> = annotations
        .windows(2)
        .map(|pair| Some(seconds_between(&pair[0], &pair[1])))
        .collect();

    let mut spans = Vec::with_capacity(annotations.len());
    for pair in annotations.windows(2) {
        let (cur, next) = (&pair[0], &pair[1]);
        if log.as_bytes().get(cur.end) != Some(&b'\n') {
            return Err(AnnotateError::MissingNewline {
                name: cur.name.clone(),
                offset: cur.end,
            });
        }
        spans.push(cur.end + 1..next.start);
    }

    let step_sum: f64 = elapsed.iter().flatten().sum();

    if completion == Completion::Clean {
        let Some(done) = annotations.pop() else {
            return Err(AnnotateError::NoAnnotations);
        };
        if !log.ends_with('\n') || done.end + 1 != log.len() {
            return Err(AnnotateError::MissingTrailingNewline);
        }
        if let Some(recorded) = total_elapsed
            && step_sum != recorded
        {
            return Err(AnnotateError::ElapsedMismatch {
                computed: step_sum,
                recorded,
            });
        }
    } else {
        elapsed.push(total_elapsed.map(|total| total - step_sum));
        let tail_start = (last_end(&annotations) + 1).min(log.len());
        spans.push(tail_start..log.len());
    }

    if annotations.len() != elapsed.len() || annotations.len() != spans.len() {
        return Err(AnnotateError::CountMismatch {
            annotations: annotations.len(),
            elapsed: elapsed.len(),
            spans: spans.len(),
        });
    }

    let steps = annotations
        .into_iter()
        .zip(elapsed)
        .zip(spans)
        .map(|((annotation, elapsed_s), output)| Step {
            name: annotation.name,
            start: annotation.timestamp_str,
            elapsed_s,
            output,
        })
        .collect();

    Ok(BuildRecord {
        meta,
        outcome: BuildOutcome::Steps { completion, steps },
    })
}

fn seconds_between(from: &Annotation, to: &Annotation) -> f64 {
    (to.timestamp - from.timestamp).num_milliseconds() as f64 / 1000.0
}

fn last_end(annotations: &[Annotation]) -> usize {
    annotations.last().map(|a| a.end).unwrap_or_default()
}
