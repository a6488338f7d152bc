use std::fmt;
use std::ops::Range;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};

use crate::errors::AnnotateError;

/// Final annotation of a poll that found nothing to build.
pub const NO_COMMITS_PREFIX: &str = "no new commits.";

/// Final annotation of a successful build.
pub const DONE_MARKER: &str = "done";

/// One `INFO:<timestamp>:root:<name>` marker found in a build log.
#[derive(Debug, Clone)]
pub struct Annotation {
    pub name: String,
    pub timestamp_str: String,
    pub timestamp: DateTime<Utc>,
    /// Byte offsets of the marker text (without its newline).
    pub start: usize,
    pub end: usize,
}

/// A build phase between two annotations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub name: String,
    pub start: String,
    pub elapsed_s: Option<f64>,
    #[serde(serialize_with = "serialize_span")]
    pub output: Range<usize>,
}

impl Step {
    /// The log text written while this step ran.
    pub fn output_text<'a>(&self, log: &'a str) -> &'a str {
        &log[self.output.clone()]
    }
}

fn serialize_span<S: Serializer>(span: &Range<usize>, serializer: S) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(2))?;
    seq.serialize_element(&span.start)?;
    seq.serialize_element(&span.end)?;
    seq.end()
}

/// The `N.meta.json` side file written next to each build log.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Metadata(pub serde_json::Map<String, serde_json::Value>);

impl Metadata {
    pub fn exit_code(&self) -> Result<Option<i64>, AnnotateError> {
        match self.0.get("exit_code") {
            None => Ok(None),
            Some(v) => v.as_i64().map(Some).ok_or(AnnotateError::InvalidMetadata {
                field: "exit_code",
                expected: "an integer",
            }),
        }
    }

    pub fn elapsed_s(&self) -> Result<Option<f64>, AnnotateError> {
        match self.0.get("elapsed_s") {
            None => Ok(None),
            Some(v) => v.as_f64().map(Some).ok_or(AnnotateError::InvalidMetadata {
                field: "elapsed_s",
                expected: "a number",
            }),
        }
    }
}

/// How a build log ends, decided from its last annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    NoOpPoll,
    Clean,
    Abnormal,
}

impl Completion {
    pub fn classify(last_annotation: &str) -> Self {
        if last_annotation.starts_with(NO_COMMITS_PREFIX) {
            Completion::NoOpPoll
        } else if last_annotation == DONE_MARKER {
            Completion::Clean
        } else {
            Completion::Abnormal
        }
    }
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Completion::NoOpPoll => "no-op poll",
            Completion::Clean => "clean",
            Completion::Abnormal => "abnormal",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    NoCommits,
    Steps {
        completion: Completion,
        steps: Vec<Step>,
    },
}

/// Metadata merged with what the log parser derived.
///
/// Serializes as the metadata object plus either `"no_commits": true` or
/// `"steps": [...]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildRecord {
    pub meta: Metadata,
    pub outcome: BuildOutcome,
}

impl BuildRecord {
    pub fn is_no_commits(&self) -> bool {
        matches!(self.outcome, BuildOutcome::NoCommits)
    }

    pub fn steps(&self) -> &[Step] {
        match &self.outcome {
            BuildOutcome::NoCommits => &[],
            BuildOutcome::Steps { steps, .. } => steps,
        }
    }

    /// `None` for no-op polls, which have no verdict.
    pub fn status(&self) -> Option<BuildStatus> {
        let completion = match &self.outcome {
            BuildOutcome::NoCommits => return None,
            BuildOutcome::Steps { completion, .. } => *completion,
        };
        // parse_output already checked exit_code against the completion.
        let passing = match self.meta.exit_code() {
            Ok(Some(code)) => code == 0,
            _ => completion == Completion::Clean,
        };
        Some(if passing {
            BuildStatus::Passing
        } else {
            BuildStatus::Failing
        })
    }
}

impl Serialize for BuildRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let derived_key = match self.outcome {
            BuildOutcome::NoCommits => "no_commits",
            BuildOutcome::Steps { .. } => "steps",
        };
        let mut map = serializer.serialize_map(None)?;
        for (k, v) in &self.meta.0 {
            if k != derived_key {
                map.serialize_entry(k, v)?;
            }
        }
        match &self.outcome {
            BuildOutcome::NoCommits => map.serialize_entry("no_commits", &true)?,
            BuildOutcome::Steps { steps, .. } => map.serialize_entry("steps", steps)?,
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Passing,
    Failing,
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStatus::Passing => f.write_str("passing"),
            BuildStatus::Failing => f.write_str("failing"),
        }
    }
}

/// Log and metadata paths sharing one build number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildFiles {
    pub log: Option<PathBuf>,
    pub meta: Option<PathBuf>,
}

/// The newest non-poll build of a platform.
#[derive(Debug, Clone)]
pub struct NewestBuild {
    pub number: u32,
    pub log: PathBuf,
    pub record: BuildRecord,
}

#[derive(Debug, Clone)]
pub struct PlatformSummary {
    pub platform: String,
    pub build: NewestBuild,
}
