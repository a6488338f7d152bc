use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum AnnotateError {
    #[error("No timestamped INFO:<time>:root: annotations found in log")]
    NoAnnotations,

    #[error("Log has {count} INFO:root: annotation(s) without timestamps; timestamp-less logs are not supported")]
    MissingTimestamps { count: usize },

    #[error("Malformed annotation timestamp '{timestamp}': {source}")]
    MalformedTimestamp {
        timestamp: String,
        source: chrono::ParseError,
    },

    #[error("Annotation '{name}' at byte {offset} is not followed by a newline")]
    MissingNewline { name: String, offset: usize },

    #[error("Log does not end with a newline right after the final 'done' annotation")]
    MissingTrailingNewline,

    #[error("Exit code {exit_code} contradicts a {completion} log")]
    ExitCodeMismatch { exit_code: i64, completion: String },

    #[error("Step times add up to {computed}s but metadata says elapsed_s = {recorded}")]
    ElapsedMismatch { computed: f64, recorded: f64 },

    #[error("Mismatched step data: {annotations} annotations, {elapsed} elapsed values, {spans} output spans")]
    CountMismatch {
        annotations: usize,
        elapsed: usize,
        spans: usize,
    },

    #[error("Invalid metadata field '{field}': expected {expected}")]
    InvalidMetadata {
        field: &'static str,
        expected: &'static str,
    },

    #[error("Failed to read build log {path}: {source}")]
    LogReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read metadata file {path}: {source}")]
    MetaReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse metadata in {path}: {source}")]
    MetaParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Build {build} has a metadata file but no log")]
    MissingLog { build: u32 },

    #[error("Unexpected file {path}; expected N.txt or N.meta.json")]
    UnexpectedFile { path: PathBuf },

    #[error("Failed to read directory {path}: {source}")]
    DirReadError {
        path: PathBuf,
        source: std::io::Error,
    },
}
