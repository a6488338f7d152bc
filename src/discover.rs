use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, warn};

use crate::annotate::parse_output;
use crate::errors::AnnotateError;
use crate::types::{BuildFiles, BuildRecord, Metadata, NewestBuild, PlatformSummary};

/// Index `N.txt` / `N.meta.json` files in a platform directory by build number.
///
/// Names starting with `.` (editor swap files, `.DS_Store`) are skipped. Any
/// other name that doesn't fit the pattern is an error.
pub fn index_builds(platform_dir: &Path) -> Result<BTreeMap<u32, BuildFiles>> {
    let entries = fs::read_dir(platform_dir).map_err(|source| AnnotateError::DirReadError {
        path: platform_dir.to_path_buf(),
        source,
    })?;

    let mut builds: BTreeMap<u32, BuildFiles> = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|source| AnnotateError::DirReadError {
            path: platform_dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            return Err(AnnotateError::UnexpectedFile { path }.into());
        };
        if name.starts_with('.') {
            continue;
        }

        let Some((number, kind)) = name
            .split_once('.')
            .and_then(|(num, rest)| Some((num.parse::<u32>().ok()?, rest)))
        else {
            return Err(AnnotateError::UnexpectedFile { path }.into());
        };

        let files = builds.entry(number).or_default();
        match kind {
            "txt" => files.log = Some(path),
            "meta.json" => files.meta = Some(path),
            _ => return Err(AnnotateError::UnexpectedFile { path }.into()),
        }
    }

    debug!("Indexed {} builds in {}", builds.len(), platform_dir.display());
    Ok(builds)
}

/// Read one build's log and metadata and parse them.
pub fn parse_buildlog(number: u32, files: &BuildFiles) -> Result<BuildRecord, AnnotateError> {
    let Some(log_path) = &files.log else {
        return Err(AnnotateError::MissingLog { build: number });
    };
    let log = fs::read_to_string(log_path).map_err(|source| AnnotateError::LogReadError {
        path: log_path.clone(),
        source,
    })?;

    // Very old builds have no meta.json.
    let meta = match &files.meta {
        Some(meta_path) => {
            let text = fs::read_to_string(meta_path).map_err(|source| {
                AnnotateError::MetaReadError {
                    path: meta_path.clone(),
                    source,
                }
            })?;
            let meta: Metadata =
                serde_json::from_str(&text).map_err(|source| AnnotateError::MetaParseError {
                    path: meta_path.clone(),
                    source,
                })?;
            Some(meta)
        }
        None => {
            warn!("Build {} has no metadata file", log_path.display());
            None
        }
    };

    parse_output(&log, meta)
}

/// Find the newest build that did real work, skipping no-op polls.
///
/// Returns `Ok(None)` when the directory holds only polls (or nothing).
pub fn newest_build(platform_dir: &Path) -> Result<Option<NewestBuild>> {
    let builds = index_builds(platform_dir)?;

    for (&number, files) in builds.iter().rev() {
        let record = parse_buildlog(number, files)
            .with_context(|| format!("Build {} in {}", number, platform_dir.display()))?;
        if record.is_no_commits() {
            debug!("Skipping no-op build {} in {}", number, platform_dir.display());
            continue;
        }
        let Some(log) = files.log.clone() else {
            return Err(AnnotateError::MissingLog { build: number }.into());
        };
        return Ok(Some(NewestBuild {
            number,
            log,
            record,
        }));
    }

    Ok(None)
}

/// Newest real build for every platform directory under `buildlog_dir`,
/// sorted by platform name.
pub fn platform_summaries(buildlog_dir: &Path) -> Result<Vec<PlatformSummary>> {
    let entries = fs::read_dir(buildlog_dir).map_err(|source| AnnotateError::DirReadError {
        path: buildlog_dir.to_path_buf(),
        source,
    })?;

    let mut platforms = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| AnnotateError::DirReadError {
            path: buildlog_dir.to_path_buf(),
            source,
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || !entry.path().is_dir() {
            continue;
        }
        platforms.push((name, entry.path()));
    }
    platforms.sort();

    let mut summaries = Vec::new();
    for (platform, dir) in platforms {
        match newest_build(&dir).with_context(|| format!("Platform {platform}"))? {
            Some(build) => summaries.push(PlatformSummary { platform, build }),
            None => debug!("Platform {platform} has only no-op builds"),
        }
    }

    Ok(summaries)
}
