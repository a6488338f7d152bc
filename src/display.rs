use owo_colors::{OwoColorize, Stream};
use serde::Serialize;

use crate::types::{BuildOutcome, BuildRecord, BuildStatus, Completion, NewestBuild, PlatformSummary};

/// Format seconds compactly: "42s", "3m05s", "1h02m".
pub fn format_elapsed(secs: f64) -> String {
    let secs = secs.max(0.0).round() as u64;
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Total build time: the metadata's figure if it has one, else the step sum.
pub fn total_elapsed(build: &NewestBuild) -> Option<f64> {
    if let Ok(Some(total)) = build.record.meta.elapsed_s() {
        return Some(total);
    }
    build
        .record
        .steps()
        .iter()
        .map(|s| s.elapsed_s)
        .sum::<Option<f64>>()
}

/// The step an abnormal build stopped in.
pub fn failing_step(build: &NewestBuild) -> Option<&str> {
    match &build.record.outcome {
        BuildOutcome::Steps {
            completion: Completion::Abnormal,
            steps,
        } => steps.last().map(|s| s.name.as_str()),
        _ => None,
    }
}

fn status_word(status: BuildStatus) -> String {
    let word = status.to_string();
    match status {
        BuildStatus::Passing => word
            .if_supports_color(Stream::Stdout, |s| s.green())
            .to_string(),
        BuildStatus::Failing => word
            .if_supports_color(Stream::Stdout, |s| s.red())
            .to_string(),
    }
}

/// One "<platform> passing|failing" line per platform.
pub fn format_summary(summaries: &[PlatformSummary], details: bool) -> String {
    let mut out = String::new();
    for summary in summaries {
        let Some(status) = summary.build.record.status() else {
            continue;
        };
        out.push_str(&summary.platform);
        out.push(' ');
        out.push_str(&status_word(status));

        if details {
            out.push_str(&format_details(&summary.build));
        }
        out.push('\n');
    }
    out
}

fn format_details(build: &NewestBuild) -> String {
    let mut parts = vec![format!("#{}", build.number)];
    if let Some(first) = build.record.steps().first() {
        parts.push(format!("started {}", first.start));
    }
    if let Some(total) = total_elapsed(build) {
        parts.push(format!("took {}", format_elapsed(total)));
    }
    if let Some(step) = failing_step(build) {
        parts.push(format!("in step '{}'", step));
    }
    parts.push(build.log.display().to_string());

    let joined = parts.join(", ");
    format!(
        " ({})",
        joined.if_supports_color(Stream::Stdout, |s| s.dimmed())
    )
}

#[derive(Serialize)]
struct JsonPlatform<'a> {
    platform: &'a str,
    build: u32,
    status: Option<BuildStatus>,
    log: String,
    record: &'a BuildRecord,
}

pub fn format_json(summaries: &[PlatformSummary]) -> String {
    let platforms: Vec<JsonPlatform> = summaries
        .iter()
        .map(|summary| JsonPlatform {
            platform: &summary.platform,
            build: summary.build.number,
            status: summary.build.record.status(),
            log: summary.build.log.to_string_lossy().to_string(),
            record: &summary.build.record,
        })
        .collect();

    serde_json::to_string_pretty(&platforms).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::parse_output;
    use std::path::PathBuf;

    fn summary(platform: &str, number: u32, log: &str, meta: serde_json::Value) -> PlatformSummary {
        let record = parse_output(log, Some(serde_json::from_value(meta).unwrap())).unwrap();
        PlatformSummary {
            platform: platform.to_string(),
            build: NewestBuild {
                number,
                log: PathBuf::from(format!("/logs/{platform}/{number}.txt")),
                record,
            },
        }
    }

    const PASSING_LOG: &str = concat!(
        "INFO:2020-01-01T00:00:00Z:root:building\n",
        "ok\n",
        "INFO:2020-01-01T00:02:05Z:root:done\n",
    );

    const FAILING_LOG: &str = concat!(
        "INFO:2020-01-01T00:00:00Z:root:building\n",
        "ok\n",
        "INFO:2020-01-01T00:00:40Z:root:testing\n",
        "FAIL\n",
    );

    // ---- format_elapsed tests ----

    #[test]
    fn elapsed_seconds() {
        assert_eq!(format_elapsed(0.0), "0s");
        assert_eq!(format_elapsed(59.4), "59s");
    }

    #[test]
    fn elapsed_minutes() {
        assert_eq!(format_elapsed(60.0), "1m00s");
        assert_eq!(format_elapsed(125.0), "2m05s");
    }

    #[test]
    fn elapsed_hours() {
        assert_eq!(format_elapsed(3600.0), "1h00m");
        assert_eq!(format_elapsed(3725.0), "1h02m");
    }

    #[test]
    fn elapsed_negative_clamps_to_zero() {
        assert_eq!(format_elapsed(-5.0), "0s");
    }

    // ---- format_summary tests ----

    #[test]
    fn summary_lines() {
        let summaries = vec![
            summary("linux", 4, FAILING_LOG, serde_json::json!({"exit_code": 1})),
            summary("mac", 7, PASSING_LOG, serde_json::json!({"exit_code": 0})),
        ];
        assert_eq!(format_summary(&summaries, false), "linux failing\nmac passing\n");
    }

    #[test]
    fn summary_details_for_failing_build() {
        let summaries = vec![summary(
            "linux",
            4,
            FAILING_LOG,
            serde_json::json!({"exit_code": 1, "elapsed_s": 100}),
        )];
        let out = format_summary(&summaries, true);
        assert!(out.starts_with("linux failing ("));
        assert!(out.contains("#4"));
        assert!(out.contains("started 2020-01-01T00:00:00Z"));
        assert!(out.contains("took 1m40s"));
        assert!(out.contains("in step 'testing'"));
        assert!(out.contains("/logs/linux/4.txt"));
    }

    #[test]
    fn summary_details_for_passing_build_sums_steps() {
        let summaries = vec![summary("mac", 7, PASSING_LOG, serde_json::json!({"exit_code": 0}))];
        let out = format_summary(&summaries, true);
        assert!(out.contains("took 2m05s"));
        assert!(!out.contains("in step"));
    }

    #[test]
    fn unknown_last_step_time_omits_total() {
        let summaries = vec![summary("linux", 1, FAILING_LOG, serde_json::json!({"exit_code": 1}))];
        let build = &summaries[0].build;
        assert_eq!(total_elapsed(build), None);
        assert_eq!(failing_step(build), Some("testing"));
    }

    // ---- format_json tests ----

    #[test]
    fn json_output() {
        let summaries = vec![summary(
            "mac",
            7,
            PASSING_LOG,
            serde_json::json!({"exit_code": 0, "elapsed_s": 125}),
        )];
        let parsed: serde_json::Value = serde_json::from_str(&format_json(&summaries)).unwrap();
        let arr = parsed.as_array().unwrap();
        assert_eq!(arr.len(), 1);
        assert_eq!(arr[0]["platform"], "mac");
        assert_eq!(arr[0]["build"], 7);
        assert_eq!(arr[0]["status"], "passing");
        assert_eq!(arr[0]["log"], "/logs/mac/7.txt");
        assert_eq!(arr[0]["record"]["elapsed_s"], 125);
        assert_eq!(arr[0]["record"]["steps"][0]["name"], "building");
    }

    #[test]
    fn json_empty() {
        assert_eq!(format_json(&[]), "[]");
    }
}
