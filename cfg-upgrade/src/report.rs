use cfgdiff_core::{format_summary, format_text, EditOperation, PatchReport, Status};
use colored::Colorize;

use crate::upgrade::{FileState, FileUpgrade};
use crate::verify::VerifyReport;

/// Render edit operations for terminal output.
pub fn render_text(operations: &[EditOperation]) -> String {
    let raw = format_text(operations);
    let mut out = Vec::new();

    for line in raw.lines() {
        let hunk = line.strip_prefix("  ").filter(|rest| !rest.starts_with("@@"));
        let marker = hunk.unwrap_or(line);
        let colored = if marker.starts_with("+++") || marker.starts_with("---") {
            line.bold().to_string()
        } else if marker.starts_with('+') {
            line.green().to_string()
        } else if marker.starts_with('-') {
            line.red().to_string()
        } else if line.starts_with('~') {
            line.yellow().to_string()
        } else {
            line.to_string()
        };
        out.push(colored);
    }

    out.join("\n")
}

/// Render operation counts for terminal output.
pub fn render_summary(operations: &[EditOperation]) -> String {
    format_summary(operations).cyan().to_string()
}

/// One line per operation of a patch run, followed by the counts.
pub fn render_patch_report(report: &PatchReport) -> String {
    let mut out = Vec::new();
    let (mut applied, mut unchanged, mut skipped) = (0, 0, 0);
    for entry in &report.entries {
        let line = format!("{:<9} {} {}", status_label(entry.status), entry.command, entry.path);
        let line = match (&entry.conflict, entry.mode) {
            (Some(conflict), _) => format!("{line}: {conflict}"),
            (None, Some(mode)) => format!("{line} ({mode})"),
            (None, None) => line,
        };
        out.push(match entry.status {
            Status::Applied => {
                applied += 1;
                line.green().to_string()
            }
            Status::Unchanged => {
                unchanged += 1;
                line
            }
            Status::Skipped => {
                skipped += 1;
                line.magenta().to_string()
            }
        });
    }
    out.push(
        format!("applied={applied} unchanged={unchanged} skipped={skipped}")
            .cyan()
            .to_string(),
    );
    out.join("\n")
}

fn status_label(status: Status) -> &'static str {
    match status {
        Status::Applied => "applied",
        Status::Unchanged => "unchanged",
        Status::Skipped => "skipped",
    }
}

/// Per-file results of a batch upgrade.
pub fn render_upgrade(results: &[FileUpgrade]) -> String {
    let mut out = Vec::new();
    for result in results {
        let state = format!("{:?}", result.state).to_lowercase();
        let mut line = format!("{state:<10} {} [{}]", result.path.display(), result.format);
        if let Some(report) = &result.report {
            let changes = report.entries.iter().filter(|e| e.changed()).count();
            line.push_str(&format!(" changes={changes} conflicts={}", result.conflicts()));
        }
        if let Some(reason) = &result.reason {
            line.push_str(&format!(": {reason}"));
        }
        out.push(match result.state {
            FileState::Failed => line.red().to_string(),
            FileState::Skipped => line.dimmed().to_string(),
            FileState::Saved | FileState::Installed => line.green().to_string(),
            _ if result.conflicts() > 0 => line.yellow().to_string(),
            _ => line,
        });
        if let Some(report) = &result.report {
            for entry in report.skipped() {
                let reason = entry
                    .conflict
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                out.push(
                    format!("  ! {} {}: {reason}", entry.command, entry.path)
                        .magenta()
                        .to_string(),
                );
            }
        }
    }
    let failed = results.iter().filter(|r| r.failed()).count();
    let changed = results
        .iter()
        .filter(|r| matches!(r.state, FileState::Saved | FileState::Installed))
        .count();
    out.push(
        format!("files={} changed={changed} failed={failed}", results.len())
            .cyan()
            .to_string(),
    );
    out.join("\n")
}

/// Pass/fail line per verified release pair.
pub fn render_verify(report: &VerifyReport) -> String {
    let mut out = Vec::new();
    for pair in &report.pairs {
        if pair.ok {
            out.push(
                format!("OK   {} -> {} ({} operations)", pair.from, pair.to, pair.operations)
                    .green()
                    .to_string(),
            );
        } else {
            let error = pair.error.as_deref().unwrap_or("unknown failure");
            out.push(
                format!("FAIL {} -> {}: {error}", pair.from, pair.to)
                    .red()
                    .to_string(),
            );
        }
    }
    out.push(
        format!("pairs={} failures={}", report.pairs.len(), report.failures)
            .cyan()
            .to_string(),
    );
    out.join("\n")
}
