use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use cfg_upgrade::manifest::{default_manifest, Manifest};
use cfg_upgrade::report::render_patch_report;
use cfgdiff_core::{
    parse_file_lines, parse_json, Config, ConflictPolicy, EditOperation, FilePatch, Format,
    PatchMode, PatchReport,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::{PatchArgs, PatchFormat, ReportFormat};
use crate::path_guard::ensure_output_not_same;

/// Result of patching one file.
#[derive(Debug, Serialize)]
struct FileOutcome {
    file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<PatchReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip)]
    config: Option<Config>,
}

impl FileOutcome {
    fn complete(&self) -> bool {
        self.report
            .as_ref()
            .is_some_and(|report| report.skipped().next().is_none())
    }
}

pub fn run_patch(args: PatchArgs) -> Result<()> {
    let mut patches = read_patches(&args)?;
    if patches.is_empty() {
        if args.file.is_none() {
            bail!("patch document has no operations");
        }
        patches.push(FilePatch {
            file: None,
            operations: Vec::new(),
        });
    }
    if args.output.is_some() && patches.len() > 1 {
        bail!("--output needs a patch for a single file, found {}", patches.len());
    }

    let policy = args.policy.policy_or(ConflictPolicy::new());
    let manifest = default_manifest();
    let mut outcomes = Vec::new();
    for patch in &patches {
        let file = target_path(&args, patch.file.as_deref())?;
        if let Some(output) = &args.output {
            ensure_output_not_same(output, &[file.as_path()])?;
        }
        outcomes.push(patch_file(&args, &manifest, file, &patch.operations, &policy));
    }

    let failed = outcomes.iter().filter(|outcome| outcome.error.is_some()).count();
    let incomplete = outcomes.iter().filter(|outcome| !outcome.complete()).count();
    let hold_back = args.all && incomplete > 0;
    if hold_back {
        warn!(incomplete, "not every file patched cleanly, writing nothing");
    } else if !policy.contains(PatchMode::Dummy) {
        save_all(&args, &outcomes)?;
    }

    print_outcomes(&outcomes, args.format)?;

    if hold_back {
        bail!("{incomplete} of {} files did not patch cleanly; no file written", outcomes.len());
    }
    if failed > 0 {
        bail!("{failed} of {} files failed to patch", outcomes.len());
    }
    let skipped: usize = outcomes
        .iter()
        .filter_map(|outcome| outcome.report.as_ref())
        .map(|report| report.skipped().count())
        .sum();
    if args.strict && skipped > 0 {
        bail!("patch failed in strict mode: {skipped} operations skipped");
    }
    Ok(())
}

fn patch_file(
    args: &PatchArgs,
    manifest: &Manifest,
    file: PathBuf,
    operations: &[EditOperation],
    policy: &ConflictPolicy,
) -> FileOutcome {
    let patched = file_format(args, manifest, &file)
        .and_then(|format| crate::load(format, &file))
        .and_then(|mut config| {
            let report = config
                .patch(operations, policy)
                .with_context(|| format!("failed to patch {}", file.display()))?;
            Ok((config, report))
        });

    match patched {
        Ok((config, report)) => FileOutcome {
            file,
            report: Some(report),
            error: None,
            config: Some(config),
        },
        Err(err) => {
            let error = format!("{err:#}");
            warn!(file = %file.display(), %error, "file not patched");
            FileOutcome {
                file,
                report: None,
                error: Some(error),
                config: None,
            }
        }
    }
}

fn save_all(args: &PatchArgs, outcomes: &[FileOutcome]) -> Result<()> {
    for outcome in outcomes {
        let (Some(config), Some(report)) = (&outcome.config, &outcome.report) else {
            continue;
        };
        match &args.output {
            Some(output) => config
                .save_to(output)
                .with_context(|| format!("failed to write {}", output.display()))?,
            None if report.changed() => {
                config
                    .save()
                    .with_context(|| format!("failed to write {}", outcome.file.display()))?;
                info!(file = %outcome.file.display(), "patched");
            }
            None => {}
        }
    }
    Ok(())
}

fn print_outcomes(outcomes: &[FileOutcome], format: ReportFormat) -> Result<()> {
    if let [single] = outcomes {
        if let Some(report) = &single.report {
            match format {
                ReportFormat::Text => println!("{}", render_patch_report(report)),
                ReportFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
            }
            return Ok(());
        }
    }

    match format {
        ReportFormat::Text => {
            for outcome in outcomes {
                println!("{}", outcome.file.display());
                match (&outcome.report, &outcome.error) {
                    (Some(report), _) => println!("{}", render_patch_report(report)),
                    (None, Some(error)) => println!("error: {error}"),
                    (None, None) => {}
                }
            }
        }
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(outcomes)?),
    }
    Ok(())
}

/// Where the operations of one group land: the FILE argument for lines
/// without a file prefix, the named file (under `--prefix`) otherwise.
fn target_path(args: &PatchArgs, named: Option<&Path>) -> Result<PathBuf> {
    let Some(named) = named else {
        return args
            .file
            .clone()
            .ok_or_else(|| anyhow!("operations without a file prefix need a FILE argument"));
    };
    Ok(match &args.prefix {
        Some(prefix) => prefix.join(named.strip_prefix("/").unwrap_or(named)),
        None => named.to_path_buf(),
    })
}

fn file_format(args: &PatchArgs, manifest: &Manifest, file: &Path) -> Result<Format> {
    if let Some(file_type) = args.file_type {
        return Ok(Format::from(file_type));
    }
    manifest.format_of(file).ok_or_else(|| {
        anyhow!(
            "no --type given and {} is not a managed file",
            file.display()
        )
    })
}

fn read_patches(args: &PatchArgs) -> Result<Vec<FilePatch>> {
    let (raw, source) = match &args.patch {
        Some(path) => (
            fs::read_to_string(path)
                .with_context(|| format!("failed to read patch {}", path.display()))?,
            path.display().to_string(),
        ),
        None => {
            let mut raw = String::new();
            io::stdin()
                .read_to_string(&mut raw)
                .context("failed to read patch from stdin")?;
            (raw, "stdin".to_string())
        }
    };

    let patches = match args.patch_format {
        PatchFormat::Json => vec![FilePatch {
            file: None,
            operations: parse_json(&raw)
                .with_context(|| format!("invalid JSON patch document {source}"))?,
        }],
        PatchFormat::Line => parse_file_lines(&raw)
            .with_context(|| format!("invalid line patch document {source}"))?,
    };
    Ok(patches)
}
