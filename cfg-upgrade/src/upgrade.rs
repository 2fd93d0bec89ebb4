//! Three-way upgrade of customized configuration files.
//!
//! The vendor's change-set between the old and new stock files is computed
//! with the differencer and replayed onto the customized file, so local edits
//! survive and conflicting ones are reported.

use std::fs;
use std::path::{Path, PathBuf};

use cfgdiff_core::{Config, ConfigError, ConflictPolicy, Format, PatchMode, PatchReport};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::backup::{backup, BackupError};
use crate::manifest::{ManagedFile, Manifest};

/// Apply the changes between `old_stock` and `new_stock` onto `customized`.
pub fn upgrade(
    customized: &mut Config,
    old_stock: &Config,
    new_stock: &Config,
    policy: &ConflictPolicy,
) -> Result<PatchReport, ConfigError> {
    match old_stock.diff(new_stock)? {
        Some(operations) => customized.patch(&operations, policy),
        None => Ok(PatchReport::default()),
    }
}

/// Walk `releases` (oldest first) and apply every consecutive diff in turn.
pub fn upgrade_chain(
    customized: &mut Config,
    releases: &[Config],
    policy: &ConflictPolicy,
) -> Result<Vec<PatchReport>, ConfigError> {
    let mut reports = Vec::with_capacity(releases.len().saturating_sub(1));
    for pair in releases.windows(2) {
        reports.push(upgrade(customized, &pair[0], &pair[1], policy)?);
    }
    Ok(reports)
}

/// Failure of a single file in a batch run.
#[derive(Debug, Error)]
pub enum UpgradeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Backup(#[from] BackupError),
}

/// Where the batch run finds and keeps its files.
#[derive(Debug, Clone)]
pub struct UpgradeRoots {
    /// Installation prefix holding the customized files.
    pub prefix: PathBuf,
    /// Stock files of the currently installed release.
    pub old_stock: PathBuf,
    /// Stock files of the release being upgraded to.
    pub new_stock: PathBuf,
    /// Backups of rewritten files land here, mirroring the prefix layout.
    pub backup_dir: Option<PathBuf>,
}

/// Progress of one file through the batch run. The last state reached is
/// reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    Unloaded,
    Loaded,
    Diffed,
    Patched,
    Saved,
    /// Copied from the new stock because the prefix had no such file.
    Installed,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileUpgrade {
    pub path: PathBuf,
    pub format: Format,
    pub state: FileState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<PatchReport>,
    /// Why the file was skipped, or the error that failed it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl FileUpgrade {
    fn new(file: &ManagedFile) -> Self {
        Self {
            path: file.path.clone(),
            format: file.format,
            state: FileState::Unloaded,
            report: None,
            reason: None,
        }
    }

    fn finish(mut self, state: FileState, reason: impl Into<String>) -> Self {
        self.state = state;
        self.reason = Some(reason.into());
        self
    }

    pub fn failed(&self) -> bool {
        self.state == FileState::Failed
    }

    pub fn changed(&self) -> bool {
        self.report.as_ref().is_some_and(PatchReport::changed)
    }

    /// Number of operations skipped because of a conflict.
    pub fn conflicts(&self) -> usize {
        self.report
            .as_ref()
            .map_or(0, |report| report.skipped().count())
    }
}

/// Upgrade every file in `manifest`. Files are independent: a failure is
/// recorded and the run moves on to the next file.
pub fn run_upgrade(
    manifest: &Manifest,
    roots: &UpgradeRoots,
    policy: &ConflictPolicy,
) -> Vec<FileUpgrade> {
    manifest
        .files
        .iter()
        .map(|file| {
            let outcome = upgrade_file(file, roots, policy);
            match outcome.state {
                FileState::Failed => warn!(
                    path = %outcome.path.display(),
                    reason = outcome.reason.as_deref().unwrap_or_default(),
                    "upgrade failed"
                ),
                state => info!(
                    path = %outcome.path.display(),
                    state = ?state,
                    conflicts = outcome.conflicts(),
                    "file processed"
                ),
            }
            outcome
        })
        .collect()
}

fn upgrade_file(file: &ManagedFile, roots: &UpgradeRoots, policy: &ConflictPolicy) -> FileUpgrade {
    let mut outcome = FileUpgrade::new(file);
    let target = roots.prefix.join(&file.path);
    let old_path = roots.old_stock.join(&file.path);
    let new_path = roots.new_stock.join(&file.path);
    let dummy = policy.contains(PatchMode::Dummy);

    match (target.is_file(), old_path.is_file(), new_path.is_file()) {
        (false, false, false) => outcome.finish(FileState::Skipped, "not present anywhere"),
        (_, _, false) if file.optional => {
            outcome.finish(FileState::Skipped, "not shipped by the new stock")
        }
        (true, false, true) if file.optional => {
            outcome.finish(FileState::Skipped, "not shipped by the old stock")
        }
        (false, _, true) => install(outcome, &new_path, &target, dummy),
        (false, true, false) => outcome.finish(FileState::Skipped, "dropped by the new stock"),
        (true, _, false) => outcome.finish(
            FileState::Failed,
            format!("missing from new stock {}", new_path.display()),
        ),
        (true, false, true) => outcome.finish(
            FileState::Failed,
            format!("missing from old stock {}", old_path.display()),
        ),
        (true, true, true) => {
            match three_way(&mut outcome, &target, &old_path, &new_path, roots, policy) {
                Ok(()) => outcome,
                Err(err) => {
                    let reason = err.to_string();
                    outcome.finish(FileState::Failed, reason)
                }
            }
        }
    }
}

fn install(outcome: FileUpgrade, from: &Path, to: &Path, dummy: bool) -> FileUpgrade {
    if dummy {
        return outcome.finish(FileState::Installed, "would be installed from new stock");
    }
    let copied = to
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|()| fs::copy(from, to).map(|_| ()));
    match copied {
        Ok(()) => outcome.finish(FileState::Installed, "installed from new stock"),
        Err(err) => outcome.finish(
            FileState::Failed,
            format!("failed to install {}: {err}", to.display()),
        ),
    }
}

fn three_way(
    outcome: &mut FileUpgrade,
    target: &Path,
    old_path: &Path,
    new_path: &Path,
    roots: &UpgradeRoots,
    policy: &ConflictPolicy,
) -> Result<(), UpgradeError> {
    let format = outcome.format;
    let mut customized = Config::new(format, target);
    let mut old_stock = Config::new(format, old_path);
    let mut new_stock = Config::new(format, new_path);
    customized.load()?;
    old_stock.load()?;
    new_stock.load()?;
    outcome.state = FileState::Loaded;

    let Some(operations) = old_stock.diff(&new_stock)? else {
        outcome.state = FileState::Diffed;
        outcome.report = Some(PatchReport::default());
        return Ok(());
    };
    outcome.state = FileState::Diffed;

    let report = customized.patch(&operations, policy)?;
    outcome.state = FileState::Patched;
    let changed = report.changed();
    outcome.report = Some(report);
    if !changed || policy.contains(PatchMode::Dummy) {
        return Ok(());
    }

    if let Some(dir) = &roots.backup_dir {
        backup(target, &dir.join(&outcome.path))?;
    }
    customized.save()?;
    outcome.state = FileState::Saved;
    Ok(())
}
