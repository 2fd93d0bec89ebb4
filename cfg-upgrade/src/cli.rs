use std::path::PathBuf;

use cfgdiff_core::{ConflictPolicy, Format, PatchMode};
use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "cfg-upgrade")]
#[command(about = "Diff, patch and upgrade structured configuration files")]
pub struct Cli {
    /// Log debug details to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Compare two versions of a file and print the edit operations.
    Diff(DiffArgs),
    /// Apply a patch document to a file.
    Patch(PatchArgs),
    /// Upgrade every managed file under a prefix from one release to the next.
    Upgrade(UpgradeArgs),
    /// Check that diffs between release files patch cleanly.
    Verify(VerifyArgs),
    /// Copy a file or directory to a backup location.
    Backup(BackupArgs),
    /// Put a backup back in place.
    Restore(RestoreArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum FileType {
    Text,
    Shell,
    One,
    Yaml,
    YamlStrict,
}

impl From<FileType> for Format {
    fn from(value: FileType) -> Self {
        match value {
            FileType::Text => Format::Text,
            FileType::Shell => Format::Shell,
            FileType::One => Format::OneConf,
            FileType::Yaml => Format::Yaml,
            FileType::YamlStrict => Format::YamlStrict,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Line,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum PatchFormat {
    Json,
    Line,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
pub struct DiffArgs {
    pub old: PathBuf,
    pub new: PathBuf,
    #[arg(long = "type", value_enum)]
    pub file_type: FileType,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Print operation counts only.
    #[arg(long)]
    pub summary: bool,
    /// Paths left out of the comparison (repeatable).
    #[arg(long)]
    pub ignore: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct PatchArgs {
    /// File to patch. Optional for line patches whose lines name their file.
    pub file: Option<PathBuf>,
    /// Patch document; read from stdin when omitted.
    #[arg(long)]
    pub patch: Option<PathBuf>,
    /// File format. Looked up in the built-in manifest when omitted.
    #[arg(long = "type", value_enum)]
    pub file_type: Option<FileType>,
    /// Root under which file names from a line patch are resolved.
    #[arg(long)]
    pub prefix: Option<PathBuf>,
    /// Write no file unless every file patches without a skipped operation.
    #[arg(long)]
    pub all: bool,
    #[arg(long, value_enum, default_value_t = PatchFormat::Json)]
    pub patch_format: PatchFormat,
    #[command(flatten)]
    pub policy: PolicyArgs,
    /// Write the result here instead of back to FILE.
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Fail when any operation was skipped.
    #[arg(long)]
    pub strict: bool,
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

#[derive(Parser, Debug)]
pub struct UpgradeArgs {
    /// Installation prefix holding the customized files.
    #[arg(long)]
    pub prefix: PathBuf,
    /// Stock files of the installed release.
    #[arg(long)]
    pub from: PathBuf,
    /// Stock files of the target release.
    #[arg(long)]
    pub to: PathBuf,
    /// Managed files manifest. Defaults to the built-in one.
    #[arg(long)]
    pub manifest: Option<PathBuf>,
    #[command(flatten)]
    pub policy: PolicyArgs,
    /// Keep a copy of every rewritten file under this directory.
    #[arg(long)]
    pub backup_dir: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Release files, oldest first.
    #[arg(required = true, num_args = 2..)]
    pub files: Vec<PathBuf>,
    #[arg(long = "type", value_enum)]
    pub file_type: FileType,
    /// Only check neighbouring releases.
    #[arg(long)]
    pub consecutive: bool,
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

#[derive(Parser, Debug)]
pub struct BackupArgs {
    pub source: PathBuf,
    pub dest: PathBuf,
}

#[derive(Parser, Debug)]
pub struct RestoreArgs {
    pub backup: PathBuf,
    pub target: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct PolicyArgs {
    /// Conflict handling modes, comma separated: skip, force, replace.
    #[arg(long, value_delimiter = ',')]
    pub mode: Vec<PatchMode>,
    /// Report what would change without writing anything.
    #[arg(long)]
    pub noop: bool,
}

impl PolicyArgs {
    /// Modes from the command line, or `fallback` when none were given.
    pub fn policy_or(&self, fallback: ConflictPolicy) -> ConflictPolicy {
        let policy = if self.mode.is_empty() {
            fallback
        } else {
            self.mode.iter().copied().collect()
        };
        if self.noop {
            policy.with(PatchMode::Dummy)
        } else {
            policy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_are_comma_separated() {
        let cli = Cli::try_parse_from([
            "cfg-upgrade",
            "patch",
            "oned.conf",
            "--type",
            "one",
            "--mode",
            "skip,replace",
            "--noop",
        ])
        .expect("parse");
        let Command::Patch(args) = cli.command else {
            panic!("expected patch");
        };
        let policy = args.policy.policy_or(ConflictPolicy::new());
        assert!(policy.contains(PatchMode::Skip));
        assert!(policy.contains(PatchMode::Replace));
        assert!(policy.contains(PatchMode::Dummy));
        assert_eq!(args.file_type.map(Format::from), Some(Format::OneConf));
        assert!(!args.all);
    }

    #[test]
    fn multi_file_patch_needs_no_file_argument() {
        let cli = Cli::try_parse_from([
            "cfg-upgrade",
            "patch",
            "--patch-format",
            "line",
            "--prefix",
            "/tmp/root",
            "--all",
        ])
        .expect("parse");
        let Command::Patch(args) = cli.command else {
            panic!("expected patch");
        };
        assert_eq!(args.file, None);
        assert_eq!(args.file_type, None);
        assert_eq!(args.prefix, Some(PathBuf::from("/tmp/root")));
        assert!(args.all);
    }

    #[test]
    fn manifest_defaults_apply_without_modes() {
        let args = PolicyArgs {
            mode: Vec::new(),
            noop: false,
        };
        let policy = args.policy_or(ConflictPolicy::new().with(PatchMode::Force));
        assert!(policy.contains(PatchMode::Force));
    }

    #[test]
    fn verify_needs_two_files() {
        let err = Cli::try_parse_from(["cfg-upgrade", "verify", "--type", "shell", "a"]);
        assert!(err.is_err());
    }
}
