use anyhow::{Context, Result};
use cfg_upgrade::backup::{backup, restore};
use cfg_upgrade::report::{render_summary, render_text};
use cfgdiff_core::{format_json, format_lines, Config, DiffOptions, Format, Path};
use clap::Parser;

mod cli;
mod logging;
mod path_guard;
mod patch_cmd;
mod upgrade_cmd;
mod verify_cmd;

use cli::{BackupArgs, Cli, Command, DiffArgs, OutputFormat, RestoreArgs};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Command::Diff(args) => run_diff(args),
        Command::Patch(args) => patch_cmd::run_patch(args),
        Command::Upgrade(args) => upgrade_cmd::run_upgrade(args),
        Command::Verify(args) => verify_cmd::run_verify(args),
        Command::Backup(args) => run_backup(args),
        Command::Restore(args) => run_restore(args),
    }
}

fn run_diff(args: DiffArgs) -> Result<()> {
    let format = Format::from(args.file_type);
    let old = load(format, &args.old)?;
    let new = load(format, &args.new)?;

    let ignore_paths = args
        .ignore
        .iter()
        .map(|raw| {
            raw.parse::<Path>()
                .with_context(|| format!("invalid --ignore path {raw:?}"))
        })
        .collect::<Result<Vec<_>>>()?;
    let opts = DiffOptions { ignore_paths };

    let operations = old
        .diff_with(&new, &opts)
        .with_context(|| {
            format!(
                "failed to diff {} against {}",
                args.old.display(),
                args.new.display()
            )
        })?
        .unwrap_or_default();

    if args.summary {
        println!("{}", render_summary(&operations));
        return Ok(());
    }

    match args.format {
        OutputFormat::Text if operations.is_empty() => println!("no differences"),
        OutputFormat::Text => println!("{}", render_text(&operations)),
        OutputFormat::Json => println!("{}", format_json(&operations)),
        OutputFormat::Line => println!("{}", format_lines(&operations)),
    }
    Ok(())
}

pub(crate) fn load(format: Format, path: &std::path::Path) -> Result<Config> {
    let mut config = Config::new(format, path);
    config
        .load()
        .with_context(|| format!("failed to load {}", path.display()))?;
    Ok(config)
}

fn run_backup(args: BackupArgs) -> Result<()> {
    backup(&args.source, &args.dest)
        .with_context(|| format!("failed to back up {}", args.source.display()))?;
    println!(
        "backed up {} to {}",
        args.source.display(),
        args.dest.display()
    );
    Ok(())
}

fn run_restore(args: RestoreArgs) -> Result<()> {
    restore(&args.backup, &args.target)
        .with_context(|| format!("failed to restore {}", args.target.display()))?;
    println!(
        "restored {} from {}",
        args.target.display(),
        args.backup.display()
    );
    Ok(())
}
