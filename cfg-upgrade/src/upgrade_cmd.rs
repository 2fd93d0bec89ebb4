use anyhow::{bail, Context, Result};
use cfg_upgrade::manifest::{default_manifest, load_manifest};
use cfg_upgrade::report::render_upgrade;
use cfg_upgrade::upgrade::{self, UpgradeRoots};
use tracing::info;

use crate::cli::{ReportFormat, UpgradeArgs};

pub fn run_upgrade(args: UpgradeArgs) -> Result<()> {
    for (flag, dir) in [("--prefix", &args.prefix), ("--from", &args.from), ("--to", &args.to)] {
        if !dir.is_dir() {
            bail!("{flag} {} is not a directory", dir.display());
        }
    }

    let manifest = match &args.manifest {
        Some(path) => load_manifest(path)
            .with_context(|| format!("failed to load manifest {}", path.display()))?,
        None => default_manifest(),
    };
    let policy = args.policy.policy_or(manifest.default_policy());
    let roots = UpgradeRoots {
        prefix: args.prefix,
        old_stock: args.from,
        new_stock: args.to,
        backup_dir: args.backup_dir,
    };
    info!(files = manifest.files.len(), policy = %policy, "starting upgrade");

    let results = upgrade::run_upgrade(&manifest, &roots, &policy);

    match args.format {
        ReportFormat::Text => println!("{}", render_upgrade(&results)),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
    }

    let failed = results.iter().filter(|result| result.failed()).count();
    if failed > 0 {
        bail!("upgrade failed: {failed} of {} files", results.len());
    }
    Ok(())
}
