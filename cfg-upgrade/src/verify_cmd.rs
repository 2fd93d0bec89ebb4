use anyhow::{bail, Result};
use cfg_upgrade::report::render_verify;
use cfg_upgrade::verify::verify_releases;
use cfgdiff_core::Format;

use crate::cli::{ReportFormat, VerifyArgs};

pub fn run_verify(args: VerifyArgs) -> Result<()> {
    let format = Format::from(args.file_type);
    let releases = args
        .files
        .iter()
        .map(|path| crate::load(format, path))
        .collect::<Result<Vec<_>>>()?;

    let report = verify_releases(&releases, args.consecutive);

    match args.format {
        ReportFormat::Text => println!("{}", render_verify(&report)),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if !report.ok() {
        bail!(
            "verify failed: {} of {} pairs",
            report.failures,
            report.pairs.len()
        );
    }
    Ok(())
}
