//! Release-to-release verification: every diff between two stock releases
//! must turn the older one into the newer one when patched back in.

use cfgdiff_core::{Config, ConflictPolicy, PatchMode};
use serde::Serialize;
use tracing::{debug, warn};

/// Outcome for one ordered pair of releases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairCheck {
    pub from: String,
    pub to: String,
    pub ok: bool,
    pub operations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub pairs: Vec<PairCheck>,
    pub failures: usize,
}

impl VerifyReport {
    pub fn ok(&self) -> bool {
        self.failures == 0
    }
}

/// Check every pair `i < j` of `releases` (oldest first), or only
/// neighbouring ones when `consecutive` is set.
pub fn verify_releases(releases: &[Config], consecutive: bool) -> VerifyReport {
    let mut pairs = Vec::new();
    for (i, from) in releases.iter().enumerate() {
        let later = &releases[i + 1..];
        let later = if consecutive {
            &later[..later.len().min(1)]
        } else {
            later
        };
        for to in later {
            pairs.push(check_pair(from, to));
        }
    }
    let failures = pairs.iter().filter(|pair| !pair.ok).count();
    VerifyReport { pairs, failures }
}

fn check_pair(from: &Config, to: &Config) -> PairCheck {
    let mut check = PairCheck {
        from: label(from),
        to: label(to),
        ok: false,
        operations: 0,
        error: None,
    };

    let operations = match from.diff(to) {
        Ok(operations) => operations.unwrap_or_default(),
        Err(err) => {
            check.error = Some(err.to_string());
            return check;
        }
    };
    check.operations = operations.len();

    let mut patched = from.clone();
    let policy = ConflictPolicy::new().with(PatchMode::Skip);
    match patched.patch(&operations, &policy) {
        Ok(report) => {
            if let Some(conflict) = report.first_conflict() {
                check.error = Some(conflict.to_string());
            } else if !patched.similar(to) {
                check.error = Some("patched result differs from the newer release".to_string());
            } else {
                check.ok = true;
            }
        }
        Err(err) => check.error = Some(err.to_string()),
    }

    if check.ok {
        debug!(from = %check.from, to = %check.to, operations = check.operations, "pair verified");
    } else {
        warn!(
            from = %check.from,
            to = %check.to,
            error = check.error.as_deref().unwrap_or_default(),
            "pair failed verification"
        );
    }
    check
}

fn label(config: &Config) -> String {
    config
        .name()
        .map(|name| name.display().to_string())
        .unwrap_or_else(|| "<unnamed>".to_string())
}
