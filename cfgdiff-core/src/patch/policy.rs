use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One conflict-handling behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchMode {
    /// Validate on a scratch copy; the target is never touched.
    Dummy,
    /// Record conflicting operations as skipped and keep going.
    Skip,
    /// Coerce the target into the expected shape.
    Force,
    /// Install new subtrees wholesale instead of merging.
    Replace,
}

impl Display for PatchMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            PatchMode::Dummy => "dummy",
            PatchMode::Skip => "skip",
            PatchMode::Force => "force",
            PatchMode::Replace => "replace",
        };
        write!(f, "{name}")
    }
}

impl FromStr for PatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dummy" | "noop" => Ok(PatchMode::Dummy),
            "skip" => Ok(PatchMode::Skip),
            "force" => Ok(PatchMode::Force),
            "replace" => Ok(PatchMode::Replace),
            other => Err(format!("unknown patch mode {other:?}")),
        }
    }
}

/// Set of [`PatchMode`]s for one patch invocation. The empty set is the
/// default best-effort behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConflictPolicy {
    modes: BTreeSet<PatchMode>,
}

impl ConflictPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, mode: PatchMode) -> Self {
        self.modes.insert(mode);
        self
    }

    pub fn contains(&self, mode: PatchMode) -> bool {
        self.modes.contains(&mode)
    }

    pub fn is_default(&self) -> bool {
        self.modes.is_empty()
    }

    pub fn modes(&self) -> impl Iterator<Item = PatchMode> + '_ {
        self.modes.iter().copied()
    }
}

impl FromIterator<PatchMode> for ConflictPolicy {
    fn from_iter<I: IntoIterator<Item = PatchMode>>(iter: I) -> Self {
        Self {
            modes: iter.into_iter().collect(),
        }
    }
}

impl Display for ConflictPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.modes.is_empty() {
            return write!(f, "default");
        }
        let names: Vec<String> = self.modes.iter().map(ToString::to_string).collect();
        write!(f, "{}", names.join(","))
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty() && *part != "default")
            .map(str::parse::<PatchMode>)
            .collect()
    }
}
