use std::fs;
use std::path::{Component, Path, PathBuf};

use cfgdiff_core::{ConflictPolicy, Format, PatchMode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One configuration file the upgrade run is responsible for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedFile {
    /// Location relative to the installation prefix and the stock trees.
    pub path: PathBuf,
    pub format: Format,
    /// Not shipped by every release.
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    /// Patch modes used when the command line names none.
    #[serde(default)]
    pub modes: Vec<PatchMode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default, rename = "file")]
    pub files: Vec<ManagedFile>,
}

impl Manifest {
    pub fn default_policy(&self) -> ConflictPolicy {
        self.defaults.modes.iter().copied().collect()
    }

    /// Format of the managed file at `path`, which may be given relative to
    /// the prefix or as an absolute installed location.
    pub fn format_of(&self, path: &Path) -> Option<Format> {
        let relative: PathBuf = path
            .components()
            .filter(|component| matches!(component, Component::Normal(_)))
            .collect();
        self.files
            .iter()
            .find(|file| relative.ends_with(&file.path))
            .map(|file| file.format)
    }
}

/// Errors returned when loading manifest files.
#[derive(Debug, Error)]
pub enum ManifestLoadError {
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse manifest {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("manifest {path} lists {entry}, which is not a relative path inside the prefix")]
    InvalidPath { path: String, entry: String },
}

/// Load a manifest from a TOML file.
pub fn load_manifest(path: &Path) -> Result<Manifest, ManifestLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| ManifestLoadError::Io {
        path: path.display().to_string(),
        source,
    })?;

    parse_manifest(&raw, path.display().to_string())
}

/// Built-in manifest.
pub fn default_manifest() -> Manifest {
    let embedded = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/manifest/files.toml"
    ));
    match parse_manifest(embedded, "embedded manifest".to_string()) {
        Ok(manifest) if !manifest.files.is_empty() => manifest,
        _ => fallback_manifest(),
    }
}

fn parse_manifest(raw: &str, path: String) -> Result<Manifest, ManifestLoadError> {
    let parsed: Manifest = toml::from_str(raw).map_err(|source| ManifestLoadError::Parse {
        path: path.clone(),
        source,
    })?;
    for file in &parsed.files {
        if !is_contained(&file.path) {
            return Err(ManifestLoadError::InvalidPath {
                path,
                entry: file.path.display().to_string(),
            });
        }
    }
    Ok(parsed)
}

fn is_contained(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

fn fallback_manifest() -> Manifest {
    Manifest {
        defaults: Defaults::default(),
        files: vec![
            ManagedFile {
                path: PathBuf::from("etc/one/oned.conf"),
                format: Format::OneConf,
                optional: false,
            },
            ManagedFile {
                path: PathBuf::from("etc/one/sunstone-server.conf"),
                format: Format::Yaml,
                optional: false,
            },
            ManagedFile {
                path: PathBuf::from("var/lib/one/remotes/etc/vmm/kvm/kvmrc"),
                format: Format::Shell,
                optional: false,
            },
        ],
    }
}
