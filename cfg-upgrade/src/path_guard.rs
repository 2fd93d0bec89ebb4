use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

/// Refuse an `--output` that resolves to one of the inputs.
pub fn ensure_output_not_same(output: &Path, inputs: &[&Path]) -> Result<()> {
    let out_norm = normalize_for_compare(output)
        .with_context(|| format!("failed to normalize output path {}", output.display()))?;

    for input in inputs {
        let in_norm = normalize_for_compare(input)
            .with_context(|| format!("failed to normalize input path {}", input.display()))?;
        if out_norm == in_norm {
            bail!(
                "refusing to overwrite the patched file: output {} matches input {}; \
                 omit --output to patch in place",
                output.display(),
                input.display()
            );
        }
    }
    Ok(())
}

fn normalize_for_compare(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return path
            .canonicalize()
            .with_context(|| format!("canonicalize {}", path.display()));
    }

    // `..` is not resolved for paths that do not exist yet.
    let base = if path.is_absolute() {
        PathBuf::new()
    } else {
        std::env::current_dir().context("current_dir")?
    };

    Ok(base.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn same_file_through_another_spelling_is_refused() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("kvmrc");
        std::fs::write(&file, "A=1\n").expect("write");
        let other = dir.path().join(".").join("kvmrc");
        assert!(ensure_output_not_same(&other, &[&file]).is_err());
    }

    #[test]
    fn new_output_is_accepted() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("kvmrc");
        std::fs::write(&file, "A=1\n").expect("write");
        ensure_output_not_same(&dir.path().join("kvmrc.new"), &[&file]).expect("distinct paths");
    }
}
