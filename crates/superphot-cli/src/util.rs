use anyhow::Result;
use std::path::{Path, PathBuf};

/// Fail early when an input table does not exist.
pub fn validate_input_file<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if !path.is_file() {
        anyhow::bail!("File does not exist: {}", path.display());
    }
    Ok(())
}

/// `<prefix>_results.txt`, keeping any directory part of the prefix.
pub fn results_path(prefix: &str) -> PathBuf {
    PathBuf::from(format!("{}_results.txt", prefix))
}
