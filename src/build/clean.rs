//! Build artifact cleanup.
//!
//! - `twinbin clean` - Remove the staging directory
//! - `twinbin clean --all` - Also remove both executables and `compile_commands.json`

use crate::config::Config;
use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::path::Path;

/// Returns whether anything was removed.
pub fn clean(config: &Config, root: &Path, all: bool) -> Result<bool> {
    let mut cleaned = false;

    let staging = root.join(&config.build.staging_dir);
    if staging.exists() {
        fs::remove_dir_all(&staging)
            .with_context(|| format!("Failed to remove {}", staging.display()))?;
        println!("{} Removed {}/", "🗑️".red(), config.build.staging_dir.display());
        cleaned = true;
    }

    if all {
        for file in [
            config.build.output.as_path(),
            config.tests.output.as_path(),
            Path::new("compile_commands.json"),
        ] {
            let path = root.join(file);
            if path.is_file() {
                fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
                println!("{} Removed {}", "🗑️".red(), file.display());
                cleaned = true;
            }
        }
    }

    if cleaned {
        println!("{} Clean complete.", "✓".green());
    } else {
        println!("{} Nothing to clean", "!".yellow());
    }
    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        fs::create_dir_all(dir.path().join("temp_files")).unwrap();
        fs::write(dir.path().join("temp_files/a.o"), "").unwrap();
        fs::write(dir.path().join("main"), "").unwrap();
        fs::write(dir.path().join("test"), "").unwrap();
        (dir, config)
    }

    #[test]
    fn default_clean_keeps_executables() {
        let (dir, config) = populated();
        assert!(clean(&config, dir.path(), false).unwrap());
        assert!(!dir.path().join("temp_files").exists());
        assert!(dir.path().join("main").exists());
    }

    #[test]
    fn clean_all_removes_outputs() {
        let (dir, config) = populated();
        assert!(clean(&config, dir.path(), true).unwrap());
        assert!(!dir.path().join("main").exists());
        assert!(!dir.path().join("test").exists());
    }

    #[test]
    fn nothing_to_clean() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!clean(&Config::default(), dir.path(), true).unwrap());
    }
}
