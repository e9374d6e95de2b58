//! Source discovery and object planning.

use crate::error::{BuildError, BuildResult};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Ordinary,
    /// The lower-level module built with its own compiler and flags.
    SpecialModule,
    /// The translation unit holding the alternate entry function.
    TestUnit,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Ordinary => "ordinary",
            Role::SpecialModule => "special-module",
            Role::TestUnit => "test-unit",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceFile {
    /// Relative to the discovery root, always `/`-separated.
    pub path: PathBuf,
    pub extension: String,
    pub role: Role,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, role: Role) -> Self {
        let path = path.into();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            path,
            extension,
            role,
        }
    }

    /// File name up to the first `.`: `src/foo.test.cpp` -> `foo`.
    pub fn base_name(&self) -> String {
        base_name(&self.path)
    }

    /// Where this file's object lands inside the staging directory.
    pub fn object_path(&self, staging_dir: &Path) -> PathBuf {
        staging_dir.join(format!("{}.o", self.base_name()))
    }
}

/// Leading dots belong to the name: `.hidden.cpp` -> `.hidden`.
pub fn base_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let (dots, rest) = name.split_at(name.len() - name.trim_start_matches('.').len());
    match rest.split_once('.') {
        Some((stem, _)) => format!("{}{}", dots, stem),
        None => name,
    }
}

/// Normalise to forward slashes regardless of host separator.
fn normalize(path: &Path) -> PathBuf {
    PathBuf::from(path.to_string_lossy().replace('\\', "/"))
}

/// Recursively find every file under `root` whose extension is `extension`.
///
/// Paths come back relative to `root`, sorted, so two runs over the same tree
/// agree entry for entry.
pub fn discover(root: &Path, extension: &str) -> BuildResult<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            BuildError::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == extension) {
            let rel = path.strip_prefix(root).unwrap_or(path);
            found.push(normalize(rel));
        }
    }
    found.sort();
    Ok(found)
}

/// Everything one build compiles, split by role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSet {
    /// Ordinary sources and the test unit, in discovery order.
    pub sources: Vec<SourceFile>,
    pub module: SourceFile,
}

impl SourceSet {
    /// Discover sources under `root` and attach the special module.
    ///
    /// `test_unit` is matched against base names exactly and case-sensitively.
    pub fn discover(
        root: &Path,
        extension: &str,
        module: &Path,
        test_unit: &str,
    ) -> BuildResult<Self> {
        let module_on_disk = if module.is_absolute() {
            module.to_path_buf()
        } else {
            root.join(module)
        };
        if !module_on_disk.is_file() {
            return Err(BuildError::MissingModule {
                path: module.to_path_buf(),
            });
        }

        let sources: Vec<SourceFile> = discover(root, extension)?
            .into_iter()
            .map(|path| {
                let role = if base_name(&path) == test_unit {
                    Role::TestUnit
                } else {
                    Role::Ordinary
                };
                SourceFile::new(path, role)
            })
            .collect();

        if sources.is_empty() {
            return Err(BuildError::NoSources {
                root: root.to_path_buf(),
                extension: extension.to_string(),
            });
        }

        let set = Self {
            sources,
            module: SourceFile::new(normalize(module), Role::SpecialModule),
        };
        set.check_object_names()?;
        Ok(set)
    }

    /// Every source, special module last.
    pub fn all(&self) -> impl Iterator<Item = &SourceFile> {
        self.sources.iter().chain(std::iter::once(&self.module))
    }

    pub fn test_unit(&self) -> Option<&SourceFile> {
        self.sources.iter().find(|s| s.role == Role::TestUnit)
    }

    /// One object per source: two files sharing a base name would silently
    /// overwrite each other's object.
    fn check_object_names(&self) -> BuildResult<()> {
        let mut seen: HashMap<String, &Path> = HashMap::new();
        for source in self.all() {
            let stem = source.base_name();
            if let Some(first) = seen.insert(stem.clone(), &source.path) {
                return Err(BuildError::DuplicateObject {
                    stem,
                    first: first.to_path_buf(),
                    second: source.path.clone(),
                });
            }
        }
        Ok(())
    }
}
