use crate::error::{BuildError, BuildResult};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Default config file looked up in the working directory.
pub const CONFIG_FILE: &str = "twinbin.toml";

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub build: BuildConfig,
    pub module: ModuleConfig,
    pub tests: TestConfig,
}

/// Ordinary translation units and the production link.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    pub compiler: String,
    /// Used for compiling every ordinary source and reused for both links.
    pub flags: Vec<String>,
    /// Extension (without the dot) of the sources to discover.
    pub extension: String,
    pub staging_dir: PathBuf,
    /// Production executable.
    pub output: PathBuf,
    /// Kill any tool that runs longer than this.
    pub timeout_secs: Option<u64>,
    /// Write `compile_commands.json` after compilation.
    pub compile_commands: bool,
}

/// The lower-level module compiled with its own compiler and flags.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ModuleConfig {
    pub path: PathBuf,
    pub compiler: String,
    pub flags: Vec<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TestConfig {
    pub enabled: bool,
    pub compiler: String,
    pub output: PathBuf,
    /// Base name of the test translation unit.
    pub unit: String,
    /// Base name of the unit that defines the production entry point. Unset
    /// means the entry symbol is renamed in every production object.
    pub entry_unit: Option<String>,
    /// Extra flags for the test unit only.
    pub unit_flags: Vec<String>,
    pub symbol_editor: String,
    pub entry_symbol: String,
    pub renamed_entry_symbol: String,
    pub test_symbol: String,
    /// Link the test unit's object into the production binary too.
    pub production_includes_unit: bool,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            compiler: "g++".to_string(),
            flags: strings(&[
                "-I.",
                "-I./examples",
                "-O3",
                "-DNDEBUG",
                "-std=c++11",
                "-fPIC",
                "-Wall",
                "-Wextra",
                "-Wpedantic",
                "-Wcast-qual",
                "-Wno-unused-function",
                "-pthread",
                "-march=native",
                "-mtune=native",
            ]),
            extension: "cpp".to_string(),
            staging_dir: PathBuf::from("temp_files"),
            output: PathBuf::from("main"),
            timeout_secs: None,
            compile_commands: false,
        }
    }
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("core.c"),
            compiler: "cc".to_string(),
            flags: strings(&[
                "-I.",
                "-O3",
                "-DNDEBUG",
                "-std=c11",
                "-fPIC",
                "-Wall",
                "-Wextra",
                "-Wpedantic",
                "-Wcast-qual",
                "-Wdouble-promotion",
                "-Wshadow",
                "-Wstrict-prototypes",
                "-Wpointer-arith",
                "-Wno-unused-function",
                "-pthread",
                "-march=native",
                "-mtune=native",
            ]),
        }
    }
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            compiler: "g++".to_string(),
            output: PathBuf::from("test"),
            unit: "tests".to_string(),
            entry_unit: None,
            unit_flags: strings(&["-Wno-implicit-function-declaration"]),
            symbol_editor: "objcopy".to_string(),
            entry_symbol: "main".to_string(),
            renamed_entry_symbol: "oldmain".to_string(),
            test_symbol: "test".to_string(),
            production_includes_unit: false,
        }
    }
}

impl Config {
    pub fn from_toml(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)
            .context("Failed to parse config - check for syntax errors or unknown keys")?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> BuildResult<()> {
        let required = [
            ("build.compiler", self.build.compiler.as_str()),
            ("build.extension", self.build.extension.as_str()),
            ("module.compiler", self.module.compiler.as_str()),
            ("tests.compiler", self.tests.compiler.as_str()),
            ("tests.unit", self.tests.unit.as_str()),
            ("tests.symbol_editor", self.tests.symbol_editor.as_str()),
            ("tests.entry_symbol", self.tests.entry_symbol.as_str()),
            ("tests.renamed_entry_symbol", self.tests.renamed_entry_symbol.as_str()),
            ("tests.test_symbol", self.tests.test_symbol.as_str()),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(BuildError::Config(format!("'{}' must not be empty", key)));
            }
        }

        if self
            .tests
            .entry_unit
            .as_deref()
            .is_some_and(|unit| unit.trim().is_empty())
        {
            return Err(BuildError::Config(
                "'tests.entry_unit' must not be empty when set".to_string(),
            ));
        }

        if self.build.extension.starts_with('.') {
            return Err(BuildError::Config(
                "'build.extension' is written without the leading dot".to_string(),
            ));
        }

        for (key, path) in [
            ("build.staging_dir", &self.build.staging_dir),
            ("build.output", &self.build.output),
            ("module.path", &self.module.path),
            ("tests.output", &self.tests.output),
        ] {
            if path.as_os_str().is_empty() {
                return Err(BuildError::Config(format!("'{}' must not be empty", key)));
            }
        }

        if self.build.output == self.tests.output {
            return Err(BuildError::Config(format!(
                "production and test executables are both named '{}'",
                self.build.output.display()
            )));
        }

        if self.build.timeout_secs == Some(0) {
            return Err(BuildError::Config(
                "'build.timeout_secs' must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Load the config.
///
/// An explicit path must exist. Without one, `twinbin.toml` is used when
/// present and the built-in defaults otherwise.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(p) => {
            if !p.exists() {
                return Err(anyhow::anyhow!("{} not found", p.display()));
            }
            p.to_path_buf()
        }
        None => {
            let default = PathBuf::from(CONFIG_FILE);
            if !default.exists() {
                return Ok(Config::default());
            }
            default
        }
    };

    let config_str = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {} - check file permissions", path.display()))?;
    let config = Config::from_toml(&config_str)
        .with_context(|| format!("Invalid config in {}", path.display()))?;
    config.validate()?;
    Ok(config)
}
