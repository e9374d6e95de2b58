use super::compile::{CompileStage, CompiledObject};
use super::link::LinkStage;
use super::patch::TestPatchStage;
use super::sources::SourceSet;
use super::staging::StagingArea;
use crate::config::Config;
use crate::error::{BuildError, BuildResult};
use crate::toolchain::ToolRunner;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// What a successful build produced.
#[derive(Debug)]
pub struct BuildReport {
    pub objects: Vec<CompiledObject>,
    pub production: PathBuf,
    /// Present only when the test pass ran.
    pub test: Option<PathBuf>,
    pub elapsed: Duration,
}

/// Runs the pipeline for one project root:
/// discover, compile sources, compile the module, link, then optionally patch
/// and link the test binary.
pub struct BuildDriver<R: ToolRunner> {
    config: Config,
    root: PathBuf,
    runner: R,
    dry_run: bool,
}

impl<R: ToolRunner> BuildDriver<R> {
    pub fn new(config: Config, root: impl Into<PathBuf>, runner: R) -> Self {
        Self {
            config,
            root: root.into(),
            runner,
            dry_run: false,
        }
    }

    /// Plan without creating, deleting or patching anything on disk.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn into_runner(self) -> R {
        self.runner
    }

    fn staging_dir(&self) -> PathBuf {
        self.root.join(&self.config.build.staging_dir)
    }

    fn discover(&self) -> BuildResult<SourceSet> {
        SourceSet::discover(
            &self.root,
            &self.config.build.extension,
            &self.config.module.path,
            &self.config.tests.unit,
        )
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if self.dry_run {
            return ProgressBar::hidden();
        }
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        let pb = ProgressBar::new(len as u64);
        pb.set_style(style);
        pb
    }

    /// Link-stage failures wipe the staging area; compile failures don't.
    fn fail_link(&self, staging: &StagingArea, err: BuildError) -> BuildError {
        println!("{} {}", "x".red(), err);
        if let Err(cleanup_err) = staging.clear() {
            println!(
                "{} Could not clean {}: {}",
                "!".yellow(),
                staging.dir().display(),
                cleanup_err
            );
        }
        err
    }

    /// Run the whole pipeline once. Every source is recompiled.
    pub fn run(&mut self) -> BuildResult<BuildReport> {
        let start = Instant::now();
        self.config.validate()?;

        let staging = if self.dry_run {
            StagingArea::planned(self.staging_dir())
        } else {
            StagingArea::prepare(self.staging_dir())?
        };

        let set = self.discover()?;

        let objects = {
            let pb = self.progress_bar(set.all().count());
            pb.set_message("Compiling...");
            let stage = CompileStage::new(&self.config, &self.root, &staging);
            let mut objects = stage.compile_all(&mut self.runner, &set.sources, &pb)?;
            objects.push(stage.compile_one(&mut self.runner, &set.module, &pb)?);
            pb.finish_and_clear();
            objects
        };
        println!("{} compilation completed successfully", "✓".green());

        // Every object was just rewritten, so none carries renamed symbols.
        staging.clear_patched()?;

        if self.config.build.compile_commands && !self.dry_run {
            write_compile_commands(&self.root, &objects)?;
        }

        let production = LinkStage::new(&self.config, &self.root, &staging)
            .link(&mut self.runner, &objects)
            .map_err(|e| self.fail_link(&staging, e))?;

        let test = if self.config.tests.enabled {
            let out = TestPatchStage::new(&self.config, &self.root, &staging)
                .run(&mut self.runner, &objects)
                .map_err(|e| self.fail_link(&staging, e))?;
            Some(out)
        } else {
            None
        };

        let elapsed = start.elapsed();
        println!("{} Build finished in {:.2?}", "✓".green(), elapsed);

        Ok(BuildReport {
            objects,
            production,
            test,
            elapsed,
        })
    }

    /// Link the production binary from the objects a previous build staged,
    /// without compiling.
    ///
    /// Refused once the test pass has rewritten the objects.
    pub fn relink(&mut self) -> BuildResult<PathBuf> {
        self.config.validate()?;
        let staging = if self.dry_run {
            StagingArea::planned(self.staging_dir())
        } else {
            StagingArea::open(self.staging_dir())?
        };
        let set = self.discover()?;

        let compile = CompileStage::new(&self.config, &self.root, &staging);
        let objects: Vec<CompiledObject> = set
            .all()
            .map(|source| CompiledObject {
                path: source.object_path(staging.dir()),
                invocation: compile.invocation_for(source),
                source: source.clone(),
            })
            .collect();

        if !self.dry_run
            && let Some(missing) = objects.iter().find(|o| !o.path.exists())
        {
            return Err(BuildError::io(
                &missing.path,
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "object not staged; run a full build first",
                ),
            ));
        }

        LinkStage::new(&self.config, &self.root, &staging)
            .link(&mut self.runner, &objects)
            .map_err(|e| match e {
                BuildError::StalePatchedObjects { .. } => e,
                other => self.fail_link(&staging, other),
            })
    }
}

/// Write a clang-style compilation database for the compiled objects.
pub fn write_compile_commands(root: &Path, objects: &[CompiledObject]) -> BuildResult<()> {
    let directory = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let directory = directory.to_string_lossy().to_string();

    let entries: Vec<serde_json::Value> = objects
        .iter()
        .map(|obj| {
            json!({
                "directory": directory,
                "command": obj.invocation.command_line(),
                "file": obj.source.path.to_string_lossy(),
                "output": obj.path.to_string_lossy(),
            })
        })
        .collect();

    let path = root.join("compile_commands.json");
    let json_str = serde_json::to_string_pretty(&entries)
        .map_err(|e| BuildError::io(&path, std::io::Error::other(e)))?;
    fs::write(&path, json_str).map_err(|e| BuildError::io(&path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::sources::{Role, SourceFile};
    use crate::toolchain::ToolInvocation;

    #[test]
    fn compile_commands_has_one_entry_per_object() {
        let dir = tempfile::tempdir().unwrap();
        let objects = vec![CompiledObject {
            source: SourceFile::new("a.cpp", Role::Ordinary),
            path: PathBuf::from("temp_files/a.o"),
            invocation: ToolInvocation::new("g++").args(["-c", "a.cpp", "-o", "temp_files/a.o"]),
        }];
        write_compile_commands(dir.path(), &objects).unwrap();

        let text = fs::read_to_string(dir.path().join("compile_commands.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        let entries = parsed.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["file"], "a.cpp");
        assert_eq!(entries[0]["command"], "g++ -c a.cpp -o temp_files/a.o");
    }
}
