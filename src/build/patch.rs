//! Test binary derivation by entry-symbol swapping.
//!
//! The production objects are reused as-is and edited in place. `main`
//! becomes `oldmain` in every production object (or only in the configured
//! entry unit), then the test unit's `test` becomes `main`. Relinking the full
//! set yields an executable that starts in the test entry function. The
//! renames are ordered: renaming `test` first would leave two definitions of
//! `main` in the object set. Objects without the symbol are left unchanged by
//! the editor.

use super::compile::CompiledObject;
use super::link::{link_invocation, run_link};
use super::sources::Role;
use super::staging::StagingArea;
use crate::config::Config;
use crate::error::{BuildError, BuildResult};
use crate::toolchain::{ToolInvocation, ToolRunner};
use colored::*;
use std::path::{Path, PathBuf};

/// `<editor> --redefine-sym <from>=<to> <object>`
pub fn rename_invocation(editor: &str, from: &str, to: &str, object: &Path) -> ToolInvocation {
    ToolInvocation::new(editor)
        .arg("--redefine-sym")
        .arg(format!("{}={}", from, to))
        .path_arg(object)
}

/// One in-place symbol rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRename {
    pub object: PathBuf,
    pub from: String,
    pub to: String,
}

impl SymbolRename {
    fn apply<R: ToolRunner>(&self, runner: &mut R, editor: &str) -> BuildResult<()> {
        let inv = rename_invocation(editor, &self.from, &self.to, &self.object);
        let status = runner.run(&inv)?;
        if status.success {
            return Ok(());
        }
        println!(
            "{} could not rename {} in {}",
            "x".red(),
            self.from,
            self.object.display()
        );
        Err(BuildError::SymbolPatch {
            object: self.object.clone(),
            from: self.from.clone(),
            to: self.to.clone(),
            reason: match status.code {
                Some(c) => format!("{} exited with code {}", editor, c),
                None => format!("{} terminated by signal", editor),
            },
        })
    }
}

pub struct TestPatchStage<'a> {
    config: &'a Config,
    root: &'a Path,
    staging: &'a StagingArea,
}

impl<'a> TestPatchStage<'a> {
    pub fn new(config: &'a Config, root: &'a Path, staging: &'a StagingArea) -> Self {
        Self {
            config,
            root,
            staging,
        }
    }

    pub fn output(&self) -> PathBuf {
        self.root.join(&self.config.tests.output)
    }

    /// Renames in the order they must be applied: the entry symbol in each
    /// production object (sorted by path), then the test symbol last.
    pub fn renames(&self, objects: &[CompiledObject]) -> BuildResult<Vec<SymbolRename>> {
        let tests = &self.config.tests;

        let mut entries: Vec<&CompiledObject> = objects
            .iter()
            .filter(|o| o.source.role != Role::TestUnit)
            .filter(|o| {
                tests
                    .entry_unit
                    .as_deref()
                    .is_none_or(|unit| o.source.base_name() == unit)
            })
            .collect();
        if entries.is_empty() {
            let base = tests.entry_unit.as_deref().unwrap_or(&tests.entry_symbol);
            return Err(self.not_staged(base, &tests.entry_symbol, &tests.renamed_entry_symbol));
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        let unit = objects
            .iter()
            .find(|o| o.source.role == Role::TestUnit)
            .ok_or_else(|| self.not_staged(&tests.unit, &tests.test_symbol, &tests.entry_symbol))?;

        let mut renames: Vec<SymbolRename> = entries
            .into_iter()
            .map(|o| SymbolRename {
                object: o.path.clone(),
                from: tests.entry_symbol.clone(),
                to: tests.renamed_entry_symbol.clone(),
            })
            .collect();
        renames.push(SymbolRename {
            object: unit.path.clone(),
            from: tests.test_symbol.clone(),
            to: tests.entry_symbol.clone(),
        });
        Ok(renames)
    }

    fn not_staged(&self, base: &str, from: &str, to: &str) -> BuildError {
        BuildError::SymbolPatch {
            object: self.staging.dir().join(format!("{}.o", base)),
            from: from.to_string(),
            to: to.to_string(),
            reason: "object was not produced by this build".to_string(),
        }
    }

    /// Every staged object, test unit included, sorted by path.
    pub fn test_objects(&self, objects: &[CompiledObject]) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = objects.iter().map(|o| o.path.clone()).collect();
        paths.sort();
        paths
    }

    pub fn link_invocation(&self, objects: &[CompiledObject]) -> ToolInvocation {
        link_invocation(
            &self.config.tests.compiler,
            &self.test_objects(objects),
            &self.config.build.flags,
            &self.output(),
        )
    }

    /// Apply every rename, then link the test executable.
    ///
    /// Must run after the production link: the staged objects are no longer
    /// fit for it afterwards.
    pub fn run<R: ToolRunner>(
        &self,
        runner: &mut R,
        objects: &[CompiledObject],
    ) -> BuildResult<PathBuf> {
        let renames = self.renames(objects)?;

        println!("   {} Patching entry symbols...", "🧪".magenta());
        self.staging.mark_patched()?;
        for rename in &renames {
            rename.apply(runner, &self.config.tests.symbol_editor)?;
        }

        println!(
            "   {} Linking {}...",
            "🔗".cyan(),
            self.config.tests.output.display()
        );
        run_link(runner, &self.link_invocation(objects))?;
        Ok(self.output())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::sources::SourceFile;
    use crate::toolchain::ToolStatus;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<ToolInvocation>,
        fail_program: Option<&'static str>,
    }

    impl ToolRunner for Recorder {
        fn run(&mut self, invocation: &ToolInvocation) -> BuildResult<ToolStatus> {
            self.seen.push(invocation.clone());
            if self.fail_program == Some(invocation.program.as_str()) {
                Ok(ToolStatus::failed(1))
            } else {
                Ok(ToolStatus::ok())
            }
        }
    }

    fn object(name: &str, role: Role, staging: &Path) -> CompiledObject {
        let source = SourceFile::new(format!("{}.cpp", name), role);
        CompiledObject {
            path: source.object_path(staging),
            invocation: ToolInvocation::new("g++"),
            source,
        }
    }

    fn fixture(staging: &Path) -> Vec<CompiledObject> {
        vec![
            object("main", Role::Ordinary, staging),
            object("a", Role::Ordinary, staging),
            object("tests", Role::TestUnit, staging),
            object("core", Role::SpecialModule, staging),
        ]
    }

    #[test]
    fn rename_invocation_matches_objcopy_syntax() {
        let inv = rename_invocation("objcopy", "main", "oldmain", Path::new("temp_files/main.o"));
        assert_eq!(
            inv.command_line(),
            "objcopy --redefine-sym main=oldmain temp_files/main.o"
        );
    }

    fn summary(renames: &[SymbolRename]) -> Vec<(String, String)> {
        renames
            .iter()
            .map(|r| {
                (
                    r.object.to_string_lossy().to_string(),
                    format!("{}={}", r.from, r.to),
                )
            })
            .collect()
    }

    #[test]
    fn entry_renamed_in_every_production_object_before_test() {
        let config = Config::default();
        let staging = StagingArea::planned("temp_files");
        let stage = TestPatchStage::new(&config, Path::new(""), &staging);
        let renames = stage.renames(&fixture(staging.dir())).unwrap();
        assert_eq!(
            summary(&renames),
            vec![
                ("temp_files/a.o".to_string(), "main=oldmain".to_string()),
                ("temp_files/core.o".to_string(), "main=oldmain".to_string()),
                ("temp_files/main.o".to_string(), "main=oldmain".to_string()),
                ("temp_files/tests.o".to_string(), "test=main".to_string()),
            ]
        );
    }

    #[test]
    fn entry_unit_narrows_the_entry_rename() {
        let mut config = Config::default();
        config.tests.entry_unit = Some("main".to_string());
        let staging = StagingArea::planned("temp_files");
        let stage = TestPatchStage::new(&config, Path::new(""), &staging);
        let renames = stage.renames(&fixture(staging.dir())).unwrap();
        assert_eq!(
            summary(&renames),
            vec![
                ("temp_files/main.o".to_string(), "main=oldmain".to_string()),
                ("temp_files/tests.o".to_string(), "test=main".to_string()),
            ]
        );
    }

    #[test]
    fn unknown_entry_unit_is_a_patch_error() {
        let mut config = Config::default();
        config.tests.entry_unit = Some("app".to_string());
        let staging = StagingArea::planned("temp_files");
        let stage = TestPatchStage::new(&config, Path::new(""), &staging);
        let err = stage.renames(&fixture(staging.dir())).unwrap_err();
        match err {
            BuildError::SymbolPatch { object, from, .. } => {
                assert_eq!(object, PathBuf::from("temp_files/app.o"));
                assert_eq!(from, "main");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn run_marks_renames_and_relinks_everything() {
        let root = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.build.flags = vec!["-O1".into()];
        config.tests.compiler = "clang++".into();
        let staging = StagingArea::prepare(root.path().join("temp_files")).unwrap();
        let stage = TestPatchStage::new(&config, root.path(), &staging);
        let objects = fixture(staging.dir());

        let mut runner = Recorder::default();
        let out = stage.run(&mut runner, &objects).unwrap();

        assert_eq!(out, root.path().join("test"));
        assert!(staging.is_patched());
        let programs: Vec<&str> = runner.seen.iter().map(|i| i.program.as_str()).collect();
        assert_eq!(
            programs,
            vec!["objcopy", "objcopy", "objcopy", "objcopy", "clang++"]
        );
        assert!(runner.seen[..3].iter().all(|i| i.args[1] == "main=oldmain"));
        assert_eq!(runner.seen[3].args[1], "test=main");

        let link = &runner.seen[4];
        let tests_obj = staging.dir().join("tests.o").to_string_lossy().to_string();
        assert!(link.args.contains(&tests_obj));
        assert!(link.args.contains(&"-O1".to_string()));
        assert_eq!(link.args.iter().filter(|a| a.ends_with(".o")).count(), 4);
    }

    #[test]
    fn failing_rename_stops_before_relink() {
        let root = tempfile::tempdir().unwrap();
        let config = Config::default();
        let staging = StagingArea::prepare(root.path().join("temp_files")).unwrap();
        let stage = TestPatchStage::new(&config, root.path(), &staging);

        let mut runner = Recorder {
            fail_program: Some("objcopy"),
            ..Default::default()
        };
        let err = stage.run(&mut runner, &fixture(staging.dir())).unwrap_err();
        assert!(matches!(err, BuildError::SymbolPatch { ref from, .. } if from == "main"));
        assert_eq!(runner.seen.len(), 1);
    }

    #[test]
    fn missing_test_unit_is_a_patch_error_without_edits() {
        let root = tempfile::tempdir().unwrap();
        let config = Config::default();
        let staging = StagingArea::prepare(root.path().join("temp_files")).unwrap();
        let stage = TestPatchStage::new(&config, root.path(), &staging);
        let objects: Vec<_> = fixture(staging.dir())
            .into_iter()
            .filter(|o| o.source.role != Role::TestUnit)
            .collect();

        let mut runner = Recorder::default();
        let err = stage.run(&mut runner, &objects).unwrap_err();
        assert!(matches!(err, BuildError::SymbolPatch { .. }));
        assert!(runner.seen.is_empty());
        assert!(!staging.is_patched());
    }
}
