use super::sources::{Role, SourceFile};
use super::staging::StagingArea;
use crate::config::Config;
use crate::error::{BuildError, BuildResult};
use crate::toolchain::{ToolInvocation, ToolRunner};
use colored::*;
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};

/// A staged object and the command that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledObject {
    pub source: SourceFile,
    pub path: PathBuf,
    pub invocation: ToolInvocation,
}

/// Compiles translation units one at a time into the staging area.
pub struct CompileStage<'a> {
    config: &'a Config,
    root: &'a Path,
    staging: &'a StagingArea,
}

impl<'a> CompileStage<'a> {
    pub fn new(config: &'a Config, root: &'a Path, staging: &'a StagingArea) -> Self {
        Self {
            config,
            root,
            staging,
        }
    }

    /// `<compiler> <flags> [<test-unit flags>] -c <input> -o <staging>/<base>.o`
    pub fn invocation_for(&self, source: &SourceFile) -> ToolInvocation {
        let (compiler, flags) = match source.role {
            Role::SpecialModule => (&self.config.module.compiler, &self.config.module.flags),
            Role::Ordinary | Role::TestUnit => {
                (&self.config.build.compiler, &self.config.build.flags)
            }
        };

        let mut inv = ToolInvocation::new(compiler.as_str()).args(flags.iter().cloned());
        // Test glue calls functions declared only in units it doesn't include.
        if source.role == Role::TestUnit {
            inv = inv.args(self.config.tests.unit_flags.iter().cloned());
        }
        inv.arg("-c")
            .path_arg(&self.root.join(&source.path))
            .arg("-o")
            .path_arg(&source.object_path(self.staging.dir()))
    }

    /// Compile every source in order, stopping at the first failure.
    pub fn compile_all<R: ToolRunner>(
        &self,
        runner: &mut R,
        sources: &[SourceFile],
        pb: &ProgressBar,
    ) -> BuildResult<Vec<CompiledObject>> {
        let names: Vec<String> = sources
            .iter()
            .map(|s| s.path.to_string_lossy().to_string())
            .collect();
        pb.suspend(|| println!("   files to compile: {}", names.join(" ")));

        let mut objects = Vec::with_capacity(sources.len());
        for source in sources {
            objects.push(self.compile_one(runner, source, pb)?);
        }
        Ok(objects)
    }

    pub fn compile_one<R: ToolRunner>(
        &self,
        runner: &mut R,
        source: &SourceFile,
        pb: &ProgressBar,
    ) -> BuildResult<CompiledObject> {
        let invocation = self.invocation_for(source);
        pb.set_message(format!("Compiling {}", source.base_name()));
        pb.suspend(|| {
            println!(
                "   {} {}",
                "Compiling".green().bold(),
                source.path.display()
            )
        });

        let status = runner.run(&invocation)?;
        if !status.success {
            pb.abandon();
            println!("{} {} compilation error", "x".red(), source.path.display());
            return Err(BuildError::Compile {
                source_file: source.path.clone(),
                code: status.code,
            });
        }

        pb.inc(1);
        Ok(CompiledObject {
            source: source.clone(),
            path: source.object_path(self.staging.dir()),
            invocation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::ToolStatus;

    struct FailOn(&'static str, Vec<ToolInvocation>);

    impl ToolRunner for FailOn {
        fn run(&mut self, invocation: &ToolInvocation) -> BuildResult<ToolStatus> {
            self.1.push(invocation.clone());
            if invocation.args.iter().any(|a| a.ends_with(self.0)) {
                Ok(ToolStatus::failed(1))
            } else {
                Ok(ToolStatus::ok())
            }
        }
    }

    fn stage_fixture() -> (Config, StagingArea) {
        let mut config = Config::default();
        config.build.flags = vec!["-O2".into()];
        config.module.flags = vec!["-std=c11".into()];
        (config, StagingArea::planned("temp_files"))
    }

    #[test]
    fn ordinary_file_gets_common_flags_only() {
        let (config, staging) = stage_fixture();
        let stage = CompileStage::new(&config, Path::new("."), &staging);
        let inv = stage.invocation_for(&SourceFile::new("src/my_tests.cpp", Role::Ordinary));
        assert_eq!(inv.program, "g++");
        assert_eq!(
            inv.args,
            vec!["-O2", "-c", "./src/my_tests.cpp", "-o", "temp_files/my_tests.o"]
        );
    }

    #[test]
    fn test_unit_gets_warning_suppression() {
        let (config, staging) = stage_fixture();
        let stage = CompileStage::new(&config, Path::new("."), &staging);
        let inv = stage.invocation_for(&SourceFile::new("tests.cpp", Role::TestUnit));
        assert_eq!(
            inv.args,
            vec![
                "-O2",
                "-Wno-implicit-function-declaration",
                "-c",
                "./tests.cpp",
                "-o",
                "temp_files/tests.o"
            ]
        );
    }

    #[test]
    fn special_module_uses_its_own_toolchain() {
        let (config, staging) = stage_fixture();
        let stage = CompileStage::new(&config, Path::new("proj"), &staging);
        let inv = stage.invocation_for(&SourceFile::new("core.c", Role::SpecialModule));
        assert_eq!(inv.program, "cc");
        assert_eq!(
            inv.args,
            vec!["-std=c11", "-c", "proj/core.c", "-o", "temp_files/core.o"]
        );
    }

    #[test]
    fn compile_all_stops_at_first_failure() {
        let (config, staging) = stage_fixture();
        let stage = CompileStage::new(&config, Path::new("."), &staging);
        let sources = vec![
            SourceFile::new("a.cpp", Role::Ordinary),
            SourceFile::new("b.cpp", Role::Ordinary),
            SourceFile::new("c.cpp", Role::Ordinary),
        ];
        let mut runner = FailOn("b.cpp", Vec::new());
        let err = stage
            .compile_all(&mut runner, &sources, &ProgressBar::hidden())
            .unwrap_err();

        assert!(matches!(err, BuildError::Compile { ref source_file, code: Some(1) }
            if source_file == Path::new("b.cpp")));
        assert_eq!(runner.1.len(), 2);
    }

    #[test]
    fn compile_all_returns_one_object_per_source() {
        let (config, staging) = stage_fixture();
        let stage = CompileStage::new(&config, Path::new("."), &staging);
        let sources = vec![
            SourceFile::new("a.cpp", Role::Ordinary),
            SourceFile::new("tests.cpp", Role::TestUnit),
        ];
        let mut runner = FailOn("never", Vec::new());
        let objects = stage
            .compile_all(&mut runner, &sources, &ProgressBar::hidden())
            .unwrap();
        let paths: Vec<_> = objects.iter().map(|o| o.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("temp_files/a.o"),
                PathBuf::from("temp_files/tests.o")
            ]
        );
    }
}
