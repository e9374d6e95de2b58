use super::compile::CompiledObject;
use super::sources::Role;
use super::staging::StagingArea;
use crate::config::Config;
use crate::error::{BuildError, BuildResult};
use crate::toolchain::{ToolInvocation, ToolRunner};
use colored::*;
use std::path::{Path, PathBuf};

/// `<compiler> <objects...> <flags> -o <output>`
pub fn link_invocation(
    compiler: &str,
    objects: &[PathBuf],
    flags: &[String],
    output: &Path,
) -> ToolInvocation {
    let mut inv = ToolInvocation::new(compiler);
    for obj in objects {
        inv = inv.path_arg(obj);
    }
    inv.args(flags.iter().cloned()).arg("-o").path_arg(output)
}

/// Run a link and map a non-zero exit to [`BuildError::Link`].
pub fn run_link<R: ToolRunner>(runner: &mut R, invocation: &ToolInvocation) -> BuildResult<()> {
    let status = runner.run(invocation)?;
    if status.success {
        return Ok(());
    }
    println!("{} linking error", "x".red());
    Err(BuildError::Link {
        output: PathBuf::from(invocation.output().unwrap_or_default()),
        code: status.code,
    })
}

pub struct LinkStage<'a> {
    config: &'a Config,
    root: &'a Path,
    staging: &'a StagingArea,
}

impl<'a> LinkStage<'a> {
    pub fn new(config: &'a Config, root: &'a Path, staging: &'a StagingArea) -> Self {
        Self {
            config,
            root,
            staging,
        }
    }

    pub fn output(&self) -> PathBuf {
        self.root.join(&self.config.build.output)
    }

    /// Objects that make up the production binary, sorted by path.
    ///
    /// The test unit is left out unless `tests.production_includes_unit` is set.
    pub fn production_objects(&self, objects: &[CompiledObject]) -> Vec<PathBuf> {
        let include_unit = self.config.tests.production_includes_unit;
        let mut paths: Vec<PathBuf> = objects
            .iter()
            .filter(|o| include_unit || o.source.role != Role::TestUnit)
            .map(|o| o.path.clone())
            .collect();
        paths.sort();
        paths
    }

    pub fn invocation(&self, objects: &[CompiledObject]) -> ToolInvocation {
        link_invocation(
            &self.config.build.compiler,
            &self.production_objects(objects),
            &self.config.build.flags,
            &self.output(),
        )
    }

    /// Link the production executable.
    ///
    /// Objects whose entry symbols were already renamed are refused: the
    /// result would have no usable `main`.
    pub fn link<R: ToolRunner>(
        &self,
        runner: &mut R,
        objects: &[CompiledObject],
    ) -> BuildResult<PathBuf> {
        if self.staging.is_patched() {
            return Err(BuildError::StalePatchedObjects {
                dir: self.staging.dir().to_path_buf(),
            });
        }
        println!("   {} Linking {}...", "🔗".cyan(), self.config.build.output.display());
        run_link(runner, &self.invocation(objects))?;
        Ok(self.output())
    }
}
