//! External tool execution.
//!
//! The compiler, linker and symbol editor are opaque collaborators: the
//! pipeline only hands them an argument list and looks at the exit status.
//! [`ToolRunner`] is the seam the build stages talk to, so the whole pipeline
//! can be planned without running anything ([`DryRunRunner`]).

pub mod types;

pub use types::{ToolInvocation, ToolStatus};

use crate::error::{BuildError, BuildResult};
use colored::*;
use std::process::{Child, Command};
use std::time::{Duration, Instant};

/// Runs one [`ToolInvocation`] to completion.
pub trait ToolRunner {
    /// Block until the tool exits. `Err` is reserved for failures to run the
    /// tool at all; a non-zero exit is reported through [`ToolStatus`].
    fn run(&mut self, invocation: &ToolInvocation) -> BuildResult<ToolStatus>;
}

impl<R: ToolRunner + ?Sized> ToolRunner for &mut R {
    fn run(&mut self, invocation: &ToolInvocation) -> BuildResult<ToolStatus> {
        (**self).run(invocation)
    }
}

/// Spawns real subprocesses with inherited stdio.
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
    verbose: bool,
}

const POLL_INTERVAL: Duration = Duration::from_millis(20);

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Echo each command line before running it.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn wait_with_timeout(
        program: &str,
        child: &mut Child,
        timeout: Duration,
    ) -> BuildResult<ToolStatus> {
        let start = Instant::now();
        loop {
            let polled = child.try_wait().map_err(|source| BuildError::Spawn {
                program: program.to_string(),
                source,
            })?;
            if let Some(status) = polled {
                return Ok(status.into());
            }
            if start.elapsed() >= timeout {
                // Already-exited races are fine; the wait below reaps it either way.
                let _ = child.kill();
                let _ = child.wait();
                return Err(BuildError::Timeout {
                    program: program.to_string(),
                    secs: timeout.as_secs(),
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl ToolRunner for ProcessRunner {
    fn run(&mut self, invocation: &ToolInvocation) -> BuildResult<ToolStatus> {
        if self.verbose {
            println!("   {} {}", "$".dimmed(), invocation.command_line().dimmed());
        }

        let spawn_err = |source| BuildError::Spawn {
            program: invocation.program.clone(),
            source,
        };
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);

        match self.timeout {
            None => cmd.status().map(ToolStatus::from).map_err(spawn_err),
            Some(timeout) => {
                let mut child = cmd.spawn().map_err(spawn_err)?;
                Self::wait_with_timeout(&invocation.program, &mut child, timeout)
            }
        }
    }
}

/// Prints each invocation instead of running it and reports success.
#[derive(Debug, Default)]
pub struct DryRunRunner {
    pub invocations: Vec<ToolInvocation>,
}

impl ToolRunner for DryRunRunner {
    fn run(&mut self, invocation: &ToolInvocation) -> BuildResult<ToolStatus> {
        println!("{}", invocation.command_line());
        self.invocations.push(invocation.clone());
        Ok(ToolStatus::ok())
    }
}
