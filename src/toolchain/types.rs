use std::fmt;
use std::path::Path;

/// One external tool call: program plus ordered arguments.
///
/// Built fresh for every compile, link or rename and never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().to_string())
    }

    /// Path following `-o`, if any.
    pub fn output(&self) -> Option<&str> {
        self.args
            .windows(2)
            .find(|w| w[0] == "-o")
            .map(|w| w[1].as_str())
    }

    /// Shell-like rendering for logs and `compile_commands.json`.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(quote)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

fn quote(s: &str) -> String {
    if !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=+:,@%".contains(c))
    {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

/// How an external tool finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolStatus {
    pub success: bool,
    /// `None` when the process was ended by a signal.
    pub code: Option<i32>,
}

impl ToolStatus {
    pub fn ok() -> Self {
        Self {
            success: true,
            code: Some(0),
        }
    }

    pub fn failed(code: i32) -> Self {
        Self {
            success: false,
            code: Some(code),
        }
    }
}

impl From<std::process::ExitStatus> for ToolStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            success: status.success(),
            code: status.code(),
        }
    }
}
