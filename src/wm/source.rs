//! Invocation of the window-manager CLI.

use crate::wm::parser::WindowParser;
use crate::wm::window::Window;
use std::process::Command;
use thiserror::Error;

/// Failure to obtain output from the window-manager tool.
#[derive(Debug, Error)]
pub enum ExternalToolError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Status {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("{program} produced non-UTF-8 output")]
    Output { program: String },
}

/// Anything that can report the current set of windows.
pub trait WindowSource {
    fn current_windows(&self) -> Result<Vec<Window>, ExternalToolError>;
}

/// Runs an external command and parses its stdout.
pub struct CommandSource {
    program: String,
    args: Vec<String>,
    parser: Box<dyn WindowParser>,
}

impl CommandSource {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        parser: Box<dyn WindowParser>,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            parser,
        }
    }

    /// Run the command and return its stdout.
    pub fn raw_output(&self) -> Result<String, ExternalToolError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|source| ExternalToolError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ExternalToolError::Status {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|_| ExternalToolError::Output {
            program: self.program.clone(),
        })
    }

    pub fn parser(&self) -> &dyn WindowParser {
        self.parser.as_ref()
    }
}

impl WindowSource for CommandSource {
    fn current_windows(&self) -> Result<Vec<Window>, ExternalToolError> {
        let raw = self.raw_output()?;
        let windows = self.parser.parse(&raw);
        tracing::debug!(program = %self.program, count = windows.len(), "scraped windows");
        Ok(windows)
    }
}

/// A source that always reports the same windows.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    pub windows: Vec<Window>,
}

impl WindowSource for StaticSource {
    fn current_windows(&self) -> Result<Vec<Window>, ExternalToolError> {
        Ok(self.windows.clone())
    }
}
