// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;

/// Captured result of one external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status; `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external programs. Spawning failures are `Err`; a non-zero exit is
/// still `Ok` and left for the caller to classify.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput>;
}

pub fn render(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}
