//! External tool runner: process capture, toolchain probes, unpacking.

mod pac;
mod runner;

pub use pac::{check_dotnet, ensure_pac_installed, unpack_solution};
pub use runner::{CommandOutput, ProcessRunner, TokioProcessRunner, ToolchainError};
