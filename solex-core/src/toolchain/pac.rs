//! Toolchain checks and solution unpacking via the PAC CLI.
//!
//! All user-visible output goes through a log callback; the toolchain probes
//! are advisory and never abort a batch. Only a failure to launch `pac` for
//! an actual unpack is surfaced as an error.

use std::path::Path;

use tracing::{info, warn};

use super::runner::{ProcessRunner, ToolchainError};

/// NuGet package id of the PAC CLI dotnet tool.
const PAC_TOOL_PACKAGE: &str = "Microsoft.PowerApps.CLI.Tool";

/// Log the installed .NET SDKs, or an advisory note if `dotnet` is missing.
///
/// Never fatal; a missing or broken `dotnet` is reported as a log line only.
pub async fn check_dotnet<F: Fn(String)>(runner: &dyn ProcessRunner, log: F) {
    match runner.run("dotnet", &["--list-sdks"]).await {
        Ok(output) => {
            log("Installed .NET SDKs:".to_string());
            log(output.stdout);
        }
        Err(e) => {
            warn!(error = %e, "dotnet probe failed");
            log("The 'dotnet' command is not available. Please ensure .NET is installed.".to_string());
        }
    }
}

/// Make sure the PAC CLI is installed, installing it if the probe fails.
///
/// The probe is `pac --version`; any launch failure or non-zero exit triggers
/// exactly one `dotnet tool install` attempt. The install itself is
/// fire-and-forget: its outcome is logged but never escalated, since a
/// missing tool is an expected first-run condition.
pub async fn ensure_pac_installed<F: Fn(String)>(runner: &dyn ProcessRunner, log: F) {
    let probe_ok = match runner.run("pac", &["--version"]).await {
        Ok(output) => output.success(),
        Err(e) => {
            warn!(error = %e, "pac probe failed to launch");
            false
        }
    };

    if probe_ok {
        log("PAC CLI is already installed.".to_string());
        return;
    }

    log("Installing PAC CLI...".to_string());
    match runner
        .run("dotnet", &["tool", "install", "--global", PAC_TOOL_PACKAGE])
        .await
    {
        Ok(output) if output.success() => {
            info!("PAC CLI installed");
            log("PAC CLI installed successfully.".to_string());
        }
        Ok(output) => {
            warn!(exit_code = output.exit_code, "PAC CLI install exited non-zero");
            log(format!(
                "PAC CLI install exited with code {}.",
                output.exit_code
            ));
            if !output.stderr.is_empty() {
                log(output.stderr);
            }
        }
        Err(e) => {
            warn!(error = %e, "PAC CLI install failed to launch");
            log(format!("PAC CLI install could not be started: {}", e));
        }
    }
}

/// Unpack one solution's unmanaged zip into `{dest_dir}/{name}/`.
///
/// Skips with a log line if the zip is missing. A non-zero `pac` exit is
/// logged (both streams) but not treated as an error; only a launch failure
/// is returned to the caller.
pub async fn unpack_solution<F: Fn(String)>(
    runner: &dyn ProcessRunner,
    unique_name: &str,
    zip_dir: &Path,
    dest_dir: &Path,
    log: F,
) -> Result<(), ToolchainError> {
    log(format!("Unpacking unmanaged solution for: {}", unique_name));

    let zip_file = zip_dir.join(format!("{}.zip", unique_name));
    let output_folder = dest_dir.join(unique_name);

    if !zip_file.exists() {
        log(format!(
            "Unmanaged solution zip file not found: {}",
            zip_file.display()
        ));
        return Ok(());
    }

    log(format!("Unpacking to: {}", output_folder.display()));

    let zip_arg = zip_file.display().to_string();
    let folder_arg = output_folder.display().to_string();
    let output = runner
        .run(
            "pac",
            &[
                "solution",
                "unpack",
                "--zipfile",
                &zip_arg,
                "--folder",
                &folder_arg,
                "--packageType",
                "Both",
            ],
        )
        .await?;

    if !output.stdout.is_empty() {
        log(output.stdout);
    }
    if !output.stderr.is_empty() {
        log(output.stderr);
    }

    Ok(())
}
