//! Orchestration flow: connect → list → export → toolchain checks → unpack.
//!
//! Each user action spawns one background task on the app's tokio runtime;
//! the task streams [`FlowEvent`]s back over an unbounded channel that the
//! GUI drains once per frame, so all observable output is serialized in the
//! order operations complete. Work within a batch is strictly sequential;
//! there is no fan-out across solutions or export variants.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::auth;
use crate::dataverse::{
    self, DataverseConnection, SolutionRecord, SolutionSource,
};
use crate::toolchain::{self, ProcessRunner};

/// Export steps per solution: unmanaged, then managed.
pub const STEPS_PER_SOLUTION: u32 = 2;

/// Subdirectory of the export root that receives unpacked solutions.
pub const UNPACK_DIR_NAME: &str = "Export";

// =============================================================================
// Phases
// =============================================================================

/// The flow's coarse state, reflected in the GUI's control enablement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowPhase {
    Idle,
    Connecting,
    Connected,
    Exporting,
    Unpacking,
    Done,
    Failed,
}

impl FlowPhase {
    /// Whether a background task is running and controls should be disabled.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            FlowPhase::Connecting | FlowPhase::Exporting | FlowPhase::Unpacking
        )
    }
}

impl std::fmt::Display for FlowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FlowPhase::Idle => "Idle",
            FlowPhase::Connecting => "Connecting",
            FlowPhase::Connected => "Connected",
            FlowPhase::Exporting => "Exporting",
            FlowPhase::Unpacking => "Unpacking",
            FlowPhase::Done => "Done",
            FlowPhase::Failed => "Failed",
        };
        f.write_str(label)
    }
}

// =============================================================================
// Events
// =============================================================================

/// Events sent from flow tasks to the GUI.
#[derive(Debug)]
pub enum FlowEvent {
    /// A user-visible log line.
    Log(String),

    /// Mid-batch phase transition (Exporting → Unpacking).
    Phase(FlowPhase),

    /// Connect finished: live connection plus the retrieved solution list.
    ConnectSucceeded {
        connection: DataverseConnection,
        solutions: Vec<SolutionRecord>,
    },

    /// Connect failed (auth, probe, or listing); message for the user.
    ConnectFailed(String),

    /// Export progress, two steps per solution.
    Progress { completed: u32, total: u32 },

    /// The whole batch (exports + unpack) completed.
    BatchFinished,

    /// The batch aborted; message for the user.
    BatchFailed(String),
}

/// Sender for flow events.
pub type FlowSender = mpsc::UnboundedSender<FlowEvent>;

/// Receiver for flow events.
pub type FlowReceiver = mpsc::UnboundedReceiver<FlowEvent>;

/// Create an event channel for streaming flow events.
pub fn event_channel() -> (FlowSender, FlowReceiver) {
    mpsc::unbounded_channel()
}

// =============================================================================
// Connect
// =============================================================================

/// Connect to an organization and retrieve its unmanaged solutions.
///
/// Token acquisition may open the system browser. All failure paths
/// (auth errors, a not-ready connection, a failed listing) arrive as a
/// single [`FlowEvent::ConnectFailed`].
pub fn spawn_connect(
    db_path: PathBuf,
    server_url: String,
    tx: FlowSender,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let _ = tx.send(FlowEvent::Log("Connecting to CRM organization...".to_string()));

        let token = match auth::acquire_token(db_path, &server_url).await {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, "Token acquisition failed");
                let _ = tx.send(FlowEvent::Log(format!("Failed to connect: {}", e)));
                let _ = tx.send(FlowEvent::ConnectFailed(e.to_string()));
                return;
            }
        };

        let connection = dataverse::connect(&server_url, token).await;
        if !connection.is_ready() {
            let message = connection
                .last_error()
                .unwrap_or("connection is not ready")
                .to_string();
            let _ = tx.send(FlowEvent::Log(format!("Failed to connect: {}", message)));
            let _ = tx.send(FlowEvent::ConnectFailed(message));
            return;
        }

        let _ = tx.send(FlowEvent::Log("Successfully connected!".to_string()));
        let _ = tx.send(FlowEvent::Log("Retrieving solutions...".to_string()));

        let source = match connection.source() {
            Ok(source) => source,
            Err(e) => {
                let _ = tx.send(FlowEvent::ConnectFailed(e.to_string()));
                return;
            }
        };

        match source.list_unmanaged_solutions().await {
            Ok(solutions) => {
                let _ = tx.send(FlowEvent::Log(format!(
                    "Found {} unmanaged solutions.",
                    solutions.len()
                )));
                let _ = tx.send(FlowEvent::ConnectSucceeded {
                    connection,
                    solutions,
                });
            }
            Err(e) => {
                error!(error = %e, "Solution listing failed");
                let _ = tx.send(FlowEvent::Log(format!("Error: {}", e)));
                let _ = tx.send(FlowEvent::ConnectFailed(e.to_string()));
            }
        }
    })
}

// =============================================================================
// Export batch
// =============================================================================

/// Export every selected solution (both variants), then verify the toolchain
/// and unpack each unmanaged artifact.
///
/// The first export or unpack-launch error aborts the remainder of the batch;
/// already-written artifacts are left in place.
pub fn spawn_export_batch(
    source: Arc<dyn SolutionSource>,
    runner: Arc<dyn ProcessRunner>,
    selected: Vec<String>,
    export_root: PathBuf,
    tx: FlowSender,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let batch_id = uuid::Uuid::new_v4();
        info!(%batch_id, count = selected.len(), export_root = %export_root.display(), "Starting export batch");

        match run_batch(source.as_ref(), runner.as_ref(), &selected, &export_root, &tx).await {
            Ok(()) => {
                info!(%batch_id, "Export batch finished");
                let _ = tx.send(FlowEvent::Log("Export completed successfully!".to_string()));
                let _ = tx.send(FlowEvent::BatchFinished);
            }
            Err(e) => {
                error!(%batch_id, error = %e, "Export batch failed");
                let _ = tx.send(FlowEvent::Log(format!("Error during export: {:#}", e)));
                let _ = tx.send(FlowEvent::BatchFailed(format!("{:#}", e)));
            }
        }
    })
}

async fn run_batch(
    source: &dyn SolutionSource,
    runner: &dyn ProcessRunner,
    selected: &[String],
    export_root: &Path,
    tx: &FlowSender,
) -> anyhow::Result<()> {
    let total = selected.len() as u32 * STEPS_PER_SOLUTION;
    let mut completed = 0u32;
    let _ = tx.send(FlowEvent::Progress { completed, total });

    dataverse::ensure_directory_exists(export_root)
        .await
        .context("Could not create the export directory")?;
    let unpack_root = export_root.join(UNPACK_DIR_NAME);
    dataverse::ensure_directory_exists(&unpack_root)
        .await
        .context("Could not create the unpack directory")?;

    // Export phase: unmanaged then managed, sequentially per solution.
    for unique_name in selected {
        for managed in [false, true] {
            let variant = if managed { "managed" } else { "unmanaged" };
            let _ = tx.send(FlowEvent::Log(format!(
                "Exporting {} ({})...",
                unique_name, variant
            )));

            let payload = source
                .export_solution(unique_name, managed)
                .await
                .with_context(|| format!("Export of {} ({}) failed", unique_name, variant))?;

            let info = dataverse::write_artifact(export_root, unique_name, managed, &payload)
                .await
                .with_context(|| format!("Could not write the {} artifact", unique_name))?;

            let _ = tx.send(FlowEvent::Log(format!(
                "Solution exported to: {}",
                info.path.display()
            )));
            let _ = tx.send(FlowEvent::Log(format!(
                "  {} bytes, sha256 {}",
                info.bytes_written, info.sha256
            )));
            if info.zip_entries.is_none() {
                let _ = tx.send(FlowEvent::Log(format!(
                    "Warning: {} did not open as a zip archive.",
                    info.path.display()
                )));
            }

            completed += 1;
            let _ = tx.send(FlowEvent::Progress { completed, total });
        }
    }

    // Toolchain checks are advisory and cannot block the batch.
    let log = |line: String| {
        let _ = tx.send(FlowEvent::Log(line));
    };

    let _ = tx.send(FlowEvent::Log("Checking .NET installation...".to_string()));
    toolchain::check_dotnet(runner, &log).await;

    let _ = tx.send(FlowEvent::Log("Ensuring PAC CLI is installed...".to_string()));
    toolchain::ensure_pac_installed(runner, &log).await;

    let _ = tx.send(FlowEvent::Phase(FlowPhase::Unpacking));
    for unique_name in selected {
        toolchain::unpack_solution(runner, unique_name, export_root, &unpack_root, &log)
            .await
            .with_context(|| format!("Unpack of {} failed", unique_name))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataverse::GatewayError;
    use crate::toolchain::{CommandOutput, ToolchainError};
    use async_trait::async_trait;
    use std::io::{Cursor, Write};
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn sample_zip() -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            writer
                .start_file("solution.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"<ImportExportXml/>").unwrap();
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    struct MockSource {
        solutions: Vec<SolutionRecord>,
        fail_on: Option<String>,
    }

    impl MockSource {
        fn new(names: &[&str]) -> Self {
            Self {
                solutions: names
                    .iter()
                    .map(|n| SolutionRecord::new(*n, format!("{} App", n), "1.0.0.0"))
                    .collect(),
                fail_on: None,
            }
        }
    }

    #[async_trait]
    impl SolutionSource for MockSource {
        async fn list_unmanaged_solutions(&self) -> Result<Vec<SolutionRecord>, GatewayError> {
            Ok(self.solutions.clone())
        }

        async fn export_solution(
            &self,
            unique_name: &str,
            _managed: bool,
        ) -> Result<Vec<u8>, GatewayError> {
            if self.fail_on.as_deref() == Some(unique_name) {
                return Err(GatewayError::Http("simulated export failure".to_string()));
            }
            Ok(sample_zip())
        }
    }

    struct RecordingRunner {
        invocations: Mutex<Vec<Vec<String>>>,
        pac_version_exit: i32,
    }

    impl RecordingRunner {
        fn new() -> Self {
            Self {
                invocations: Mutex::new(Vec::new()),
                pac_version_exit: 0,
            }
        }

        fn invocations(&self) -> Vec<Vec<String>> {
            self.invocations.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProcessRunner for RecordingRunner {
        async fn run(
            &self,
            program: &str,
            args: &[&str],
        ) -> Result<CommandOutput, ToolchainError> {
            let mut invocation = vec![program.to_string()];
            invocation.extend(args.iter().map(|a| a.to_string()));
            self.invocations.lock().unwrap().push(invocation);

            let exit_code = if program == "pac" && args == ["--version"] {
                self.pac_version_exit
            } else {
                0
            };

            Ok(CommandOutput {
                exit_code,
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    fn drain(mut rx: FlowReceiver) -> Vec<FlowEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_batch_exports_both_variants_and_unpacks_unmanaged_only() {
        let tmp = TempDir::new().unwrap();
        let source = Arc::new(MockSource::new(&["foo", "bar"]));
        let runner = Arc::new(RecordingRunner::new());
        let (tx, rx) = event_channel();

        spawn_export_batch(
            source,
            runner.clone(),
            vec!["foo".to_string(), "bar".to_string()],
            tmp.path().to_path_buf(),
            tx,
        )
        .await
        .unwrap();

        // Four artifacts, both variants per solution.
        for file in ["foo.zip", "foo_managed.zip", "bar.zip", "bar_managed.zip"] {
            assert!(tmp.path().join(file).exists(), "missing {}", file);
        }

        // Exactly two unpack invocations, only for the unmanaged zips.
        let unpacks: Vec<_> = runner
            .invocations()
            .into_iter()
            .filter(|i| i[0] == "pac" && i.get(1).map(String::as_str) == Some("solution"))
            .collect();
        assert_eq!(unpacks.len(), 2);
        assert!(unpacks[0][4].ends_with("foo.zip"));
        assert!(unpacks[1][4].ends_with("bar.zip"));
        for unpack in &unpacks {
            assert!(!unpack[4].contains("_managed"));
            assert!(unpack[6].contains(UNPACK_DIR_NAME));
        }

        let events = drain(rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, FlowEvent::BatchFinished)));
        assert!(events
            .iter()
            .any(|e| matches!(e, FlowEvent::Phase(FlowPhase::Unpacking))));

        let last_progress = events
            .iter()
            .filter_map(|e| match e {
                FlowEvent::Progress { completed, total } => Some((*completed, *total)),
                _ => None,
            })
            .last()
            .unwrap();
        assert_eq!(last_progress, (4, 4));
    }

    #[tokio::test]
    async fn test_failed_probe_installs_pac_once_before_first_unpack() {
        let tmp = TempDir::new().unwrap();
        let source = Arc::new(MockSource::new(&["foo"]));
        let runner = Arc::new(RecordingRunner {
            invocations: Mutex::new(Vec::new()),
            pac_version_exit: 1,
        });
        let (tx, rx) = event_channel();

        spawn_export_batch(
            source,
            runner.clone(),
            vec!["foo".to_string()],
            tmp.path().to_path_buf(),
            tx,
        )
        .await
        .unwrap();

        let invocations = runner.invocations();
        let install_indices: Vec<_> = invocations
            .iter()
            .enumerate()
            .filter(|(_, i)| i[0] == "dotnet" && i.get(1).map(String::as_str) == Some("tool"))
            .map(|(idx, _)| idx)
            .collect();
        let first_unpack = invocations
            .iter()
            .position(|i| i[0] == "pac" && i.get(1).map(String::as_str) == Some("solution"))
            .expect("unpack should still run");

        assert_eq!(install_indices.len(), 1, "install must run exactly once");
        assert!(install_indices[0] < first_unpack);

        let events = drain(rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, FlowEvent::BatchFinished)));
    }

    #[tokio::test]
    async fn test_export_failure_aborts_remainder_of_batch() {
        let tmp = TempDir::new().unwrap();
        let mut source = MockSource::new(&["foo", "bar"]);
        source.fail_on = Some("bar".to_string());
        let runner = Arc::new(RecordingRunner::new());
        let (tx, rx) = event_channel();

        spawn_export_batch(
            Arc::new(source),
            runner.clone(),
            vec!["foo".to_string(), "bar".to_string()],
            tmp.path().to_path_buf(),
            tx,
        )
        .await
        .unwrap();

        // foo was exported before the failure; bar never produced artifacts.
        assert!(tmp.path().join("foo.zip").exists());
        assert!(tmp.path().join("foo_managed.zip").exists());
        assert!(!tmp.path().join("bar.zip").exists());

        // The batch aborted before the unpack phase.
        assert!(runner.invocations().is_empty());

        let events = drain(rx);
        assert!(events.iter().any(|e| matches!(e, FlowEvent::BatchFailed(_))));
        assert!(!events.iter().any(|e| matches!(e, FlowEvent::BatchFinished)));
    }

    #[tokio::test]
    async fn test_progress_counts_two_steps_per_solution() {
        let tmp = TempDir::new().unwrap();
        let source = Arc::new(MockSource::new(&["foo"]));
        let runner = Arc::new(RecordingRunner::new());
        let (tx, rx) = event_channel();

        spawn_export_batch(
            source,
            runner,
            vec!["foo".to_string()],
            tmp.path().to_path_buf(),
            tx,
        )
        .await
        .unwrap();

        let progress: Vec<_> = drain(rx)
            .into_iter()
            .filter_map(|e| match e {
                FlowEvent::Progress { completed, total } => Some((completed, total)),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![(0, 2), (1, 2), (2, 2)]);
    }
}
