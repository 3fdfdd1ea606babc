//! Main application state and update loop.

use std::path::PathBuf;
use std::sync::Arc;

use eframe::egui;
use tokio::runtime::Runtime;
use tracing::{debug, error, info, warn};

use solex_core::{
    event_channel, spawn_connect, spawn_export_batch, validate_server_url, DataverseConnection,
    Database, FlowEvent, FlowPhase, FlowReceiver, SelectionState, Settings, Theme,
    TokioProcessRunner,
};

use crate::ui;

// =============================================================================
// Notices
// =============================================================================

/// Severity of a blocking notice dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
    Error,
}

/// A blocking notice dialog, the counterpart of the form's message boxes.
#[derive(Debug, Clone)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn info(title: &str, message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            title: title.to_string(),
            message: message.into(),
        }
    }

    pub fn warning(title: &str, message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Warning,
            title: title.to_string(),
            message: message.into(),
        }
    }

    pub fn error(title: &str, message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            title: title.to_string(),
            message: message.into(),
        }
    }
}

// =============================================================================
// Application State
// =============================================================================

/// Main application state.
pub struct SolexApp {
    /// Tokio runtime for async operations.
    pub runtime: Runtime,

    /// Database connection.
    pub db: Database,

    /// User settings.
    pub settings: Settings,

    // -------------------------------------------------------------------------
    // Session (explicit values; replaced wholesale on reconnect)
    // -------------------------------------------------------------------------
    /// The live connection, if any.
    pub connection: Option<DataverseConnection>,

    /// Filter/selection state over the retrieved solution list.
    pub selection: SelectionState,

    // -------------------------------------------------------------------------
    // Form Inputs
    // -------------------------------------------------------------------------
    /// Server URL field.
    pub server_url_input: String,

    /// Export directory field.
    pub export_dir_input: String,

    /// Filter box text, mirrored into the selection state on change.
    pub filter_input: String,

    // -------------------------------------------------------------------------
    // Flow State
    // -------------------------------------------------------------------------
    /// Current flow phase; drives control enablement.
    pub phase: FlowPhase,

    /// Event receiver for the running flow task.
    pub event_rx: Option<FlowReceiver>,

    /// Handle to the running flow task.
    pub flow_handle: Option<tokio::task::JoinHandle<()>>,

    /// Export progress (completed, total), two steps per solution.
    pub progress: Option<(u32, u32)>,

    // -------------------------------------------------------------------------
    // UI State
    // -------------------------------------------------------------------------
    /// Timestamped log pane lines.
    pub log_lines: Vec<String>,

    /// Blocking notice dialog, if any.
    pub notice: Option<Notice>,

    /// Transient status message.
    pub status_message: Option<(String, chrono::DateTime<chrono::Utc>)>,

    /// Pending folder selection result receiver.
    folder_result_rx: Option<tokio::sync::oneshot::Receiver<Option<PathBuf>>>,
}

impl SolexApp {
    /// Create a new application instance.
    pub fn new(cc: &eframe::CreationContext<'_>, runtime: Runtime) -> Self {
        info!("Initializing SolexApp");

        // Open database
        let db = match Database::open() {
            Ok(db) => {
                if let Err(e) = db.migrate() {
                    error!("Failed to migrate database: {}", e);
                }
                db
            }
            Err(e) => {
                error!("Failed to open database: {}", e);
                // Create in-memory fallback
                Database::open_at(PathBuf::from(":memory:"))
                    .expect("Failed to create in-memory database")
            }
        };

        // Load settings
        let settings = Settings::load(&db);
        debug!(?settings, "Loaded settings");

        let server_url_input = settings.server_url.clone();
        let export_dir_input = settings.export_dir.clone().unwrap_or_default();

        // Apply theme
        let visuals = match settings.theme {
            Theme::Dark => egui::Visuals::dark(),
            Theme::Light => egui::Visuals::light(),
        };
        cc.egui_ctx.set_visuals(visuals);

        let mut style = (*cc.egui_ctx.style()).clone();
        style.spacing.item_spacing = egui::vec2(8.0, 6.0);
        cc.egui_ctx.set_style(style);

        Self {
            runtime,
            db,
            settings,
            connection: None,
            selection: SelectionState::new(),
            server_url_input,
            export_dir_input,
            filter_input: String::new(),
            phase: FlowPhase::Idle,
            event_rx: None,
            flow_handle: None,
            progress: None,
            log_lines: Vec::new(),
            notice: None,
            status_message: None,
            folder_result_rx: None,
        }
    }

    /// Whether a ready connection is held.
    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().is_some_and(|c| c.is_ready())
    }

    /// Append a timestamped line to the log pane.
    pub fn append_log(&mut self, line: &str) {
        let stamp = chrono::Local::now().format("%H:%M:%S");
        self.log_lines
            .push(format!("[{}] {}", stamp, line.trim_end()));
    }

    // -------------------------------------------------------------------------
    // Connect
    // -------------------------------------------------------------------------

    /// Validate the server URL and start the connect flow.
    pub fn start_connect(&mut self) {
        if self.phase.is_busy() {
            return;
        }

        let server_url = self.server_url_input.trim().to_string();
        if server_url.is_empty() {
            self.notice = Some(Notice::warning(
                "Validation Error",
                "Please enter a server URL.",
            ));
            return;
        }
        if !validate_server_url(&server_url) {
            self.notice = Some(Notice::warning(
                "Validation Error",
                "Invalid server URL format. Expected format: https://<yourorg>.crm.dynamics.com",
            ));
            return;
        }

        info!(%server_url, "Starting connect flow");

        // Remember the last-used URL
        self.settings.server_url = server_url.clone();
        self.save_settings();

        // The session is replaced wholesale on reconnect
        self.connection = None;
        self.selection.set_solutions(Vec::new());

        self.phase = FlowPhase::Connecting;
        let (tx, rx) = event_channel();
        self.event_rx = Some(rx);

        let db_path = self.db.path().clone();
        self.flow_handle = Some(spawn_connect(db_path, server_url, tx));
    }

    // -------------------------------------------------------------------------
    // Export
    // -------------------------------------------------------------------------

    /// Validate the selection and start the export/unpack batch.
    pub fn start_export(&mut self) {
        if self.phase.is_busy() {
            return;
        }

        let Some(connection) = &self.connection else {
            self.notice = Some(Notice::warning(
                "Validation Error",
                "Please connect to CRM first.",
            ));
            return;
        };
        if !connection.is_ready() {
            self.notice = Some(Notice::warning(
                "Validation Error",
                "Please connect to CRM first.",
            ));
            return;
        }

        if !self.selection.has_selection() {
            self.notice = Some(Notice::warning(
                "Validation Error",
                "Please select at least one solution to export.",
            ));
            return;
        }

        let export_dir = self.export_dir_input.trim().to_string();
        if export_dir.is_empty() {
            self.notice = Some(Notice::warning(
                "Validation Error",
                "Please choose an export directory.",
            ));
            return;
        }

        let source = match connection.source() {
            Ok(source) => source,
            Err(e) => {
                self.notice = Some(Notice::error("Connection Error", e.to_string()));
                return;
            }
        };

        let selected = self.selection.selected_unique_names();
        info!(count = selected.len(), %export_dir, "Starting export batch");

        // Remember the export directory
        self.settings.export_dir = Some(export_dir.clone());
        self.save_settings();

        self.phase = FlowPhase::Exporting;
        self.progress = Some((0, selected.len() as u32 * solex_core::flow::STEPS_PER_SOLUTION));

        let (tx, rx) = event_channel();
        self.event_rx = Some(rx);

        let runner = Arc::new(TokioProcessRunner);
        self.flow_handle = Some(spawn_export_batch(
            source,
            runner,
            selected,
            PathBuf::from(export_dir),
            tx,
        ));
    }

    // -------------------------------------------------------------------------
    // Flow Events
    // -------------------------------------------------------------------------

    /// Drain and apply events from the running flow task.
    pub fn process_events(&mut self, ctx: &egui::Context) {
        let mut events = Vec::new();
        if let Some(rx) = &mut self.event_rx {
            while let Ok(event) = rx.try_recv() {
                events.push(event);
            }
        }
        if events.is_empty() {
            return;
        }

        let mut finished = false;
        for event in events {
            match event {
                FlowEvent::Log(line) => {
                    self.append_log(&line);
                }

                FlowEvent::Phase(phase) => {
                    debug!(%phase, "Flow phase change");
                    self.phase = phase;
                }

                FlowEvent::ConnectSucceeded {
                    connection,
                    solutions,
                } => {
                    info!(count = solutions.len(), "Connected");
                    self.connection = Some(connection);
                    self.selection.set_solutions(solutions);
                    self.phase = FlowPhase::Connected;
                    finished = true;
                }

                FlowEvent::ConnectFailed(message) => {
                    warn!(%message, "Connect failed");
                    self.phase = FlowPhase::Idle;
                    self.notice = Some(Notice::error(
                        "Connection Error",
                        format!("Failed to connect to CRM organization.\n\n{}", message),
                    ));
                    finished = true;
                }

                FlowEvent::Progress { completed, total } => {
                    self.progress = Some((completed, total));
                }

                FlowEvent::BatchFinished => {
                    info!("Export batch finished");
                    self.phase = FlowPhase::Done;
                    self.progress = None;
                    self.notice = Some(Notice::info(
                        "Success",
                        "All solutions exported successfully!",
                    ));
                    finished = true;
                }

                FlowEvent::BatchFailed(message) => {
                    error!(%message, "Export batch failed");
                    self.phase = FlowPhase::Failed;
                    self.progress = None;
                    self.notice = Some(Notice::error(
                        "Error",
                        format!("Error during export: {}", message),
                    ));
                    finished = true;
                }
            }
        }

        if finished {
            self.event_rx = None;
            self.flow_handle = None;
        }
        ctx.request_repaint();
    }

    // -------------------------------------------------------------------------
    // Status & Settings
    // -------------------------------------------------------------------------

    /// Set a status message.
    pub fn set_status(&mut self, msg: &str) {
        self.status_message = Some((msg.to_string(), chrono::Utc::now()));
    }

    /// Clear old status messages.
    pub fn clear_old_status(&mut self) {
        if let Some((_, time)) = &self.status_message {
            if chrono::Utc::now() - *time > chrono::Duration::seconds(5) {
                self.status_message = None;
            }
        }
    }

    /// Save settings to the database.
    pub fn save_settings(&mut self) {
        if let Err(e) = self.settings.save(&self.db) {
            error!("Failed to save settings: {}", e);
            self.set_status("Failed to save settings");
        }
    }

    // -------------------------------------------------------------------------
    // Folder Dialog
    // -------------------------------------------------------------------------

    /// Open a folder selection dialog asynchronously.
    pub fn open_folder_dialog(&mut self) {
        // Don't open another dialog if one is pending
        if self.folder_result_rx.is_some() {
            return;
        }

        let (tx, rx) = tokio::sync::oneshot::channel();
        self.folder_result_rx = Some(rx);

        let starting_dir = self.export_dir_input.trim().to_string();
        self.runtime.spawn(async move {
            let mut dialog = rfd::AsyncFileDialog::new();
            if !starting_dir.is_empty() {
                dialog = dialog.set_directory(&starting_dir);
            }
            let folder = dialog.pick_folder().await.map(|f| f.path().to_path_buf());
            let _ = tx.send(folder);
        });
    }

    /// Check for folder selection completion.
    fn check_folder_selection(&mut self) {
        if let Some(mut rx) = self.folder_result_rx.take() {
            match rx.try_recv() {
                Ok(Some(folder)) => {
                    info!("Selected export directory: {}", folder.display());
                    self.export_dir_input = folder.to_string_lossy().to_string();
                    self.set_status(&format!("Export directory: {}", folder.display()));
                }
                Ok(None) => {
                    // User cancelled the dialog
                    debug!("Folder selection cancelled");
                }
                Err(tokio::sync::oneshot::error::TryRecvError::Empty) => {
                    // Still waiting
                    self.folder_result_rx = Some(rx);
                }
                Err(tokio::sync::oneshot::error::TryRecvError::Closed) => {
                    warn!("Folder selection channel closed unexpectedly");
                }
            }
        }
    }
}

impl eframe::App for SolexApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Check for async completions
        self.check_folder_selection();

        // Process any pending events from the flow task
        self.process_events(ctx);
        self.clear_old_status();

        // Connection and export form at the top
        egui::TopBottomPanel::top("form_panel").show(ctx, |ui| {
            ui.add_space(4.0);
            ui::connection::render(self, ui);
            ui::export::render(self, ui);
            ui.add_space(4.0);
        });

        // Status bar at the bottom
        egui::TopBottomPanel::bottom("status_panel")
            .max_height(28.0)
            .show(ctx, |ui| {
                ui::status::render(self, ui);
            });

        // Log pane above the status bar
        egui::TopBottomPanel::bottom("log_panel")
            .resizable(true)
            .default_height(180.0)
            .show(ctx, |ui| {
                ui::logpane::render(self, ui);
            });

        // Notice dialog if open
        if self.notice.is_some() {
            ui::notice::render(self, ctx);
        }

        // Solution list fills the remaining space
        egui::CentralPanel::default().show(ctx, |ui| {
            ui::solutions::render(self, ui);
        });

        // Request repaint while background work is running
        if self.phase.is_busy() || self.folder_result_rx.is_some() {
            ctx.request_repaint();
        }
    }
}
