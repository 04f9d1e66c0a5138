//! Application state management for the shavtzak TUI.
//!
//! This module contains the core `App` struct that manages all application state,
//! including UI state, the roster being edited, session management, and
//! background task coordination.

use std::path::PathBuf;

use anyhow::Result;
use chrono::Local;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use shavtzak_core::auth::{CredentialStore, FirebaseAuth, Session};
use shavtzak_core::cache::CacheManager;
use shavtzak_core::config::Config;
use shavtzak_core::models::{
    EquipmentItem, EquipmentTemplate, FormErrors, ReportSettings, Soldier, SoldierForm, User,
};
use shavtzak_core::notify::Mailer;
use shavtzak_core::report::build_report;
use shavtzak_core::sheets::{SheetsClient, SyncSummary};
use shavtzak_core::store::{TemplateStore, UserStore, TEMPLATES_FILE, USERS_FILE};
use shavtzak_core::{Roster, Status};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 8;

/// Maximum length for the email input.
const MAX_EMAIL_LENGTH: usize = 64;

/// Maximum length for password input.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Maximum length for free-text prompts and form fields.
const MAX_TEXT_LENGTH: usize = 120;

/// Number of items to scroll on page up/down.
pub const PAGE_SCROLL_SIZE: usize = 10;

// ============================================================================
// UI State Types
// ============================================================================

/// Main navigation tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Roster,
    Equipment,
    Users,
    Report,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Roster, Tab::Equipment, Tab::Users, Tab::Report];

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Roster => "Roster",
            Tab::Equipment => "Equipment",
            Tab::Users => "Users",
            Tab::Report => "Report",
        }
    }

    /// Get the next tab (wrapping around)
    pub fn next(&self) -> Self {
        match self {
            Tab::Roster => Tab::Equipment,
            Tab::Equipment => Tab::Users,
            Tab::Users => Tab::Report,
            Tab::Report => Tab::Roster,
        }
    }

    /// Get the previous tab (wrapping around)
    pub fn prev(&self) -> Self {
        match self {
            Tab::Roster => Tab::Report,
            Tab::Equipment => Tab::Roster,
            Tab::Users => Tab::Equipment,
            Tab::Report => Tab::Users,
        }
    }
}

/// Single-line text prompts shown as an overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Notes,
    CustomStatus,
    TemplateName,
    TemplateItem,
}

impl PromptKind {
    pub fn title(&self) -> &'static str {
        match self {
            PromptKind::Notes => "Notes",
            PromptKind::CustomStatus => "Custom status",
            PromptKind::TemplateName => "New template name",
            PromptKind::TemplateItem => "Item (name:quantity, 0 removes)",
        }
    }
}

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    Searching,
    ShowingHelp,
    LoggingIn,
    EditingSoldier,
    Prompting(PromptKind),
    ConfirmingDiscard,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoginFocus {
    Email,
    Password,
    Button,
}

/// Field focus inside the add/edit soldier form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Id,
    FirstName,
    LastName,
    Platoon,
    Status,
    CustomStatus,
    Notes,
}

impl FormField {
    pub const ALL: [FormField; 7] = [
        FormField::Id,
        FormField::FirstName,
        FormField::LastName,
        FormField::Platoon,
        FormField::Status,
        FormField::CustomStatus,
        FormField::Notes,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FormField::Id => "Personal #",
            FormField::FirstName => "First name",
            FormField::LastName => "Last name",
            FormField::Platoon => "Platoon",
            FormField::Status => "Status",
            FormField::CustomStatus => "Custom",
            FormField::Notes => "Notes",
        }
    }

    pub fn next(&self) -> Self {
        let i = Self::ALL.iter().position(|f| f == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> Self {
        let i = Self::ALL.iter().position(|f| f == self).unwrap_or(0);
        Self::ALL[(i + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Results sent back from spawned tasks over the MPSC channel.
/// Each task has its own failure variant so only its flag is cleared.
enum RefreshResult {
    /// Roster fetched from the sheet
    Soldiers(Vec<Soldier>),
    RefreshFailed(String),
    /// These records were written back
    Synced { summary: SyncSummary, sent: Vec<Soldier> },
    SyncFailed(String),
    /// Report mailed to this many recipients
    Emailed(usize),
    EmailFailed(String),
}

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    // Core services
    pub config: Config,
    pub session: Session,
    firebase: Option<FirebaseAuth>,
    sheets: Option<SheetsClient>,
    pub cache: CacheManager,
    users: UserStore,
    templates: TemplateStore,

    // Data
    pub roster: Roster,
    pub current_user: Option<User>,
    pub user_list: Vec<User>,
    pub template_list: Vec<EquipmentTemplate>,
    pub report_settings: ReportSettings,

    // UI State
    pub state: AppState,
    pub current_tab: Tab,
    pub roster_selection: usize,
    pub equipment_selection: usize,
    pub users_selection: usize,
    pub report_scroll: u16,

    // Soldier form
    pub form: SoldierForm,
    pub form_field: FormField,
    pub form_errors: FormErrors,
    /// Personal number being edited, `None` when adding
    pub editing_id: Option<String>,

    // Prompt input
    pub prompt_input: String,

    // Login form state
    pub login_email: String,
    pub login_password: String,
    pub login_focus: LoginFocus,
    pub login_error: Option<String>,

    // Background task channel
    refresh_rx: mpsc::Receiver<RefreshResult>,
    refresh_tx: mpsc::Sender<RefreshResult>,
    pub refreshing: bool,
    pub syncing: bool,
    pub emailing: bool,

    // Status message
    pub status_message: Option<String>,
    pub cache_age: String,
}

impl App {
    /// Create a new application instance
    pub async fn new() -> Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };
        debug!(spreadsheet = ?config.spreadsheet_id, "Config loaded");

        let cache_dir = config.cache_dir().unwrap_or_else(|_| PathBuf::from("./cache"));
        let data_dir = config.data_dir().unwrap_or_else(|_| PathBuf::from("./data"));
        debug!(?cache_dir, ?data_dir, "Directories configured");

        Self::with_dirs(config, cache_dir, data_dir)
    }

    fn with_dirs(config: Config, cache_dir: PathBuf, data_dir: PathBuf) -> Result<Self> {
        let mut session = Session::new(cache_dir.clone());
        let load_result = session.load();
        debug!(?load_result, has_data = session.data.is_some(), "Session loaded");

        let firebase = match config.firebase_api_key.as_deref() {
            Some(key) => Some(FirebaseAuth::new(key)?),
            None => {
                info!("No Firebase API key configured, running without login");
                None
            }
        };

        let sheets = build_sheets_client(&config)?;
        let cache = CacheManager::new(cache_dir)?;
        let users = UserStore::new(data_dir.join(USERS_FILE));
        let templates = TemplateStore::new(data_dir.join(TEMPLATES_FILE));

        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        let login_email = config.last_email.clone().unwrap_or_default();
        let login_password = if login_email.is_empty() {
            String::new()
        } else {
            CredentialStore::get_password(&login_email).unwrap_or_default()
        };

        let mut app = Self {
            config,
            session,
            firebase,
            sheets,
            cache,
            users,
            templates,

            roster: Roster::new(),
            current_user: None,
            user_list: Vec::new(),
            template_list: Vec::new(),
            report_settings: ReportSettings::for_date(Local::now().date_naive()),

            state: AppState::Normal,
            current_tab: Tab::Roster,
            roster_selection: 0,
            equipment_selection: 0,
            users_selection: 0,
            report_scroll: 0,

            form: SoldierForm::default(),
            form_field: FormField::Id,
            form_errors: FormErrors::default(),
            editing_id: None,

            prompt_input: String::new(),

            login_email,
            login_password,
            login_focus: LoginFocus::Email,
            login_error: None,

            refresh_rx: rx,
            refresh_tx: tx,
            refreshing: false,
            syncing: false,
            emailing: false,

            status_message: None,
            cache_age: "never".to_string(),
        };
        app.reload_documents();
        Ok(app)
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    pub fn requires_login(&self) -> bool {
        self.firebase.is_some()
    }

    /// Check for a usable session, refreshing the ID token when it is close to expiry.
    pub async fn restore_session(&mut self) -> bool {
        let Some(firebase) = self.firebase.clone() else {
            return true;
        };
        let Some(data) = self.session.data.clone() else {
            return false;
        };

        if data.needs_refresh() {
            match firebase.refresh(&data).await {
                Ok(fresh) => {
                    self.session.update(fresh);
                    if let Err(e) = self.session.save() {
                        warn!(error = %e, "Failed to save refreshed session");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Session refresh failed");
                    return false;
                }
            }
        }

        self.load_current_user();
        self.session.is_valid()
    }

    fn load_current_user(&mut self) {
        self.current_user = match self.session.uid() {
            Some(uid) => self.users.get(uid).unwrap_or_else(|e| {
                warn!(error = %e, "Failed to read user store");
                None
            }),
            None => None,
        };
    }

    /// Attempt login with the credentials from the login form
    pub async fn attempt_login(&mut self) -> Result<()> {
        let email = self.login_email.trim().to_string();
        let password = self.login_password.clone();

        if email.is_empty() || password.is_empty() {
            self.login_error = Some("Email and password required".to_string());
            return Err(anyhow::anyhow!("Email and password required"));
        }
        let Some(firebase) = self.firebase.clone() else {
            self.state = AppState::Normal;
            return Ok(());
        };

        self.login_error = None;

        match firebase.sign_in(&email, &password).await {
            Ok(session_data) => {
                if let Err(e) = CredentialStore::store(&email, &password) {
                    warn!(error = %e, "Failed to store credentials");
                }

                self.config.last_email = Some(email);
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }

                self.session.update(session_data);
                if let Err(e) = self.session.save() {
                    warn!(error = %e, "Failed to save session");
                }

                self.load_current_user();
                if let Some(user) = &self.current_user {
                    if !user.is_active {
                        self.status_message =
                            Some("Account pending approval - read-only access".to_string());
                    }
                }

                self.login_password.clear();
                self.state = AppState::Normal;
                info!("Login successful");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Login failed");
                self.login_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Start the login process (show login overlay)
    pub fn start_login(&mut self) {
        self.state = AppState::LoggingIn;
        self.login_focus = if self.login_email.is_empty() {
            LoginFocus::Email
        } else {
            LoginFocus::Password
        };
        self.login_error = None;
    }

    pub fn logout(&mut self) {
        if let Err(e) = self.session.clear() {
            warn!(error = %e, "Failed to clear session");
        }
        if !self.login_email.is_empty() {
            if let Err(e) = CredentialStore::delete(&self.login_email) {
                debug!(error = %e, "No stored password to forget");
            }
        }
        self.login_password.clear();
        self.current_user = None;
        self.start_login();
    }

    /// Roster edits need an active commander or admin. Before any user exists
    /// (or without login) the local operator may edit.
    pub fn can_edit(&self) -> bool {
        match &self.current_user {
            Some(user) => user.can_edit_roster(),
            None => self.firebase.is_none() || self.user_list.is_empty(),
        }
    }

    pub fn can_manage_users(&self) -> bool {
        match &self.current_user {
            Some(user) => user.can_manage_users(),
            None => self.firebase.is_none() || self.user_list.is_empty(),
        }
    }

    pub fn can_write_sheet(&self) -> bool {
        self.sheets.as_ref().map(|s| s.can_write()).unwrap_or(false)
    }

    // =========================================================================
    // Cache Management
    // =========================================================================

    /// Load the roster snapshot from the cache. Returns false when absent or expired.
    pub fn load_from_cache(&mut self) -> bool {
        match self.cache.get_soldiers() {
            Some(cached) => {
                self.cache_age = cached.age_display();
                debug!(count = cached.data.len(), age = %self.cache_age, "Roster loaded from cache");
                self.roster.load(cached.data);
                true
            }
            None => false,
        }
    }

    fn reload_documents(&mut self) {
        match self.users.list_sorted() {
            Ok(users) => self.user_list = users,
            Err(e) => warn!(error = %e, "Failed to load users"),
        }
        match self.templates.list_sorted() {
            Ok(templates) => self.template_list = templates,
            Err(e) => warn!(error = %e, "Failed to load equipment templates"),
        }
        self.users_selection = self.users_selection.min(self.user_list.len().saturating_sub(1));
        self.equipment_selection = self
            .equipment_selection
            .min(self.template_list.len().saturating_sub(1));
    }

    // =========================================================================
    // Background Tasks
    // =========================================================================

    async fn send_result(tx: &mpsc::Sender<RefreshResult>, result: RefreshResult) {
        if let Err(e) = tx.send(result).await {
            error!(error = %e, "Failed to send background result - channel closed");
        }
    }

    /// Fetch the roster from the sheet in the background.
    pub fn refresh_background(&mut self) {
        let Some(client) = self.sheets.clone() else {
            self.status_message = Some("No spreadsheet configured".to_string());
            return;
        };
        if self.refreshing {
            return;
        }
        if self.syncing {
            self.status_message = Some("Sync in progress...".to_string());
            return;
        }
        if self.roster.has_changes() {
            self.status_message =
                Some("Unsynced changes - sync [S] or discard [D] before refreshing".to_string());
            return;
        }

        info!("Starting background roster refresh");
        self.refreshing = true;
        self.status_message = Some("Refreshing roster...".to_string());

        let tx = self.refresh_tx.clone();
        tokio::spawn(async move {
            let result = match client.fetch_soldiers().await {
                Ok(soldiers) => RefreshResult::Soldiers(soldiers),
                Err(e) => RefreshResult::RefreshFailed(format!("Refresh failed: {}", e)),
            };
            Self::send_result(&tx, result).await;
        });
    }

    /// Write changed soldiers back to the sheet in the background.
    pub fn sync_changes(&mut self) {
        if self.syncing {
            self.status_message = Some("Sync in progress...".to_string());
            return;
        }
        if self.refreshing {
            self.status_message = Some("Refresh in progress...".to_string());
            return;
        }
        if !self.can_edit() {
            self.status_message = Some("You do not have permission to edit the roster".to_string());
            return;
        }
        let Some(client) = self.sheets.clone() else {
            self.status_message = Some("No spreadsheet configured".to_string());
            return;
        };
        if !client.can_write() {
            self.status_message = Some("Read-only: set SHEETS_ACCESS_TOKEN to sync".to_string());
            return;
        }
        let changed: Vec<Soldier> = self.roster.changed_soldiers().into_iter().cloned().collect();
        if changed.is_empty() {
            self.status_message = Some("No changes to sync".to_string());
            return;
        }

        info!(count = changed.len(), "Syncing changes");
        self.syncing = true;
        self.status_message = Some(format!("Syncing {} changes...", changed.len()));

        let tx = self.refresh_tx.clone();
        tokio::spawn(async move {
            let refs: Vec<&Soldier> = changed.iter().collect();
            let result = match client.update_soldiers(&refs).await {
                Ok(summary) => RefreshResult::Synced {
                    summary,
                    sent: changed,
                },
                Err(e) => RefreshResult::SyncFailed(format!("Sync failed: {}", e)),
            };
            Self::send_result(&tx, result).await;
        });
    }

    /// Email the current report to the configured recipients.
    pub fn email_report(&mut self) {
        if self.emailing {
            self.status_message = Some("Report is already being sent...".to_string());
            return;
        }
        let Some(smtp) = self.config.smtp_settings() else {
            self.status_message = Some("SMTP is not configured".to_string());
            return;
        };
        if self.config.report_recipients.is_empty() {
            self.status_message = Some("No report recipients configured".to_string());
            return;
        }

        let recipients = self.config.report_recipients.clone();
        let settings = self.report_settings.clone();
        let body = self.report_text();
        let tx = self.refresh_tx.clone();
        self.emailing = true;
        self.status_message = Some("Sending report...".to_string());

        tokio::spawn(async move {
            let result = match Mailer::new(&smtp) {
                Ok(mailer) => match mailer.send_report(&recipients, &settings, &body).await {
                    Ok(sent) => RefreshResult::Emailed(sent),
                    Err(e) => RefreshResult::EmailFailed(format!("Email failed: {}", e)),
                },
                Err(e) => RefreshResult::EmailFailed(format!("Email failed: {}", e)),
            };
            Self::send_result(&tx, result).await;
        });
    }

    /// Check for completed background tasks and process results
    pub fn check_background_tasks(&mut self) {
        while let Ok(result) = self.refresh_rx.try_recv() {
            self.process_refresh_result(result);
        }
    }

    fn process_refresh_result(&mut self, result: RefreshResult) {
        match result {
            RefreshResult::Soldiers(soldiers) => {
                self.refreshing = false;
                if let Err(e) = self.cache.set_soldiers(&soldiers) {
                    warn!(error = %e, "Failed to cache roster");
                }
                self.cache_age = self.cache.soldiers_age();
                if self.roster.has_changes() {
                    warn!("Fetched roster not applied over unsynced changes");
                    self.status_message =
                        Some("Fetched roster not applied - sync or discard changes first".to_string());
                    return;
                }
                let count = soldiers.len();
                self.roster.load(soldiers);
                self.clamp_roster_selection();
                self.status_message = Some(format!("Loaded {} soldiers", count));
            }
            RefreshResult::RefreshFailed(message) => {
                self.refreshing = false;
                warn!(%message, "Refresh failed");
                self.status_message = Some(message);
            }
            RefreshResult::Synced { summary, sent } => {
                self.syncing = false;
                self.roster.mark_synced(&sent);
                if let Err(e) = self.cache.set_soldiers(self.roster.baseline()) {
                    warn!(error = %e, "Failed to cache roster");
                }
                self.cache_age = self.cache.soldiers_age();
                self.status_message = Some(format!(
                    "Synced: {} updated, {} added",
                    summary.updated, summary.appended
                ));
            }
            RefreshResult::SyncFailed(message) => {
                self.syncing = false;
                warn!(%message, "Sync failed");
                self.status_message = Some(message);
            }
            RefreshResult::Emailed(sent) => {
                self.emailing = false;
                self.status_message = Some(format!("Report sent to {} recipients", sent));
            }
            RefreshResult::EmailFailed(message) => {
                self.emailing = false;
                warn!(%message, "Email failed");
                self.status_message = Some(message);
            }
        }
    }

    // =========================================================================
    // Roster
    // =========================================================================

    pub fn visible_soldiers(&self) -> Vec<&Soldier> {
        self.roster.filtered()
    }

    pub fn selected_soldier(&self) -> Option<&Soldier> {
        self.visible_soldiers().get(self.roster_selection).copied()
    }

    fn selected_soldier_id(&self) -> Option<String> {
        self.selected_soldier().map(|s| s.id.clone())
    }

    pub fn clamp_roster_selection(&mut self) {
        let len = self.visible_soldiers().len();
        self.roster_selection = self.roster_selection.min(len.saturating_sub(1));
    }

    /// Returns false (with a status message) when edits are not allowed right now.
    fn ensure_editable(&mut self) -> bool {
        if self.syncing {
            self.status_message = Some("Sync in progress...".to_string());
            false
        } else if self.refreshing {
            self.status_message = Some("Refresh in progress...".to_string());
            false
        } else if !self.can_edit() {
            self.status_message = Some("You do not have permission to edit the roster".to_string());
            false
        } else {
            true
        }
    }

    pub fn toggle_selected(&mut self) {
        if let Some(id) = self.selected_soldier_id() {
            if let Err(e) = self.roster.toggle_selected(&id) {
                self.status_message = Some(e.to_string());
            }
        }
    }

    /// Cycle the status of the checked soldiers, or of the highlighted one
    /// when nothing is checked.
    pub fn cycle_status(&mut self) {
        if !self.ensure_editable() {
            return;
        }
        let Some(current) = self.selected_soldier() else {
            return;
        };
        let next = current.status.next();

        if !self.roster.selected().is_empty() {
            let count = self.roster.set_status_for_selected(next, None);
            self.status_message = Some(format!("{} soldiers set to {}", count, next));
        } else if let Some(id) = self.selected_soldier_id() {
            if let Err(e) = self.roster.set_status(&id, next, None) {
                self.status_message = Some(e.to_string());
            }
        }
        self.clamp_roster_selection();
    }

    pub fn open_prompt(&mut self, kind: PromptKind) {
        match kind {
            PromptKind::Notes | PromptKind::CustomStatus => {
                if !self.ensure_editable() {
                    return;
                }
                let Some(soldier) = self.selected_soldier() else {
                    return;
                };
                self.prompt_input = match kind {
                    PromptKind::Notes => soldier.notes_display().to_string(),
                    _ => soldier.custom_status.clone().unwrap_or_default(),
                };
            }
            PromptKind::TemplateName => self.prompt_input.clear(),
            PromptKind::TemplateItem => {
                if self.template_list.is_empty() {
                    self.status_message = Some("Create a template first [n]".to_string());
                    return;
                }
                self.prompt_input.clear();
            }
        }
        self.state = AppState::Prompting(kind);
    }

    pub fn submit_prompt(&mut self, kind: PromptKind) {
        let input = std::mem::take(&mut self.prompt_input);
        self.state = AppState::Normal;

        match kind {
            PromptKind::Notes => {
                if let Some(id) = self.selected_soldier_id() {
                    if let Err(e) = self.roster.set_notes(&id, &input) {
                        self.status_message = Some(e.to_string());
                    }
                }
            }
            PromptKind::CustomStatus => {
                let text = input.trim().to_string();
                if text.is_empty() {
                    self.status_message = Some("Custom status cannot be empty".to_string());
                    return;
                }
                if !self.roster.selected().is_empty() {
                    let count = self.roster.set_status_for_selected(Status::Other, Some(text));
                    self.status_message = Some(format!("{} soldiers updated", count));
                } else if let Some(id) = self.selected_soldier_id() {
                    if let Err(e) = self.roster.set_status(&id, Status::Other, Some(text)) {
                        self.status_message = Some(e.to_string());
                    }
                }
                self.clamp_roster_selection();
            }
            PromptKind::TemplateName => self.create_template(&input),
            PromptKind::TemplateItem => self.edit_template_item(&input),
        }
    }

    pub fn start_add_soldier(&mut self) {
        if !self.ensure_editable() {
            return;
        }
        self.form = SoldierForm {
            status: Some(Status::Home),
            ..SoldierForm::default()
        };
        self.form_field = FormField::Id;
        self.form_errors = FormErrors::default();
        self.editing_id = None;
        self.state = AppState::EditingSoldier;
    }

    pub fn start_edit_soldier(&mut self) {
        if !self.ensure_editable() {
            return;
        }
        let Some(soldier) = self.selected_soldier() else {
            return;
        };
        let form = SoldierForm::from_soldier(soldier);
        self.editing_id = Some(form.id.clone());
        self.form = form;
        self.form_field = FormField::FirstName;
        self.form_errors = FormErrors::default();
        self.state = AppState::EditingSoldier;
    }

    pub fn form_field_mut(&mut self) -> Option<&mut String> {
        match self.form_field {
            FormField::Id => Some(&mut self.form.id),
            FormField::FirstName => Some(&mut self.form.first_name),
            FormField::LastName => Some(&mut self.form.last_name),
            FormField::Platoon => Some(&mut self.form.platoon),
            FormField::CustomStatus => Some(&mut self.form.custom_status),
            FormField::Notes => Some(&mut self.form.notes),
            FormField::Status => None,
        }
    }

    pub fn cycle_form_status(&mut self) {
        self.form.status = Some(self.form.status.map(|s| s.next()).unwrap_or(Status::Home));
    }

    pub fn submit_form(&mut self) {
        self.form_errors = self.form.validate();
        if !self.form_errors.is_empty() {
            return;
        }

        let result = match self.editing_id.clone() {
            Some(id) => self.roster.update_soldier(&id, &self.form),
            None => self.roster.add_manual(&self.form).map(|_| ()),
        };

        match result {
            Ok(()) => {
                self.status_message = Some(match self.editing_id {
                    Some(_) => "Soldier updated".to_string(),
                    None => "Soldier added".to_string(),
                });
                self.state = AppState::Normal;
                self.clamp_roster_selection();
            }
            Err(e) => self.status_message = Some(e.to_string()),
        }
    }

    pub fn remove_selected_soldier(&mut self) {
        if !self.ensure_editable() {
            return;
        }
        let Some(id) = self.selected_soldier_id() else {
            return;
        };
        match self.roster.remove(&id) {
            Ok(soldier) => {
                self.status_message = Some(format!("Removed {} (not deleted from the sheet)", soldier.name));
            }
            Err(e) => self.status_message = Some(e.to_string()),
        }
        self.clamp_roster_selection();
    }

    pub fn discard_changes(&mut self) {
        self.roster.discard_changes();
        self.clamp_roster_selection();
        self.status_message = Some("Changes discarded".to_string());
    }

    // =========================================================================
    // Equipment templates
    // =========================================================================

    pub fn selected_template(&self) -> Option<&EquipmentTemplate> {
        self.template_list.get(self.equipment_selection)
    }

    fn create_template(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        // Saved once it has its first item; templates cannot be empty
        let template = EquipmentTemplate::new(name);
        if self
            .template_list
            .iter()
            .any(|t| t.name.trim().eq_ignore_ascii_case(name))
        {
            self.status_message = Some(format!("A template named '{}' already exists", name));
            return;
        }
        self.template_list.push(template);
        self.equipment_selection = self.template_list.len() - 1;
        self.status_message = Some("Add items with [i] to save the template".to_string());
        self.open_prompt(PromptKind::TemplateItem);
    }

    fn edit_template_item(&mut self, input: &str) {
        let Some(item) = EquipmentItem::parse(input) else {
            self.status_message = Some("Use the form name:quantity".to_string());
            return;
        };
        let Some(template) = self.template_list.get_mut(self.equipment_selection) else {
            return;
        };

        if item.quantity == 0 {
            template.remove_item(&item.name);
        } else if !template.set_quantity(&item.name, item.quantity) {
            template.add_item(item);
        }

        if template.items.is_empty() {
            match self.templates.delete(&template.id) {
                Ok(_) => self.status_message = Some("Template removed (no items left)".to_string()),
                Err(e) => self.status_message = Some(e.to_string()),
            }
        } else {
            match self.templates.save_template(template) {
                Ok(()) => self.status_message = Some(format!("Saved {}", template.name)),
                Err(e) => self.status_message = Some(e.to_string()),
            }
        }
        self.reload_documents();
    }

    pub fn delete_selected_template(&mut self) {
        let Some(template) = self.selected_template() else {
            return;
        };
        let id = template.id.clone();
        let name = template.name.clone();
        match self.templates.delete(&id) {
            Ok(_) => self.status_message = Some(format!("Deleted {}", name)),
            Err(e) => self.status_message = Some(e.to_string()),
        }
        self.reload_documents();
    }

    // =========================================================================
    // Users
    // =========================================================================

    fn selected_user_uid(&self) -> Option<String> {
        self.user_list.get(self.users_selection).map(|u| u.uid.clone())
    }

    pub fn cycle_selected_user_role(&mut self) {
        if !self.can_manage_users() {
            self.status_message = Some("Only admins can manage users".to_string());
            return;
        }
        let Some(uid) = self.selected_user_uid() else {
            return;
        };
        let Some(role) = self.user_list.get(self.users_selection).map(|u| u.role.next()) else {
            return;
        };
        match self.users.set_role(&uid, role) {
            Ok(_) => self.status_message = Some(format!("Role set to {}", role)),
            Err(e) => self.status_message = Some(e.to_string()),
        }
        self.reload_documents();
    }

    pub fn toggle_selected_user_active(&mut self) {
        if !self.can_manage_users() {
            self.status_message = Some("Only admins can manage users".to_string());
            return;
        }
        let Some(user) = self.user_list.get(self.users_selection) else {
            return;
        };
        let (uid, active) = (user.uid.clone(), !user.is_active);
        match self.users.set_active(&uid, active) {
            Ok(_) => {
                self.status_message =
                    Some(if active { "User approved" } else { "User deactivated" }.to_string())
            }
            Err(e) => self.status_message = Some(e.to_string()),
        }
        self.reload_documents();
    }

    // =========================================================================
    // Report
    // =========================================================================

    pub fn report_text(&self) -> String {
        build_report(self.roster.soldiers(), &self.report_settings)
    }

    /// Write the report to a dated text file in the data directory.
    pub fn export_report(&mut self) {
        let result = self.config.data_dir().and_then(|dir| {
            std::fs::create_dir_all(&dir)?;
            let path = dir.join(format!("report-{}.txt", self.report_settings.date.format("%Y-%m-%d")));
            std::fs::write(&path, self.report_text())?;
            Ok(path)
        });
        self.status_message = Some(match result {
            Ok(path) => format!("Report written to {}", path.display()),
            Err(e) => format!("Export failed: {}", e),
        });
    }
}

fn build_sheets_client(config: &Config) -> Result<Option<SheetsClient>> {
    let Some(id) = config.spreadsheet_id.as_deref().filter(|id| !id.trim().is_empty()) else {
        return Ok(None);
    };
    let client = SheetsClient::new(id, config.sheet_name.clone())?
        .with_api_key(config.sheets_api_key.clone())
        .with_access_token(config.sheets_access_token());
    Ok(Some(client))
}

// ============================================================================
// Input validation helpers (exported for use in input.rs)
// ============================================================================

/// Check if a character is valid for input (no control characters)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

pub fn can_add_email_char(current_len: usize, c: char) -> bool {
    current_len < MAX_EMAIL_LENGTH && is_valid_input_char(c) && !c.is_whitespace()
}

pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

pub fn can_add_text_char(current_len: usize, c: char) -> bool {
    current_len < MAX_TEXT_LENGTH && is_valid_input_char(c)
}

// ============================================================================
// Tests
// ============================================================================
