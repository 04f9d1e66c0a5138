//! shavtzak - a terminal interface for the unit's daily roster (שבצ״ק).
//!
//! Soldiers and their statuses are read from a Google Sheet, edited locally
//! and written back. Run with a flag for one-shot commands instead of the TUI.

mod app;
mod ui;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shavtzak_core::auth::FirebaseAuth;
use shavtzak_core::cache::CacheManager;
use shavtzak_core::config::Config;
use shavtzak_core::models::{EquipmentItem, EquipmentTemplate, ReportSettings, Soldier};
use shavtzak_core::notify::Mailer;
use shavtzak_core::registration::{RegistrationError, RegistrationFlow};
use shavtzak_core::report::build_report;
use shavtzak_core::sheets::SheetsClient;
use shavtzak_core::store::{TemplateStore, UserStore, TEMPLATES_FILE, USERS_FILE};

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

const USAGE: &str = "\
Usage: shavtzak [COMMAND]

Without a command the interactive roster editor starts.

Commands:
  --report                     Print today's report
  --export [FILE]              Write the roster as JSON (stdout by default)
  --email-report               Email today's report to the configured recipients
  --register                   Register an account for a soldier on the roster
  --new-template NAME ITEM...  Create an equipment template (ITEM is name:quantity)
  --help                       Show this message";

fn env_filter() -> EnvFilter {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Log to stderr; used by the one-shot commands
fn init_stderr_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter())
        .init();
}

/// Log to a daily file so output does not draw over the TUI.
/// The returned guard must live until exit to flush the writer.
fn init_file_tracing(log_dir: &Path) -> Option<WorkerGuard> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("shavtzak")
        .filename_suffix("log")
        .build(log_dir)
        .ok()?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(env_filter())
        .init();
    Some(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Some(command) = args.first() {
        init_stderr_tracing();
        return match command.as_str() {
            "--report" => print_report().await,
            "--export" => export_roster(args.get(1).map(PathBuf::from)).await,
            "--email-report" => email_report().await,
            "--register" => register().await,
            "--new-template" => new_template(&args[1..]),
            "--help" | "-h" => {
                println!("{}", USAGE);
                Ok(())
            }
            other => Err(anyhow!("Unknown command '{}'\n\n{}", other, USAGE)),
        };
    }

    let log_dir = Config::load()
        .and_then(|c| c.cache_dir())
        .unwrap_or_else(|_| PathBuf::from("./cache"))
        .join("logs");
    let _guard = init_file_tracing(&log_dir);
    info!("shavtzak starting");

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = match App::new().await {
        Ok(mut app) => {
            // Show cached data first, even behind the login overlay
            let cached = app.load_from_cache();

            if app.requires_login() && !app.restore_session().await {
                app.start_login();
            } else if !cached {
                app.refresh_background();
            }

            run_app(&mut terminal, &mut app).await
        }
        Err(e) => Err(e),
    };

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("shavtzak shutting down");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                if handle_input(app, key).await? {
                    return Ok(());
                }
            }
        }

        app.check_background_tasks();

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}

// ============================================================================
// One-shot commands
// ============================================================================

/// Fetch the roster from the sheet, falling back to the cached snapshot.
async fn load_soldiers(config: &Config) -> Result<Vec<Soldier>> {
    let cache = CacheManager::new(config.cache_dir()?)?;

    if let Some(id) = config.spreadsheet_id.as_deref().filter(|id| !id.trim().is_empty()) {
        let client = SheetsClient::new(id, config.sheet_name.clone())?
            .with_api_key(config.sheets_api_key.clone())
            .with_access_token(config.sheets_access_token());
        match client.fetch_soldiers().await {
            Ok(soldiers) => {
                if let Err(e) = cache.set_soldiers(&soldiers) {
                    warn!(error = %e, "Failed to cache roster");
                }
                return Ok(soldiers);
            }
            Err(e) => warn!(error = %e, "Fetching the roster failed, trying the cache"),
        }
    }

    let cached = cache
        .get_soldiers()
        .ok_or_else(|| anyhow!("No roster available: configure a spreadsheet or run online once"))?;
    eprintln!("Using cached roster ({})", cached.age_display());
    Ok(cached.data)
}

fn todays_report(soldiers: &[Soldier]) -> (ReportSettings, String) {
    let settings = ReportSettings::for_date(Local::now().date_naive());
    let body = build_report(soldiers, &settings);
    (settings, body)
}

async fn print_report() -> Result<()> {
    let config = Config::load()?;
    let soldiers = load_soldiers(&config).await?;
    let (_, body) = todays_report(&soldiers);
    print!("{}", body);
    Ok(())
}

async fn export_roster(path: Option<PathBuf>) -> Result<()> {
    let config = Config::load()?;
    let soldiers = load_soldiers(&config).await?;
    let json = serde_json::to_string_pretty(&soldiers)?;

    match path {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Exported {} soldiers to {}", soldiers.len(), path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

async fn email_report() -> Result<()> {
    let config = Config::load()?;
    let smtp = config
        .smtp_settings()
        .ok_or_else(|| anyhow!("SMTP is not configured (smtp_host and smtp_from in config.json)"))?;
    let soldiers = load_soldiers(&config).await?;
    let (settings, body) = todays_report(&soldiers);

    let mailer = Mailer::new(&smtp)?;
    let sent = mailer
        .send_report(&config.report_recipients, &settings, &body)
        .await?;
    eprintln!("Report sent to {} of {} recipients", sent, config.report_recipients.len());
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_new_password() -> Result<String> {
    loop {
        let password = rpassword::prompt_password("Password: ")?;
        let confirm = rpassword::prompt_password("Confirm password: ")?;
        if password == confirm {
            return Ok(password);
        }
        eprintln!("Passwords do not match, try again.");
    }
}

async fn register() -> Result<()> {
    let config = Config::load()?;
    let api_key = config
        .firebase_api_key
        .clone()
        .ok_or_else(|| anyhow!("FIREBASE_API_KEY is not configured"))?;
    let smtp = config
        .smtp_settings()
        .ok_or_else(|| anyhow!("SMTP is not configured; verification codes are sent by email"))?;
    let firebase = FirebaseAuth::new(api_key)?;
    let mailer = Mailer::new(&smtp)?;
    let users = UserStore::new(config.data_dir()?.join(USERS_FILE));

    println!("\n=== shavtzak registration ===\n");
    let soldiers = load_soldiers(&config).await?;
    let existing = users.list()?;

    let mut flow = RegistrationFlow::new();
    let personal_number = prompt("Personal number: ")?;
    let email = prompt("Email: ")?;
    let code = flow.start(&personal_number, &email, &soldiers, &existing)?;
    mailer.send_verification_code(flow.email(), &code).await?;
    println!("A verification code was sent to {}", flow.email());

    loop {
        let input = prompt("Verification code (or 'resend'): ")?;
        if input.eq_ignore_ascii_case("resend") {
            let code = flow.resend()?;
            mailer.send_verification_code(flow.email(), &code).await?;
            println!("A new code was sent.");
            continue;
        }
        match flow.verify(&input) {
            Ok(()) => break,
            Err(
                e @ (RegistrationError::WrongCode { .. }
                | RegistrationError::TooManyAttempts
                | RegistrationError::CodeExpired),
            ) => eprintln!("{}", e),
            Err(e) => return Err(e.into()),
        }
    }

    let password = prompt_new_password()?;
    let phone = prompt("Phone (optional): ")?;

    let session = firebase.sign_up(flow.email(), &password).await?;
    let user = flow.complete(&session.uid, Some(phone))?;
    users.upsert(&user)?;

    println!(
        "\nRegistered {}. An admin must approve the account before it can edit the roster.",
        user.full_name()
    );
    Ok(())
}

fn new_template(args: &[String]) -> Result<()> {
    let (name, specs) = args
        .split_first()
        .ok_or_else(|| anyhow!("Usage: shavtzak --new-template NAME ITEM..."))?;

    let mut template = EquipmentTemplate::new(name.trim());
    for spec in specs {
        let item = EquipmentItem::parse(spec)
            .ok_or_else(|| anyhow!("Invalid item '{}', expected name:quantity", spec))?;
        template.add_item(item);
    }

    let config = Config::load()?;
    let store = TemplateStore::new(config.data_dir()?.join(TEMPLATES_FILE));
    store.save_template(&template)?;
    println!(
        "Saved template '{}' with {} items ({} pieces)",
        template.name,
        template.items.len(),
        template.total_quantity()
    );
    Ok(())
}
