pub mod analytics;
pub mod cli;
pub mod config;
pub mod export;
pub mod issue_cache;
pub mod layout;
pub mod normalize;
pub mod pptx;
mod print;
pub mod secrets;
pub mod view;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{Local, Utc};
use clap::Parser;
use log::{debug, info, warn};
use redmine_api::{IssueQuery, RawIssue, RedmineClient, RedmineConfig};
use tokio::task;

use analytics::{Dimension, IssueFilter, StatusClassifier};
use cli::{Cli, Command, ConfigCommand, ConnectionArgs, FilterArgs};
use config::{Config, ConfigManager};
use issue_cache::{ConnectionKey, IssueCache};
use layout::ReportLanguage;
use normalize::NormalizedRow;
use pptx::DocumentInfo;
use secrets::{redact, SecretsManager, StoredCredentials, KEYRING_SERVICE};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

const NOT_AUTHENTICATED: &str =
    "Not authenticated. Run `redmine-report login --url <URL> --api-key <KEY>` or set REDMINE_URL and REDMINE_API_KEY.";

struct App {
    connection: ConnectionArgs,
    config: Config,
    config_manager: ConfigManager,
    secrets: SecretsManager,
    cache: IssueCache,
}

impl App {
    fn include_closed(&self) -> bool {
        self.connection.all_statuses || self.config.include_closed
    }

    async fn stored_session(&self) -> Result<Option<StoredCredentials>, String> {
        let manager = self.secrets.clone();
        task::spawn_blocking(move || manager.get_session())
            .await
            .map_err(|err| format!("Failed to read stored credentials: {}", err))?
    }

    async fn credentials(&self) -> Result<StoredCredentials, String> {
        let flag_url = self.connection.url.as_deref();
        let flag_key = self.connection.api_key.as_deref();
        let stored = if flag_url.is_some() && flag_key.is_some() {
            None
        } else {
            self.stored_session().await.unwrap_or_else(|err| {
                warn!("Ignoring keyring: {}", err);
                None
            })
        };
        merge_credentials(flag_url, flag_key, stored, &self.config.base_url)
    }

    fn client(&self, credentials: &StoredCredentials) -> Result<RedmineClient, String> {
        let config = RedmineConfig::new(credentials.base_url.clone(), credentials.api_key.clone())
            .with_user_agent(USER_AGENT)
            .with_page_size(self.config.page_size)
            .with_cooldown(self.config.request_cooldown())
            .with_timeout(self.config.timeout());
        RedmineClient::new(config).map_err(|err| format!("Failed to create client: {}", err))
    }

    async fn load_issues(
        &self,
        client: &RedmineClient,
        credentials: &StoredCredentials,
    ) -> Result<Vec<RawIssue>, String> {
        let key = ConnectionKey::new(
            credentials.base_url.clone(),
            credentials.api_key.clone(),
            self.include_closed(),
        );
        if !self.connection.refresh {
            if let Some(issues) = self.cache.get(&key) {
                debug!("Serving {} issues from cache", issues.len());
                return Ok(issues);
            }
        }

        let query = if self.include_closed() {
            IssueQuery::all_statuses()
        } else {
            IssueQuery::default()
        };
        let issues = client
            .get_all_issues(&query)
            .await
            .map_err(|err| wrap_error("failed to fetch issues", &err, credentials))?;
        info!("Fetched {} issues from {}", issues.len(), credentials.base_url);
        if let Err(err) = self.cache.store(&key, &issues) {
            warn!("Failed to write issue cache: {}", err);
        }
        Ok(issues)
    }

    async fn filtered_rows(&self, filter: &FilterArgs) -> Result<Vec<NormalizedRow>, String> {
        let credentials = self.credentials().await?;
        let client = self.client(&credentials)?;
        let issues = self.load_issues(&client, &credentials).await?;
        Ok(issue_filter(filter).apply(normalize::normalize_all(&issues)))
    }

    async fn fetch_issue(&self, id: i64) -> Result<RawIssue, String> {
        let credentials = self.credentials().await?;
        let client = self.client(&credentials)?;
        client
            .get_issue(id)
            .await
            .map_err(|err| wrap_error(&format!("failed to fetch issue #{id}"), &err, &credentials))
    }
}

fn issue_filter(args: &FilterArgs) -> IssueFilter {
    IssueFilter {
        project: args.project.clone(),
        status: args.status.clone(),
    }
}

/// Flags and environment take precedence over the keyring; the configured
/// base URL is the last resort for the server address.
fn merge_credentials(
    flag_url: Option<&str>,
    flag_key: Option<&str>,
    stored: Option<StoredCredentials>,
    default_url: &str,
) -> Result<StoredCredentials, String> {
    let url = flag_url
        .map(str::to_string)
        .or_else(|| stored.as_ref().map(|session| session.base_url.clone()))
        .unwrap_or_else(|| default_url.to_string());
    let key = flag_key
        .map(str::to_string)
        .or_else(|| stored.map(|session| session.api_key))
        .ok_or_else(|| NOT_AUTHENTICATED.to_string())?;
    StoredCredentials::new(&url, &key)
}

fn wrap_error(context: &str, err: &redmine_api::RedmineError, credentials: &StoredCredentials) -> String {
    let message = format!("{}: {}", context, err);
    let message = redact(&message, &credentials.api_key);
    if err.is_authentication() {
        format!("{message} (check the API key and that the REST API is enabled)")
    } else {
        message
    }
}

async fn write_output(path: &Path, bytes: &[u8]) -> Result<(), String> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|err| format!("Failed to write {}: {}", path.display(), err))
}

async fn login(app: &App) -> Result<(), String> {
    let url = app
        .connection
        .url
        .clone()
        .unwrap_or_else(|| app.config.base_url.clone());
    let key = app
        .connection
        .api_key
        .clone()
        .ok_or_else(|| "login requires --api-key or REDMINE_API_KEY".to_string())?;
    let credentials = StoredCredentials::new(&url, &key)?;

    let client = app.client(&credentials)?;
    client
        .check_connection()
        .await
        .map_err(|err| wrap_error("connection check failed", &err, &credentials))?;

    let manager = app.secrets.clone();
    let saved = task::spawn_blocking(move || manager.save_session(&credentials.base_url, &credentials.api_key))
        .await
        .map_err(|err| format!("Failed to store credentials: {}", err))??;
    clear_cache(app);
    info!("Stored credentials for {}", saved.base_url);
    println!("Connected to {}. Credentials stored in the OS keyring.", saved.base_url);
    Ok(())
}

async fn logout(app: &App) -> Result<(), String> {
    let manager = app.secrets.clone();
    task::spawn_blocking(move || manager.clear_session())
        .await
        .map_err(|err| format!("Failed to clear credentials: {}", err))??;
    clear_cache(app);
    println!("Stored credentials removed.");
    Ok(())
}

fn clear_cache(app: &App) {
    if let Err(err) = app.cache.invalidate() {
        warn!("Failed to clear issue cache: {}", err);
    }
}

async fn projects(app: &App) -> Result<(), String> {
    let credentials = app.credentials().await?;
    let client = app.client(&credentials)?;
    let projects = client
        .get_projects()
        .await
        .map_err(|err| wrap_error("failed to fetch projects", &err, &credentials))?;
    print::print_projects(&projects);
    Ok(())
}

async fn summary(app: &App, filter: &FilterArgs) -> Result<(), String> {
    let rows = app.filtered_rows(filter).await?;
    let rows: Vec<&NormalizedRow> = rows.iter().collect();
    let statuses = StatusClassifier::new(&app.config.closed_status_pattern)
        .map_err(|err| format!("invalid closed_status_pattern: {}", err))?;
    let today = Local::now().date_naive();

    print::print_overview(&analytics::overview(&rows, &statuses));
    print::print_counts("By status", &analytics::value_counts(&rows, Dimension::Status));
    print::print_counts("By priority", &analytics::value_counts(&rows, Dimension::Priority));
    print::print_counts("By tracker", &analytics::value_counts(&rows, Dimension::Tracker));
    print::print_counts("By project", &analytics::value_counts(&rows, Dimension::Project));
    print::print_counts("Top assignees", &analytics::assignee_counts(&rows));
    print::print_workload(&analytics::workload_by_assignee(&rows));
    print::print_counts("Due dates by month", &analytics::deadline_months(&rows));
    print::print_dated_rows("Overdue", &analytics::overdue(&rows, today));
    print::print_dated_rows(
        &format!("Due within {} days", app.config.upcoming_window_days),
        &analytics::upcoming(&rows, today, app.config.upcoming_window_days),
    );
    print::print_schedule(&analytics::schedule(&rows));
    Ok(())
}

async fn list(app: &App, filter: &FilterArgs, limit: Option<usize>) -> Result<(), String> {
    let rows = app.filtered_rows(filter).await?;
    let labels = app.config.report_language.labels();
    let shown = limit.unwrap_or(rows.len()).min(rows.len());
    for row in rows.iter().take(shown) {
        println!("{}", view::list_entry(row, labels));
    }
    println!("{} of {} issues", shown, rows.len());
    Ok(())
}

async fn show(app: &App, id: i64) -> Result<(), String> {
    let issue = app.fetch_issue(id).await?;
    println!("{}", view::issue_detail(&issue, app.config.report_language.labels()));
    Ok(())
}

async fn export_csv(app: &App, filter: &FilterArgs, output: Option<PathBuf>) -> Result<(), String> {
    let rows = app.filtered_rows(filter).await?;
    let bytes = export::rows_to_csv(&rows).map_err(|err| format!("failed to export CSV: {}", err))?;
    let path = output.unwrap_or_else(|| PathBuf::from(export::default_csv_filename(Local::now())));
    write_output(&path, &bytes).await?;
    println!("Exported {} issues to {}", rows.len(), path.display());
    Ok(())
}

async fn report(
    app: &App,
    id: i64,
    output: Option<PathBuf>,
    language: Option<ReportLanguage>,
) -> Result<(), String> {
    let issue = app.fetch_issue(id).await?;
    let language = language.unwrap_or(app.config.report_language);
    let blocks = layout::layout_with(&issue, language);
    debug!("Laid out {} blocks for issue #{}", blocks.len(), id);

    let info = DocumentInfo {
        title: format!("#{} {}", id, issue.subject.as_deref().unwrap_or_default()),
        created: Utc::now(),
    };
    let bytes = pptx::write_presentation(&blocks, &info)
        .map_err(|err| format!("failed to generate report: {}", err))?;
    let path = output.unwrap_or_else(|| PathBuf::from(export::default_report_filename(id, Local::now())));
    write_output(&path, &bytes).await?;
    println!("Report for #{} written to {}", id, path.display());
    Ok(())
}

fn configure(app: &App, command: ConfigCommand) -> Result<(), String> {
    match command {
        ConfigCommand::Show => {
            print::print_config(&app.config, app.config_manager.path());
            return Ok(());
        }
        ConfigCommand::Set { key, value } => {
            let mut config = app.config.clone();
            config.set(&key, &value)?;
            save_config(app, &config)?;
            println!("{key} = {}", value.trim());
        }
        ConfigCommand::Reset => {
            save_config(app, &Config::default())?;
            println!("Settings restored to defaults.");
        }
    }
    Ok(())
}

fn save_config(app: &App, config: &Config) -> Result<(), String> {
    app.config_manager
        .save(config)
        .map_err(|err| format!("Failed to save config: {}", err))
}

async fn execute(cli: Cli) -> Result<(), String> {
    let config_manager = ConfigManager::new()?;
    let config = config_manager.load();
    let cache = IssueCache::new(config.cache_ttl())?;
    let app = App {
        connection: cli.connection,
        config,
        config_manager,
        secrets: SecretsManager::new(KEYRING_SERVICE),
        cache,
    };

    match cli.command {
        Command::Login => login(&app).await,
        Command::Logout => logout(&app).await,
        Command::Projects => projects(&app).await,
        Command::Summary { filter } => summary(&app, &filter).await,
        Command::List { filter, limit } => list(&app, &filter, limit).await,
        Command::Show { id } => show(&app, id).await,
        Command::ExportCsv { filter, output } => export_csv(&app, &filter, output).await,
        Command::Report { id, output, language } => report(&app, id, output, language).await,
        Command::Config(command) => configure(&app, command),
    }
}

pub fn run() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .try_init();
    if let Ok(path) = dotenv {
        debug!("Loaded environment from {}", path.display());
    }

    let cli = Cli::parse();
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: failed to start async runtime: {}", err);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(execute(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{merge_credentials, wrap_error, NOT_AUTHENTICATED};
    use crate::secrets::StoredCredentials;
    use redmine_api::RedmineError;

    fn stored() -> StoredCredentials {
        StoredCredentials::new("https://stored.example.com", "stored-key").unwrap()
    }

    #[test]
    fn flags_override_stored_credentials() {
        let merged = merge_credentials(
            Some("https://flag.example.com/"),
            Some("flag-key"),
            Some(stored()),
            "http://localhost:3000",
        )
        .unwrap();
        assert_eq!(merged.base_url, "https://flag.example.com");
        assert_eq!(merged.api_key, "flag-key");
    }

    #[test]
    fn stored_credentials_fill_missing_flags() {
        let merged = merge_credentials(None, Some("flag-key"), Some(stored()), "http://localhost:3000").unwrap();
        assert_eq!(merged.base_url, "https://stored.example.com");
        assert_eq!(merged.api_key, "flag-key");

        let merged = merge_credentials(None, None, Some(stored()), "http://localhost:3000").unwrap();
        assert_eq!(merged, stored());
    }

    #[test]
    fn configured_url_is_the_fallback_address() {
        let merged = merge_credentials(None, Some("k"), None, "http://localhost:3000").unwrap();
        assert_eq!(merged.base_url, "http://localhost:3000");
    }

    #[test]
    fn missing_key_is_reported() {
        assert_eq!(
            merge_credentials(Some("https://x.example.com"), None, None, "http://localhost:3000"),
            Err(NOT_AUTHENTICATED.to_string())
        );
    }

    #[test]
    fn wrapped_errors_never_leak_the_key() {
        let credentials = StoredCredentials::new("https://x.example.com", "sekrit").unwrap();
        let err = RedmineError::Other("request to https://x.example.com/issues.json?key=sekrit failed".into());
        let message = wrap_error("failed to fetch issues", &err, &credentials);
        assert!(message.starts_with("failed to fetch issues: "));
        assert!(!message.contains("sekrit"));

        let rejected = RedmineError::Authentication("invalid API key".into());
        let message = wrap_error("failed to fetch issues", &rejected, &credentials);
        assert!(message.contains("check the API key"));
    }
}
