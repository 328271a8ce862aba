use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::layout::ReportLanguage;

#[derive(Parser, Debug, Clone)]
#[command(name = "redmine-report", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Overrides for the stored connection. Flags win over the environment,
/// which wins over the keyring.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Redmine base URL, e.g. https://redmine.example.com
    #[arg(long, global = true, env = "REDMINE_URL")]
    pub url: Option<String>,
    /// Redmine API key (My account -> API access key)
    #[arg(long, global = true, env = "REDMINE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
    /// Include closed issues when fetching the issue list
    #[arg(long, global = true)]
    pub all_statuses: bool,
    /// Ignore the cached issue list and refetch
    #[arg(long, global = true)]
    pub refresh: bool,
}

/// Narrows the fetched issue list before aggregation or export.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Only issues of this project (exact name)
    #[arg(long)]
    pub project: Option<String>,
    /// Only issues in this status (exact name)
    #[arg(long)]
    pub status: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Verify the connection and store it in the OS keyring
    Login,
    /// Forget the stored connection
    Logout,
    /// List projects visible to the account
    Projects,
    /// Print dashboard-style statistics over the issue list
    Summary {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Print one line per issue
    List {
        #[command(flatten)]
        filter: FilterArgs,
        /// Maximum number of issues to print
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print the details of one issue with its latest comments
    Show {
        /// Issue number
        id: i64,
    },
    /// Export the (filtered) issue list as UTF-8 CSV
    ExportCsv {
        #[command(flatten)]
        filter: FilterArgs,
        /// Output file; defaults to redmine_tickets_<timestamp>.csv
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Render a one-slide PowerPoint report for one issue
    Report {
        /// Issue number
        id: i64,
        /// Output file; defaults to ticket_<id>_report_<timestamp>.pptx
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Label language (ja or en); defaults to the configured language
        #[arg(long)]
        language: Option<ReportLanguage>,
    },
    /// Show or change persisted settings
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Print every setting and the config file location
    Show,
    /// Change one setting, e.g. `config set report_language en`
    Set { key: String, value: String },
    /// Restore default settings
    Reset,
}
