use std::io::{self, IsTerminal};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;

mod client;
mod config;
mod csv_mapper;
mod datetime;
mod error;
mod export_command;
mod import_command;
mod model_converter;
mod progress;
mod project;
mod rest_client;
mod time_entry;
mod time_range;
mod time_record;
mod toggl;
mod workspace;

use client::ClientRepository;
use config::Config;
use export_command::{ExportArgs, ExportCommand};
use import_command::{ImportArgs, ImportCommand};
use model_converter::TogglModelConverter;
use progress::{ConsoleProgress, SilentProgress};
use project::ProjectRepository;
use rest_client::TogglRestClient;
use time_record::TimeRecordRepository;
use toggl::TogglApi;
use workspace::WorkspaceRepository;

/// `--help`の末尾に表示する環境変数の説明。
const ENVIRONMENT_HELP: &str = "\
ENVIRONMENT:
    TOGGL_API_TOKEN          Toggl API token, used when --token is not given
    TOGGL_API_URL            Toggl API base URL [default: https://api.track.toggl.com/api/v8]
                             The default points at the v8 API; set this to reach a compatible endpoint
    TOGGL_REQUEST_PAUSE_MS   Pause between API requests in milliseconds [default: 1000]";

/// Togglの時間記録をCSVでインポート・エクスポートするためのCLIアプリケーション。
///
/// # Examples
/// ```
/// $ togglcsv export 2016-07-12 2016-08-12 > records.csv
/// $ togglcsv import < records.csv
/// ```
#[derive(Debug, Parser)]
#[clap(version, about, after_help = ENVIRONMENT_HELP)]
struct Args {
    #[clap(short = 'v', long = "verbose", global = true, help = "Print debug logs")]
    verbose: bool,

    #[clap(subcommand)]
    subcommand: SubCommands,
}

/// サブコマンドを表す列挙型。
#[derive(Debug, Subcommand)]
enum SubCommands {
    /// Export time records as CSV to stdout
    Export(ExportArgs),
    /// Import time records as CSV from stdin
    Import(ImportArgs),
}

impl SubCommands {
    fn token(&self) -> Option<String> {
        match self {
            SubCommands::Export(export) => export.token.clone(),
            SubCommands::Import(import) => import.token.clone(),
        }
    }
}

/// ログの出力先を設定する。標準出力はCSVに使うため、ログは標準エラー出力に書き込む。
fn setup_logger(verbose: bool) -> Result<()> {
    let colors = ColoredLevelConfig::new()
        .info(Color::Green)
        .debug(Color::Blue)
        .warn(Color::Yellow)
        .error(Color::Red);
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} {} [{}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(LevelFilter::Warn)
        .level_for(env!("CARGO_PKG_NAME"), level)
        .chain(io::stderr())
        .apply()
        .context("Failed to set up logger")?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logger(args.verbose)?;

    let config = Config::load(args.subcommand.token())?;
    let api = TogglApi::new(TogglRestClient::new(&config));
    let workspaces = WorkspaceRepository::new(&api);
    let clients = ClientRepository::new(&api, &workspaces);
    let projects = ProjectRepository::new(&api, &workspaces, &clients);
    let converter = TogglModelConverter::new(&workspaces, &projects, &clients);
    let time_records = TimeRecordRepository::new(&api, &projects, &converter);

    match &args.subcommand {
        SubCommands::Export(export) => {
            let mut stdout = io::stdout().lock();
            ExportCommand::new(&time_records)
                .run(export, &mut stdout)
                .await?;
        }
        SubCommands::Import(_) => {
            let stdin = io::stdin().lock();
            let mut stderr = io::stderr();
            if stderr.is_terminal() {
                let mut progress = ConsoleProgress::new(&mut stderr);
                ImportCommand::new(&time_records)
                    .run(stdin, &mut progress)
                    .await?;
            } else {
                ImportCommand::new(&time_records)
                    .run(stdin, &mut SilentProgress)
                    .await?;
            }
        }
    }

    Ok(())
}
