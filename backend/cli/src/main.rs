mod analyze_cmd;
mod api;
mod config_cmd;
mod extract_cmd;
mod runtime;
mod sessions;
mod terminal_output;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use tuvi_agent::ChartFlow;
use tuvi_config::TuviConfig;

use api::ApiState;
use sessions::SessionRegistry;

#[derive(Parser)]
#[command(name = "tuvi")]
#[command(about = "Tử Vi chart reader: digitise a chart image and read the year ahead")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.tuvi/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read birth details off a chart image and print the filled-in profile
    Extract {
        /// Chart image (png, jpg, webp)
        #[arg(long)]
        image: PathBuf,
        #[command(flatten)]
        profile: ProfileArgs,
    },
    /// Analyse a chart and open a consultation in the terminal
    Analyze {
        /// Chart image (png, jpg, webp)
        #[arg(long)]
        image: PathBuf,
        #[command(flatten)]
        profile: ProfileArgs,
        /// Fill birth fields recognised on the image before analysing
        #[arg(long)]
        autofill: bool,
        /// Write the report here after the reading (.md or .html)
        #[arg(long)]
        export: Option<PathBuf>,
        /// Print the reading and exit without a consultation
        #[arg(long)]
        no_chat: bool,
    },
    /// Start the HTTP API server
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Check whether a server is running
    Status {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective config with secrets masked
    Show,
    /// Write a config file with every default filled in
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Birth details given on the command line. Unset flags keep the profile
/// file's value, or the default.
#[derive(Args, Debug, Default, Clone)]
pub struct ProfileArgs {
    /// YAML or JSON profile file
    #[arg(long)]
    pub profile: Option<PathBuf>,
    #[arg(long)]
    pub name: Option<String>,
    /// male/female or Nam/Nữ
    #[arg(long)]
    pub gender: Option<String>,
    /// solar or lunar
    #[arg(long)]
    pub calendar: Option<String>,
    #[arg(long)]
    pub year: Option<String>,
    #[arg(long)]
    pub month: Option<String>,
    #[arg(long)]
    pub day: Option<String>,
    #[arg(long)]
    pub hour: Option<String>,
    #[arg(long)]
    pub minute: Option<String>,
    #[arg(long)]
    pub view_year: Option<String>,
    /// vi or en
    #[arg(long)]
    pub language: Option<String>,
    /// Markdown/text file replacing the built-in knowledge base
    #[arg(long)]
    pub knowledge: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| tuvi_config::config_file_path(&tuvi_config::config_dir()));

    // `config init` must work even when the current file does not validate.
    if let Commands::Config { action: ConfigAction::Init { force } } = &cli.command {
        return config_cmd::init(&config_path, *force).await;
    }

    let config = tuvi_config::load_and_prepare(&config_path).await?;
    tuvi_logging::init_logger(&runtime::log_settings(&config));

    match cli.command {
        Commands::Extract { image, profile } => extract_cmd::run(&config, &image, &profile).await,
        Commands::Analyze { image, profile, autofill, export, no_chat } => {
            let options = analyze_cmd::AnalyzeOptions { autofill, export, no_chat };
            analyze_cmd::run(&config, &image, &profile, options).await
        }
        Commands::Serve { port } => run_server(config, port).await,
        Commands::Status { port } => status(port.unwrap_or(config.port())).await,
        Commands::Config { action: ConfigAction::Show } => config_cmd::show(&config, &config_path),
        Commands::Config { action: ConfigAction::Init { .. } } => Ok(()),
    }
}

async fn run_server(config: TuviConfig, port: Option<u16>) -> Result<()> {
    let gateway = runtime::build_gateway(&config)?;
    let flow = Arc::new(ChartFlow::new(gateway, &runtime::flow_settings(&config)));

    let state = ApiState {
        flow,
        sessions: SessionRegistry::new(),
        base_profile: runtime::base_profile(&config),
    };

    let app = api::build_router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());
    let addr = format!("{}:{}", config.bind(), port.unwrap_or(config.port()));

    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP API listening");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn status(port: u16) -> Result<()> {
    let url = format!("http://localhost:{port}/api/health");
    match reqwest::Client::new().get(&url).send().await {
        Ok(resp) => {
            let body: serde_json::Value = resp.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Err(_) => terminal_output::note_warn(&format!("tuvi is not running on port {port}")),
    }
    Ok(())
}
