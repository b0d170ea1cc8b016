mod app_config;

use anyhow::Result;
use app_config::AppConfig;
use colored::Colorize;
use gamma_log::gamma::config;
use gamma_log::{GammaCommands, YahooClient, api_server_axum, logging};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let app = AppConfig::from_env();
    logging::init_logging(&app.log_dir)?;

    app.log_ci_config();
    if let Err(e) = app.validate() {
        eprintln!("{} {}", "✗".red(), e);
        eprintln!("Set GAMMA_MODE to control execution mode");
        eprintln!("Examples:");
        eprintln!("  GAMMA_MODE=pipeline cargo run                    # snapshot + append + postprocess");
        eprintln!("  GAMMA_MODE=snapshot GAMMA_SYMBOLS=SPY,QQQ cargo run");
        eprintln!("  GAMMA_MODE=postprocess cargo run                 # forward labels, events, summary");
        eprintln!("  GAMMA_MODE=server GAMMA_PORT=3001 cargo run      # Start API server on port 3001");
        std::process::exit(1);
    }

    info!(mode = %app.mode, symbols = ?app.run.symbols, data_dir = %app.run.data_dir.display(), "starting");

    let result = match app.mode.as_str() {
        "snapshot" => {
            let client = YahooClient::new()?;
            GammaCommands::run_snapshot(&client, &app.run).await.map(|_| ())
        }
        "append" => GammaCommands::run_append(&app.run).map(|_| ()),
        "postprocess" => GammaCommands::run_postprocess(&app.run).map(|_| ()),
        "structure" => GammaCommands::run_structure(&app.run).map(|_| ()),
        "server" if !config::is_ci_environment() => {
            println!("{}", "=".repeat(60).blue());
            println!("{}", "Gamma API Server".green().bold());
            println!("{}", "=".repeat(60).blue());
            println!();
            api_server_axum::start_server(app.port, app.run.clone()).await
        }
        // pipeline, and server mode forced to pipeline in CI
        _ => {
            let client = YahooClient::new()?;
            GammaCommands::run_pipeline(&client, &app.run).await.map(|_| ())
        }
    };

    if let Err(e) = &result {
        error!(error = %e, "run aborted");
        eprintln!("{} {:#}", "✗".red(), e);
    }
    result
}
