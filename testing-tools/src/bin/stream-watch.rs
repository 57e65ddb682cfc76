use analysis_client::{
    EventSourceTransport, FailureKind, SessionController, SessionStatus, TransportConfig,
};
use anyhow::Result;
use clap::Parser;
use colored::*;
use std::time::Duration;
use testing_tools::output::{print_run_status, print_summary};
use testing_tools::status_client::StatusClient;
use testing_tools::watch::watch;

#[derive(Parser)]
#[command(name = "stream-watch")]
#[command(about = "Follow one analysis run over its progress stream", long_about = None)]
struct Cli {
    /// Base URL of the analysis server
    #[arg(long, default_value = "http://localhost:4000")]
    base_url: String,

    /// System to analyze
    #[arg(long)]
    system_id: String,

    /// Restrict the run to these agents
    #[arg(long, value_delimiter = ',')]
    agents: Vec<String>,

    /// Seconds without any traffic before the stream counts as lost
    #[arg(long, default_value_t = 90)]
    idle_timeout_secs: u64,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }

    println!("{}", "=== Analysis Stream Watch ===".bright_cyan().bold());
    println!("{} Server: {}", "→".blue(), cli.base_url);
    println!("{} System: {}", "→".blue(), cli.system_id.bold());

    let transport = EventSourceTransport::new(TransportConfig {
        idle_timeout: Duration::from_secs(cli.idle_timeout_secs),
    });
    let mut controller = SessionController::new(transport, cli.base_url.clone());

    let agents = (!cli.agents.is_empty()).then_some(cli.agents.as_slice());
    if let Err(e) = controller.start(&cli.system_id, agents) {
        println!("{} Could not open the stream: {}", "✗".red(), e);
        std::process::exit(1);
    }

    let finished = watch(&mut controller).await;
    print_summary(&finished);

    if finished.error_kind == Some(FailureKind::ConnectionLost) {
        println!("\n{} Checking run status on the server...", "→".blue());
        match StatusClient::new(&cli.base_url).fetch(&cli.system_id).await {
            Ok(report) => print_run_status(report.as_ref()),
            Err(e) => println!("{} {}", "✗".red(), e),
        }
    }

    if finished.status != SessionStatus::Completed {
        std::process::exit(1);
    }

    Ok(())
}
