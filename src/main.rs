use anyhow::Result;
use clap::Parser;
use pipeops::cli::commands::{
    init::InitCommand, list::ListCommand, monitor::MonitorCommand, validate::ValidateCommand,
};
use pipeops::cli::{Cli, Commands};
use pipeops::config::PipeopsConfig;
use pipeops::telemetry::init_telemetry;
use std::time::Duration;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("\n❌ ERROR: {e:#}");
        eprintln!("Check the logs for more details");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    PipeopsConfig::load_env_file()?;
    let config = PipeopsConfig::load()?;
    init_telemetry(&config.observability)?;

    match cli.command {
        Commands::Init {
            project_url,
            token,
            config: definitions,
            dry_run,
            auto_confirm,
            no_monitor,
            on_branch_conflict,
        } => tokio::runtime::Runtime::new()?.block_on(async {
            InitCommand::new(project_url, token, config)
                .with_definitions(definitions)
                .with_dry_run(dry_run)
                .with_auto_confirm(auto_confirm)
                .with_monitoring(!no_monitor)
                .with_conflict_mode(on_branch_conflict)
                .execute()
                .await
        }),
        Commands::Monitor {
            project_url,
            token,
            pipeline_id,
            reference,
            max_wait,
            trigger,
        } => tokio::runtime::Runtime::new()?.block_on(async {
            MonitorCommand::new(project_url, token, config)
                .with_pipeline_id(pipeline_id)
                .with_reference(reference)
                .with_max_wait(max_wait.map(Duration::from_secs))
                .with_trigger(trigger)
                .execute()
                .await
        }),
        Commands::Validate { config: definitions } => tokio::runtime::Runtime::new()?
            .block_on(async { ValidateCommand::new(definitions).execute().await }),
        Commands::List { config: definitions } => tokio::runtime::Runtime::new()?
            .block_on(async { ListCommand::new(definitions).execute().await }),
    }
}
