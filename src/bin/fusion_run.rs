//! Both phases date by date: download, aggregate, write monthly/yearly tables.

use clap::Parser;
use fusion_weather::cli::{CommonArgs, DateSpanArgs};
use fusion_weather::pipeline::acquire::resolve_expected_grid_count;
use fusion_weather::pipeline::report::{tally_line, DayStatus};
use fusion_weather::{
    AcquisitionPipeline, FusionError, FusionPipeline, PostProcessor, ShutdownSignal,
};
use log::{error, info};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "fusion-run")]
#[command(about = "Download, cache and aggregate gridded observations in one pass")]
struct Cli {
    #[command(flatten)]
    span: DateSpanArgs,

    #[command(flatten)]
    common: CommonArgs,

    /// API credential
    #[arg(long, env = "KMA_AUTH_KEY", hide_env_values = true)]
    auth_key: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, FusionError> {
    let mut config = cli.common.load_config().await?;
    if cli.auth_key.is_some() {
        config.auth_key = cli.auth_key.clone();
    }
    let variables = cli.common.variables();
    let grid_count = resolve_expected_grid_count(&config).await?;

    let postprocessor = PostProcessor::load(config.clone()).await?;
    let acquisition = AcquisitionPipeline::connect(config, &variables, grid_count)?;
    let fusion = FusionPipeline::new(acquisition, postprocessor);

    if let Some(day) = cli.span.test_day {
        let run = fusion.process_day(day, &variables).await?;
        println!("{}", tally_line(day, &DayStatus::Ok, &run.aggregation.aggregated.join(",")));
        if let Some(table) = &run.aggregation.table {
            println!("{}", table.head(Some(10)));
        }
        return Ok(ExitCode::SUCCESS);
    }

    let shutdown = ShutdownSignal::new();
    shutdown.listen_for_ctrl_c();
    let span = &cli.span;
    info!(
        "Processing {}-{:02} .. {}-{:02}, variables {:?}",
        span.start_year, span.start_month, span.end_year, span.end_month, variables
    );
    let (report, written) = fusion
        .process_range(
            span.start_year,
            span.end_year,
            span.start_month,
            span.end_month,
            &variables,
            &shutdown,
        )
        .await?;

    if !written.is_empty() {
        println!("Files written:");
        for path in &written {
            println!("  - {}", path.display());
        }
    }
    println!("{}", report.summary());
    Ok(ExitCode::SUCCESS)
}
