//! Phase A: download raw grids and build the day/variable cache.

use clap::Parser;
use fusion_weather::cli::{CommonArgs, DateSpanArgs};
use fusion_weather::pipeline::acquire::resolve_expected_grid_count;
use fusion_weather::pipeline::report::{tally_line, DayStatus};
use fusion_weather::pipeline::workers::acquire_parallel;
use fusion_weather::{AcquisitionPipeline, FusionError, ShutdownSignal};
use log::{error, info};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "fusion-acquire")]
#[command(about = "Download gridded observations and cache them per day and variable")]
struct Cli {
    #[command(flatten)]
    span: DateSpanArgs,

    #[command(flatten)]
    common: CommonArgs,

    /// Concurrent date workers
    #[arg(long, default_value_t = 4)]
    max_workers: usize,

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
    config.validate_for_acquisition(&variables)?;
    let grid_count = resolve_expected_grid_count(&config).await?;

    let dates = cli.span.dates();
    info!(
        "Acquiring {} dates ({} .. {}), variables {:?}, grid count {}, data root {:?}",
        dates.len(),
        dates.first().map(ToString::to_string).unwrap_or_default(),
        dates.last().map(ToString::to_string).unwrap_or_default(),
        variables,
        grid_count,
        config.data_root
    );

    if let Some(day) = cli.span.test_day {
        let pipeline = AcquisitionPipeline::connect(config, &variables, grid_count)?;
        let result = pipeline.acquire_day_strict(day, &variables).await?;
        println!("{}", tally_line(day, &DayStatus::Ok, &result.ok.join(",")));
        return Ok(ExitCode::SUCCESS);
    }

    let shutdown = ShutdownSignal::new();
    shutdown.listen_for_ctrl_c();
    let report = acquire_parallel(&dates, &variables, cli.max_workers, &shutdown, |_| {
        AcquisitionPipeline::connect(config.clone(), &variables, grid_count)
    })
    .await?;

    println!("{}", report.summary());
    Ok(ExitCode::SUCCESS)
}
