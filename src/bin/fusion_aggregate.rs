//! Phase B: aggregate cached days to regions and write CSV outputs. No network access.

use clap::Parser;
use fusion_weather::cli::{CommonArgs, DateSpanArgs};
use fusion_weather::pipeline::calendar::span_months;
use fusion_weather::pipeline::report::{tally_line, DayStatus};
use fusion_weather::{FusionError, PostProcessor, ShutdownSignal};
use log::{error, info};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "fusion-aggregate")]
#[command(about = "Aggregate cached grids to regions and write monthly/yearly tables")]
struct Cli {
    #[command(flatten)]
    span: DateSpanArgs,

    #[command(flatten)]
    common: CommonArgs,

    /// Rebuild monthly CSVs from existing interim day tables only
    #[arg(long)]
    from_interim: bool,
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
    let config = cli.common.load_config().await?;
    let variables = cli.common.variables();
    let processor = PostProcessor::load(config).await?;

    if let Some(day) = cli.span.test_day {
        let result = processor.aggregate_day(day, &variables, true).await?;
        match &result.table {
            Some(table) => {
                println!("{}", tally_line(day, &DayStatus::Ok, &result.aggregated.join(",")));
                if !result.skipped.is_empty() {
                    println!("missing_cache={:?}", result.skipped);
                }
                println!("{}", table.head(Some(10)));
            }
            None => {
                let status = DayStatus::Skipped(format!("missing_cache={:?}", result.skipped));
                println!("{}", tally_line(day, &status, ""));
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    if cli.from_interim {
        let span = &cli.span;
        for (year, month) in span_months(span.start_year, span.end_year, span.start_month, span.end_month) {
            match processor.rebuild_month_from_interim(year, month).await? {
                Some(path) => info!("Rebuilt {:?}", path),
                None => info!("{}-{:02}: no interim tables", year, month),
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    let shutdown = ShutdownSignal::new();
    shutdown.listen_for_ctrl_c();
    let span = &cli.span;
    let (report, written) = processor
        .aggregate_range(
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
