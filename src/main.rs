mod analysis;
mod report;
mod settings;
mod stats;
mod viz;

use crate::report::{Report, Source};
use crate::settings::Settings;
use crate::viz::Plotter;
use anyhow::Context;
use hoops_api::Table;
use hoops_api::client::{CancelFlag, GamesApi};
use log::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if handle_cli_args() {
        return Ok(());
    }

    better_panic::install();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let settings = Settings::load()?;

    let (table, source) = match load_table(&settings).await {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("{e:#}");
            return Err(e);
        }
    };

    let plotter = Plotter::new(&settings.image_dir);
    info!("writing plots to {}", plotter.image_dir().display());
    let report = Report::build(&table, source, &plotter, settings.top_n)?;
    println!("{report}");

    if let Some(path) = &settings.report_path {
        report.write_json(path)?;
        info!("report written to {}", path.display());
    }
    Ok(())
}

/// Reload a saved table when asked to, otherwise fetch and save a fresh one.
async fn load_table(settings: &Settings) -> anyhow::Result<(Table, Source)> {
    if let Some(path) = &settings.from_csv {
        let table = Table::read_csv(path)?;
        info!("loaded {} games from {}", table.len(), path.display());
        return Ok((table, Source::Csv { path: path.clone() }));
    }

    let api = GamesApi::new(settings.fetch.clone())?;
    let cancel = CancelFlag::new();
    let ctrl_c = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, stopping after the current page");
                cancel.cancel();
            }
        }
    });

    let outcome = api
        .fetch_games(settings.request, &cancel)
        .await
        .with_context(|| format!("fetching games from {}", settings.fetch.endpoint));
    ctrl_c.abort();

    let outcome = outcome?;
    Ok((outcome.table, Source::Fetched(outcome.report)))
}

fn handle_cli_args() -> bool {
    let mut args = std::env::args().skip(1);
    let Some(arg) = args.next() else {
        return false;
    };

    match arg.as_str() {
        "-h" | "--help" => {
            println!("{}", usage_text());
            true
        }
        "-V" | "--version" => {
            println!("hoopstats {}", env!("CARGO_PKG_VERSION"));
            true
        }
        _ => {
            eprintln!("Unknown argument: {arg}\n\n{}", usage_text());
            std::process::exit(2);
        }
    }
}

fn usage_text() -> &'static str {
    "hoopstats - NBA game results, East vs West and home-court tests

Usage:
  hoopstats
  hoopstats --help
  hoopstats --version

Environment:
  HOOPSTATS_ENDPOINT      Games endpoint (default https://www.balldontlie.io/api/v1/games)
  HOOPSTATS_API_KEY       Sent as the Authorization header
  HOOPSTATS_OUTPUT        CSV written after a fetch (default data/games_data.csv)
  HOOPSTATS_PAGE_SIZE     Records per page (default 100)
  HOOPSTATS_START_PAGE    First page to fetch (default 1)
  HOOPSTATS_MAX_PAGES     Last page to fetch (default: all)
  HOOPSTATS_RATE_LIMIT_MS Delay between requests (default 800, 0 disables)
  HOOPSTATS_TIMEOUT_SECS  Per-request timeout (default 30)
  HOOPSTATS_SCHEMA        games uses the built-in record layout, infer reads it (default infer)
  HOOPSTATS_LENIENT       Keep rows whose shape drifts, with nulls (default false)
  HOOPSTATS_FROM_CSV      Analyse this CSV instead of fetching
  HOOPSTATS_IMAGE_DIR     Where plots are written (default img)
  HOOPSTATS_TOP_N         Teams per conference in the home-court test, 0 or all (default 5)
  HOOPSTATS_REPORT_JSON   Also write the report as JSON here
  RUST_LOG                Log filter (default info)"
}
