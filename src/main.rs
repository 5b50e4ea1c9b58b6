// External crates
use anyhow::{bail, Context, Result};
use log::info;
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

// Local modules
use price_forecaster::build_info;
use price_forecaster::config::ForecastConfig;
use price_forecaster::util::{instruments, pre_processor};
use price_forecaster::{DynRegressor, ForecastEngine};

const USAGE: &str = "usage:
  price_forecaster forecast <bars.csv> [SYMBOL] [--out forecast.csv]
  price_forecaster stocks";

struct ForecastArgs {
    csv_path: PathBuf,
    symbol: Option<String>,
    out: Option<PathBuf>,
}

fn parse_forecast_args(args: &[String]) -> Result<ForecastArgs> {
    let mut positional = Vec::new();
    let mut out = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--out" {
            let path = iter.next().context("--out needs a file path")?;
            out = Some(PathBuf::from(path));
        } else {
            positional.push(arg.as_str());
        }
    }

    let csv_path = positional
        .first()
        .map(|p| PathBuf::from(*p))
        .with_context(|| format!("missing bars CSV\n{}", USAGE))?;
    Ok(ForecastArgs {
        csv_path,
        symbol: positional.get(1).map(|s| s.to_string()),
        out,
    })
}

fn run_forecast(args: ForecastArgs) -> Result<()> {
    let config = ForecastConfig::from_env();
    config.validate()?;

    if let Some(symbol) = &args.symbol {
        match instruments::lookup(symbol) {
            Some(instrument) => info!(
                "Forecasting {} ({})",
                instruments::market_symbol(instrument.symbol),
                instrument.name
            ),
            None => info!("Forecasting {}", symbol),
        }
    }

    let bars = pre_processor::load_bars_csv(&args.csv_path)
        .with_context(|| format!("loading {}", args.csv_path.display()))?;
    info!("Loaded {} bars", bars.len());

    let (lookback, horizon, split) = (config.lookback, config.horizon, config.validation_split);
    let mut engine = ForecastEngine::<DynRegressor>::from_config(config);
    let result = engine.train_and_forecast(&bars, lookback, horizon, split)?;

    if let Some(out) = &args.out {
        pre_processor::write_forecast_csv(Path::new(out), &result.points)?;
    }
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn list_stocks() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(instruments::all())?);
    Ok(())
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "price_forecaster=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        "{} {} ({})",
        build_info::PKG_NAME,
        build_info::PKG_VERSION,
        build_info::TARGET
    );

    let args: Vec<String> = env::args().collect();
    match args.get(1).map(|s| s.as_str()) {
        Some("forecast") => run_forecast(parse_forecast_args(&args[2..])?),
        Some("stocks") => list_stocks(),
        Some(other) => bail!("unknown command '{}'\n{}", other, USAGE),
        None => bail!("{}", USAGE),
    }
}
