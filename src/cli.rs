//! CLI definition and dispatch.

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_cache::{CachedPricePort, JsonFileCache};
use crate::adapters::svg_chart::SvgChartAdapter;
use crate::domain::config_validation::{
    data_settings, farm_settings, forecast_settings, trade_settings, validate_config,
    DataSettings, FarmSettings, ForecastSettings, TradeSettings,
};
use crate::domain::error::YieldtraderError;
use crate::domain::farm::{apr_decay_for, harvest_dates, LpFarm};
use crate::domain::forecast::Forecast;
use crate::domain::indicator::ema::calculate_ema;
use crate::domain::market::{Fiat, Market};
use crate::domain::performance::{farm_chart, farm_summary, indicator_chart, ChartData};
use crate::domain::portfolio::{simulate, SimulationResult};
use crate::domain::series::diff_days;
use crate::domain::strategy::CrossoverStrategy;
use crate::ports::chart_port::ChartPort;
use crate::ports::price_port::PricePort;

#[derive(Parser, Debug)]
#[command(
    name = "yieldtrader",
    about = "Crossover trading and LP yield-farming simulator"
)]
pub struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest an EMA crossover strategy on historical prices
    Trade {
        #[arg(short, long)]
        config: PathBuf,
        /// Write the price/EMA chart here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Simulate a liquidity-pool farm on historical prices
    Farm {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run farms over synthetic price paths
    Forecast {
        #[arg(short, long)]
        config: PathBuf,
        /// Write the JSON table here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List assets available in the data directory
    ListAssets {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Install the global subscriber. `RUST_LOG` wins over `level`; a second
/// call is a no-op.
pub fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let result = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    if result.is_err() {
        tracing::debug!("logging already initialised");
    }
}

pub fn run(cli: Cli) -> ExitCode {
    setup_logging(&cli.log_level, cli.json);

    let result = match cli.command {
        Command::Trade { config, output } => run_trade(&config, output.as_deref()),
        Command::Farm { config, output } => run_farm(&config, output.as_deref()),
        Command::Forecast { config, output } => run_forecast(&config, output.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::ListAssets { config } => run_list_assets(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, YieldtraderError> {
    tracing::info!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path).map_err(|e| YieldtraderError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// CSV provider, read through the JSON cache when `cache_dir` is set.
pub fn build_price_port(data: &DataSettings) -> Box<dyn PricePort> {
    let csv = CsvAdapter::new(data.path.clone(), data.currency);
    match &data.cache_dir {
        Some(dir) => Box::new(CachedPricePort::new(
            csv,
            JsonFileCache::new(dir.clone()),
            data.cache_period,
        )),
        None => Box::new(csv),
    }
}

pub struct TradeReport {
    pub strategy: String,
    pub result: SimulationResult,
    pub chart: ChartData,
}

/// Signals from the `track` market, fills in the `asset` market.
pub fn run_trade_pipeline(
    prices: &dyn PricePort,
    currency: Fiat,
    trade: &TradeSettings,
) -> Result<TradeReport, YieldtraderError> {
    let tracking = prices.fetch_market(&trade.track, trade.days, currency)?;
    let trading = if trade.asset == trade.track {
        None
    } else {
        Some(prices.fetch_market(&trade.asset, trade.days, currency)?)
    };

    let short = calculate_ema(&tracking.prices, trade.short_period)?;
    let long = calculate_ema(&tracking.prices, trade.long_period)?;
    let strategy = CrossoverStrategy::new(&short, &long).with_size(trade.size_pct)?;

    let intents = match &trading {
        Some(market) => strategy.intents_for(&tracking.prices, market)?,
        None => strategy.intents(&tracking.prices, currency),
    };
    let traded: &Market = trading.as_ref().unwrap_or(&tracking);
    let result = simulate(trade.initial_investment, &intents, &traded.prices);

    let title = format!("{} {}", tracking.symbol.to_uppercase(), strategy.name());
    let chart = indicator_chart(&title, &tracking.prices, &[&short, &long]);

    Ok(TradeReport {
        strategy: strategy.name(),
        result,
        chart,
    })
}

/// Daily harvest and compound from `start_date` for `harvest_days`, or until
/// the last date both markets have a price. `today` bounds the history
/// requested from the provider.
pub fn run_farm_pipeline(
    prices: &dyn PricePort,
    currency: Fiat,
    settings: &FarmSettings,
    today: NaiveDate,
) -> Result<LpFarm, YieldtraderError> {
    let days = (diff_days(settings.start_date, today) + 1).min(u32::MAX as i64) as u32;
    let a = prices.fetch_market(&settings.asset_a, days, currency)?;
    let b = prices.fetch_market(&settings.asset_b, days, currency)?;

    let until = match (a.prices.latest(), b.prices.latest()) {
        (Some(pa), Some(pb)) => Some(pa.date().min(pb.date())),
        _ => None,
    };

    let mut farm = LpFarm::new(
        a,
        b,
        currency,
        settings.initial_investment,
        settings.start_date,
        settings.apr,
    )?;

    let dates = harvest_dates(settings.start_date, settings.harvest_days, until);
    if (dates.len() as u32) < settings.harvest_days {
        tracing::warn!(
            requested = settings.harvest_days,
            available = dates.len(),
            "price history ends before the last harvest"
        );
    }
    farm.set_apr_decay(apr_decay_for(settings.apr, settings.final_apr, dates.len()));
    farm.set_apr_floor(settings.apr_floor);
    farm.compound(&dates, settings.monthly_investment)?;

    Ok(farm)
}

pub fn build_forecast(
    settings: &ForecastSettings,
    currency: Fiat,
) -> Result<Forecast, YieldtraderError> {
    let mut forecast = Forecast::new(
        currency,
        settings.initial_investment,
        settings.start_date,
        settings.days,
    );

    let markets: Vec<Market> = settings
        .markets
        .iter()
        .map(|m| forecast.create_market(&m.name, &m.symbol, m.price, &m.segments))
        .collect();
    let find = |symbol: &str| {
        markets
            .iter()
            .find(|m| m.symbol == symbol)
            .ok_or_else(|| YieldtraderError::ConfigInvalid {
                section: "forecast".to_string(),
                key: "market".to_string(),
                reason: format!("unknown market {}", symbol),
            })
    };

    for lp in &settings.lps {
        let a = find(&lp.a)?;
        let b = find(&lp.b)?;
        let farm = forecast.add_lp_farm(a, b, &lp.scenario)?;
        tracing::info!(
            farm = %farm.name,
            value = %format!("{:.2}", farm.farm.total_value()),
            hodl = %format!("{:.2}", farm.farm.hodl_value()),
            "forecast farm"
        );
    }

    Ok(forecast)
}

fn render_chart(chart: &ChartData, output: Option<&Path>) -> Result<(), YieldtraderError> {
    match output {
        Some(path) => SvgChartAdapter.render(chart, path),
        None => Ok(()),
    }
}

fn run_trade(config_path: &Path, output: Option<&Path>) -> Result<(), YieldtraderError> {
    let config = load_config(config_path)?;
    let data = data_settings(&config)?;
    let trade = trade_settings(&config)?;
    let prices = build_price_port(&data);

    let report = run_trade_pipeline(prices.as_ref(), data.currency, &trade)?;
    let r = &report.result;

    for fill in &r.fills {
        tracing::info!(
            side = %fill.side,
            date = %fill.date,
            price = fill.price,
            amount = %format!("{:.2}", fill.amount),
            units = fill.units,
            "fill"
        );
    }
    tracing::info!(
        strategy = %report.strategy,
        trades = r.trades(),
        buys = r.buys,
        sells = r.sells,
        holding_days = r.holding_days(),
        fiat = %format!("{:.2}", r.fiat_balance),
        units = r.unit_balance,
        final_value = %format!("{:.2}", r.final_value()),
        pl_pct = %format!("{:.2}", r.profit_loss() * 100.0),
        "trade simulation complete"
    );

    render_chart(&report.chart, output)
}

fn run_farm(config_path: &Path, output: Option<&Path>) -> Result<(), YieldtraderError> {
    let config = load_config(config_path)?;
    let data = data_settings(&config)?;
    let settings = farm_settings(&config)?;
    let prices = build_price_port(&data);

    let farm = run_farm_pipeline(
        prices.as_ref(),
        data.currency,
        &settings,
        Utc::now().date_naive(),
    )?;

    if let Some(s) = farm_summary(&farm) {
        tracing::info!(
            pair = %s.pair,
            from = %s.first_date,
            to = %s.last_date,
            starting_apr = s.starting_apr,
            final_apr = %format!("{:.2}", s.final_apr),
            deposits = s.external_deposits,
            farm = %format!("{:.2} ({:.1}%)", s.farm_value, s.farm_pl() * 100.0),
            hodl = %format!("{:.2} ({:.1}%)", s.hodl_value, s.hodl_pl() * 100.0),
            only_a = %format!("{:.2} ({:.1}%)", s.only_a_value, s.only_a_pl() * 100.0),
            only_b = %format!("{:.2} ({:.1}%)", s.only_b_value, s.only_b_pl() * 100.0),
            impermanent_loss = %format!("{:.2}%", s.impermanent_loss * 100.0),
            "farm simulation complete"
        );
    }

    let output = output.or(settings.output.as_deref());
    render_chart(&farm_chart(&farm), output)
}

fn run_forecast(config_path: &Path, output: Option<&Path>) -> Result<(), YieldtraderError> {
    let config = load_config(config_path)?;
    let data = data_settings(&config)?;
    let settings = forecast_settings(&config)?;

    let forecast = build_forecast(&settings, data.currency)?;
    let json = forecast.to_json()?;

    match output.or(settings.output.as_deref()) {
        Some(path) => {
            fs::write(path, json)?;
            tracing::info!(path = %path.display(), "forecast written");
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), YieldtraderError> {
    let config = load_config(config_path)?;
    validate_config(&config)?;
    tracing::info!("configuration is valid");
    Ok(())
}

fn run_list_assets(config_path: &Path) -> Result<(), YieldtraderError> {
    let config = load_config(config_path)?;
    let data = data_settings(&config)?;
    let assets = build_price_port(&data).list_assets()?;

    if assets.is_empty() {
        tracing::warn!(path = %data.path.display(), currency = %data.currency, "no assets found");
    }
    for asset in &assets {
        println!("{}", asset);
    }
    Ok(())
}
