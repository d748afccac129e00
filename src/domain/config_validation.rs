//! Configuration validation.
//!
//! Each `*_settings` function reads one INI section through [`ConfigPort`],
//! applies defaults and rejects values a run could not use. Numbers are read
//! as strings so that a typo is reported instead of silently defaulted.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::domain::error::YieldtraderError;
use crate::domain::farm::AprFloor;
use crate::domain::forecast::{parse_segments, FarmScenario, PriceChangeSegment};
use crate::domain::market::Fiat;
use crate::domain::series::parse_date;
use crate::ports::cache_port::InvalidationPeriod;
use crate::ports::config_port::ConfigPort;

const MARKET_PREFIX: &str = "market.";
const LP_PREFIX: &str = "lp.";
/// Day counts and periods are stored as `u32`.
const MAX_COUNT: usize = u32::MAX as usize;

#[derive(Debug, Clone, PartialEq)]
pub struct DataSettings {
    pub path: PathBuf,
    pub currency: Fiat,
    pub cache_dir: Option<PathBuf>,
    pub cache_period: InvalidationPeriod,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeSettings {
    /// Market the crossover signals are read from.
    pub track: String,
    /// Market the intents are priced in.
    pub asset: String,
    pub short_period: usize,
    pub long_period: usize,
    pub initial_investment: f64,
    pub size_pct: f64,
    pub days: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FarmSettings {
    pub asset_a: String,
    pub asset_b: String,
    pub start_date: NaiveDate,
    pub harvest_days: u32,
    pub apr: f64,
    pub final_apr: f64,
    pub apr_floor: AprFloor,
    pub initial_investment: f64,
    pub monthly_investment: f64,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketSettings {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub segments: Vec<PriceChangeSegment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LpSettings {
    pub a: String,
    pub b: String,
    pub scenario: FarmScenario,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSettings {
    pub start_date: NaiveDate,
    pub days: u32,
    pub initial_investment: f64,
    pub output: Option<PathBuf>,
    pub markets: Vec<MarketSettings>,
    pub lps: Vec<LpSettings>,
}

impl ForecastSettings {
    pub fn market(&self, symbol: &str) -> Option<&MarketSettings> {
        self.markets.iter().find(|m| m.symbol == symbol)
    }
}

/// Validate `[data]` plus whichever of `[trade]`, `[farm]` and `[forecast]`
/// are present.
pub fn validate_config(config: &dyn ConfigPort) -> Result<(), YieldtraderError> {
    data_settings(config)?;
    let sections = config.sections();
    let has = |name: &str| sections.iter().any(|s| s == name);

    if has("trade") {
        trade_settings(config)?;
    }
    if has("farm") {
        farm_settings(config)?;
    }
    if has("forecast") {
        forecast_settings(config)?;
    }
    Ok(())
}

pub fn data_settings(config: &dyn ConfigPort) -> Result<DataSettings, YieldtraderError> {
    let path = optional_string(config, "data", "path").unwrap_or_else(|| "data".to_string());
    let currency = parsed(config, "data", "currency", Fiat::default())?;
    let cache_dir = optional_string(config, "data", "cache_dir").map(PathBuf::from);
    let cache_period = parsed(config, "data", "cache_period", InvalidationPeriod::default())?;

    Ok(DataSettings {
        path: PathBuf::from(path),
        currency,
        cache_dir,
        cache_period,
    })
}

pub fn trade_settings(config: &dyn ConfigPort) -> Result<TradeSettings, YieldtraderError> {
    let asset = required_string(config, "trade", "asset")?;
    let track = optional_string(config, "trade", "track").unwrap_or_else(|| asset.clone());

    let short_period = count(config, "trade", "short_period", 9)?;
    let long_period = count(config, "trade", "long_period", 21)?;
    if short_period >= long_period {
        return Err(invalid(
            "trade",
            "short_period",
            "short_period must be less than long_period",
        ));
    }

    let initial_investment = positive(config, "trade", "initial_investment", 10_000.0)?;
    let size_pct = number(config, "trade", "size_pct", 100.0)?;
    if !(size_pct > 0.0 && size_pct <= 100.0) {
        return Err(invalid("trade", "size_pct", "size_pct must be in (0, 100]"));
    }
    let days = count(config, "trade", "days", 365)? as u32;

    Ok(TradeSettings {
        track,
        asset,
        short_period,
        long_period,
        initial_investment,
        size_pct,
        days,
    })
}

pub fn farm_settings(config: &dyn ConfigPort) -> Result<FarmSettings, YieldtraderError> {
    let asset_a = required_string(config, "farm", "asset_a")?;
    let asset_b = required_string(config, "farm", "asset_b")?;
    let start_date = date(config, "farm", "start_date")?;
    let harvest_days = count(config, "farm", "harvest_days", 365)? as u32;
    let (apr, final_apr) = aprs(config, "farm")?;
    let apr_floor = parsed(config, "farm", "apr_floor", AprFloor::default())?;
    let initial_investment = positive(config, "farm", "initial_investment", 10_000.0)?;
    let monthly_investment = non_negative(config, "farm", "monthly_investment")?;
    let output = optional_string(config, "farm", "output").map(PathBuf::from);

    Ok(FarmSettings {
        asset_a,
        asset_b,
        start_date,
        harvest_days,
        apr,
        final_apr,
        apr_floor,
        initial_investment,
        monthly_investment,
        output,
    })
}

pub fn forecast_settings(config: &dyn ConfigPort) -> Result<ForecastSettings, YieldtraderError> {
    let start_date = date(config, "forecast", "start_date")?;
    let days = count(config, "forecast", "days", 365)? as u32;
    let initial_investment = positive(config, "forecast", "initial_investment", 10_000.0)?;
    let output = optional_string(config, "forecast", "output").map(PathBuf::from);

    let sections = config.sections();
    let mut markets = Vec::new();
    for section in &sections {
        if let Some(symbol) = section.strip_prefix(MARKET_PREFIX) {
            markets.push(market_settings(config, section, symbol)?);
        }
    }

    let mut lps = Vec::new();
    for section in &sections {
        if let Some(name) = section.strip_prefix(LP_PREFIX) {
            lps.push(lp_settings(config, section, name)?);
        }
    }
    if lps.is_empty() {
        return Err(YieldtraderError::ConfigMissing {
            section: "lp.<name>".to_string(),
            key: "a".to_string(),
        });
    }

    let settings = ForecastSettings {
        start_date,
        days,
        initial_investment,
        output,
        markets,
        lps,
    };
    for lp in &settings.lps {
        let section = format!("{}{}", LP_PREFIX, lp.scenario.name.as_deref().unwrap_or_default());
        for (key, symbol) in [("a", &lp.a), ("b", &lp.b)] {
            if settings.market(symbol).is_none() {
                return Err(invalid(
                    &section,
                    key,
                    &format!("no [market.{}] section", symbol),
                ));
            }
        }
    }
    Ok(settings)
}

fn market_settings(
    config: &dyn ConfigPort,
    section: &str,
    symbol: &str,
) -> Result<MarketSettings, YieldtraderError> {
    let name = optional_string(config, section, "name").unwrap_or_else(|| symbol.to_uppercase());
    let price = positive(config, section, "price", 0.0)?;
    let segments = match optional_string(config, section, "segments") {
        Some(s) => parse_segments(&s).map_err(|reason| invalid(section, "segments", &reason))?,
        None => Vec::new(),
    };
    Ok(MarketSettings {
        symbol: symbol.to_string(),
        name,
        price,
        segments,
    })
}

fn lp_settings(
    config: &dyn ConfigPort,
    section: &str,
    name: &str,
) -> Result<LpSettings, YieldtraderError> {
    let a = required_string(config, section, "a")?.to_lowercase();
    let b = required_string(config, section, "b")?.to_lowercase();
    let (apr, final_apr) = aprs(config, section)?;

    Ok(LpSettings {
        a,
        b,
        scenario: FarmScenario {
            name: Some(name.to_string()),
            apr,
            final_apr,
            apr_floor: parsed(config, section, "apr_floor", AprFloor::default())?,
            monthly_investment: non_negative(config, section, "monthly_investment")?,
        },
    })
}

fn invalid(section: &str, key: &str, reason: &str) -> YieldtraderError {
    YieldtraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn optional_string(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn required_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, YieldtraderError> {
    optional_string(config, section, key).ok_or_else(|| YieldtraderError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    })
}

fn parsed<T>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, YieldtraderError>
where
    T: FromStr,
    T::Err: ToString,
{
    match optional_string(config, section, key) {
        None => Ok(default),
        Some(s) => s
            .parse()
            .map_err(|e: T::Err| invalid(section, key, &e.to_string())),
    }
}

fn number(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, YieldtraderError> {
    let value: f64 = parsed(config, section, key, default)?;
    if !value.is_finite() {
        return Err(invalid(section, key, "must be a finite number"));
    }
    Ok(value)
}

fn positive(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, YieldtraderError> {
    let value = number(config, section, key, default)?;
    if value <= 0.0 {
        return Err(invalid(section, key, &format!("{} must be positive", key)));
    }
    Ok(value)
}

fn non_negative(config: &dyn ConfigPort, section: &str, key: &str) -> Result<f64, YieldtraderError> {
    let value = number(config, section, key, 0.0)?;
    if value < 0.0 {
        return Err(invalid(
            section,
            key,
            &format!("{} must be non-negative", key),
        ));
    }
    Ok(value)
}

fn count(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, YieldtraderError> {
    let value: usize = parsed(config, section, key, default)?;
    if value == 0 {
        return Err(invalid(section, key, &format!("{} must be at least 1", key)));
    }
    if value > MAX_COUNT {
        return Err(invalid(
            section,
            key,
            &format!("{} must be at most {}", key, MAX_COUNT),
        ));
    }
    Ok(value)
}

/// `apr` defaults to 100 and `final_apr` to 0; a positive final APR may not
/// exceed the starting one.
fn aprs(config: &dyn ConfigPort, section: &str) -> Result<(f64, f64), YieldtraderError> {
    let apr = number(config, section, "apr", 100.0)?;
    if apr < 0.0 {
        return Err(invalid(section, "apr", "apr must be non-negative"));
    }
    let final_apr = non_negative(config, section, "final_apr")?;
    if final_apr > apr {
        return Err(invalid(
            section,
            "final_apr",
            "final_apr must not exceed apr",
        ));
    }
    Ok((apr, final_apr))
}

fn date(config: &dyn ConfigPort, section: &str, key: &str) -> Result<NaiveDate, YieldtraderError> {
    let value = required_string(config, section, key)?;
    parse_date(&value).ok_or_else(|| {
        invalid(
            section,
            key,
            &format!("invalid {} format, expected YYYY-MM-DD", key),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const FORECAST: &str = r#"
[forecast]
start_date = 2022-01-01
days = 30
initial_investment = 5000

[market.LUNA]
name = Terra
price = 100
segments = +20:5,-20:5

[market.UST]
price = 1

[lp.luna-ust]
a = LUNA
b = UST
apr = 120
final_apr = 60
apr_floor = half_initial
monthly_investment = 250
"#;

    #[test]
    fn data_defaults() {
        let data = data_settings(&make_config("[data]\n")).unwrap();
        assert_eq!(data.path, PathBuf::from("data"));
        assert_eq!(data.currency, Fiat::Usd);
        assert_eq!(data.cache_dir, None);
        assert_eq!(data.cache_period, InvalidationPeriod::Daily);
    }

    #[test]
    fn data_rejects_unknown_currency() {
        let err = data_settings(&make_config("[data]\ncurrency = gbp\n")).unwrap_err();
        assert!(matches!(err, YieldtraderError::ConfigInvalid { key, .. } if key == "currency"));
    }

    #[test]
    fn data_rejects_unknown_cache_period() {
        let err = data_settings(&make_config("[data]\ncache_period = monthly\n")).unwrap_err();
        assert!(
            matches!(err, YieldtraderError::ConfigInvalid { key, .. } if key == "cache_period")
        );
    }

    #[test]
    fn trade_defaults_and_track_fallback() {
        let trade = trade_settings(&make_config("[trade]\nasset = terra-luna\n")).unwrap();
        assert_eq!(trade.track, "terra-luna");
        assert_eq!(trade.short_period, 9);
        assert_eq!(trade.long_period, 21);
        assert_eq!(trade.initial_investment, 10_000.0);
        assert_eq!(trade.size_pct, 100.0);
        assert_eq!(trade.days, 365);
    }

    #[test]
    fn trade_missing_asset_fails() {
        let err = trade_settings(&make_config("[trade]\ntrack = bitcoin\n")).unwrap_err();
        assert!(matches!(err, YieldtraderError::ConfigMissing { key, .. } if key == "asset"));
    }

    #[test]
    fn trade_periods_must_be_ordered() {
        let config = make_config("[trade]\nasset = a\nshort_period = 21\nlong_period = 9\n");
        let err = trade_settings(&config).unwrap_err();
        assert!(
            matches!(err, YieldtraderError::ConfigInvalid { key, .. } if key == "short_period")
        );
    }

    #[test]
    fn trade_size_out_of_range_fails() {
        for size in ["0", "150", "-5", "abc"] {
            let config = make_config(&format!("[trade]\nasset = a\nsize_pct = {size}\n"));
            let err = trade_settings(&config).unwrap_err();
            assert!(
                matches!(err, YieldtraderError::ConfigInvalid { ref key, .. } if key == "size_pct"),
                "{size}: {err}"
            );
        }
    }

    #[test]
    fn trade_zero_period_fails() {
        let config = make_config("[trade]\nasset = a\nshort_period = 0\n");
        let err = trade_settings(&config).unwrap_err();
        assert!(
            matches!(err, YieldtraderError::ConfigInvalid { key, .. } if key == "short_period")
        );
    }

    #[test]
    fn farm_settings_parsed() {
        let config = make_config(
            r#"
[farm]
asset_a = terra-luna
asset_b = terrausd
start_date = 2021-07-01
harvest_days = 90
apr = 80
final_apr = 40
apr_floor = half_initial
initial_investment = 2000
monthly_investment = 100
output = farm.svg
"#,
        );
        let farm = farm_settings(&config).unwrap();
        assert_eq!(farm.start_date, NaiveDate::from_ymd_opt(2021, 7, 1).unwrap());
        assert_eq!(farm.harvest_days, 90);
        assert_eq!(farm.apr, 80.0);
        assert_eq!(farm.final_apr, 40.0);
        assert_eq!(farm.apr_floor, AprFloor::HalfInitial);
        assert_eq!(farm.initial_investment, 2_000.0);
        assert_eq!(farm.monthly_investment, 100.0);
        assert_eq!(farm.output, Some(PathBuf::from("farm.svg")));
    }

    #[test]
    fn farm_defaults() {
        let config = make_config("[farm]\nasset_a = a\nasset_b = b\nstart_date = 2021-07-01\n");
        let farm = farm_settings(&config).unwrap();
        assert_eq!(farm.apr, 100.0);
        assert_eq!(farm.final_apr, 0.0);
        assert_eq!(farm.apr_floor, AprFloor::Zero);
        assert_eq!(farm.harvest_days, 365);
        assert_eq!(farm.output, None);
    }

    #[test]
    fn farm_invalid_start_date_fails() {
        let config = make_config("[farm]\nasset_a = a\nasset_b = b\nstart_date = 2021/07/01\n");
        let err = farm_settings(&config).unwrap_err();
        assert!(matches!(err, YieldtraderError::ConfigInvalid { key, .. } if key == "start_date"));
    }

    #[test]
    fn farm_missing_start_date_fails() {
        let config = make_config("[farm]\nasset_a = a\nasset_b = b\n");
        let err = farm_settings(&config).unwrap_err();
        assert!(matches!(err, YieldtraderError::ConfigMissing { key, .. } if key == "start_date"));
    }

    #[test]
    fn farm_final_apr_above_apr_fails() {
        let config = make_config(
            "[farm]\nasset_a = a\nasset_b = b\nstart_date = 2021-07-01\napr = 50\nfinal_apr = 60\n",
        );
        let err = farm_settings(&config).unwrap_err();
        assert!(matches!(err, YieldtraderError::ConfigInvalid { key, .. } if key == "final_apr"));
    }

    #[test]
    fn farm_negative_apr_fails() {
        let config =
            make_config("[farm]\nasset_a = a\nasset_b = b\nstart_date = 2021-07-01\napr = -1\n");
        let err = farm_settings(&config).unwrap_err();
        assert!(matches!(err, YieldtraderError::ConfigInvalid { key, .. } if key == "apr"));
    }

    #[test]
    fn forecast_settings_parsed() {
        let forecast = forecast_settings(&make_config(FORECAST)).unwrap();
        assert_eq!(forecast.days, 30);
        assert_eq!(forecast.initial_investment, 5_000.0);
        assert_eq!(forecast.markets.len(), 2);

        let luna = forecast.market("luna").unwrap();
        assert_eq!(luna.name, "Terra");
        assert_eq!(luna.segments.len(), 2);
        assert_eq!(forecast.market("ust").unwrap().name, "UST");

        let lp = &forecast.lps[0];
        assert_eq!((lp.a.as_str(), lp.b.as_str()), ("luna", "ust"));
        assert_eq!(lp.scenario.name.as_deref(), Some("luna-ust"));
        assert_eq!(lp.scenario.apr, 120.0);
        assert_eq!(lp.scenario.final_apr, 60.0);
        assert_eq!(lp.scenario.apr_floor, AprFloor::HalfInitial);
        assert_eq!(lp.scenario.monthly_investment, 250.0);
    }

    #[test]
    fn forecast_lp_must_reference_markets() {
        let config = make_config(
            "[forecast]\nstart_date = 2022-01-01\n[market.luna]\nprice = 1\n[lp.x]\na = luna\nb = atom\n",
        );
        let err = forecast_settings(&config).unwrap_err();
        assert!(matches!(
            err,
            YieldtraderError::ConfigInvalid { section, key, .. } if section == "lp.x" && key == "b"
        ));
    }

    #[test]
    fn count_above_u32_is_rejected_as_too_large() {
        let config = make_config(
            "[forecast]\nstart_date = 2022-01-01\ndays = 4294967296\n[market.luna]\nprice = 1\n[lp.x]\na = luna\nb = luna\n",
        );
        let err = forecast_settings(&config).unwrap_err();
        assert!(matches!(
            err,
            YieldtraderError::ConfigInvalid { key, reason, .. }
                if key == "days" && reason == "days must be at most 4294967295"
        ));
    }

    #[test]
    fn forecast_needs_an_lp() {
        let config = make_config("[forecast]\nstart_date = 2022-01-01\n[market.luna]\nprice = 1\n");
        assert!(matches!(
            forecast_settings(&config).unwrap_err(),
            YieldtraderError::ConfigMissing { .. }
        ));
    }

    #[test]
    fn forecast_bad_segments_fail() {
        let config = make_config(
            "[forecast]\nstart_date = 2022-01-01\n[market.luna]\nprice = 1\nsegments = up:5\n",
        );
        let err = forecast_settings(&config).unwrap_err();
        assert!(matches!(err, YieldtraderError::ConfigInvalid { key, .. } if key == "segments"));
    }

    #[test]
    fn market_price_must_be_positive() {
        let config = make_config(
            "[forecast]\nstart_date = 2022-01-01\n[market.luna]\nprice = 0\n[lp.x]\na = luna\nb = luna\n",
        );
        let err = forecast_settings(&config).unwrap_err();
        assert!(matches!(err, YieldtraderError::ConfigInvalid { key, .. } if key == "price"));
    }

    #[test]
    fn validate_config_checks_present_sections_only() {
        assert!(validate_config(&make_config("[data]\npath = prices\n")).is_ok());
        assert!(validate_config(&make_config(FORECAST)).is_ok());

        let err = validate_config(&make_config("[data]\n[farm]\nasset_a = a\n")).unwrap_err();
        assert!(matches!(err, YieldtraderError::ConfigMissing { key, .. } if key == "asset_b"));
    }
}
