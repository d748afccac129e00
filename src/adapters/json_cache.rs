//! File-backed JSON cache and a read-through price port on top of it.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::{DateTime, Datelike, Utc};

use crate::domain::error::YieldtraderError;
use crate::domain::market::{Fiat, Market};
use crate::ports::cache_port::{CachePort, InvalidationPeriod};
use crate::ports::price_port::PricePort;

/// Bucket prefix plus `key` lowercased, with every run of non-word
/// characters collapsed to a single `-`.
pub fn cache_key(key: &str, period: InvalidationPeriod, now: DateTime<Utc>) -> String {
    let prefix = match period {
        InvalidationPeriod::Hourly => now.format("%Y-%m-%d-%H").to_string(),
        InvalidationPeriod::Daily => now.format("%Y-%m-%d").to_string(),
        InvalidationPeriod::Weekly => format!(
            "{}week{:02}",
            now.format("%Y-%m-"),
            now.iso_week().week()
        ),
    };

    let mut normalized = String::with_capacity(key.len());
    let mut in_run = false;
    for c in key.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            normalized.push(c);
            in_run = false;
        } else if !in_run {
            normalized.push('-');
            in_run = true;
        }
    }

    format!("{}-{}", prefix, normalized)
}

pub struct JsonFileCache {
    dir: PathBuf,
}

impl JsonFileCache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, key: &str, period: InvalidationPeriod) -> PathBuf {
        self.dir.join(cache_key(key, period, Utc::now()))
    }
}

impl CachePort for JsonFileCache {
    fn get(
        &self,
        key: &str,
        period: InvalidationPeriod,
    ) -> Result<Option<String>, YieldtraderError> {
        let path = self.path_for(key, period);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(YieldtraderError::Cache {
                reason: format!("could not read {}: {}", path.display(), e),
            }),
        }
    }

    fn set(
        &self,
        key: &str,
        value: &str,
        period: InvalidationPeriod,
    ) -> Result<(), YieldtraderError> {
        fs::create_dir_all(&self.dir).map_err(|e| YieldtraderError::Cache {
            reason: format!("could not create {}: {}", self.dir.display(), e),
        })?;
        let path = self.path_for(key, period);
        fs::write(&path, value).map_err(|e| YieldtraderError::Cache {
            reason: format!("could not write {}: {}", path.display(), e),
        })
    }
}

/// Serves markets from `cache` when present, otherwise asks `inner` and
/// stores the answer.
pub struct CachedPricePort<P, C> {
    inner: P,
    cache: C,
    period: InvalidationPeriod,
}

impl<P: PricePort, C: CachePort> CachedPricePort<P, C> {
    pub fn new(inner: P, cache: C, period: InvalidationPeriod) -> Self {
        Self {
            inner,
            cache,
            period,
        }
    }
}

impl<P: PricePort, C: CachePort> PricePort for CachedPricePort<P, C> {
    fn fetch_market(
        &self,
        asset_id: &str,
        days: u32,
        currency: Fiat,
    ) -> Result<Market, YieldtraderError> {
        let key = format!("market/{}/{}/{}", asset_id, days, currency);

        if let Some(cached) = self.cache.get(&key, self.period)? {
            match serde_json::from_str::<Market>(&cached) {
                Ok(market) => {
                    tracing::debug!(asset = asset_id, "market served from cache");
                    return Ok(market);
                }
                Err(e) => tracing::warn!(asset = asset_id, error = %e, "ignoring corrupt cache entry"),
            }
        }

        let market = self.inner.fetch_market(asset_id, days, currency)?;
        let json = serde_json::to_string(&market).map_err(|e| YieldtraderError::Cache {
            reason: format!("could not encode market {}: {}", asset_id, e),
        })?;
        self.cache.set(&key, &json, self.period)?;
        Ok(market)
    }

    fn list_assets(&self) -> Result<Vec<String>, YieldtraderError> {
        self.inner.list_assets()
    }
}
