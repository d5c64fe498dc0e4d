// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use explorer_app::{CellFormatter, DEFAULT_MONEY_COLUMNS, MoneyFormat, ViewMode};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const APP_NAME: &str = "retail-explorer";
const CONFIG_VERSION: i64 = 1;
const CONFIG_PATH_ENV: &str = "EXPLORER_CONFIG_PATH";
const SERVICE_URL_ENV: &str = "EXPLORER_SERVICE_URL";
const DEFAULT_SERVICE_URL: &str = "http://localhost:8000/query";
const DEFAULT_TIMEOUT: &str = "30s";
const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_LOCALE: &str = "en-US";
const DEFAULT_LOG_LEVEL: &str = "warn";
const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub service: Service,
    #[serde(default)]
    pub format: Format,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            service: Service::default(),
            format: Format::default(),
            ui: Ui::default(),
            logging: Logging::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
    pub url: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Service {
    fn default() -> Self {
        Self {
            url: None,
            timeout: Some(DEFAULT_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Format {
    pub currency: Option<String>,
    pub locale: Option<String>,
    pub money_columns: Option<Vec<String>>,
}

impl Default for Format {
    fn default() -> Self {
        Self {
            currency: Some(DEFAULT_CURRENCY.to_owned()),
            locale: Some(DEFAULT_LOCALE.to_owned()),
            money_columns: Some(
                DEFAULT_MONEY_COLUMNS
                    .iter()
                    .map(|column| (*column).to_owned())
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub default_view: Option<String>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            default_view: Some(ViewMode::Table.as_str().to_owned()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Logging {
    pub level: Option<String>,
    pub path: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;

        let app_dir = config_root.join(APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.validate(path)?;
            return Ok(config);
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} has no version; add `version = 1` and put values under [service], [format], [ui], and [logging]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let service_url = self.service_url();
        let parsed = Url::parse(&service_url).with_context(|| {
            format!(
                "service.url in {} is not a valid URL: {service_url:?}",
                path.display()
            )
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "service.url in {} must use http or https, got {:?}",
                path.display(),
                parsed.scheme()
            );
        }

        if let Some(timeout) = &self.service.timeout {
            let parsed = parse_duration(timeout)
                .with_context(|| format!("service.timeout in {}", path.display()))?;
            if parsed.is_zero() {
                bail!(
                    "service.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        self.money_format()
            .with_context(|| format!("invalid [format] section in {}", path.display()))?;

        if let Some(columns) = &self.format.money_columns
            && columns.iter().any(|column| column.trim().is_empty())
        {
            bail!(
                "format.money_columns in {} must not contain blank names",
                path.display()
            );
        }

        self.default_view()
            .with_context(|| format!("ui.default_view in {}", path.display()))?;

        let level = self.log_level();
        if !LOG_LEVELS.contains(&level) {
            bail!(
                "logging.level in {} must be one of {}, got {:?}",
                path.display(),
                LOG_LEVELS.join(", "),
                level
            );
        }

        Ok(())
    }

    pub fn service_url(&self) -> String {
        if let Some(url) = &self.service.url {
            return url.trim().to_owned();
        }
        match env::var(SERVICE_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => url.trim().to_owned(),
            _ => DEFAULT_SERVICE_URL.to_owned(),
        }
    }

    pub fn service_timeout(&self) -> Result<Duration> {
        parse_duration(self.service.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn money_format(&self) -> Result<MoneyFormat> {
        MoneyFormat::from_codes(
            self.format.currency.as_deref().unwrap_or(DEFAULT_CURRENCY),
            self.format.locale.as_deref().unwrap_or(DEFAULT_LOCALE),
        )
    }

    pub fn cell_formatter(&self) -> Result<CellFormatter> {
        let money = self.money_format()?;
        Ok(match &self.format.money_columns {
            Some(columns) => CellFormatter::new(columns.iter().map(|column| column.trim()), money),
            None => CellFormatter::new(DEFAULT_MONEY_COLUMNS, money),
        })
    }

    pub fn default_view(&self) -> Result<ViewMode> {
        let raw = self
            .ui
            .default_view
            .as_deref()
            .unwrap_or(ViewMode::Table.as_str());
        parse_view(raw)
    }

    pub fn log_level(&self) -> &str {
        self.logging.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.logging.path {
            return Ok(PathBuf::from(path));
        }
        let data_root = dirs::data_local_dir().ok_or_else(|| {
            anyhow!("cannot resolve data directory; set [logging].path in the config file")
        })?;
        Ok(data_root.join(APP_NAME).join("explorer.log"))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# Retail Explorer config\n# Place this file at: {}\n\nversion = 1\n\n[service]\n# Defaults to ${} when unset, then {}\nurl = \"{}\"\ntimeout = \"{}\"\n\n[format]\n# One of: USD EUR GBP JPY CAD AUD INR CHF\ncurrency = \"{}\"\n# One of: en-US en-GB de-DE fr-FR\nlocale = \"{}\"\nmoney_columns = [\"total_spent\"]\n\n[ui]\n# table, cards, or chart\ndefault_view = \"table\"\n\n[logging]\nlevel = \"{}\"\n# path = \"/absolute/path/to/explorer.log\"\n",
            path.display(),
            SERVICE_URL_ENV,
            DEFAULT_SERVICE_URL,
            DEFAULT_SERVICE_URL,
            DEFAULT_TIMEOUT,
            DEFAULT_CURRENCY,
            DEFAULT_LOCALE,
            DEFAULT_LOG_LEVEL,
        )
    }
}

pub fn parse_view(raw: &str) -> Result<ViewMode> {
    ViewMode::parse(raw)
        .ok_or_else(|| anyhow!("unknown view {raw:?}; use one of: table, cards, chart"))
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        let secs = mins
            .checked_mul(60)
            .ok_or_else(|| anyhow!("timeout duration {raw:?} is too large"))?;
        return Ok(Duration::from_secs(secs));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 30s)")
}
