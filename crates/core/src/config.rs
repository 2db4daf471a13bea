use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cpq::pricing::{DeterministicCostAggregator, DEFAULT_LABOR_RATIO, DEFAULT_VAT_RATE};

const ENV_PREFIX: &str = "RENOQUOTE_";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub pricing: PricingConfig,
    pub analysis: AnalysisConfig,
    pub staging: StagingConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PricingConfig {
    pub vat_rate: Decimal,
    pub default_labor_ratio: Decimal,
    pub currency: String,
}

impl PricingConfig {
    pub fn aggregator(&self) -> DeterministicCostAggregator {
        DeterministicCostAggregator::new(self.vat_rate, self.default_labor_ratio)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AnalysisConfig {
    /// Analyses below this confidence are flagged, never rejected.
    pub min_confidence: Decimal,
}

/// Upper bound for `staging.ttl_secs`: one week.
pub const MAX_STAGING_TTL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StagingConfig {
    pub ttl_secs: u64,
    pub max_entries: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub vat_rate: Option<Decimal>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://renoquote.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            pricing: PricingConfig {
                vat_rate: DEFAULT_VAT_RATE,
                default_labor_ratio: DEFAULT_LABOR_RATIO,
                currency: "KRW".to_string(),
            },
            analysis: AnalysisConfig { min_confidence: Decimal::new(5, 1) },
            staging: StagingConfig { ttl_secs: 1800, max_entries: 256 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("renoquote.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(pricing) = patch.pricing {
            if let Some(vat_rate) = pricing.vat_rate {
                self.pricing.vat_rate = vat_rate;
            }
            if let Some(ratio) = pricing.default_labor_ratio {
                self.pricing.default_labor_ratio = ratio;
            }
            if let Some(currency) = pricing.currency {
                self.pricing.currency = currency;
            }
        }

        if let Some(min_confidence) = patch.analysis.and_then(|analysis| analysis.min_confidence) {
            self.analysis.min_confidence = min_confidence;
        }

        if let Some(staging) = patch.staging {
            if let Some(ttl_secs) = staging.ttl_secs {
                self.staging.ttl_secs = ttl_secs;
            }
            if let Some(max_entries) = staging.max_entries {
                self.staging.max_entries = max_entries;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_env("DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PRICING_VAT_RATE") {
            self.pricing.vat_rate = parse_env("PRICING_VAT_RATE", &value)?;
        }
        if let Some(value) = read_env("PRICING_DEFAULT_LABOR_RATIO") {
            self.pricing.default_labor_ratio = parse_env("PRICING_DEFAULT_LABOR_RATIO", &value)?;
        }
        if let Some(value) = read_env("PRICING_CURRENCY") {
            self.pricing.currency = value;
        }

        if let Some(value) = read_env("ANALYSIS_MIN_CONFIDENCE") {
            self.analysis.min_confidence = parse_env("ANALYSIS_MIN_CONFIDENCE", &value)?;
        }

        if let Some(value) = read_env("STAGING_TTL_SECS") {
            self.staging.ttl_secs = parse_env("STAGING_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("STAGING_MAX_ENTRIES") {
            self.staging.max_entries = parse_env("STAGING_MAX_ENTRIES", &value)?;
        }

        let log_level = read_env("LOGGING_LEVEL").or_else(|| read_env("LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("LOGGING_FORMAT").or_else(|| read_env("LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(vat_rate) = overrides.vat_rate {
            self.pricing.vat_rate = vat_rate;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_pricing(&self.pricing)?;
        validate_analysis(&self.analysis)?;
        validate_staging(&self.staging)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("renoquote.toml"), PathBuf::from("config/renoquote.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_pricing(pricing: &PricingConfig) -> Result<(), ConfigError> {
    if pricing.vat_rate < Decimal::ZERO || pricing.vat_rate >= Decimal::ONE {
        return Err(ConfigError::Validation(format!(
            "pricing.vat_rate must be in range 0..1 (got {}); Korean VAT is 0.10",
            pricing.vat_rate
        )));
    }

    if pricing.default_labor_ratio < Decimal::ZERO || pricing.default_labor_ratio > Decimal::ONE {
        return Err(ConfigError::Validation(format!(
            "pricing.default_labor_ratio must be in range 0..=1 (got {})",
            pricing.default_labor_ratio
        )));
    }

    let currency = pricing.currency.trim();
    if currency.len() != 3 || !currency.chars().all(|ch| ch.is_ascii_uppercase()) {
        return Err(ConfigError::Validation(
            "pricing.currency must be an ISO 4217 code such as `KRW`".to_string(),
        ));
    }

    Ok(())
}

fn validate_analysis(analysis: &AnalysisConfig) -> Result<(), ConfigError> {
    if analysis.min_confidence < Decimal::ZERO || analysis.min_confidence > Decimal::ONE {
        return Err(ConfigError::Validation(
            "analysis.min_confidence must be in range 0..=1".to_string(),
        ));
    }
    Ok(())
}

fn validate_staging(staging: &StagingConfig) -> Result<(), ConfigError> {
    if staging.ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "staging.ttl_secs must be greater than zero".to_string(),
        ));
    }
    if staging.ttl_secs > MAX_STAGING_TTL_SECS {
        return Err(ConfigError::Validation(format!(
            "staging.ttl_secs must be at most {MAX_STAGING_TTL_SECS}, got {}",
            staging.ttl_secs
        )));
    }
    if staging.max_entries == 0 {
        return Err(ConfigError::Validation(
            "staging.max_entries must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(suffix: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}{suffix}")).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: FromStr>(suffix: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: format!("{ENV_PREFIX}{suffix}"),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    pricing: Option<PricingPatch>,
    analysis: Option<AnalysisPatch>,
    staging: Option<StagingPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    vat_rate: Option<Decimal>,
    default_labor_ratio: Option<Decimal>,
    currency: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AnalysisPatch {
    min_confidence: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
struct StagingPatch {
    ttl_secs: Option<u64>,
    max_entries: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
