use crate::classifier::ClassifierConfig;
use crate::matcher::MatchConfig;
use crate::merger::MergePolicy;
use crate::normalize::NormalizerConfig;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres URL. Leads live in memory only when unset.
    pub database_url: Option<String>,
    pub port: u16,
    /// Required in `X-Api-Key` on `/api/v1` routes when set.
    pub api_key: Option<String>,
    pub default_country_code: u16,
    pub match_high_threshold: f64,
    pub match_low_threshold: f64,
    pub classifier_config_path: Option<String>,
}

/// Tuning for every pipeline stage.
#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    pub normalizer: NormalizerConfig,
    pub matching: MatchConfig,
    pub merge: MergePolicy,
    pub classifier: ClassifierConfig,
}

fn parse_threshold(name: &str, default: f64) -> anyhow::Result<f64> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => {
            let value: f64 = raw
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("{} must be a number between 0 and 1", name))?;
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{} must be between 0 and 1", name);
            }
            Ok(value)
        }
        _ => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = MatchConfig::default();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .ok()
                .filter(|url| !url.trim().is_empty())
                .map(|url| {
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })
                .transpose()?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            api_key: std::env::var("API_KEY")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            default_country_code: std::env::var("DEFAULT_COUNTRY_CODE")
                .unwrap_or_else(|_| "60".to_string())
                .trim()
                .trim_start_matches('+')
                .parse::<u16>()
                .map_err(|_| anyhow::anyhow!("DEFAULT_COUNTRY_CODE must be a calling code like 60"))
                .and_then(|code| {
                    if code == 0 || code > 999 {
                        anyhow::bail!("DEFAULT_COUNTRY_CODE must be 1-999");
                    }
                    Ok(code)
                })?,
            match_high_threshold: parse_threshold("MATCH_HIGH_THRESHOLD", defaults.high_threshold)?,
            match_low_threshold: parse_threshold("MATCH_LOW_THRESHOLD", defaults.low_threshold)?,
            classifier_config_path: std::env::var("CLASSIFIER_CONFIG_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        };

        if config.match_low_threshold > config.match_high_threshold {
            anyhow::bail!("MATCH_LOW_THRESHOLD cannot exceed MATCH_HIGH_THRESHOLD");
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        match &config.database_url {
            Some(url) => tracing::debug!("Database URL: {}...", url.chars().take(20).collect::<String>()),
            None => tracing::warn!("DATABASE_URL not set, leads are kept in memory only"),
        }
        tracing::debug!(
            "Matching thresholds: auto-merge >= {}, review >= {}",
            config.match_high_threshold,
            config.match_low_threshold
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    /// Builds stage settings, loading the classifier tables from
    /// `CLASSIFIER_CONFIG_PATH` when it is set.
    pub fn pipeline_settings(&self) -> anyhow::Result<PipelineSettings> {
        let classifier = match &self.classifier_config_path {
            Some(path) => {
                let loaded = ClassifierConfig::from_json_file(path)?;
                tracing::info!("Classifier tables loaded from {}", path);
                loaded
            }
            None => ClassifierConfig::default(),
        };

        Ok(PipelineSettings {
            normalizer: NormalizerConfig {
                default_country_code: self.default_country_code,
            },
            matching: MatchConfig {
                high_threshold: self.match_high_threshold,
                low_threshold: self.match_low_threshold,
                ..MatchConfig::default()
            },
            merge: MergePolicy::default(),
            classifier,
        })
    }
}
