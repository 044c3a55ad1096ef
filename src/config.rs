use crate::sensors::SimulationScenario;
use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Fits a full-resolution phone photo after base64 inflation.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Config {
    pub analysis_url: String,
    pub analysis_api_key: Option<String>,
    pub analysis_timeout: Duration,
    pub port: u16,
    pub max_upload_bytes: usize,
    pub connect_latency: Duration,
    pub default_scenario: SimulationScenario,
    pub simulation_seed: Option<u64>,
}

fn parse_var<T>(name: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("{} is not valid", name))
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let analysis_url = env::var("ANALYSIS_URL").context("ANALYSIS_URL must be set")?;
        let analysis_api_key = optional_var("ANALYSIS_API_KEY");
        let analysis_timeout = Duration::from_secs(parse_var("ANALYSIS_TIMEOUT_SECS", "60")?);
        let port = parse_var("PORT", "8080")?;
        let max_upload_bytes =
            parse_var("MAX_UPLOAD_BYTES", &DEFAULT_MAX_UPLOAD_BYTES.to_string())?;
        let connect_latency = Duration::from_millis(parse_var("CONNECT_LATENCY_MS", "1500")?);
        let default_scenario = parse_var("DEFAULT_SCENARIO", "resting")?;
        let simulation_seed = optional_var("SIMULATION_SEED")
            .map(|s| s.parse::<u64>())
            .transpose()
            .context("SIMULATION_SEED is not valid")?;

        // Ensure the endpoint doesn't end with a slash
        let analysis_url = analysis_url.trim_end_matches('/').to_string();

        Ok(Config {
            analysis_url,
            analysis_api_key,
            analysis_timeout,
            port,
            max_upload_bytes,
            connect_latency,
            default_scenario,
            simulation_seed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const OPTIONAL: [&str; 7] = [
        "ANALYSIS_API_KEY",
        "ANALYSIS_TIMEOUT_SECS",
        "PORT",
        "MAX_UPLOAD_BYTES",
        "CONNECT_LATENCY_MS",
        "DEFAULT_SCENARIO",
        "SIMULATION_SEED",
    ];

    fn clear_env() {
        env::remove_var("ANALYSIS_URL");
        for name in OPTIONAL {
            env::remove_var(name);
        }
    }

    #[test]
    #[serial]
    fn test_config_from_env_defaults() {
        clear_env();
        env::set_var("ANALYSIS_URL", "http://localhost:9000/analyze/");

        let config = Config::from_env().unwrap();

        assert_eq!(config.analysis_url, "http://localhost:9000/analyze");
        assert_eq!(config.analysis_api_key, None);
        assert_eq!(config.analysis_timeout, Duration::from_secs(60));
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_upload_bytes, 25 * 1024 * 1024);
        assert_eq!(config.connect_latency, Duration::from_millis(1500));
        assert_eq!(config.default_scenario, SimulationScenario::Resting);
        assert_eq!(config.simulation_seed, None);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_overrides() {
        clear_env();
        env::set_var("ANALYSIS_URL", "https://analysis.example.com/v1/analyze");
        env::set_var("ANALYSIS_API_KEY", "test_key");
        env::set_var("ANALYSIS_TIMEOUT_SECS", "15");
        env::set_var("PORT", "3000");
        env::set_var("MAX_UPLOAD_BYTES", "1048576");
        env::set_var("CONNECT_LATENCY_MS", "250");
        env::set_var("DEFAULT_SCENARIO", "Exercise");
        env::set_var("SIMULATION_SEED", "1234");

        let config = Config::from_env().unwrap();

        assert_eq!(config.analysis_api_key.as_deref(), Some("test_key"));
        assert_eq!(config.analysis_timeout, Duration::from_secs(15));
        assert_eq!(config.port, 3000);
        assert_eq!(config.max_upload_bytes, 1_048_576);
        assert_eq!(config.connect_latency, Duration::from_millis(250));
        assert_eq!(config.default_scenario, SimulationScenario::Exercise);
        assert_eq!(config.simulation_seed, Some(1234));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_errors() {
        clear_env();
        assert!(Config::from_env().is_err());

        env::set_var("ANALYSIS_URL", "http://localhost:9000");
        env::set_var("PORT", "eighty");
        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("PORT"));
        env::remove_var("PORT");

        env::set_var("DEFAULT_SCENARIO", "sprinting");
        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("DEFAULT_SCENARIO"));

        clear_env();
    }
}
