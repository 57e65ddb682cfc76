use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_SIMULATED_LAYERS: &str = "baseline_deviation,statistical_outlier,trend_shift,\
correlation_break,threshold_breach,pattern_drift";

const DEFAULT_SIMULATED_AGENTS: &str = "thermal,vibration,pressure,flow,electrical,acoustic,\
chemical,structural,efficiency,maintenance,safety,compliance,forecasting";

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that allowed to receive server responses.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "http://localhost:3000,https://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,

    /// Seconds an analysis run may execute before it is reported to the observer as timed out.
    #[arg(long, env, default_value_t = 600)]
    pub analysis_timeout_secs: u64,

    /// Milliseconds the simulated engine pauses between emitted steps.
    #[arg(long, env, default_value_t = 250)]
    pub simulated_step_delay_ms: u64,

    /// Detection layers the simulated engine runs, in order.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = DEFAULT_SIMULATED_LAYERS
    )]
    pub simulated_layers: Vec<String>,

    /// Agents the simulated engine dispatches when a request does not name any.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = DEFAULT_SIMULATED_AGENTS
    )]
    pub simulated_agents: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    /// Host and port the server binds to, formatted for `TcpListener::bind`.
    pub fn listen_address(&self) -> String {
        let interface = self.interface.as_deref().unwrap_or("127.0.0.1");
        format!("{}:{}", interface, self.port)
    }

    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_secs(self.analysis_timeout_secs)
    }

    pub fn simulated_step_delay(&self) -> Duration {
        Duration::from_millis(self.simulated_step_delay_ms)
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_describe_six_layers_and_thirteen_agents() {
        let config = Config::parse_from(["analysis_stream_rs"]);

        assert_eq!(config.simulated_layers.len(), 6);
        assert_eq!(config.simulated_agents.len(), 13);
        assert_eq!(config.simulated_layers[0], "baseline_deviation");
        assert_eq!(config.simulated_agents[12], "forecasting");
    }

    #[test]
    fn test_simulated_lists_split_on_commas() {
        let config = Config::parse_from([
            "analysis_stream_rs",
            "--simulated-layers",
            "a,b",
            "--simulated-agents",
            "x",
        ]);

        assert_eq!(config.simulated_layers, vec!["a", "b"]);
        assert_eq!(config.simulated_agents, vec!["x"]);
    }

    #[test]
    fn test_durations_are_derived_from_numeric_settings() {
        let config = Config::parse_from([
            "analysis_stream_rs",
            "--analysis-timeout-secs",
            "3",
            "--simulated-step-delay-ms",
            "20",
        ]);

        assert_eq!(config.analysis_timeout(), Duration::from_secs(3));
        assert_eq!(config.simulated_step_delay(), Duration::from_millis(20));
    }

    #[test]
    fn test_listen_address_joins_interface_and_port() {
        let config =
            Config::parse_from(["analysis_stream_rs", "--interface", "0.0.0.0", "--port", "8080"]);

        assert_eq!(config.listen_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_rust_env_parses_case_insensitively() {
        assert_eq!("PRODUCTION".parse::<RustEnv>(), Ok(RustEnv::Production));
        assert_eq!("staging".parse::<RustEnv>(), Ok(RustEnv::Staging));
        assert_eq!("qa".parse::<RustEnv>(), Err(RustEnvParseError));
    }
}
