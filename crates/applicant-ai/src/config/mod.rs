use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use chrono::NaiveTime;

use crate::workflows::jobsearch::{
    FollowUpPolicy, OutreachConfig, PollConfig, SchedulingConfig, SearchCriteria, WorkingHours,
};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration, constructed once at startup and passed explicitly
/// into the orchestrator and controller constructors.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub search: SearchCriteria,
    pub outreach: OutreachConfig,
    pub policy: FollowUpPolicy,
    pub scheduling: SchedulingConfig,
    pub poll: PollConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let search = SearchCriteria {
            keywords: env_list("SEARCH_KEYWORDS"),
            locations: env_list("SEARCH_LOCATIONS"),
            posted_within_days: env_parsed("POSTED_WITHIN_DAYS", 30)?,
            ..SearchCriteria::default()
        };

        let outreach = OutreachConfig {
            sender_name: env::var("SENDER_NAME").unwrap_or_default(),
            sender_email: env::var("SENDER_EMAIL").unwrap_or_default(),
            resume_path: env::var("RESUME_PATH").unwrap_or_default(),
            cover_letter_path: env::var("COVER_LETTER_PATH").ok(),
        };

        let policy = FollowUpPolicy {
            interval_days: env_parsed("FOLLOW_UP_INTERVAL_DAYS", 5)?,
            max_follow_ups: env_parsed("MAX_FOLLOW_UPS", 2)?,
        };

        let working_hours = WorkingHours {
            start: env_time("WORKING_HOURS_START", "09:00")?,
            end: env_time("WORKING_HOURS_END", "17:00")?,
        };
        if working_hours.start >= working_hours.end {
            return Err(ConfigError::InvalidWorkingHours);
        }

        let defaults = SchedulingConfig::default();
        let scheduling = SchedulingConfig {
            working_hours,
            buffer_minutes: env_parsed("BUFFER_MINUTES", defaults.buffer_minutes)?,
            default_duration_minutes: env_parsed(
                "DEFAULT_DURATION_MINUTES",
                defaults.default_duration_minutes,
            )?,
            horizon_days: env_parsed("SLOT_HORIZON_DAYS", defaults.horizon_days)?,
            alternative_horizon_days: env_parsed(
                "ALTERNATIVE_HORIZON_DAYS",
                defaults.alternative_horizon_days,
            )?,
            num_slots: env_parsed("SLOT_COUNT", defaults.num_slots)?,
            timezone: env::var("CALENDAR_TIMEZONE").unwrap_or(defaults.timezone),
            calendar_id: env::var("CALENDAR_ID").unwrap_or(defaults.calendar_id),
        };

        let poll = PollConfig {
            interval_seconds: env_parsed("POLL_INTERVAL_SECONDS", 3600)?,
            max_concurrent_sends: env_parsed("MAX_CONCURRENT_SENDS", 4)?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            search,
            outreach,
            policy,
            scheduling,
            poll,
        })
    }

    /// The pipeline must not start without a sender identity and resume.
    pub fn require_outreach_identity(&self) -> Result<(), ConfigError> {
        if self.outreach.sender_email.trim().is_empty() {
            return Err(ConfigError::MissingVar("SENDER_EMAIL"));
        }
        if self.outreach.resume_path.trim().is_empty() {
            return Err(ConfigError::MissingVar("RESUME_PATH"));
        }
        Ok(())
    }
}

fn env_list(key: &str) -> Vec<String> {
    env::var(key)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_parsed<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key }),
        Err(_) => Ok(default),
    }
}

fn env_time(key: &'static str, default: &str) -> Result<NaiveTime, ConfigError> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|_| ConfigError::InvalidTime { key })
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
    InvalidTime { key: &'static str },
    InvalidWorkingHours,
    MissingVar(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a non-negative number")
            }
            ConfigError::InvalidTime { key } => {
                write!(f, "{key} must be a HH:MM time")
            }
            ConfigError::InvalidWorkingHours => {
                write!(f, "working hours must start before they end")
            }
            ConfigError::MissingVar(key) => {
                write!(f, "required environment variable {key} is not set")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
