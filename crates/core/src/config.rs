use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub slack: SlackConfig,
    pub qna: QnaConfig,
    pub sheets: SheetsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub bot_token: SecretString,
    pub api_base_url: String,
    pub heartbeat_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub reconnect: ReconnectConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectConfig {
    pub strategy: ReconnectStrategy,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct QnaConfig {
    pub subscription_key: SecretString,
    pub base_url: String,
    pub knowledge_base_name: String,
    pub rebuild_on_boot: bool,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub service_account_key_path: PathBuf,
    pub client_email: Option<String>,
    pub range: String,
    pub api_base_url: String,
    pub token_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectStrategy {
    Immediate,
    Backoff,
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
    pub slack_bot_token: Option<String>,
    pub slack_api_base_url: Option<String>,
    pub heartbeat_interval_secs: Option<u64>,
    pub qna_subscription_key: Option<String>,
    pub qna_base_url: Option<String>,
    pub sheets_spreadsheet_id: Option<String>,
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
                url: "sqlite://k9.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            slack: SlackConfig {
                bot_token: String::new().into(),
                api_base_url: "https://slack.com/api".to_string(),
                heartbeat_interval_secs: 120,
                request_timeout_secs: 30,
                reconnect: ReconnectConfig {
                    strategy: ReconnectStrategy::Immediate,
                    max_retries: 5,
                    base_delay_ms: 250,
                    max_delay_ms: 5_000,
                },
            },
            qna: QnaConfig {
                subscription_key: String::new().into(),
                base_url: "https://westus.api.cognitive.microsoft.com/qnamaker/v2.0".to_string(),
                knowledge_base_name: "k9".to_string(),
                rebuild_on_boot: false,
                timeout_secs: 30,
            },
            sheets: SheetsConfig {
                spreadsheet_id: String::new(),
                service_account_key_path: PathBuf::from(".googlekeys.json"),
                client_email: None,
                range: "Sheet1!A2:B1000".to_string(),
                api_base_url: "https://sheets.googleapis.com".to_string(),
                token_url: "https://oauth2.googleapis.com/token".to_string(),
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for ReconnectStrategy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "immediate" => Ok(Self::Immediate),
            "backoff" => Ok(Self::Backoff),
            other => Err(ConfigError::Validation(format!(
                "unsupported reconnect strategy `{other}` (expected immediate|backoff)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("k9.toml"));
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

        if let Some(slack) = patch.slack {
            if let Some(bot_token) = slack.bot_token {
                self.slack.bot_token = secret_value(bot_token);
            }
            if let Some(api_base_url) = slack.api_base_url {
                self.slack.api_base_url = api_base_url;
            }
            if let Some(heartbeat_interval_secs) = slack.heartbeat_interval_secs {
                self.slack.heartbeat_interval_secs = heartbeat_interval_secs;
            }
            if let Some(request_timeout_secs) = slack.request_timeout_secs {
                self.slack.request_timeout_secs = request_timeout_secs;
            }
            if let Some(reconnect) = slack.reconnect {
                if let Some(strategy) = reconnect.strategy {
                    self.slack.reconnect.strategy = strategy;
                }
                if let Some(max_retries) = reconnect.max_retries {
                    self.slack.reconnect.max_retries = max_retries;
                }
                if let Some(base_delay_ms) = reconnect.base_delay_ms {
                    self.slack.reconnect.base_delay_ms = base_delay_ms;
                }
                if let Some(max_delay_ms) = reconnect.max_delay_ms {
                    self.slack.reconnect.max_delay_ms = max_delay_ms;
                }
            }
        }

        if let Some(qna) = patch.qna {
            if let Some(subscription_key) = qna.subscription_key {
                self.qna.subscription_key = secret_value(subscription_key);
            }
            if let Some(base_url) = qna.base_url {
                self.qna.base_url = base_url;
            }
            if let Some(knowledge_base_name) = qna.knowledge_base_name {
                self.qna.knowledge_base_name = knowledge_base_name;
            }
            if let Some(rebuild_on_boot) = qna.rebuild_on_boot {
                self.qna.rebuild_on_boot = rebuild_on_boot;
            }
            if let Some(timeout_secs) = qna.timeout_secs {
                self.qna.timeout_secs = timeout_secs;
            }
        }

        if let Some(sheets) = patch.sheets {
            if let Some(spreadsheet_id) = sheets.spreadsheet_id {
                self.sheets.spreadsheet_id = spreadsheet_id;
            }
            if let Some(service_account_key_path) = sheets.service_account_key_path {
                self.sheets.service_account_key_path = service_account_key_path;
            }
            if let Some(client_email) = sheets.client_email {
                self.sheets.client_email = Some(client_email);
            }
            if let Some(range) = sheets.range {
                self.sheets.range = range;
            }
            if let Some(api_base_url) = sheets.api_base_url {
                self.sheets.api_base_url = api_base_url;
            }
            if let Some(token_url) = sheets.token_url {
                self.sheets.token_url = token_url;
            }
            if let Some(timeout_secs) = sheets.timeout_secs {
                self.sheets.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
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
        if let Some(value) = read_env("K9_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("K9_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("K9_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("K9_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("K9_DATABASE_TIMEOUT_SECS", &value)?;
        }

        let bot_token = read_env("K9_SLACK_BOT_TOKEN").or_else(|| read_env("BOT_TOKEN"));
        if let Some(value) = bot_token {
            self.slack.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("K9_SLACK_API_BASE_URL") {
            self.slack.api_base_url = value;
        }
        if let Some(value) = read_env("K9_SLACK_HEARTBEAT_INTERVAL_SECS") {
            self.slack.heartbeat_interval_secs =
                parse_u64("K9_SLACK_HEARTBEAT_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("K9_SLACK_REQUEST_TIMEOUT_SECS") {
            self.slack.request_timeout_secs = parse_u64("K9_SLACK_REQUEST_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("K9_SLACK_RECONNECT_STRATEGY") {
            self.slack.reconnect.strategy = value.parse()?;
        }
        if let Some(value) = read_env("K9_SLACK_RECONNECT_MAX_RETRIES") {
            self.slack.reconnect.max_retries = parse_u32("K9_SLACK_RECONNECT_MAX_RETRIES", &value)?;
        }

        let subscription_key = read_env("K9_QNA_SUBSCRIPTION_KEY").or_else(|| read_env("QNA_KEY"));
        if let Some(value) = subscription_key {
            self.qna.subscription_key = secret_value(value);
        }
        if let Some(value) = read_env("K9_QNA_BASE_URL") {
            self.qna.base_url = value;
        }
        if let Some(value) = read_env("K9_QNA_KNOWLEDGE_BASE_NAME") {
            self.qna.knowledge_base_name = value;
        }
        if let Some(value) = read_env("K9_QNA_REBUILD_ON_BOOT") {
            self.qna.rebuild_on_boot = parse_bool("K9_QNA_REBUILD_ON_BOOT", &value)?;
        }

        let spreadsheet_id = read_env("K9_SHEETS_SPREADSHEET_ID").or_else(|| read_env("SHEETS_KEY"));
        if let Some(value) = spreadsheet_id {
            self.sheets.spreadsheet_id = value;
        }
        if let Some(value) = read_env("K9_SHEETS_SERVICE_ACCOUNT_KEY_PATH") {
            self.sheets.service_account_key_path = PathBuf::from(value);
        }
        let client_email = read_env("K9_SHEETS_CLIENT_EMAIL").or_else(|| read_env("GOOGLE_EMAIL"));
        if let Some(value) = client_email {
            self.sheets.client_email = Some(value);
        }
        if let Some(value) = read_env("K9_SHEETS_RANGE") {
            self.sheets.range = value;
        }

        if let Some(value) = read_env("K9_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("K9_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("K9_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("K9_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("K9_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("K9_LOGGING_LEVEL").or_else(|| read_env("K9_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("K9_LOGGING_FORMAT").or_else(|| read_env("K9_LOG_FORMAT"));
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
        if let Some(bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = secret_value(bot_token);
        }
        if let Some(api_base_url) = overrides.slack_api_base_url {
            self.slack.api_base_url = api_base_url;
        }
        if let Some(heartbeat_interval_secs) = overrides.heartbeat_interval_secs {
            self.slack.heartbeat_interval_secs = heartbeat_interval_secs;
        }
        if let Some(subscription_key) = overrides.qna_subscription_key {
            self.qna.subscription_key = secret_value(subscription_key);
        }
        if let Some(base_url) = overrides.qna_base_url {
            self.qna.base_url = base_url;
        }
        if let Some(spreadsheet_id) = overrides.sheets_spreadsheet_id {
            self.sheets.spreadsheet_id = spreadsheet_id;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_slack(&self.slack)?;
        validate_qna(&self.qna)?;
        validate_sheets(&self.sheets)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("k9.toml"), PathBuf::from("config/k9.toml")]
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

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    let bot_token = slack.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_token is required. Get it from https://api.slack.com/apps > Your App > OAuth & Permissions > Bot User OAuth Token".to_string()
        ));
    }
    if !bot_token.starts_with("xoxb-") {
        let hint = if bot_token.starts_with("xapp-") {
            " (hint: you may have used an app-level token instead of the bot token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.bot_token must start with `xoxb-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    require_http_url("slack.api_base_url", &slack.api_base_url)?;

    if slack.heartbeat_interval_secs == 0 || slack.heartbeat_interval_secs > 3_600 {
        return Err(ConfigError::Validation(
            "slack.heartbeat_interval_secs must be in range 1..=3600".to_string(),
        ));
    }

    if slack.request_timeout_secs == 0 || slack.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "slack.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if slack.reconnect.strategy == ReconnectStrategy::Backoff
        && slack.reconnect.base_delay_ms > slack.reconnect.max_delay_ms
    {
        return Err(ConfigError::Validation(
            "slack.reconnect.base_delay_ms must not exceed slack.reconnect.max_delay_ms"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_qna(qna: &QnaConfig) -> Result<(), ConfigError> {
    if qna.subscription_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "qna.subscription_key is required (env `K9_QNA_SUBSCRIPTION_KEY` or `QNA_KEY`)"
                .to_string(),
        ));
    }

    require_http_url("qna.base_url", &qna.base_url)?;

    if qna.knowledge_base_name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "qna.knowledge_base_name must not be empty".to_string(),
        ));
    }

    if qna.timeout_secs == 0 || qna.timeout_secs > 300 {
        return Err(ConfigError::Validation("qna.timeout_secs must be in range 1..=300".to_string()));
    }

    Ok(())
}

fn validate_sheets(sheets: &SheetsConfig) -> Result<(), ConfigError> {
    if sheets.spreadsheet_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "sheets.spreadsheet_id is required (env `K9_SHEETS_SPREADSHEET_ID` or `SHEETS_KEY`)"
                .to_string(),
        ));
    }

    if sheets.range.trim().is_empty() {
        return Err(ConfigError::Validation("sheets.range must not be empty".to_string()));
    }

    require_http_url("sheets.api_base_url", &sheets.api_base_url)?;
    require_http_url("sheets.token_url", &sheets.token_url)?;

    if sheets.timeout_secs == 0 || sheets.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "sheets.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
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

fn require_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{key} must start with http:// or https://")))
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    slack: Option<SlackPatch>,
    qna: Option<QnaPatch>,
    sheets: Option<SheetsPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    bot_token: Option<String>,
    api_base_url: Option<String>,
    heartbeat_interval_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    reconnect: Option<ReconnectPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ReconnectPatch {
    strategy: Option<ReconnectStrategy>,
    max_retries: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct QnaPatch {
    subscription_key: Option<String>,
    base_url: Option<String>,
    knowledge_base_name: Option<String>,
    rebuild_on_boot: Option<bool>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SheetsPatch {
    spreadsheet_id: Option<String>,
    service_account_key_path: Option<PathBuf>,
    client_email: Option<String>,
    range: Option<String>,
    api_base_url: Option<String>,
    token_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
