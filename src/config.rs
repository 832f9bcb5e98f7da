use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub payment: PaymentConfig,
    #[serde(default)]
    pub flow: FlowConfig,
    #[serde(default)]
    pub approval: ApprovalConfig,
    #[serde(default)]
    pub links: LinksConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    /// Without a token the bot is disabled and only HTTP is served
    pub bot_token: Option<String>,
    /// Chat that receives summaries and owns the confirm / reject buttons
    pub operator_chat_id: Option<i64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://data/intakebot.db?mode=rwc".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_dir")]
    pub dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: default_log_dir(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "data/logs".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_http_bind")]
    pub bind: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_http_bind(),
        }
    }
}

fn default_http_bind() -> String {
    "0.0.0.0:5000".to_string()
}

/// Values shown in the payment instructions.
#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    /// Substrings that mark a text message as "payment done"
    #[serde(default = "default_done_markers")]
    pub done_markers: Vec<String>,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            amount: None,
            channel: None,
            done_markers: default_done_markers(),
        }
    }
}

fn default_done_markers() -> Vec<String> {
    vec!["تم".to_string(), "done".to_string()]
}

/// Validation rule for the target phone number.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TargetPhoneRule {
    /// Digits only, exactly 11 of them
    #[default]
    ElevenDigits,
    /// Optional `+`, 10 to 15 digits, separators allowed
    International,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FlowConfig {
    #[serde(default)]
    pub target_phone_rule: TargetPhoneRule,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApprovalConfig {
    /// Countdown before automatic release; `0` disables the automatic path
    #[serde(default = "default_auto_release_secs")]
    pub auto_release_secs: u64,
    /// How often the user's status message is refreshed
    #[serde(default = "default_approval_tick_secs")]
    pub tick_secs: u64,
    /// Messages kept in each user's log, and so deleted at most on release
    #[serde(default = "default_cleanup_limit")]
    pub cleanup_limit: u64,
}

impl ApprovalConfig {
    /// `None` when the countdown is disabled.
    pub fn auto_release(&self) -> Option<Duration> {
        (self.auto_release_secs > 0).then(|| Duration::from_secs(self.auto_release_secs))
    }
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            auto_release_secs: default_auto_release_secs(),
            tick_secs: default_approval_tick_secs(),
            cleanup_limit: default_cleanup_limit(),
        }
    }
}

fn default_auto_release_secs() -> u64 {
    90
}

fn default_approval_tick_secs() -> u64 {
    30
}

fn default_cleanup_limit() -> u64 {
    100
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LinksConfig {
    /// Shown on the ready prompt, rotated modulo the list length
    #[serde(default)]
    pub service: Vec<Url>,
    /// Sent with the unlock message
    #[serde(default)]
    pub download: Vec<Url>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("INTAKE")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("links.service")
                    .with_list_parse_key("links.download")
                    .with_list_parse_key("payment.done_markers"),
            );

        builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn log_level(&self) -> tracing::Level {
        match self.logging.level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "info" => tracing::Level::INFO,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[telegram]
bot_token = "123:abc"
operator_chat_id = -1001

[payment]
amount = "10"
done_markers = ["paid"]

[flow]
target_phone_rule = "international"

[approval]
auto_release_secs = 5

[links]
download = ["https://dl.example.com/a", "https://dl.example.com/b"]
"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = Config::load_from(&path).unwrap();

        assert_eq!(config.telegram.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(config.telegram.operator_chat_id, Some(-1001));
        assert_eq!(config.payment.done_markers, vec!["paid".to_string()]);
        assert_eq!(config.flow.target_phone_rule, TargetPhoneRule::International);
        assert_eq!(config.approval.auto_release(), Some(Duration::from_secs(5)));
        assert_eq!(config.approval.tick_secs, 30);
        assert_eq!(config.approval.cleanup_limit, 100);
        assert_eq!(config.links.download.len(), 2);
        assert!(config.links.service.is_empty());
        assert_eq!(config.http.bind, "0.0.0.0:5000");
        assert_eq!(config.database.url, "sqlite://data/intakebot.db?mode=rwc");
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.telegram.bot_token, None);
        assert_eq!(config.flow.target_phone_rule, TargetPhoneRule::ElevenDigits);
        assert_eq!(config.approval.auto_release(), Some(Duration::from_secs(90)));
        assert_eq!(config.log_level(), tracing::Level::INFO);
    }

    #[test]
    fn test_zero_auto_release_disables_countdown() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[approval]
auto_release_secs = 0
tick_secs = 10
"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = Config::load_from(&path).unwrap();

        assert_eq!(config.approval.auto_release(), None);
        assert_eq!(config.approval.tick_secs, 10);
    }

    #[test]
    fn test_approval_section_without_auto_release_uses_default() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[approval]\ncleanup_limit = 20").unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = Config::load_from(&path).unwrap();

        assert_eq!(config.approval.auto_release(), Some(Duration::from_secs(90)));
        assert_eq!(config.approval.cleanup_limit, 20);
    }
}
