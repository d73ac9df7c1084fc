//! Configuration for PBSC Ignite
//!
//! CLI arguments and environment variable handling using clap. Every option
//! can be set from the environment (or a `.env` file loaded by the binaries).

use clap::{Parser, Subcommand};
use std::net::SocketAddr;

/// Secret used for token signing when running in development mode without SECRET_KEY
const DEV_SECRET_KEY: &str = "dev-only-insecure-secret-key-do-not-deploy";

/// Minimum accepted SECRET_KEY length outside development mode
pub const MIN_SECRET_KEY_LEN: usize = 32;

/// PBSC Ignite - AI learning roadmaps, tutoring and career coaching
#[derive(Parser, Debug, Clone)]
#[command(name = "ignite")]
#[command(about = "PBSC Ignite learning platform API server")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:5000")]
    pub listen: SocketAddr,

    /// Enable development mode (insecure default signing key)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Enable debug endpoints (cache clearing)
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    /// MongoDB configuration
    #[command(flatten)]
    pub mongo: MongoArgs,

    /// Redis cache configuration
    #[command(flatten)]
    pub redis: RedisArgs,

    /// AI provider configuration
    #[command(flatten)]
    pub llm: LlmArgs,

    /// LinkedIn (Unipile) configuration
    #[command(flatten)]
    pub unipile: UnipileArgs,

    /// Secret for token signing (required in production)
    #[arg(long, env = "SECRET_KEY")]
    pub secret_key: Option<String>,

    /// Token expiry in seconds
    #[arg(long, env = "TOKEN_EXPIRY_SECONDS", default_value = "86400")]
    pub token_expiry_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Timeout for outbound AI and LinkedIn API calls in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "60000")]
    pub request_timeout_ms: u64,
}

/// MongoDB connection configuration
#[derive(Parser, Debug, Clone)]
pub struct MongoArgs {
    /// MongoDB connection URI
    #[arg(long, env = "MONGO_URI", default_value = "mongodb://localhost:27017/")]
    pub mongo_uri: String,

    /// MongoDB database name
    #[arg(long, env = "DB_NAME", default_value = "PBSC-Ignite-db")]
    pub db_name: String,
}

/// Redis response cache configuration
#[derive(Parser, Debug, Clone)]
pub struct RedisArgs {
    /// Full Redis URL (takes precedence over host/port/password/db)
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    #[arg(long, env = "REDIS_HOST", default_value = "localhost")]
    pub redis_host: String,

    #[arg(long, env = "REDIS_PORT", default_value = "6379")]
    pub redis_port: u16,

    #[arg(long, env = "REDIS_PASSWORD")]
    pub redis_password: Option<String>,

    #[arg(long, env = "REDIS_DB", default_value = "0")]
    pub redis_db: i64,

    /// Enable the response cache
    #[arg(long, env = "CACHE_ENABLED", default_value_t = true, action = clap::ArgAction::Set)]
    pub cache_enabled: bool,

    /// Short-lived entries (seconds)
    #[arg(long, env = "CACHE_TIMEOUT_SHORT", default_value = "300")]
    pub cache_timeout_short: u64,

    /// Profile data (seconds)
    #[arg(long, env = "CACHE_TIMEOUT_MEDIUM", default_value = "1800")]
    pub cache_timeout_medium: u64,

    /// Roadmaps and learning plans (seconds)
    #[arg(long, env = "CACHE_TIMEOUT_LONG", default_value = "21600")]
    pub cache_timeout_long: u64,

    /// External API responses (seconds)
    #[arg(long, env = "CACHE_TIMEOUT_API", default_value = "43200")]
    pub cache_timeout_api: u64,
}

/// AI provider configuration
#[derive(Parser, Debug, Clone)]
pub struct LlmArgs {
    #[arg(long, env = "GROQ_API_KEY")]
    pub groq_api_key: Option<String>,

    #[arg(long, env = "GROQ_BASE_URL", default_value = "https://api.groq.com/openai/v1")]
    pub groq_base_url: String,

    #[arg(long, env = "GROQ_MODEL", default_value = "meta-llama/llama-4-scout-17b-16e-instruct")]
    pub groq_model: String,

    #[arg(long, env = "PERPLEXITY_API_KEY")]
    pub perplexity_api_key: Option<String>,

    #[arg(long, env = "PERPLEXITY_BASE_URL", default_value = "https://api.perplexity.ai")]
    pub perplexity_base_url: String,

    #[arg(long, env = "PERPLEXITY_MODEL", default_value = "sonar-pro")]
    pub perplexity_model: String,

    /// AWS region for Bedrock (credentials come from the AWS credential chain)
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub aws_region: String,

    #[arg(long, env = "BEDROCK_MODEL_ID", default_value = "anthropic.claude-sonnet-4-20250514-v1:0")]
    pub bedrock_model_id: String,

    /// Enable the Bedrock (Claude) provider
    #[arg(long, env = "BEDROCK_ENABLED", default_value_t = true, action = clap::ArgAction::Set)]
    pub bedrock_enabled: bool,
}

/// Unipile (LinkedIn) configuration
#[derive(Parser, Debug, Clone)]
pub struct UnipileArgs {
    #[arg(long, env = "UNIPILE_API_KEY")]
    pub unipile_api_key: Option<String>,

    #[arg(long, env = "UNIPILE_BASE_URL", default_value = "https://api.unipile.com/v1")]
    pub unipile_base_url: String,
}

impl Args {
    /// Get effective signing secret (uses a fixed key in dev mode)
    pub fn secret_key(&self) -> Option<String> {
        match (&self.secret_key, self.dev_mode) {
            (Some(key), _) if !key.is_empty() => Some(key.clone()),
            (_, true) => Some(DEV_SECRET_KEY.to_string()),
            _ => None,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            match self.secret_key.as_deref() {
                None | Some("") => {
                    return Err("SECRET_KEY is required in production mode".to_string());
                }
                Some(key) if key.len() < MIN_SECRET_KEY_LEN => {
                    return Err(format!(
                        "SECRET_KEY must be at least {} characters",
                        MIN_SECRET_KEY_LEN
                    ));
                }
                _ => {}
            }
        }

        if !matches!(self.log_format.as_str(), "text" | "json") {
            return Err(format!("LOG_FORMAT must be 'text' or 'json', got '{}'", self.log_format));
        }

        Ok(())
    }
}

impl RedisArgs {
    /// Connection URL, built from host/port/password/db unless REDIS_URL is set
    pub fn url(&self) -> String {
        if let Some(url) = self.redis_url.as_deref().filter(|u| !u.is_empty()) {
            return url.to_string();
        }
        match self.redis_password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                password, self.redis_host, self.redis_port, self.redis_db
            ),
            None => format!("redis://{}:{}/{}", self.redis_host, self.redis_port, self.redis_db),
        }
    }

    /// Address for logs (never includes the password)
    pub fn display_addr(&self) -> String {
        match self.redis_url.as_deref().filter(|u| !u.is_empty()) {
            Some(_) => "REDIS_URL".to_string(),
            None => format!("{}:{}/{}", self.redis_host, self.redis_port, self.redis_db),
        }
    }
}

impl UnipileArgs {
    pub fn configured(&self) -> bool {
        self.unipile_api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

/// PBSC Ignite database tool
#[derive(Parser, Debug)]
#[command(name = "ignite-db")]
#[command(about = "Initialize, check or reset the PBSC Ignite MongoDB database")]
pub struct DbCli {
    #[command(flatten)]
    pub mongo: MongoArgs,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: DbCommand,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum DbCommand {
    /// Create collections, indexes and the system configuration document
    Init,
    /// Report connection status, collections and document counts
    Check,
    /// Drop the database and initialize it again
    Reset {
        /// Skip the interactive confirmation
        #[arg(long)]
        yes: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["ignite"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_secret_key_required_outside_dev_mode() {
        let args = parse(&["--secret-key", ""]);
        assert!(args.validate().is_err());

        let args = parse(&["--secret-key", "too-short"]);
        assert!(args.validate().unwrap_err().contains("32"));

        let args = parse(&["--secret-key", "0123456789abcdef0123456789abcdef"]);
        assert!(args.validate().is_ok());
        assert_eq!(args.secret_key().as_deref(), Some("0123456789abcdef0123456789abcdef"));
    }

    #[test]
    fn test_dev_mode_falls_back_to_dev_secret() {
        let args = parse(&["--dev-mode", "--secret-key", ""]);
        assert!(args.validate().is_ok());
        assert_eq!(args.secret_key().as_deref(), Some(DEV_SECRET_KEY));
    }

    #[test]
    fn test_redis_url_construction() {
        let args = parse(&["--dev-mode", "--redis-url", "", "--redis-password", "", "--redis-host", "cache", "--redis-port", "6380", "--redis-db", "2"]);
        assert_eq!(args.redis.url(), "redis://cache:6380/2");

        let args = parse(&["--dev-mode", "--redis-url", "", "--redis-host", "cache", "--redis-port", "6379", "--redis-db", "0", "--redis-password", "pw"]);
        assert_eq!(args.redis.url(), "redis://:pw@cache:6379/0");

        let args = parse(&["--dev-mode", "--redis-url", "redis://elsewhere:1/3"]);
        assert_eq!(args.redis.url(), "redis://elsewhere:1/3");
    }

    #[test]
    fn test_db_cli_subcommands() {
        let cli = DbCli::parse_from(["ignite-db", "reset", "--yes"]);
        assert_eq!(cli.command, DbCommand::Reset { yes: true });

        let cli = DbCli::parse_from(["ignite-db", "check"]);
        assert_eq!(cli.command, DbCommand::Check);
    }
}
