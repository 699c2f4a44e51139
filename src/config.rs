//! Process configuration
//!
//! Everything configurable is read from the environment exactly once, at
//! startup, and handed to components by value. Request handling never
//! touches `std::env`.

use crate::error::{QuittungError, Result};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8003";
const DEFAULT_MAX_QUESTION_BYTES: usize = 2048;
const DEFAULT_QUERY_BUDGET_MS: u64 = 1000;
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 30;

/// Which strategy classifies generated SQL as read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardKind {
    /// Textual blacklist plus leading-keyword allow list.
    Keyword,
    /// Parse to an AST and allow only plain read statements.
    Parser,
}

/// Connection settings for the chat-completions provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// MySQL URL for the expense ledger.
    pub database_url: String,
    pub llm: LlmConfig,
    pub bind_addr: SocketAddr,
    pub guard: GuardKind,
    /// Questions longer than this are refused before generation.
    pub max_question_bytes: usize,
    /// Per-statement server-side execution cap.
    pub query_budget_ms: u64,
    /// When set, rejected SQL is blanked out of API responses.
    pub redact_rejected_sql: bool,
}

impl AppConfig {
    /// Read the full configuration from the environment. Loading `.env`
    /// files is the binaries' job; this only consults `std::env`.
    pub fn from_env() -> Result<Self> {
        let database_url = match env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => mysql_url_from_parts()?,
        };

        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| QuittungError::Config("OPENAI_API_KEY is not set".to_string()))?;
        let base_url =
            env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let timeout_secs = parse_env("LLM_TIMEOUT_SECS", DEFAULT_LLM_TIMEOUT_SECS)?;

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| QuittungError::Config(format!("invalid BIND_ADDR: {e}")))?;

        let guard = match env::var("GUARD_POLICY").as_deref() {
            Ok("parser") => GuardKind::Parser,
            Ok("keyword") | Err(_) => GuardKind::Keyword,
            Ok(other) => {
                return Err(QuittungError::Config(format!(
                    "GUARD_POLICY must be 'keyword' or 'parser', got '{other}'"
                )))
            }
        };

        Ok(Self {
            database_url,
            llm: LlmConfig {
                api_key,
                base_url,
                model,
                request_timeout: Duration::from_secs(timeout_secs),
            },
            bind_addr,
            guard,
            max_question_bytes: parse_env("MAX_QUESTION_BYTES", DEFAULT_MAX_QUESTION_BYTES)?,
            query_budget_ms: parse_env("QUERY_BUDGET_MS", DEFAULT_QUERY_BUDGET_MS)?,
            redact_rejected_sql: matches!(
                env::var("REDACT_REJECTED_SQL").as_deref(),
                Ok("1") | Ok("true")
            ),
        })
    }
}

/// Assemble a MySQL URL from the individual MYSQL_* variables when no
/// DATABASE_URL is given.
fn mysql_url_from_parts() -> Result<String> {
    let user = require("MYSQL_USER")?;
    let password = require("MYSQL_PASSWORD")?;
    let host = env::var("MYSQL_HOST").unwrap_or_else(|_| "localhost".to_string());
    let database = require("MYSQL_DATABASE")?;
    Ok(format!("mysql://{user}:{password}@{host}/{database}"))
}

fn require(name: &str) -> Result<String> {
    env::var(name).map_err(|_| {
        QuittungError::Config(format!("{name} is not set (set it or provide DATABASE_URL)"))
    })
}

fn parse_env<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| QuittungError::Config(format!("{name} must be a number, got '{raw}'"))),
        Err(_) => Ok(default),
    }
}
