//! Question pipeline
//!
//! Orchestrates one natural-language question end to end:
//! generate SQL, extract it, guard it, execute it, synthesize an answer.
//! Every stage either advances or short-circuits into a terminal
//! [`QueryReport`]; the pipeline itself never returns an error and never
//! panics on model misbehavior.

use super::execute::{ExecutionOutcome, QueryExecutor, QueryResult};
use super::extract::extract_sql;
use super::generate::{AnswerSynthesizer, SqlGenerator};
use super::guard::SqlPolicy;
use super::schema::SchemaDescription;
use crate::config::{AppConfig, GuardKind};
use crate::error::Result;
use crate::llm::LlmClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub const DEFAULT_MAX_QUESTION_BYTES: usize = 2048;

pub const MSG_INVALID_QUESTION: &str =
    "Please ask a short, non-empty question about your expenses.";
pub const MSG_GENERATION_FAILED: &str =
    "Sorry, I couldn't turn that question into a database query. Please try rephrasing it.";
pub const MSG_NO_VALID_SQL: &str =
    "Sorry, I couldn't find a usable database query for that question.";
pub const MSG_REJECTED: &str = "I can only execute read-only queries for security reasons. \
     Please ask questions that don't require data modification.";
pub const MSG_EXECUTION_FAILED: &str =
    "Sorry, I couldn't execute the query due to a database error.";
pub const MSG_SYNTHESIS_FALLBACK: &str =
    "The query ran fine, but I couldn't put the answer into words. The raw results are attached.";

/// Stable machine-readable codes for the ways a question can end without a
/// synthesized answer. These serialize to fixed strings that clients match
/// on, so they must never change casing or wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    #[serde(rename = "invalid question")]
    InvalidQuestion,
    #[serde(rename = "generation failed")]
    GenerationFailed,
    #[serde(rename = "no valid SQL")]
    NoValidSql,
    #[serde(rename = "rejected")]
    Rejected,
    #[serde(rename = "execution failed")]
    ExecutionFailed,
    #[serde(rename = "synthesis failed")]
    SynthesisFailed,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::InvalidQuestion => "invalid question",
            FailureKind::GenerationFailed => "generation failed",
            FailureKind::NoValidSql => "no valid SQL",
            FailureKind::Rejected => "rejected",
            FailureKind::ExecutionFailed => "execution failed",
            FailureKind::SynthesisFailed => "synthesis failed",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of one question. `natural_language_response` is always
/// populated, even on failure; `raw_results` is present exactly when the
/// statement executed successfully.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryReport {
    pub original_question: String,
    pub generated_sql: String,
    pub natural_language_response: String,
    pub raw_results: Option<QueryResult>,
    pub error: Option<FailureKind>,
}

pub struct ChatPipeline {
    generator: Arc<dyn SqlGenerator>,
    policy: Arc<dyn SqlPolicy>,
    executor: Arc<dyn QueryExecutor>,
    synthesizer: Arc<dyn AnswerSynthesizer>,
    schema: SchemaDescription,
    max_question_bytes: usize,
}

impl ChatPipeline {
    pub fn new(
        generator: Arc<dyn SqlGenerator>,
        policy: Arc<dyn SqlPolicy>,
        executor: Arc<dyn QueryExecutor>,
        synthesizer: Arc<dyn AnswerSynthesizer>,
        schema: SchemaDescription,
    ) -> Self {
        Self {
            generator,
            policy,
            executor,
            synthesizer,
            schema,
            max_question_bytes: DEFAULT_MAX_QUESTION_BYTES,
        }
    }

    /// Assemble the production pipeline from configuration: LLM-backed
    /// generation and synthesis, the configured guard, and the MySQL
    /// executor.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        use super::execute::MySqlExecutor;
        use super::generate::{LlmAnswerSynthesizer, LlmSqlGenerator};
        use super::guard::{KeywordPolicy, ParserPolicy};

        let llm = LlmClient::new(&config.llm)?;
        let schema = SchemaDescription::current();
        let policy: Arc<dyn SqlPolicy> = match config.guard {
            GuardKind::Keyword => Arc::new(KeywordPolicy::new()),
            GuardKind::Parser => Arc::new(ParserPolicy),
        };

        Ok(Self {
            generator: Arc::new(LlmSqlGenerator::new(llm.clone())),
            policy,
            executor: Arc::new(MySqlExecutor::new(
                config.database_url.clone(),
                config.query_budget_ms,
            )),
            synthesizer: Arc::new(LlmAnswerSynthesizer::new(llm, schema.clone())),
            schema,
            max_question_bytes: config.max_question_bytes,
        })
    }

    pub fn with_max_question_bytes(mut self, max_question_bytes: usize) -> Self {
        self.max_question_bytes = max_question_bytes;
        self
    }

    pub fn max_question_bytes(&self) -> usize {
        self.max_question_bytes
    }

    /// Answer one question. Infallible by contract: every possible failure
    /// becomes a [`QueryReport`] with a `FailureKind` and a human-readable
    /// message.
    pub async fn answer(&self, question: &str) -> QueryReport {
        let request_id = Uuid::new_v4();
        let question = question.trim();
        info!(%request_id, question, "question received");

        if question.is_empty() || question.len() > self.max_question_bytes {
            warn!(%request_id, bytes = question.len(), "question refused before generation");
            return failed(
                question,
                String::new(),
                MSG_INVALID_QUESTION,
                FailureKind::InvalidQuestion,
            );
        }

        let raw = match self.generator.generate_sql(question, &self.schema).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(%request_id, error = %e, "SQL generation failed");
                return failed(
                    question,
                    String::new(),
                    MSG_GENERATION_FAILED,
                    FailureKind::GenerationFailed,
                );
            }
        };

        let sql = extract_sql(&raw);
        if sql.is_empty() {
            warn!(%request_id, "model output contained no SQL");
            return failed(question, sql, MSG_NO_VALID_SQL, FailureKind::NoValidSql);
        }
        info!(%request_id, %sql, "extracted SQL");

        let verdict = self.policy.check(&sql);
        if !verdict.safe {
            warn!(%request_id, %sql, violation = ?verdict.violation, "statement rejected by guard");
            return failed(question, sql, MSG_REJECTED, FailureKind::Rejected);
        }

        // Only guard-approved SQL ever reaches the executor.
        let result = match self.executor.execute(&sql).await {
            ExecutionOutcome::Success(result) => result,
            ExecutionOutcome::Failed => {
                return failed(
                    question,
                    sql,
                    MSG_EXECUTION_FAILED,
                    FailureKind::ExecutionFailed,
                );
            }
        };
        info!(%request_id, rows = result.rows.len(), "query executed");

        match self.synthesizer.synthesize(question, &sql, &result).await {
            Ok(response) => QueryReport {
                original_question: question.to_string(),
                generated_sql: sql,
                natural_language_response: response,
                raw_results: Some(result),
                error: None,
            },
            Err(e) => {
                warn!(%request_id, error = %e, "synthesis failed, returning raw results");
                QueryReport {
                    original_question: question.to_string(),
                    generated_sql: sql,
                    natural_language_response: MSG_SYNTHESIS_FALLBACK.to_string(),
                    raw_results: Some(result),
                    error: Some(FailureKind::SynthesisFailed),
                }
            }
        }
    }
}

fn failed(question: &str, sql: String, message: &str, kind: FailureKind) -> QueryReport {
    QueryReport {
        original_question: question.to_string(),
        generated_sql: sql,
        natural_language_response: message.to_string(),
        raw_results: None,
        error: Some(kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_codes_are_stable() {
        let expectations = [
            (FailureKind::InvalidQuestion, "invalid question"),
            (FailureKind::GenerationFailed, "generation failed"),
            (FailureKind::NoValidSql, "no valid SQL"),
            (FailureKind::Rejected, "rejected"),
            (FailureKind::ExecutionFailed, "execution failed"),
            (FailureKind::SynthesisFailed, "synthesis failed"),
        ];
        for (kind, code) in expectations {
            assert_eq!(kind.as_str(), code);
            assert_eq!(serde_json::to_value(kind).unwrap(), serde_json::json!(code));
        }
    }

    #[test]
    fn test_failure_kind_round_trips_through_serde() {
        for kind in [
            FailureKind::InvalidQuestion,
            FailureKind::GenerationFailed,
            FailureKind::NoValidSql,
            FailureKind::Rejected,
            FailureKind::ExecutionFailed,
            FailureKind::SynthesisFailed,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            let back: FailureKind = serde_json::from_str(&json).unwrap();
            assert_eq!(back, kind);
        }
    }

    #[test]
    fn test_report_serializes_expected_field_names() {
        let report = failed("q", String::new(), MSG_INVALID_QUESTION, FailureKind::InvalidQuestion);
        let value = serde_json::to_value(&report).unwrap();
        for field in [
            "original_question",
            "generated_sql",
            "natural_language_response",
            "raw_results",
            "error",
        ] {
            assert!(value.get(field).is_some(), "missing field {}", field);
        }
        assert_eq!(value["error"], serde_json::json!("invalid question"));
        assert_eq!(value["raw_results"], serde_json::Value::Null);
    }
}
