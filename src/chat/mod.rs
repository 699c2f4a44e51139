//! Natural-language querying of the expense ledger
//!
//! One question flows through five stages:
//! - SQL generation from the schema description
//! - extraction of the statement from raw model output
//! - read-only guard classification
//! - bounded execution against MySQL
//! - natural-language synthesis over the rows
//!
//! Each stage either advances or ends the request with a tagged failure.

pub mod execute;
pub mod extract;
pub mod generate;
pub mod guard;
pub mod pipeline;
pub mod render;
pub mod schema;

pub use execute::{ExecutionOutcome, MySqlExecutor, QueryExecutor, QueryResult};
pub use extract::extract_sql;
pub use generate::{AnswerSynthesizer, LlmAnswerSynthesizer, LlmSqlGenerator, SqlGenerator};
pub use guard::{KeywordPolicy, ParserPolicy, SafetyVerdict, SqlPolicy, Violation};
pub use pipeline::{ChatPipeline, FailureKind, QueryReport};
pub use render::format_query_results;
pub use schema::SchemaDescription;
