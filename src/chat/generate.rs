//! SQL generation and answer synthesis
//!
//! The two model-facing stages of the question pipeline. Both are thin
//! prompt adapters over [`LlmClient`]; the traits are the seams the
//! orchestrator and the tests plug into.

use super::execute::QueryResult;
use super::render::format_query_results;
use super::schema::SchemaDescription;
use crate::error::Result;
use crate::llm::LlmClient;
use async_trait::async_trait;

/// Turns a natural-language question into raw model output that should
/// contain a single SQL statement. Extraction and safety checks happen
/// downstream; implementations just produce text.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    async fn generate_sql(&self, question: &str, schema: &SchemaDescription) -> Result<String>;
}

/// Explains an executed result in natural language. The question and the
/// SQL that produced the rows always travel along so the answer can refer
/// to what was actually asked and run.
#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    async fn synthesize(&self, question: &str, sql: &str, result: &QueryResult) -> Result<String>;
}

pub struct LlmSqlGenerator {
    llm: LlmClient,
}

impl LlmSqlGenerator {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl SqlGenerator for LlmSqlGenerator {
    async fn generate_sql(&self, question: &str, schema: &SchemaDescription) -> Result<String> {
        let prompt = format!(
            r#"You are a SQL assistant. Convert the following natural language request into a single secure MySQL query.
Avoid any destructive operations (no UPDATE, DELETE, INSERT, DROP, etc.). Here are the following tables and their detailed columns:

{}

Natural language: "{}"
Return only the SQL code."#,
            schema.text(),
            question
        );

        self.llm.complete(&prompt).await
    }
}

pub struct LlmAnswerSynthesizer {
    llm: LlmClient,
    schema: SchemaDescription,
}

impl LlmAnswerSynthesizer {
    pub fn new(llm: LlmClient, schema: SchemaDescription) -> Self {
        Self { llm, schema }
    }
}

#[async_trait]
impl AnswerSynthesizer for LlmAnswerSynthesizer {
    async fn synthesize(&self, question: &str, sql: &str, result: &QueryResult) -> Result<String> {
        let rendered = format_query_results(result);
        let prompt = format!(
            r#"You are a helpful financial assistant. A user asked a question about their financial data, and you executed a SQL query to get the answer.

Database Schema:
{}

User's Original Question: "{}"

SQL Query Executed: {}

Query Results:
{}

Please provide a clear, concise, and helpful natural language response to the user's original question based on the query results.
If there are no results, explain that appropriately.
Make the response conversational and easy to understand, avoiding technical jargon.
Focus on answering the user's question directly and highlight key insights from the data."#,
            self.schema.text(),
            question,
            sql,
            rendered
        );

        self.llm.complete(&prompt).await
    }
}
