use async_trait::async_trait;
use tracing::debug;

use super::extract::extract_statement;
use super::prompt::build_prompt;
use crate::error::AgentResult;

/// Narrow capability boundary around the completion endpoint
///
/// The production implementation talks HTTP; tests substitute a
/// deterministic stub. Providers do not retry; retrying is a user
/// action taken at a higher layer.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Send a prompt, get back free-form completion text
    async fn complete(&self, prompt: &str) -> AgentResult<String>;

    /// Provider name, for logging
    fn provider_name(&self) -> &str;
}

/// Turns a question plus a schema into one reviewed-to-be-run SQL statement
///
/// Generation never executes anything: the statement goes back to the
/// caller for human review before it reaches a connection.
pub struct SqlGenerator {
    provider: Box<dyn CompletionProvider>,
}

impl SqlGenerator {
    pub fn new(provider: Box<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    /// Generate a single SQL statement grounded in the given schema
    pub async fn generate(
        &self,
        dialect: &str,
        schema_text: &str,
        question: &str,
    ) -> AgentResult<String> {
        let prompt = build_prompt(dialect, schema_text, question);

        debug!(
            "Requesting completion from {} ({} prompt bytes)",
            self.provider.provider_name(),
            prompt.len()
        );

        let response = self.provider.complete(&prompt).await?;
        let sql = extract_statement(&response)?;

        debug!("Extracted statement: {}", sql);

        Ok(sql)
    }
}
