use std::time::Duration;

use tracing::{debug, info};

use crate::config::types::ExecutionConfig;
use crate::engine::registry::LanguageRegistry;
use crate::engine::runner::ProcessRunner;
use crate::engine::strategy::ExecutionStrategy;
use crate::engine::workspace::Workspace;
use crate::error::{CodeletError, Result};

/// The execution engine: drives the full stage/prepare/run/cleanup
/// lifecycle for one code snippet at a time.
///
/// Each call is self-contained; the only shared state is the immutable
/// language registry, so any number of calls may run concurrently.
pub struct Engine {
    timeout: Duration,
}

impl Engine {
    pub fn new(config: &ExecutionConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    /// Registered language identifiers, sorted.
    pub fn supported_languages() -> Vec<&'static str> {
        LanguageRegistry::global().supported_languages()
    }

    /// Execute `code` as a program in `language` and render the outcome as
    /// text. Never fails: every failure mode, including internal errors, is
    /// encoded in the returned string.
    pub async fn execute_code(&self, language: &str, code: &str) -> String {
        match self.try_execute(language, code).await {
            Ok(result) => result,
            Err(e) => format!("Error executing code: {}", e),
        }
    }

    async fn try_execute(&self, language: &str, code: &str) -> Result<String> {
        let language = language.trim().to_lowercase();
        let registry = LanguageRegistry::global();

        let strategy = match registry.resolve(&language) {
            Some(strategy) => strategy,
            None => {
                info!(language = %language, "Rejected unsupported language");
                let miss = CodeletError::UnsupportedLanguage {
                    language,
                    supported: registry.supported_languages().join(", "),
                };
                return Ok(miss.to_string());
            }
        };

        let code = unescape_newlines(code);

        // The workspace is disposed on every path out of here; Drop covers
        // anything that unwinds past the explicit dispose.
        let workspace = Workspace::stage(&code, strategy.as_ref()).await?;
        let result = self.run_in_workspace(&workspace, strategy.as_ref()).await;
        workspace.dispose().await;
        result
    }

    async fn run_in_workspace(
        &self,
        workspace: &Workspace,
        strategy: &dyn ExecutionStrategy,
    ) -> Result<String> {
        if strategy.needs_preparation() {
            if let Some(diagnostics) = strategy.prepare(workspace.source_file()).await? {
                debug!(language = strategy.id(), "Preparation failed, run phase skipped");
                return Ok(diagnostics);
            }
        }

        let argv = strategy.build_run_command(workspace.source_file())?;
        let run = ProcessRunner::run(&argv, self.timeout).await?;

        if run.timed_out {
            return Ok(format!(
                "Execution timed out after {} seconds",
                self.timeout.as_secs()
            ));
        }
        if run.exit_code != 0 {
            return Ok(format!(
                "Execution failed with exit code {}:\n{}",
                run.exit_code, run.output
            ));
        }
        Ok(run.output)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(&ExecutionConfig::default())
    }
}

/// Clients that JSON-escape newlines without decoding them submit the
/// two-character sequence backslash-n; rewrite it into real newlines.
/// Idempotent on code that carries none.
fn unescape_newlines(code: &str) -> String {
    code.replace("\\n", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescapes_literal_newline_sequences() {
        assert_eq!(unescape_newlines("a\\nb"), "a\nb");
        assert_eq!(unescape_newlines("print('hi')\\nprint('bye')"), "print('hi')\nprint('bye')");
    }

    #[test]
    fn unescape_is_idempotent_on_clean_code() {
        let code = "line one\nline two\n";
        assert_eq!(unescape_newlines(code), code);
    }

    #[tokio::test]
    async fn unsupported_language_message_lists_supported_set() {
        let engine = Engine::default();
        let result = engine.execute_code("ruby", "puts 1").await;
        assert_eq!(
            result,
            "Unsupported language: ruby. Supported languages are: cpp, java, javascript, python, typescript"
        );
    }

    #[tokio::test]
    async fn language_is_normalized_before_lookup() {
        let engine = Engine::default();
        let result = engine.execute_code("  RuBy ", "puts 1").await;
        assert!(result.starts_with("Unsupported language: ruby."));
    }
}
