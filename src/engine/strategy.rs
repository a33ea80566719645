use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::engine::runner::ProcessRunner;
use crate::error::{CodeletError, Result};

/// Bound on compile steps, independent of the run-phase timeout.
pub const COMPILE_TIMEOUT_SECONDS: u64 = 30;

/// Per-language execution policy.
///
/// Implemented by a closed, fixed set of strategy types, one per registered
/// language. The registry hands these out; nothing else constructs them.
#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    /// Registry identifier (lowercase).
    fn id(&self) -> &'static str;

    /// Extension for the staged source file, including the dot.
    fn file_extension(&self) -> &'static str;

    /// Whether a compile step must run before execution.
    fn needs_preparation(&self) -> bool {
        false
    }

    /// Stem for the staged file, when the language dictates one.
    /// `None` lets the workspace generate a unique random name.
    fn staged_file_stem(&self, _source: &str) -> Option<String> {
        None
    }

    /// Compile step. `Ok(Some(text))` is a preparation failure: the text is
    /// returned to the caller verbatim and the run phase never starts.
    async fn prepare(&self, _source_file: &Path) -> Result<Option<String>> {
        Ok(None)
    }

    /// Command line that executes the staged (and possibly compiled) program.
    fn build_run_command(&self, source_file: &Path) -> Result<Vec<String>>;
}

// ============================================================================
// Interpreted languages
// ============================================================================

pub struct Python;

#[async_trait]
impl ExecutionStrategy for Python {
    fn id(&self) -> &'static str {
        "python"
    }

    fn file_extension(&self) -> &'static str {
        ".py"
    }

    fn build_run_command(&self, source_file: &Path) -> Result<Vec<String>> {
        Ok(vec![
            "python3".to_string(),
            source_file.to_string_lossy().into_owned(),
        ])
    }
}

pub struct JavaScript;

#[async_trait]
impl ExecutionStrategy for JavaScript {
    fn id(&self) -> &'static str {
        "javascript"
    }

    fn file_extension(&self) -> &'static str {
        ".js"
    }

    fn build_run_command(&self, source_file: &Path) -> Result<Vec<String>> {
        Ok(vec![
            "node".to_string(),
            source_file.to_string_lossy().into_owned(),
        ])
    }
}

/// TypeScript runs through ts-node: either the binary named by the
/// `TS_NODE_PATH` environment variable, or `npx ts-node` as the fallback.
pub struct TypeScript;

#[async_trait]
impl ExecutionStrategy for TypeScript {
    fn id(&self) -> &'static str {
        "typescript"
    }

    fn file_extension(&self) -> &'static str {
        ".ts"
    }

    fn build_run_command(&self, source_file: &Path) -> Result<Vec<String>> {
        let file = source_file.to_string_lossy().into_owned();
        match std::env::var("TS_NODE_PATH") {
            Ok(ts_node) if !ts_node.is_empty() => Ok(vec![ts_node, file]),
            _ => Ok(vec!["npx".to_string(), "ts-node".to_string(), file]),
        }
    }
}

// ============================================================================
// Compiled languages
// ============================================================================

/// Java compiles to bytecode with `javac` and runs via the `java` runtime
/// with the workspace directory as the classpath root. The staged filename
/// must match the declared public class, so the stem comes from a heuristic
/// scan of the source.
pub struct Java;

#[async_trait]
impl ExecutionStrategy for Java {
    fn id(&self) -> &'static str {
        "java"
    }

    fn file_extension(&self) -> &'static str {
        ".java"
    }

    fn needs_preparation(&self) -> bool {
        true
    }

    fn staged_file_stem(&self, source: &str) -> Option<String> {
        Some(extract_public_class_name(source))
    }

    async fn prepare(&self, source_file: &Path) -> Result<Option<String>> {
        let argv = vec![
            "javac".to_string(),
            source_file.to_string_lossy().into_owned(),
        ];
        compile(&argv).await
    }

    fn build_run_command(&self, source_file: &Path) -> Result<Vec<String>> {
        let class_name = source_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| CodeletError::Staging("staged file has no stem".to_string()))?;
        let classpath = source_file
            .parent()
            .map(|d| d.to_string_lossy().into_owned())
            .ok_or_else(|| CodeletError::Staging("staged file has no parent".to_string()))?;

        Ok(vec![
            "java".to_string(),
            "-cp".to_string(),
            classpath,
            class_name,
        ])
    }
}

/// C++ compiles ahead of time with `g++` to a native binary in the
/// workspace, which is then invoked directly.
pub struct Cpp;

#[async_trait]
impl ExecutionStrategy for Cpp {
    fn id(&self) -> &'static str {
        "cpp"
    }

    fn file_extension(&self) -> &'static str {
        ".cpp"
    }

    fn needs_preparation(&self) -> bool {
        true
    }

    async fn prepare(&self, source_file: &Path) -> Result<Option<String>> {
        let binary = source_file.with_extension("");
        let argv = vec![
            "g++".to_string(),
            "-o".to_string(),
            binary.to_string_lossy().into_owned(),
            source_file.to_string_lossy().into_owned(),
        ];

        if let Some(diagnostics) = compile(&argv).await? {
            return Ok(Some(diagnostics));
        }

        // Some filesystems drop the execute bit on freshly written files.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = tokio::fs::metadata(&binary).await?.permissions();
            perms.set_mode(0o755);
            tokio::fs::set_permissions(&binary, perms).await?;
        }

        Ok(None)
    }

    fn build_run_command(&self, source_file: &Path) -> Result<Vec<String>> {
        Ok(vec![source_file
            .with_extension("")
            .to_string_lossy()
            .into_owned()])
    }
}

/// Runs a compiler command under the compile bound and renders its failure
/// modes as preparation-error text.
async fn compile(argv: &[String]) -> Result<Option<String>> {
    debug!(command = ?argv, "Compiling staged source");

    let result = ProcessRunner::run(argv, Duration::from_secs(COMPILE_TIMEOUT_SECONDS)).await?;

    if result.timed_out {
        return Ok(Some(format!(
            "Compilation failed: compiler did not finish within {} seconds\n{}",
            COMPILE_TIMEOUT_SECONDS, result.output
        )));
    }
    if result.exit_code != 0 {
        return Ok(Some(format!("Compilation failed: {}", result.output)));
    }

    Ok(None)
}

/// Heuristic scan for `public class <name>`, first match wins; `Main` when
/// nothing matches. Line-oriented on purpose: nested declarations or odd
/// formatting can misfire, and full parsing is out of scope here.
fn extract_public_class_name(source: &str) -> String {
    for line in source.lines() {
        if let Some(rest) = line.trim().split("public class ").nth(1) {
            let name: String = rest
                .trim_start()
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
                .collect();
            if !name.is_empty() {
                return name;
            }
        }
    }
    "Main".to_string()
}
