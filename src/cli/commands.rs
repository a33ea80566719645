use tokio::io::AsyncReadExt;
use tracing::info;

use crate::cli::args::{ConfigAction, ConfigArgs, ExecArgs, InitArgs, OutputFormat};
use crate::config::loader::get_config_path;
use crate::config::types::CodeletConfig;
use crate::engine::Engine;
use crate::error::{CodeletError, Result};

/// Execute a code snippet and print the engine's result string
pub async fn exec(args: ExecArgs, config: CodeletConfig, format: OutputFormat) -> Result<()> {
    let code = read_code(&args).await?;

    let mut execution = config.execution.clone();
    if let Some(timeout) = args.timeout {
        execution.timeout_seconds = timeout;
    }

    info!(language = %args.language, timeout_secs = execution.timeout_seconds, "Executing code");

    let engine = Engine::new(&execution);
    let result = engine.execute_code(&args.language, &code).await;

    match format {
        OutputFormat::Text => {
            // The engine's result is displayed verbatim.
            print!("{}", result);
            if !result.ends_with('\n') {
                println!();
            }
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "language": args.language,
                    "result": result,
                })
            );
        }
    }

    Ok(())
}

async fn read_code(args: &ExecArgs) -> Result<String> {
    if let Some(code) = &args.code {
        return Ok(code.clone());
    }
    if let Some(file) = &args.file {
        return Ok(tokio::fs::read_to_string(file).await?);
    }

    let mut code = String::new();
    tokio::io::stdin().read_to_string(&mut code).await?;
    Ok(code)
}

/// List registered language identifiers
pub fn languages(format: OutputFormat) {
    let ids = Engine::supported_languages();

    match format {
        OutputFormat::Text => {
            for id in ids {
                println!("{}", id);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "languages": ids }));
        }
    }
}

/// Write a default configuration file
pub async fn init(args: InitArgs) -> Result<()> {
    let path = get_config_path();

    if path.exists() && !args.force {
        return Err(CodeletError::Config(format!(
            "Configuration already exists at {} (use --force to overwrite)",
            path.display()
        )));
    }

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let content = toml::to_string_pretty(&CodeletConfig::default())
        .map_err(|e| CodeletError::Config(e.to_string()))?;
    tokio::fs::write(&path, content).await?;

    println!("Wrote {}", path.display());
    Ok(())
}

/// Inspect configuration
pub fn config(args: ConfigArgs, config: CodeletConfig) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            let content = toml::to_string_pretty(&config)
                .map_err(|e| CodeletError::Config(e.to_string()))?;
            print!("{}", content);
        }
        ConfigAction::Path => {
            println!("{}", get_config_path().display());
        }
    }
    Ok(())
}
