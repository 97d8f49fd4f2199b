//! Command-line arguments and the wiring they drive.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use clap::Parser;
use tracing::info;

use retitle_core::defaults::{ENV_OLLAMA_BASE, ENV_OLLAMA_GEN_MODEL, GEN_MODEL, OLLAMA_URL};
use retitle_extract::ExtractionRegistry;
use retitle_inference::{LlmNameGenerator, OllamaBackend, OllamaVisionBackend, VisionBackend};
use retitle_rename::{RenameConfig, RenameRunner};

#[derive(Parser, Debug)]
#[command(name = "retitle")]
#[command(author, version, about = "Rename files after what they contain")]
pub struct Cli {
    /// Directory whose files are renamed (not recursive)
    pub directory: PathBuf,

    /// Show the planned names without renaming anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Files analysed at the same time
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: Option<u16>,

    /// Naming model (overrides OLLAMA_GEN_MODEL)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Vision model used to describe images without text (overrides OLLAMA_VISION_MODEL)
    #[arg(long)]
    pub vision_model: Option<String>,

    /// Print the run summary as JSON instead of report lines
    #[arg(long)]
    pub json: bool,

    /// Debug-level logging (ignored when RUST_LOG is set)
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Environment configuration with command-line overrides applied.
    pub fn rename_config(&self) -> RenameConfig {
        let mut config = RenameConfig::from_env();
        if self.dry_run {
            config = config.with_dry_run(true);
        }
        if let Some(n) = self.concurrency {
            config = config.with_max_concurrent(n as usize);
        }
        config
    }
}

fn ollama_base() -> anyhow::Result<String> {
    let base = std::env::var(ENV_OLLAMA_BASE).unwrap_or_else(|_| OLLAMA_URL.to_string());
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        bail!("{} must be an http(s) URL, got '{}'", ENV_OLLAMA_BASE, base);
    }
    Ok(base)
}

fn non_empty(value: Option<String>, flag: &str) -> anyhow::Result<Option<String>> {
    match value {
        Some(v) if v.trim().is_empty() => bail!("{} must not be empty", flag),
        other => Ok(other),
    }
}

/// Build the runner from arguments and environment. Errors here are
/// configuration errors.
pub fn build_runner(cli: &Cli) -> anyhow::Result<RenameRunner> {
    let config = cli.rename_config();
    let base = ollama_base()?;

    let model = match non_empty(cli.model.clone(), "--model")? {
        Some(m) => m,
        None => std::env::var(ENV_OLLAMA_GEN_MODEL)
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| GEN_MODEL.to_string()),
    };
    let backend = OllamaBackend::with_config(base.clone(), model)
        .with_timeout_secs(config.gen_timeout.as_secs().max(1));
    let namer = LlmNameGenerator::new(Arc::new(backend));

    let vision: Option<Arc<dyn VisionBackend>> =
        match non_empty(cli.vision_model.clone(), "--vision-model")? {
            Some(m) => Some(Arc::new(OllamaVisionBackend::new(base, m)) as Arc<dyn VisionBackend>),
            None => OllamaVisionBackend::from_env().map(|v| Arc::new(v) as Arc<dyn VisionBackend>),
        };
    info!(
        vision = vision.as_ref().map(|v| v.model_name()).unwrap_or("(none)"),
        max_concurrent = config.max_concurrent,
        dry_run = config.dry_run,
        "Configured rename run"
    );

    let registry = ExtractionRegistry::with_defaults(vision);
    Ok(RenameRunner::new(Arc::new(registry), Arc::new(namer), config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_command_line() {
        let cli = Cli::try_parse_from([
            "retitle",
            "./inbox",
            "--dry-run",
            "--concurrency",
            "8",
            "--model",
            "llama3.2:3b",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.directory, PathBuf::from("./inbox"));
        assert!(cli.dry_run);
        assert_eq!(cli.concurrency, Some(8));
        assert_eq!(cli.model.as_deref(), Some("llama3.2:3b"));
        assert!(cli.json);

        let config = cli.rename_config();
        assert!(config.dry_run);
        assert_eq!(config.max_concurrent, 8);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        assert!(Cli::try_parse_from(["retitle", ".", "--concurrency", "0"]).is_err());
    }

    #[test]
    fn test_directory_required() {
        assert!(Cli::try_parse_from(["retitle"]).is_err());
    }

    #[test]
    fn test_empty_model_is_config_error() {
        assert!(non_empty(Some("  ".to_string()), "--model").is_err());
        assert_eq!(
            non_empty(Some("m".to_string()), "--model").unwrap(),
            Some("m".to_string())
        );
        assert_eq!(non_empty(None, "--model").unwrap(), None);
    }
}
