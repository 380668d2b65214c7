//! Formulate a nutrient solution from a JSON request
//!
//! The result is printed to stdout as JSON; logs go to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use nutrient_formulator::{load_fertilizer_catalog, EngineConfig, FormulationEngine, FormulationRequest};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "formulate")]
#[command(about = "Select fertilizers and dosages for a target nutrient solution")]
#[command(version)]
struct Cli {
    /// Formulation request (JSON)
    request: PathBuf,

    /// CSV fertilizer catalog appended to the request's fertilizers
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Engine configuration overrides (JSON)
    #[arg(long, env = "FORMULATOR_CONFIG")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nutrient_formulator=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading engine config: {:?}", path);
            EngineConfig::load(path)?
        }
        None => EngineConfig::default(),
    };
    let engine = FormulationEngine::new(config)?;

    let contents = std::fs::read_to_string(&cli.request)
        .with_context(|| format!("Failed to read request: {:?}", cli.request))?;
    let mut request: FormulationRequest =
        serde_json::from_str(&contents).with_context(|| "Failed to parse request JSON")?;

    if let Some(path) = &cli.catalog {
        let records = load_fertilizer_catalog(path)?;
        tracing::info!("Loaded {} fertilizers from {:?}", records.len(), path);
        request.fertilizers.extend(records);
    }

    let result = engine.formulate(&request)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_equals_form_and_flags() {
        let cli = Cli::try_parse_from([
            "formulate",
            "request.json",
            "--catalog=catalog.csv",
            "--config",
            "engine.json",
        ])
        .unwrap();
        assert_eq!(cli.request, PathBuf::from("request.json"));
        assert_eq!(cli.catalog, Some(PathBuf::from("catalog.csv")));
        assert_eq!(cli.config, Some(PathBuf::from("engine.json")));
    }

    #[test]
    fn test_rejects_extra_positional_and_unknown_flag() {
        assert!(Cli::try_parse_from(["formulate", "a.json", "b.json"]).is_err());
        assert!(Cli::try_parse_from(["formulate", "a.json", "--verbose-mode"]).is_err());
        assert!(Cli::try_parse_from(["formulate"]).is_err());
    }
}
