//! Command handlers for CLI operations

use anyhow::{Context as _, Result, bail};
use quill_core::{GenerationRequest, QuillConfig, Source, TEMPLATE_MODEL_ID};
use quill_routing::Quill;
use serde_json::to_string_pretty;
use std::io::{self, Write as _};
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

use crate::cli::GenerateArgs;

/// Installs the stderr log subscriber; `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    Registry::default()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quill_routing=info,quill_providers=info".into()),
        )
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .init();
}

/// Generate one review and print it.
///
/// # Errors
/// Returns an error if configuration or state cannot be loaded, or output fails.
pub async fn handle_generate(config: Option<&Path>, args: GenerateArgs) -> Result<()> {
    let quill = Quill::open(config).context("Failed to initialize quill")?;
    let json = args.json;

    if let Some(session) = &args.session {
        let variant = quill.assign_variant(session);
        info!("Session {session} is in variant {variant}");
    }

    let request = build_request(args);
    let result = quill.generate(&request).await;
    if result.origin == Source::Template {
        warn!("No provider answered, review came from the local template");
    }
    info!(
        "Answered by {} ({}) in {}ms",
        result.source,
        result.provider_id.as_deref().unwrap_or(&result.model_id),
        result.latency_ms
    );

    if let Err(error) = quill.persist_metrics() {
        warn!("Failed to save metrics: {error}");
    }

    let mut stdout = io::stdout().lock();
    if json {
        writeln!(stdout, "{}", to_string_pretty(&result)?)?;
    } else {
        writeln!(stdout, "{}", result.text)?;
    }
    Ok(())
}

/// Maps CLI flags onto a request.
fn build_request(args: GenerateArgs) -> GenerationRequest {
    let mut request =
        GenerationRequest::new(args.hotel_name, args.rating).with_highlights(args.highlights);
    if let Some(trip_type) = args.trip_type {
        request = request.with_trip_type(trip_type);
    }
    if let Some(nights) = args.nights {
        request = request.with_nights(nights);
    }
    if let Some(guests) = args.guests {
        request = request.with_guests(guests);
    }
    if let Some(language) = args.language {
        request = request.with_language(language);
    }
    if let Some(voice) = args.voice {
        request = request.with_voice(voice);
    }
    request
}

/// Print the metrics report.
///
/// # Errors
/// Returns an error if configuration or state cannot be loaded.
pub fn handle_metrics(config: Option<&Path>) -> Result<()> {
    let quill = Quill::open(config).context("Failed to initialize quill")?;
    let mut stdout = io::stdout().lock();
    write!(stdout, "{}", quill.metrics_summary())?;
    Ok(())
}

/// Check providers and print the fallback chain.
///
/// # Errors
/// Returns an error if configuration or state cannot be loaded.
pub async fn handle_providers(config: Option<&Path>) -> Result<()> {
    let quill = Quill::open(config).context("Failed to initialize quill")?;
    let availability = quill.check_availability().await;
    let manager = quill.config();
    let proxy = &manager.config().proxy;

    let mut stdout = io::stdout().lock();
    writeln!(
        stdout,
        "{:<10} {:<12} {:<24} {:<10} ENDPOINT",
        "RANK", "PROVIDER", "MODEL", "AVAILABLE"
    )?;
    for entry in manager.providers() {
        let endpoint = if proxy.enabled {
            proxy.endpoint_for(entry.id())
        } else {
            entry.config.endpoint.clone()
        };
        let available = availability.get(entry.id()).copied().unwrap_or(false);
        writeln!(
            stdout,
            "{:<10} {:<12} {:<24} {:<10} {endpoint}",
            Source::Remote { rank: entry.rank }.label(),
            entry.id(),
            entry.config.model_id,
            if available { "yes" } else { "no" },
        )?;
    }
    writeln!(
        stdout,
        "{:<10} {:<12} {:<24} {:<10} -",
        "fallback", "template", TEMPLATE_MODEL_ID, "yes"
    )?;
    Ok(())
}

/// Write a default configuration file.
///
/// # Errors
/// Returns an error if the file exists (without `force`) or cannot be written.
pub fn handle_init_config(config: Option<&Path>, force: bool) -> Result<()> {
    let path = match config {
        Some(path) => path.to_path_buf(),
        None => QuillConfig::config_path()?,
    };
    if path.exists() && !force {
        bail!(
            "{} already exists, pass --force to overwrite it",
            path.display()
        );
    }

    QuillConfig::default().save_to_file(&path)?;
    info!("Wrote default configuration to {}", path.display());
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", path.display())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser as _;
    use quill_core::{TripType, Voice};

    use crate::cli::{Cli, Commands};

    fn generate_args(argv: &[&str]) -> GenerateArgs {
        let cli = Cli::try_parse_from(argv).expect("arguments should parse");
        match cli.command {
            Commands::Generate(args) => args,
            _ => panic!("expected the generate command"),
        }
    }

    #[test]
    fn test_build_request_maps_every_flag() {
        let args = generate_args(&[
            "quill",
            "generate",
            "Grand Plaza",
            "--rating",
            "4",
            "--trip-type",
            "business",
            "--highlight",
            "wifi,desk",
            "--highlight",
            "gym",
            "--nights",
            "3",
            "--guests",
            "1",
            "--language",
            "German",
            "--voice",
            "concise",
        ]);
        let request = build_request(args);

        assert_eq!(request.hotel_name, "Grand Plaza");
        assert_eq!(request.rating, 4);
        assert_eq!(request.trip_type, Some(TripType::Business));
        assert_eq!(request.highlights.len(), 3);
        assert_eq!(request.nights, Some(3));
        assert_eq!(request.guests, Some(1));
        assert_eq!(request.language.as_deref(), Some("German"));
        assert_eq!(request.voice, Some(Voice::Concise));
    }

    #[test]
    fn test_unknown_voice_rejected() {
        let parsed = Cli::try_parse_from([
            "quill", "generate", "Grand Plaza", "--rating", "4", "--voice", "grumpy",
        ]);
        assert!(parsed.is_err());
    }
}
