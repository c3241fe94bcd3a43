use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use isbnmeta_core::{AppConfig, CoreError, ExitCode, Field, Secrets, SourceId, Table};
use isbnmeta_enrich::{
    EnrichError, EnrichmentPipeline, Isbn, choose, generate_bogus, generate_isbn13, labelled,
};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "isbnmeta",
    about = "Fill book catalog tables from online ISBN metadata providers",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format (for scripts).
    /// Also enabled by setting ISBNMETA_JSON=1.
    #[arg(long, global = true)]
    json: bool,

    /// Config file to use instead of the standard location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output on stderr (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Enrich every row of a catalog CSV and write the result.
    Enrich {
        input: PathBuf,
        output: PathBuf,
        /// Providers to query, comma separated (default: from config).
        #[arg(long, value_delimiter = ',')]
        sources: Vec<SourceId>,
        #[arg(long)]
        row_concurrency: Option<usize>,
    },

    /// Show every provider's raw record for an ISBN.
    Lookup {
        isbn: String,
        #[arg(long, value_delimiter = ',')]
        sources: Vec<SourceId>,
    },

    /// Show one field's candidates for an ISBN and the reconciled value.
    Field {
        field: Field,
        isbn: String,
        #[arg(long, value_delimiter = ',')]
        sources: Vec<SourceId>,
    },

    /// ISBN utilities.
    Isbn {
        #[command(subcommand)]
        action: IsbnAction,
    },

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum IsbnAction {
    /// Generate random checksum-valid ISBN-13s.
    Gen {
        #[arg(long, default_value = "1")]
        count: usize,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Generate ISBN look-alikes that no provider can know.
    Bogus {
        #[arg(long, default_value = "1")]
        count: usize,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Validate an ISBN-10 or ISBN-13 and show its forms.
    Check { isbn: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default config and an empty secrets file.
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Print the effective config with keys redacted.
    Show,
    /// Validate the effective config.
    Check,
    /// Print the config and secrets file paths.
    Path,
}

// ─── Main ────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let json_output = cli.json || std::env::var("ISBNMETA_JSON").as_deref() == Ok("1");
    let start = Instant::now();

    if let Err(err) = run(cli, json_output, start).await {
        let code = exit_code_for(&err);
        if json_output {
            let _ = print_json(&serde_json::json!({
                "status": "error",
                "error": format!("{code:?}"),
                "message": format!("{err:#}"),
                "meta": { "duration_ms": start.elapsed().as_millis() }
            }));
        } else {
            eprintln!("Error: {err:#}");
        }
        std::process::exit(code.code());
    }
}

async fn run(cli: Cli, json_output: bool, start: Instant) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(AppConfig::config_path);

    match cli.command {
        // ── Enrich ─────────────────────────────────────────────────────────
        Commands::Enrich {
            input,
            output,
            sources,
            row_concurrency,
        } => {
            let mut config = load_config(&config_path, &sources)?;
            if let Some(n) = row_concurrency {
                config.enrichment.row_concurrency = n;
            }
            let pipeline = EnrichmentPipeline::from_config(&config)?;

            let mut table = Table::read_csv(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let report = pipeline.enrich(&mut table).await?;
            table
                .write_csv(&output)
                .with_context(|| format!("writing {}", output.display()))?;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "output": output, "report": report },
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                println!(
                    "Enriched {} rows ({} cells filled) into {}",
                    report.rows_processed,
                    report.cells_filled,
                    output.display()
                );
                if !report.columns_added.is_empty() {
                    println!("  Added columns: {}", report.columns_added.join(", "));
                }
                for problem in &report.problems {
                    println!(
                        "  Skipped row {}: {} ({})",
                        problem.row + 1,
                        problem.message,
                        problem.isbn.as_deref().unwrap_or("-")
                    );
                }
            }
        }

        // ── Lookup ─────────────────────────────────────────────────────────
        Commands::Lookup { isbn, sources } => {
            let config = load_config(&config_path, &sources)?;
            let pipeline = EnrichmentPipeline::from_config(&config)?;
            let metadata = pipeline.lookup(&isbn).await?;
            let dur = start.elapsed().as_millis();
            let found = metadata.values().any(Option::is_some);
            let status = if found { "ok" } else { "not_found" };

            if json_output {
                print_json(&serde_json::json!({
                    "status": status,
                    "data": { "isbn": isbn, "sources": &*metadata },
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                for (source, record) in metadata.iter() {
                    match record {
                        Some(record) => println!(
                            "── {} ──\n{}",
                            source.display_name(),
                            serde_json::to_string_pretty(record)?
                        ),
                        None => println!("── {} ── no data", source.display_name()),
                    }
                }
            }
            if !found {
                std::process::exit(ExitCode::NotFound.code());
            }
        }

        // ── Field ──────────────────────────────────────────────────────────
        Commands::Field {
            field,
            isbn,
            sources,
        } => {
            let config = load_config(&config_path, &sources)?;
            let pipeline = EnrichmentPipeline::from_config(&config)?;
            let candidates = pipeline.candidates(field, &isbn).await?;
            let chosen = choose(&candidates);
            let status = if chosen.is_some() { "ok" } else { "not_found" };
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": status,
                    "data": {
                        "isbn": isbn,
                        "field": field,
                        "candidates": labelled(field, &candidates),
                        "chosen": chosen,
                    },
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                for (label, value) in labelled(field, &candidates) {
                    println!("  {label:<24} {value}");
                }
                match &chosen {
                    Some(value) => println!("{field}: {value}"),
                    None => println!("No {field} found for {isbn}"),
                }
            }
            if chosen.is_none() {
                std::process::exit(ExitCode::NotFound.code());
            }
        }

        // ── ISBN ───────────────────────────────────────────────────────────
        Commands::Isbn { action } => match action {
            IsbnAction::Gen { count, seed } => {
                let mut rng = seeded_rng(seed);
                let isbns = (0..count).map(|_| generate_isbn13(&mut rng)).collect::<Vec<_>>();
                print_list(&isbns, json_output, start)?;
            }
            IsbnAction::Bogus { count, seed } => {
                let mut rng = seeded_rng(seed);
                let isbns = (0..count).map(|_| generate_bogus(&mut rng)).collect::<Vec<_>>();
                print_list(&isbns, json_output, start)?;
            }
            IsbnAction::Check { isbn } => {
                let parsed = Isbn::parse(&isbn)?;
                if json_output {
                    print_json(&serde_json::json!({
                        "status": "ok",
                        "data": parsed,
                        "meta": { "duration_ms": start.elapsed().as_millis() }
                    }))?;
                } else {
                    println!("ISBN-13:   {}", parsed.isbn13);
                    println!("ISBN-10:   {}", parsed.isbn10.as_deref().unwrap_or("-"));
                    println!("Formatted: {}", parsed.formatted);
                }
            }
        },

        // ── Config ─────────────────────────────────────────────────────────
        Commands::Config { action } => {
            let secrets_path = AppConfig::secrets_path_for(&config_path);
            match action {
                ConfigAction::Init { force } => {
                    let wrote_config = if force || !config_path.exists() {
                        AppConfig::default().save_to(&config_path)?;
                        true
                    } else {
                        false
                    };
                    let wrote_secrets = Secrets::write_template(&secrets_path)?;
                    if json_output {
                        print_json(&serde_json::json!({
                            "status": "ok",
                            "data": {
                                "config": { "path": config_path, "written": wrote_config },
                                "secrets": { "path": secrets_path, "written": wrote_secrets },
                            }
                        }))?;
                    } else {
                        report_written("Config", &config_path, wrote_config);
                        report_written("Secrets", &secrets_path, wrote_secrets);
                    }
                }
                ConfigAction::Show => {
                    let config = redacted(load_config(&config_path, &[])?);
                    if json_output {
                        print_json(&serde_json::json!({ "status": "ok", "data": config }))?;
                    } else {
                        print!("{}", toml::to_string_pretty(&config)?);
                    }
                }
                ConfigAction::Check => {
                    let config = load_config(&config_path, &[])?;
                    config.validate()?;
                    if json_output {
                        print_json(&serde_json::json!({
                            "status": "ok",
                            "data": { "sources": config.enrichment.sources }
                        }))?;
                    } else {
                        let names = config
                            .enrichment
                            .sources
                            .iter()
                            .map(|s| s.display_name())
                            .collect::<Vec<_>>();
                        println!("Config OK: {}", names.join(", "));
                    }
                }
                ConfigAction::Path => {
                    if json_output {
                        print_json(&serde_json::json!({
                            "status": "ok",
                            "data": { "config": config_path, "secrets": secrets_path }
                        }))?;
                    } else {
                        println!("{}", config_path.display());
                        println!("{}", secrets_path.display());
                    }
                }
            }
        }
    }

    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "isbnmeta=info",
        1 => "isbnmeta=debug",
        _ => "isbnmeta=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(filter)
        .init();
}

/// Config file, then secrets file, then environment; `sources` replaces the
/// configured providers when non-empty.
fn load_config(path: &Path, sources: &[SourceId]) -> Result<AppConfig> {
    let mut config = AppConfig::load_from(path)
        .with_context(|| format!("loading config {}", path.display()))?;
    config.apply_secrets(Secrets::load_from(&AppConfig::secrets_path_for(path))?);
    config.apply_env_overrides(|name| std::env::var(name).ok());
    if !sources.is_empty() {
        config.enrichment.sources = sources.to_vec();
    }
    tracing::debug!(path = %path.display(), sources = ?config.enrichment.sources, "config loaded");
    Ok(config)
}

fn redacted(mut config: AppConfig) -> AppConfig {
    for key in [&mut config.google_books.api_key, &mut config.isbndb.api_key] {
        if !key.is_empty() {
            *key = "***".to_string();
        }
    }
    config
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    if let Some(err) = err.downcast_ref::<EnrichError>() {
        return err.exit_code();
    }
    if let Some(err) = err.downcast_ref::<CoreError>() {
        return err.exit_code();
    }
    ExitCode::GeneralError
}

fn report_written(what: &str, path: &Path, written: bool) {
    if written {
        println!("✓ {what}: {}", path.display());
    } else {
        println!("○ {what}: {} (exists, left alone)", path.display());
    }
}

fn print_list(items: &[String], json_output: bool, start: Instant) -> Result<()> {
    if json_output {
        print_json(&serde_json::json!({
            "status": "ok",
            "data": { "items": items, "total": items.len() },
            "meta": { "duration_ms": start.elapsed().as_millis() }
        }))
    } else {
        for item in items {
            println!("{item}");
        }
        Ok(())
    }
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_enrich_with_source_list() {
        let cli = Cli::try_parse_from([
            "isbnmeta", "--json", "enrich", "in.csv", "out.csv", "--sources", "gobo,ol",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Enrich { input, sources, .. } => {
                assert_eq!(input, PathBuf::from("in.csv"));
                assert_eq!(sources, vec![SourceId::GoogleBooks, SourceId::OpenLibrary]);
            }
            _ => panic!("expected enrich"),
        }
    }

    #[test]
    fn parses_field_names_and_rejects_unknown() {
        let cli = Cli::try_parse_from(["isbnmeta", "field", "author", "9780711246812"]).unwrap();
        assert!(matches!(cli.command, Commands::Field { field: Field::Authors, .. }));
        assert!(Cli::try_parse_from(["isbnmeta", "field", "colour", "9780711246812"]).is_err());
    }

    #[test]
    fn redacts_keys() {
        let mut config = AppConfig::default();
        config.isbndb.api_key = "secret".to_string();
        let shown = redacted(config);
        assert_eq!(shown.isbndb.api_key, "***");
        assert!(shown.google_books.api_key.is_empty());
    }

    #[test]
    fn load_config_applies_secrets_and_source_override() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[enrichment]\nconcurrency = 2\n").unwrap();
        std::fs::write(dir.path().join("secrets.toml"), "isbndb_key = \"k\"\n").unwrap();

        let config = load_config(&path, &[SourceId::IsbnDb]).unwrap();
        assert_eq!(config.enrichment.concurrency, 2);
        assert_eq!(config.enrichment.sources, vec![SourceId::IsbnDb]);
        assert!(!config.isbndb.api_key.is_empty());
    }

    #[test]
    fn exit_codes_follow_error_kind() {
        let err = anyhow::Error::from(EnrichError::InvalidIsbn("x".to_string()));
        assert_eq!(exit_code_for(&err), ExitCode::InvalidArgs);
        let err = anyhow::Error::from(CoreError::Config("bad".to_string()));
        assert_eq!(exit_code_for(&err), ExitCode::ConfigError);
        assert_eq!(exit_code_for(&anyhow::anyhow!("other")), ExitCode::GeneralError);
    }
}
