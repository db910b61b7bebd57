use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use market_parser::dump::{load_dump, load_ranked_items, write_ranked_items};
use market_parser::logging::init_logging;
use market_parser::{
    extract_records_with, reconcile, ParserError, ProductRecord, ProfileSet, Result, Strictness,
};

#[derive(Parser)]
#[command(name = "market-parser")]
#[command(about = "Extract and rank product records from captured marketplace pages")]
#[command(version)]
struct Cli {
    /// Site profile file (TOML, or JSON by extension) overlaid on the built-ins
    #[arg(long, global = true, env = "MARKET_PARSER_PROFILES")]
    profiles: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract product records from capture dumps (JSON or HTML)
    Extract {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Use this site's profile instead of detecting it
        #[arg(long)]
        site: Option<String>,
        /// loose, standard or strict
        #[arg(long, default_value = "standard")]
        strictness: Strictness,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Merge ranked output files into one capped list
    Reconcile {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Extract from dumps, rank per site, then merge across sites
    Run {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value = "standard")]
        strictness: Strictness,
        /// Output one ranked list per site instead of a merged list
        #[arg(long)]
        per_site: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let profiles = match &cli.profiles {
        Some(path) => ProfileSet::load(path)?,
        None => ProfileSet::builtin(),
    };

    match cli.command {
        Commands::Extract {
            files,
            site,
            strictness,
            output,
        } => {
            if let Some(site) = &site {
                if profiles.get(site).is_none() {
                    return Err(ParserError::UnknownSite(site.clone()));
                }
            }
            let records: Vec<ProductRecord> = extract_files(&files, &profiles, site.as_deref(), strictness)
                .into_values()
                .flatten()
                .collect();
            emit_records(&records, output.as_deref())
        }
        Commands::Reconcile {
            files,
            limit,
            output,
        } => {
            let mut pairs = Vec::new();
            for path in &files {
                let default_source = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                match load_ranked_items(path, &default_source) {
                    Ok(records) => pairs.extend(records.into_iter().map(|r| (r.source.clone(), r))),
                    Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable file"),
                }
            }
            let merged = reconcile(pairs, limit);
            emit_records(&merged, output.as_deref())
        }
        Commands::Run {
            files,
            limit,
            strictness,
            per_site,
            output,
        } => {
            let by_site: BTreeMap<String, Vec<ProductRecord>> =
                extract_files(&files, &profiles, None, strictness)
                    .into_iter()
                    .map(|(site, records)| {
                        let ranked = reconcile(records.into_iter().map(|r| (site.clone(), r)), limit);
                        info!(site = %site, kept = ranked.len(), "ranked site");
                        (site, ranked)
                    })
                    .collect();

            if per_site {
                return emit(&by_site, output.as_deref());
            }
            let union = by_site
                .into_iter()
                .flat_map(|(site, records)| records.into_iter().map(move |r| (site.clone(), r)));
            let merged = reconcile(union, limit);
            emit_records(&merged, output.as_deref())
        }
    }
}

/// Extract every readable dump, grouped by site. Unreadable dumps are skipped.
fn extract_files(
    files: &[PathBuf],
    profiles: &ProfileSet,
    site: Option<&str>,
    strictness: Strictness,
) -> BTreeMap<String, Vec<ProductRecord>> {
    let mut by_site: BTreeMap<String, Vec<ProductRecord>> = BTreeMap::new();
    for path in files {
        let dump = match load_dump(path, profiles, site) {
            Ok(d) => d,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable dump");
                continue;
            }
        };
        let site_name = dump.site.clone().unwrap_or_else(|| "generic".to_string());
        let profile = profiles.resolve(&site_name);
        let records = extract_records_with(&dump.node, &site_name, profile, strictness);
        debug!(path = %path.display(), site = %site_name, records = records.len(), "extracted dump");
        by_site.entry(site_name).or_default().extend(records);
    }
    by_site
}

fn emit_records(records: &[ProductRecord], output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => write_ranked_items(path, records),
        None => emit(&records, None),
    }
}

fn emit<T: Serialize + ?Sized>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, json)?;
            info!(path = %path.display(), "wrote output");
        }
        None => println!("{json}"),
    }
    Ok(())
}
