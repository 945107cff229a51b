use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use termlink_core::{
    markdown, CollectingSink, Diagnostic, DiagnosticsSink, DocumentIdentity, Linker,
    RewriteConfig, RewriteOutcome, StaticGlossary, TracingSink,
};

const DEFAULT_CONFIG: &str = "termlink.toml";
const DEFAULT_EXTENSIONS: &str = "md,mdx";

#[derive(Parser, Debug)]
#[command(name = "termlink", version, about = "Turn glossary terms into cross-reference links")]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Glossary file (.json array of targets or .toml `[[target]]` tables).
    #[arg(long, global = true)]
    glossary: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the raw matches found in TEXT as JSON lines.
    Scan { text: String },
    /// Rewrite one markdown file and write the resulting tree as JSON.
    Rewrite {
        input: PathBuf,
        #[arg(short = 'o', long = "out")]
        out: Option<PathBuf>,
        #[command(flatten)]
        identity: IdentityArgs,
        #[arg(long, action = ArgAction::SetTrue)]
        pretty: bool,
    },
    /// Rewrite every markdown file under INPUT in parallel.
    Batch {
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value = DEFAULT_EXTENSIONS)]
        extensions: String,
        #[arg(long)]
        threads: Option<usize>,
    },
    /// Print the effective configuration.
    Config,
}

#[derive(Args, Debug, Default)]
struct IdentityArgs {
    /// Location used for self-reference and proximity; defaults to the input
    /// path relative to `[glossary].root` or the working directory.
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    id: Option<String>,
    #[arg(long)]
    slug: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct AppConfig {
    #[serde(default)]
    rewrite: RewriteConfig,
    #[serde(default)]
    glossary: GlossarySection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct GlossarySection {
    path: Option<PathBuf>,
    /// Prefix stripped from document paths before matching source locations.
    root: Option<String>,
}

/// Logs every diagnostic and keeps them for the run summary.
#[derive(Default)]
struct CliSink {
    collected: CollectingSink,
}

impl DiagnosticsSink for CliSink {
    fn report(&self, diagnostic: Diagnostic) {
        TracingSink.report(diagnostic.clone());
        self.collected.report(diagnostic);
    }
}

#[derive(Debug, Default, Serialize)]
struct BatchSummary {
    documents: usize,
    failed: usize,
    links: usize,
    suppressed: usize,
    short_notes: usize,
    warnings: usize,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let mut app_config = load_config(&config_path)?;
    if let Some(path) = cli.glossary.clone() {
        app_config.glossary.path = Some(path);
    }

    match cli.command {
        Commands::Scan { text } => {
            let linker = build_linker(&app_config)?;
            let sink = CliSink::default();
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            for found in linker.scan(&text, &sink)? {
                serde_json::to_writer(&mut handle, &found)?;
                handle.write_all(b"\n")?;
            }
        }
        Commands::Rewrite {
            input,
            out,
            identity,
            pretty,
        } => {
            let linker = build_linker(&app_config)?;
            let sink = CliSink::default();
            let location = match identity.location.clone() {
                Some(location) => location,
                None => file_location(&input, app_config.glossary.root.as_deref())?,
            };
            let identity = DocumentIdentity {
                location: Some(location),
                id: identity.id,
                slug: identity.slug,
            };
            let outcome = rewrite_file(&linker, &input, &identity, &sink)?;
            let json = if pretty {
                serde_json::to_string_pretty(&outcome.tree)?
            } else {
                serde_json::to_string(&outcome.tree)?
            };
            match out {
                Some(path) => write_output(&path, &json)?,
                None => println!("{json}"),
            }
            eprintln!(
                "linked {} terms ({} self-references kept, {} short notes)",
                outcome.stats.links, outcome.stats.suppressed, outcome.stats.short_notes
            );
        }
        Commands::Batch {
            input,
            out,
            extensions,
            threads,
        } => {
            if let Some(threads) = threads {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build_global()
                    .map_err(|e| anyhow!("failed to size worker pool: {e}"))?;
            }
            let linker = build_linker(&app_config)?;
            let summary = run_batch(
                &linker,
                &input,
                &out,
                &parse_extensions(&extensions),
                app_config.glossary.root.as_deref(),
            )?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            if summary.failed > 0 {
                return Err(anyhow!(
                    "{} of {} documents failed",
                    summary.failed,
                    summary.documents
                ));
            }
        }
        Commands::Config => {
            let rendered = toml::to_string_pretty(&app_config)
                .map_err(|e| anyhow!("failed to render config: {e}"))?;
            println!("{rendered}");
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: AppConfig = toml::from_str(&contents).map_err(|e| anyhow!("invalid config: {e}"))?;
    config.rewrite.validate()?;
    Ok(config)
}

/// Builds the linker; without a glossary path the linker has no provider and
/// every rewrite fails with a configuration error.
fn build_linker(config: &AppConfig) -> Result<Linker> {
    let mut linker = Linker::new(config.rewrite.clone())?;
    if let Some(path) = &config.glossary.path {
        let mut glossary = StaticGlossary::from_path(path)
            .with_context(|| format!("failed to load glossary {}", path.display()))?;
        if let Some(root) = &config.glossary.root {
            glossary = glossary.with_root(root.clone());
        }
        tracing::info!(targets = glossary.len(), path = %path.display(), "loaded glossary");
        linker.set_provider(Arc::new(glossary));
    }
    Ok(linker)
}

fn rewrite_file(
    linker: &Linker,
    input: &Path,
    identity: &DocumentIdentity,
    sink: &dyn DiagnosticsSink,
) -> Result<RewriteOutcome> {
    let source = fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let tree = markdown::parse(&source);
    let outcome = linker.rewrite_document(tree, identity, sink)?;
    Ok(outcome)
}

fn run_batch(
    linker: &Linker,
    input: &Path,
    out: &Path,
    extensions: &[String],
    root: Option<&str>,
) -> Result<BatchSummary> {
    let files = gather_input_files(input, extensions)?;
    let single_file = input.is_file();
    let sink = CliSink::default();
    let results: Vec<(PathBuf, Result<RewriteOutcome>)> = files
        .par_iter()
        .map(|path| {
            let result = batch_entry(input, path, single_file, root)
                .and_then(|(location, relative)| {
                    let identity = DocumentIdentity::at(location);
                    let outcome = rewrite_file(linker, path, &identity, &sink)?;
                    write_output(&output_path(out, &relative), &serde_json::to_string(&outcome.tree)?)?;
                    Ok(outcome)
                });
            (path.clone(), result)
        })
        .collect();

    let mut summary = BatchSummary {
        documents: results.len(),
        ..Default::default()
    };
    for (path, result) in results {
        match result {
            Ok(outcome) => {
                summary.links += outcome.stats.links;
                summary.suppressed += outcome.stats.suppressed;
                summary.short_notes += outcome.stats.short_notes;
            }
            Err(err) => {
                tracing::error!(path = %path.display(), "rewrite failed: {err:#}");
                summary.failed += 1;
            }
        }
    }
    summary.warnings = sink.collected.warnings();
    Ok(summary)
}

/// Location and output-relative path of one batch document. Directory walks
/// use the path below the input directory; a single file input is located
/// like `rewrite` does and written under its file name.
fn batch_entry(
    input: &Path,
    path: &Path,
    single_file: bool,
    root: Option<&str>,
) -> Result<(String, PathBuf)> {
    if single_file {
        let name = path
            .file_name()
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("input {} has no file name", path.display()))?;
        return Ok((file_location(path, root)?, name));
    }
    let relative = path.strip_prefix(input).unwrap_or(path).to_path_buf();
    Ok((slash_path(&relative), relative))
}

/// Location of a document named on the command line: relative to the
/// glossary root when it lies below it, else relative to the working
/// directory, else the path as given.
fn file_location(path: &Path, root: Option<&str>) -> Result<String> {
    let cwd = std::env::current_dir().context("failed to read working directory")?;
    let absolute = cwd.join(path);
    if let Some(root) = root.filter(|r| !r.trim().is_empty()) {
        if let Ok(relative) = absolute.strip_prefix(cwd.join(root)) {
            return Ok(slash_path(relative));
        }
    }
    match absolute.strip_prefix(&cwd) {
        Ok(relative) => Ok(slash_path(relative)),
        Err(_) => Ok(slash_path(path)),
    }
}

/// `<out>/<relative>.json`, keeping the source extension so `a.md` and
/// `a.mdx` do not collide.
fn output_path(out: &Path, relative: &Path) -> PathBuf {
    let mut target = out.join(relative).into_os_string();
    target.push(".json");
    PathBuf::from(target)
}

fn gather_input_files(input: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(anyhow!("input {} does not exist", input.display()));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(input).follow_links(true) {
        let entry = entry.with_context(|| format!("failed to walk {}", input.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false);
        if matches {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|ext| ext.trim().trim_start_matches("*.").trim_start_matches('.'))
        .filter(|ext| !ext.is_empty())
        .map(str::to_string)
        .collect()
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn write_output(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}
