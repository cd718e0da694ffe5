use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bhlnames_core::{Config, Engine, Input, NaiveBayes, TitleMatcher, config_file};
use bhlnames_store::SqliteStore;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

mod output;

use output::ColorMode;

/// Find references to scientific names in the Biodiversity Heritage Library
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Options shared by every command that opens the database.
#[derive(Args, Debug)]
struct DbArgs {
    /// Path to the BHL names SQLite database
    #[arg(long)]
    db: Option<PathBuf>,

    /// Path to a JSON file with Bayes model counts (embedded model by default)
    #[arg(long)]
    model: Option<PathBuf>,
}

/// Search options applied to queries.
#[derive(Args, Debug, Default)]
struct SearchArgs {
    /// Look for the publication where the name was introduced
    #[arg(long)]
    nomen: bool,

    /// Include references of synonyms of the name
    #[arg(long)]
    taxon: bool,

    /// Return only the number of references
    #[arg(long)]
    short: bool,

    /// Maximum number of references per name
    #[arg(long)]
    limit: Option<usize>,

    /// Sort references from the latest to the earliest
    #[arg(long)]
    desc: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find references for one name
    Name {
        /// Scientific name, optionally with authorship and year
        name: String,

        /// Citation of the publication the name is expected in
        #[arg(long = "ref")]
        reference: Option<String>,

        #[command(flatten)]
        search: SearchArgs,

        /// Print JSON instead of a readable listing
        #[arg(long)]
        json: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Find references for a stream of queries, one per line
    ///
    /// A line is either a JSON query object or a plain name-string. Results
    /// are written as JSON lines in completion order.
    Refs {
        /// File with queries, `-` for stdin
        input: PathBuf,

        /// Path to output file (stdout by default)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of concurrent workers
        #[arg(short, long)]
        jobs: Option<usize>,

        #[command(flatten)]
        search: SearchArgs,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Show the reference of one BHL page
    Page {
        /// BHL page ID
        page_id: i64,

        /// Print JSON instead of a readable listing
        #[arg(long)]
        json: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Rebuild the title abbreviation index
    IndexTitles {
        #[command(flatten)]
        db: DbArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    // stdout carries results, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Name {
            name,
            reference,
            search,
            json,
            no_color,
            db,
        } => name_cmd(name, reference, search, json, no_color, db).await,
        Command::Refs {
            input,
            output,
            jobs,
            search,
            db,
        } => refs_cmd(input, output, jobs, search, db).await,
        Command::Page {
            page_id,
            json,
            no_color,
            db,
        } => page_cmd(page_id, json, no_color, db),
        Command::IndexTitles { db } => index_titles(db),
    }
}

/// Resolve configuration: CLI flags > env vars > config file > defaults.
fn resolve_config(db: &DbArgs, jobs: Option<usize>, search: &SearchArgs) -> anyhow::Result<Config> {
    let mut config = config_file::load_config().apply_to(Config::default())?;

    if let Ok(path) = std::env::var("BHLNAMES_DB") {
        config.db_path = Some(PathBuf::from(path));
    }
    if let Ok(path) = std::env::var("BHLNAMES_MODEL") {
        config.model_path = Some(PathBuf::from(path));
    }
    if let Ok(jobs) = std::env::var("BHLNAMES_JOBS") {
        match jobs.parse::<usize>() {
            Ok(n) if n > 0 => config.jobs_num = n,
            _ => tracing::warn!(value = %jobs, "ignoring invalid BHLNAMES_JOBS"),
        }
    }

    if let Some(path) = &db.db {
        config.db_path = Some(path.clone());
    }
    if let Some(path) = &db.model {
        config.model_path = Some(path.clone());
    }
    if let Some(n) = jobs {
        if n == 0 {
            anyhow::bail!("--jobs must be positive");
        }
        config.jobs_num = n;
    }
    if let Some(limit) = search.limit {
        config.refs_limit = limit;
    }
    if search.desc {
        config.sort_desc = true;
    }
    Ok(config)
}

fn open_store(config: &Config) -> anyhow::Result<Arc<SqliteStore>> {
    let Some(path) = &config.db_path else {
        anyhow::bail!(
            "No database configured. Use --db, set BHLNAMES_DB, or add db_path to .bhlnames.toml"
        );
    };
    if !path.exists() {
        anyhow::bail!("Database not found at {}", path.display());
    }
    Ok(Arc::new(SqliteStore::open(path)?))
}

fn build_engine(config: Config) -> anyhow::Result<Engine> {
    let store = open_store(&config)?;
    let titles = TitleMatcher::new(store.clone())?;
    if titles.pattern_count() == 0 {
        tracing::warn!("title index is empty, run `bhlnames index-titles` to build it");
    }
    let model = match &config.model_path {
        Some(path) => NaiveBayes::load(path)?,
        None => NaiveBayes::embedded()?,
    };
    Ok(Engine::new(store, Some(titles), model, config)?)
}

/// Apply search flags to a query. An explicit `--limit` fills the query's
/// limit before the nomen-event default is chosen.
fn apply_search(mut input: Input, search: &SearchArgs) -> Input {
    input.params.with_nomen_event |= search.nomen;
    input.params.with_taxon |= search.taxon;
    input.params.with_shortened_output |= search.short;
    if input.params.refs_limit == 0
        && let Some(limit) = search.limit
    {
        input.params.refs_limit = limit;
    }
    input.complete()
}

async fn name_cmd(
    name: String,
    reference: Option<String>,
    search: SearchArgs,
    json: bool,
    no_color: bool,
    db: DbArgs,
) -> anyhow::Result<()> {
    let config = resolve_config(&db, None, &search)?;
    let mut builder = Input::builder().name_string(name);
    if let Some(reference) = reference {
        builder = builder.ref_string(reference);
    }
    let input = apply_search(builder.build(), &search);
    let engine = build_engine(config)?;

    let refs = tokio::task::spawn_blocking(move || engine.name_refs(&input)).await?;
    let refs = match refs {
        Ok(refs) => refs,
        Err(e) => anyhow::bail!(output::describe_error(&e)),
    };

    let mut stdout = std::io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut stdout, &refs)?;
        writeln!(stdout)?;
    } else {
        output::print_refs(&mut stdout, &refs, ColorMode(!no_color))?;
    }
    Ok(())
}

/// Parse one input line. Blank lines and comments yield `None`.
fn parse_line(line: &str) -> anyhow::Result<Option<Input>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    if line.starts_with('{') {
        let input: Input = serde_json::from_str(line)?;
        return Ok(Some(input));
    }
    Ok(Some(Input::builder().name_string(line).build()))
}

fn open_input(path: &Path) -> anyhow::Result<Box<dyn BufRead + Send>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(std::io::BufReader::new(std::io::stdin())));
    }
    if !path.exists() {
        anyhow::bail!("Input file not found: {}", path.display());
    }
    Ok(Box::new(std::io::BufReader::new(std::fs::File::open(path)?)))
}

async fn refs_cmd(
    input_path: PathBuf,
    output: Option<PathBuf>,
    jobs: Option<usize>,
    search: SearchArgs,
    db: DbArgs,
) -> anyhow::Result<()> {
    let config = resolve_config(&db, jobs, &search)?;
    let jobs_num = config.jobs_num;
    let reader = open_input(&input_path)?;
    let mut writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(std::io::BufWriter::new(std::fs::File::create(path)?)),
        None => Box::new(std::io::stdout().lock()),
    };

    let cancel = CancellationToken::new();

    // Set up Ctrl+C handler
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_clone.cancel();
        }
    });

    let (in_tx, in_rx) = async_channel::unbounded::<Input>();
    let (out_tx, out_rx) = async_channel::unbounded();

    let reader_cancel = cancel.clone();
    let reader_task = tokio::task::spawn_blocking(move || {
        for (n, line) in reader.lines().enumerate() {
            if reader_cancel.is_cancelled() {
                break;
            }
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::error!(error = %e, "cannot read input");
                    break;
                }
            };
            match parse_line(&line) {
                Ok(Some(input)) => {
                    let input = apply_search(input, &search);
                    if in_tx.send_blocking(input).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(line = n + 1, error = %e, "skipping malformed query"),
            }
        }
        in_tx.close();
    });

    let engine = Arc::new(build_engine(config)?);
    let stream = tokio::spawn(bhlnames_core::name_refs_stream(
        engine,
        in_rx,
        out_tx,
        cancel.clone(),
        jobs_num,
    ));

    let (mut total, mut failed) = (0, 0);
    while let Ok(outcome) = out_rx.recv().await {
        total += 1;
        if outcome.result.is_err() {
            failed += 1;
        }
        output::write_json_line(&mut *writer, &outcome)?;
    }
    writer.flush()?;

    stream.await?;
    reader_task.await?;

    let mut stderr = std::io::stderr();
    output::print_summary(&mut stderr, total, failed, cancel.is_cancelled(), ColorMode(true))?;
    Ok(())
}

fn page_cmd(page_id: i64, json: bool, no_color: bool, db: DbArgs) -> anyhow::Result<()> {
    let config = resolve_config(&db, None, &SearchArgs::default())?;
    let engine = build_engine(config)?;
    let rf = match engine.ref_by_page_id(page_id) {
        Ok(rf) => rf,
        Err(e) => anyhow::bail!(output::describe_error(&e)),
    };

    let mut stdout = std::io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut stdout, &rf)?;
        writeln!(stdout)?;
    } else {
        output::print_page_reference(&mut stdout, &rf, ColorMode(!no_color))?;
    }
    Ok(())
}

fn index_titles(db: DbArgs) -> anyhow::Result<()> {
    let config = resolve_config(&db, None, &SearchArgs::default())?;
    let store = open_store(&config)?;
    let n = store.build_title_index()?;
    println!("Indexed {n} title abbreviations");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_and_json_lines() {
        assert!(parse_line("   ").unwrap().is_none());
        assert!(parse_line("# comment").unwrap().is_none());

        let plain = parse_line("Achenium lusitanicum Skalitzky, 1884").unwrap().unwrap();
        assert_eq!(plain.name.canonical, "Achenium lusitanicum");
        assert!(!plain.id.is_empty());

        let json = parse_line(r#"{"id":"x1","name":{"nameString":"Pardosa moesta Banks, 1892"}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(json.id, "x1");
        assert_eq!(json.name.name_string, "Pardosa moesta Banks, 1892");

        assert!(parse_line("{not json").is_err());
    }

    #[test]
    fn search_flags_are_applied() {
        let search = SearchArgs {
            nomen: true,
            ..Default::default()
        };
        let input = Input::builder().name_string("Aus bus").build();
        let input = apply_search(input, &search);
        assert!(input.params.with_nomen_event);
        assert_eq!(input.params.refs_limit, 3);
    }

    #[test]
    fn explicit_limit_wins_over_nomen_default() {
        let search = SearchArgs {
            nomen: true,
            limit: Some(10),
            ..Default::default()
        };
        let input = apply_search(Input::builder().name_string("Aus bus").build(), &search);
        assert_eq!(input.params.refs_limit, 10);

        let own_limit = Input::builder().name_string("Aus bus").refs_limit(5).build();
        assert_eq!(apply_search(own_limit, &search).params.refs_limit, 5);
    }

    #[test]
    fn page_command_parses() {
        let cli = Cli::try_parse_from(["bhlnames", "page", "2002", "--json"]).unwrap();
        match cli.command {
            Command::Page { page_id, json, .. } => {
                assert_eq!(page_id, 2002);
                assert!(json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_parses() {
        let cli = Cli::try_parse_from([
            "bhlnames",
            "name",
            "Aus bus",
            "--ref",
            "Some journal 3: 12",
            "--nomen",
            "--db",
            "/tmp/bhl.db",
        ])
        .unwrap();
        match cli.command {
            Command::Name {
                name,
                reference,
                search,
                db,
                ..
            } => {
                assert_eq!(name, "Aus bus");
                assert_eq!(reference.as_deref(), Some("Some journal 3: 12"));
                assert!(search.nomen);
                assert_eq!(db.db, Some(PathBuf::from("/tmp/bhl.db")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
