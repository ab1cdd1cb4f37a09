use std::error::Error;
use std::path::PathBuf;

use atty::Stream;
use avvai_lookup::{
    CachedEntry, DictionaryEntry, DictionaryReader, LookupConfig, Resolution, ResolutionSource,
    normalize,
};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};

#[derive(Parser, Debug)]
#[command(name = "avvai-lookup", about = "Look up Tamil words the way the reader does", version)]
pub struct Cli {
    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Command,
}

/// Overrides for values otherwise taken from `AVVAI_*` environment variables.
#[derive(Args, Debug)]
struct ConfigArgs {
    /// Origin serving /api/dictionary and /api/dictionary/lemmatise.
    #[arg(long, global = true)]
    backend_url: Option<String>,
    /// Directory holding the cache slot file.
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,
    /// Name of the cache slot.
    #[arg(long, global = true)]
    cache_slot: Option<String>,
    /// Maximum number of cached records.
    #[arg(long, global = true)]
    max_entries: Option<usize>,
}

impl ConfigArgs {
    fn resolve(&self) -> LookupConfig {
        let mut config = LookupConfig::from_env();
        if let Some(url) = &self.backend_url {
            config.backend_url = url.clone();
        }
        if let Some(dir) = &self.cache_dir {
            config.cache_dir = dir.clone();
        }
        if let Some(slot) = &self.cache_slot {
            config.cache_slot = slot.clone();
        }
        if let Some(max) = self.max_entries {
            config.max_entries = max.max(1);
        }
        config
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve words through the cache, the dictionary and the lemmatiser.
    Lookup {
        /// One or more words, as selected in the lesson text.
        #[arg(required = true)]
        words: Vec<String>,
    },
    /// Inspect or edit the local dictionary cache.
    #[command(subcommand)]
    Cache(CacheCommand),
    /// Serve the lookup pipeline over HTTP.
    #[cfg(feature = "web")]
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: std::net::SocketAddr,
    },
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// List every cached record.
    List,
    /// Show the record stored under a key.
    Get { key: String },
    /// Store an entry under a key.
    Upsert {
        key: String,
        /// Short English definition.
        #[arg(long)]
        definition: String,
        /// Example sentence; repeat for several.
        #[arg(long = "example")]
        examples: Vec<String>,
        /// Headword; defaults to the key.
        #[arg(long)]
        word: Option<String>,
    },
    /// Delete the record stored under a key.
    Remove { key: String },
    /// Delete every record.
    Clear,
}

pub async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = cli.config.resolve();
    let reader = DictionaryReader::from_config(&config)?;
    match cli.command {
        Command::Lookup { words } => handle_lookup(&reader, words, cli.json).await,
        Command::Cache(command) => handle_cache(&reader, command, cli.json),
        #[cfg(feature = "web")]
        Command::Serve { addr } => {
            let web_config = avvai_lookup::web::WebConfig { addr };
            avvai_lookup::web::serve(web_config, reader.lookup_pipeline().clone()).await?;
            Ok(())
        }
    }
}

async fn handle_lookup(
    reader: &DictionaryReader,
    words: Vec<String>,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let mut rows = Vec::with_capacity(words.len());
    for word in words {
        let resolution = reader.resolve(&word).await;
        rows.push((word, resolution));
    }

    if as_json {
        let payload: Vec<_> = rows
            .iter()
            .map(|(word, resolution)| {
                json!({
                    "word": word,
                    "key": resolution.key,
                    "source": resolution.source,
                    "entry": resolution.entry,
                    "failures": resolution
                        .failures
                        .iter()
                        .map(|f| format!("{}: {}", f.step, f.error))
                        .collect::<Vec<_>>(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_lookup_table(&rows);
        for (_, resolution) in &rows {
            if let Some(entry) = &resolution.entry {
                print_entry(entry);
            }
        }
    }
    Ok(())
}

fn handle_cache(
    reader: &DictionaryReader,
    command: CacheCommand,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let lookup = reader.lookup_pipeline();
    let cache = lookup.cache();
    match command {
        CacheCommand::List => {
            let entries = cache.entries();
            if as_json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                print_cache_table(&entries, cache.max_entries());
            }
        }
        CacheCommand::Get { key } => {
            let record = cache
                .get(&key)
                .ok_or_else(|| format!("No cached record for {key:?}"))?;
            let entry = CachedEntry {
                key: normalize(&key),
                record,
            };
            if as_json {
                println!("{}", serde_json::to_string_pretty(&entry)?);
            } else {
                print_cache_table(std::slice::from_ref(&entry), cache.max_entries());
                if let Some(value) = &entry.record.value {
                    print_entry(value);
                }
            }
        }
        CacheCommand::Upsert {
            key,
            definition,
            examples,
            word,
        } => {
            let key = normalize(&key);
            if key.is_empty() {
                return Err("Cache key cannot be empty".into());
            }
            let entry = DictionaryEntry {
                word: word.unwrap_or_else(|| key.clone()),
                definition,
                examples,
            };
            cache.try_put(&key, lookup.record(Some(entry)))?;
            println!("Stored {key:?}.");
        }
        CacheCommand::Remove { key } => {
            if !cache.remove(&key) {
                return Err(format!("No cached record for {key:?}").into());
            }
            println!("Removed {:?}.", normalize(&key));
        }
        CacheCommand::Clear => {
            let count = cache.len();
            cache.clear();
            println!("Cleared {count} records.");
        }
    }
    Ok(())
}

fn source_label(source: &ResolutionSource) -> String {
    match source {
        ResolutionSource::Skipped => "skipped".to_string(),
        ResolutionSource::Cache => "cache".to_string(),
        ResolutionSource::Backend => "backend".to_string(),
        ResolutionSource::Lemma { lemma, cached } => {
            let origin = if *cached { "cache" } else { "backend" };
            format!("lemma {lemma} ({origin})")
        }
        ResolutionSource::NotFound => "not found".to_string(),
    }
}

fn print_lookup_table(rows: &[(String, Resolution)]) {
    let width = rows
        .iter()
        .map(|(word, _)| word.chars().count())
        .max()
        .unwrap_or(4)
        .max("WORD".len());
    println!("{:<width$}  {}", "WORD", "SOURCE", width = width);
    println!("{:-<width$}  {}", "", "------", width = width);
    for (word, resolution) in rows {
        let mut label = source_label(&resolution.source);
        if !resolution.failures.is_empty() {
            label.push_str(&format!(" [{} failed]", resolution.failures.len()));
        }
        println!("{:<width$}  {}", word, label, width = width);
    }
}

fn print_cache_table(entries: &[CachedEntry], capacity: usize) {
    if entries.is_empty() {
        println!("Cache is empty (capacity {capacity}).");
        return;
    }
    let width = entries
        .iter()
        .map(|entry| entry.key.chars().count())
        .max()
        .unwrap_or(3)
        .max("KEY".len());
    println!("{} of {capacity} records", entries.len());
    println!("{:<width$}  {:<13}  {}", "KEY", "INSERTED_AT", "DEFINITION", width = width);
    println!("{:-<width$}  {:-<13}  {}", "", "", "----------", width = width);
    for entry in entries {
        let definition = entry
            .record
            .value
            .as_ref()
            .map(|value| value.definition.as_str())
            .unwrap_or("<not found>");
        println!(
            "{:<width$}  {:<13}  {}",
            entry.key,
            entry.record.inserted_at,
            definition,
            width = width
        );
    }
}

fn print_entry(entry: &DictionaryEntry) {
    println!("\n{}", entry.word);
    render_markdown_block("Definition", &entry.definition);
    if !entry.examples.is_empty() {
        let list = entry
            .examples
            .iter()
            .map(|example| format!("* {example}"))
            .collect::<Vec<_>>()
            .join("\n");
        render_markdown_block("Examples", &list);
    }
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

fn render_markdown_block(title: &str, body: &str) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return;
    }
    println!("{title}:");
    if stdout_is_tty() {
        let skin = MadSkin::default();
        let formatted = FmtText::from(&skin, trimmed, Some(markdown_width()));
        println!("{formatted}");
    } else {
        println!("{trimmed}");
    }
}
