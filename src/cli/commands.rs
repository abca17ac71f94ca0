//! Command execution logic for the Xiphos CLI.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::analysis::{Analyzer, StandardAnalyzer};
use crate::authority::AuthoritySignals;
use crate::cli::args::{BuildArgs, Command, SearchArgs, StatsArgs, XiphosArgs};
use crate::error::Result;
use crate::index::{IndexBuilder, IndexSnapshot, IndexStats};
use crate::postings::DocId;
use crate::ranking::Bm25Params;
use crate::search::{FieldIndex, FusionConfig, SearchEngine};
use crate::storage::{FileStorage, Storage};

/// Subdirectory holding the body index.
const BODY_DIR: &str = "body_index";
/// Subdirectory holding the title index.
const TITLE_DIR: &str = "title_index";
/// Logical name of the body index.
const BODY_INDEX: &str = "body";
/// Logical name of the title index.
const TITLE_INDEX: &str = "title";
/// Blob name of the persisted id-to-title map.
const TITLES_FILE: &str = "titles.bin";

/// One corpus document as read from the JSONL input.
#[derive(Debug, Deserialize, Serialize)]
struct DocRecord {
    id: DocId,
    title: String,
    body: String,
}

/// Execute the parsed command.
pub fn execute_command(args: XiphosArgs) -> Result<()> {
    match args.command {
        Command::Build(build_args) => execute_build(build_args),
        Command::Search(search_args) => execute_search(search_args),
        Command::Stats(stats_args) => execute_stats(stats_args),
    }
}

fn execute_build(args: BuildArgs) -> Result<()> {
    log::info!("building indexes from {}", args.docs_file.display());
    let analyzer = StandardAnalyzer::new();

    let mut body_builder = IndexBuilder::new();
    let mut title_builder = IndexBuilder::new();
    let mut titles: AHashMap<DocId, String> = AHashMap::new();

    let file = File::open(&args.docs_file)?;
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let doc: DocRecord = serde_json::from_str(&line)?;

        body_builder.add_doc(doc.id, &analyzer.analyze(&doc.body));
        title_builder.add_doc(doc.id, &analyzer.analyze(&doc.title));
        titles.insert(doc.id, doc.title);
    }

    log::debug!(
        "flushing {} documents to {}",
        body_builder.doc_count(),
        args.index_dir.display()
    );
    let body_storage = FileStorage::new(args.index_dir.join(BODY_DIR))?;
    body_builder.write_postings(&body_storage, BODY_INDEX)?;
    body_builder.write_stats(&body_storage, BODY_INDEX)?;

    let title_storage = FileStorage::new(args.index_dir.join(TITLE_DIR))?;
    title_builder.write_postings(&title_storage, TITLE_INDEX)?;
    title_builder.write_stats(&title_storage, TITLE_INDEX)?;

    let root_storage = FileStorage::new(&args.index_dir)?;
    write_titles(&root_storage, &titles)?;

    println!(
        "Indexed {} documents ({} body terms, {} title terms) into {}",
        body_builder.doc_count(),
        body_builder.total_corpus_terms(),
        title_builder.total_corpus_terms(),
        args.index_dir.display()
    );

    Ok(())
}

fn execute_search(args: SearchArgs) -> Result<()> {
    let engine = open_engine(
        &args,
        FusionConfig {
            body_weight: args.body_weight,
            title_weight: args.title_weight,
            max_results: args.limit,
            ..FusionConfig::default()
        },
    )?;

    let hits = engine.search(&args.query)?;
    println!("{}", serde_json::to_string_pretty(&hits)?);

    Ok(())
}

fn execute_stats(args: StatsArgs) -> Result<()> {
    for (dir, name) in [(BODY_DIR, BODY_INDEX), (TITLE_DIR, TITLE_INDEX)] {
        let storage = FileStorage::new(args.index_dir.join(dir))?;
        let stats = IndexStats::read(&storage, name)?;
        println!(
            "{name}: {} documents, {} corpus terms, {} distinct terms",
            stats.doc_count,
            stats.total_corpus_terms,
            stats.df.len()
        );
    }
    Ok(())
}

fn open_engine(args: &SearchArgs, config: FusionConfig) -> Result<SearchEngine> {
    log::debug!("opening index at {}", args.index_dir.display());
    let body_storage: Arc<dyn Storage> =
        Arc::new(FileStorage::new(args.index_dir.join(BODY_DIR))?);
    let title_storage: Arc<dyn Storage> =
        Arc::new(FileStorage::new(args.index_dir.join(TITLE_DIR))?);

    let body_snapshot = Arc::new(IndexSnapshot::open(
        body_storage.as_ref(),
        BODY_INDEX,
        &[BODY_INDEX],
    )?);
    let title_snapshot = Arc::new(IndexSnapshot::open(
        title_storage.as_ref(),
        TITLE_INDEX,
        &[TITLE_INDEX],
    )?);

    let root_storage = FileStorage::new(&args.index_dir)?;
    let signals = AuthoritySignals::load(&root_storage)?;
    let titles = read_titles(&root_storage)?;

    Ok(SearchEngine::new(
        FieldIndex::new(body_storage, body_snapshot, Bm25Params::default()),
        FieldIndex::new(title_storage, title_snapshot, Bm25Params::default()),
        signals,
        titles,
        config,
        Box::new(StandardAnalyzer::new()),
    ))
}

fn write_titles(storage: &dyn Storage, titles: &AHashMap<DocId, String>) -> Result<()> {
    let mut output = storage.create_output(TITLES_FILE)?;
    bincode::serialize_into(&mut output, titles)?;
    output.close()?;
    Ok(())
}

fn read_titles(storage: &dyn Storage) -> Result<AHashMap<DocId, String>> {
    if !storage.file_exists(TITLES_FILE) {
        return Ok(AHashMap::new());
    }
    let mut input = storage.open_input(TITLES_FILE)?;
    let titles = bincode::deserialize_from(&mut input)?;
    Ok(titles)
}
