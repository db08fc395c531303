use std::env;
use std::path::PathBuf;

use retrieval_cli::{build_engine, init_logging, load_chunks};
use retrieval_core::config::{expand_path, Config};
use retrieval_core::types::SearchStrategy;

fn usage(prog: &str) -> ! {
    eprintln!("Usage: {} <query> [--strategy hybrid|vector-only|keyword-only] [--top-k N] [--source ID]", prog);
    eprintln!("Example: {} 'JWT authentication' --strategy keyword-only --top-k 3", prog);
    std::process::exit(1);
}

fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i + 1) {
        Some(value) => value.as_str(),
        None => { eprintln!("Error: {} requires a value", flag); std::process::exit(1); }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.engine_settings()?;
    let mut search = config.search_defaults()?;

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 { usage(&args[0]); }
    let mut query = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--strategy" => { search.strategy = flag_value(&args, i, "--strategy").parse::<SearchStrategy>().unwrap_or_else(|e| { eprintln!("Error: {}", e); std::process::exit(1) }); i += 1; }
            "--top-k" => { search.top_k = flag_value(&args, i, "--top-k").parse().unwrap_or_else(|_| { eprintln!("Error: --top-k requires a number"); std::process::exit(1) }); i += 1; }
            "--source" => { search.source_filter = Some(flag_value(&args, i, "--source").to_string()); i += 1; }
            "--help" | "-h" => usage(&args[0]),
            other if !other.starts_with('-') && query.is_none() => query = Some(other.to_string()),
            other => { eprintln!("Error: unexpected argument {}", other); usage(&args[0]); }
        }
        i += 1;
    }
    let Some(query) = query else { usage(&args[0]) };

    let chunks_dir: PathBuf = expand_path(&settings.chunks_dir);
    println!("🔍 retrieval-search\n==================");
    println!("Query: {}", query);
    println!("Strategy: {}  top_k: {}  source: {}", search.strategy, search.top_k, search.source_filter.as_deref().unwrap_or("*"));
    println!("Chunks: {}", chunks_dir.display());

    let chunks = load_chunks(&chunks_dir)?;
    let engine = build_engine(&settings, chunks).await?;
    let results = engine.search(&query, &search).await?;

    println!("\n🔍 Found {} results for: \"{}\"", results.len(), query);
    for (rank, result) in results.iter().enumerate() {
        let c = &result.chunk;
        println!("\n  {}. relevance={:.4}  id={}  source={}  span={:.1}-{:.1}", rank + 1, result.relevance, c.id, c.source_id, c.start_offset, c.end_offset);
        println!("     📝 {}", c.text);
    }
    let stats = engine.stats();
    if stats.keyword_fallbacks + stats.hybrid_lexical_skips + stats.hybrid_vector_retries > 0 {
        println!("\n⚠️  Served by a fallback path: {:?}", stats);
    }
    Ok(())
}
