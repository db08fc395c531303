use std::env;
use std::fs;

use anyhow::Context;

use retrieval_cli::{build_engine, init_logging, load_chunks};
use retrieval_core::config::{expand_path, Config};
use retrieval_core::eval::{EvalCase, RetrievalMetrics};

fn fmt_metrics(m: &RetrievalMetrics) -> String {
    let ndcg = m.ndcg_at_k.map(|v| format!("{:.3}", v)).unwrap_or_else(|| "-".to_string());
    format!("recall={:.3}  precision={:.3}  mrr={:.3}  ndcg={}", m.recall_at_k, m.precision_at_k, m.mrr, ndcg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <cases.json>", args[0]);
        eprintln!("cases.json: [{{\"query\": \"...\", \"relevant_chunks\": [\"c1\"], \"relevance_scores\": {{\"c1\": 3}}}}]");
        std::process::exit(1);
    }
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.engine_settings()?;
    let search = config.search_defaults()?;

    let raw = fs::read_to_string(&args[1]).with_context(|| format!("reading {}", args[1]))?;
    let cases: Vec<EvalCase> = serde_json::from_str(&raw).with_context(|| format!("parsing {}", args[1]))?;

    let chunks = load_chunks(&expand_path(&settings.chunks_dir))?;
    let engine = build_engine(&settings, chunks).await?;

    println!("📊 retrieval-eval\n================");
    println!("Cases: {}  strategy: {}  k: {}", cases.len(), search.strategy, search.top_k);
    let mut all = Vec::with_capacity(cases.len());
    for case in &cases {
        let results = engine.search(&case.query, &search).await?;
        let metrics = RetrievalMetrics::evaluate(&results, case, search.top_k);
        println!("\n  \"{}\"\n     {}", case.query, fmt_metrics(&metrics));
        all.push(metrics);
    }
    println!("\n✅ Mean over {} cases: {}", all.len(), fmt_metrics(&RetrievalMetrics::mean(&all)));
    Ok(())
}
