//! Search demo: a composition root wired from configuration.
//!
//! Usage: `search-demo [CONFIG] [QUERY]...`
//!
//! Defaults to `boundary.toml` in the working directory and the query
//! `sausages`. The corpus path inside the config is relative to the config
//! file, so any working directory works as long as CONFIG points at it. Set
//! `BOUNDARY__SEARCH__ADAPTER=http` and `BOUNDARY__SEARCH__ENDPOINT=...` to
//! swap the file corpus for an HTTP endpoint without touching this code.

use std::path::PathBuf;

use boundary_contract::logging::init_tracing;
use boundary_contract::{CompositionRoot, SearchCapability, SearchService, Settings};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let config_path = PathBuf::from(args.next().unwrap_or_else(|| "boundary.toml".into()));
    let mut queries: Vec<String> = args.collect();
    if queries.is_empty() {
        queries.push("sausages".into());
    }

    let settings = Settings::load(Some(config_path.as_path()))?;
    init_tracing(&settings.logging);

    let root = CompositionRoot::from_settings(&settings)?;
    let search = root.resolve::<SearchCapability>()?;
    info!(adapter = search.adapter_name(), "search capability bound");

    let service = SearchService::new(search).with_policy(settings.retry.clone());

    let query_refs: Vec<&str> = queries.iter().map(String::as_str).collect();
    let outcomes = service.search_all(&query_refs).await;

    for (query, outcome) in queries.iter().zip(outcomes) {
        println!("{query}:");
        match outcome {
            Ok(results) if results.is_empty() => println!("  (no results)"),
            Ok(results) => {
                for result in &results {
                    println!("  {}  {}", result.url, result.text);
                }
            }
            Err(err) => println!("  error: {err}"),
        }
    }

    root.shutdown().await;
    Ok(())
}
