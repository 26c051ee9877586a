use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod client;
mod config;
mod crawl;
mod documents;
mod eid;
mod errors;
mod ingest;
mod semantic;
mod sources;
#[cfg(test)]
mod tests;
mod web;

use cli::{Command, VaultArgs};
use client::ApiClient;
use config::Config;
use documents::{Document, Metadata};
use semantic::{SearchQuery, SearchResult};
use sources::{obsidian::ObsidianVault, DocumentSource, SourceRegistry};

const VAULT_SEARCH_THRESHOLD: f32 = 0.3;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn push_documents(config: &Config, client: &ApiClient, documents: Vec<Document>) {
    println!("Total documents to index: {}", documents.len());
    if documents.is_empty() {
        println!("No documents found!");
        return;
    }

    let report = ingest::push_in_batches(&documents, config.ingest.batch_size, |chunk| {
        client.index_batch(chunk)
    });

    println!("Indexing complete!");
    println!("  Indexed: {}", report.indexed);
    println!("  Errors:  {}", report.errors);

    match client.stats() {
        Ok(stats) => println!(
            "Collection {:?}: {} documents",
            stats.collection_name, stats.total_documents
        ),
        Err(err) => log::warn!("could not fetch collection stats: {err}"),
    }
}

fn print_ranked(results: &[SearchResult]) {
    println!("Found {} results:\n", results.len());
    for (i, result) in results.iter().enumerate() {
        let file_path = result
            .metadata
            .get("file_path")
            .and_then(|v| v.as_str())
            .unwrap_or("N/A");
        let tags: Vec<&str> = result
            .metadata
            .get("tags")
            .and_then(|v| v.as_array())
            .map(|tags| tags.iter().filter_map(|t| t.as_str()).collect())
            .unwrap_or_default();

        println!("{}. {} (score: {:.3})", i + 1, result.title, result.score);
        println!("   Path: {file_path}");
        println!("   Tags: {}", tags.join(", "));
        println!("   Preview: {}...", documents::truncate_chars(&result.text, 100));
        println!("   URL: {}\n", result.url);
    }
}

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    init_logging();

    let config = Config::load()?;

    if let Command::Serve {} = args.command {
        return web::start_daemon(config);
    }

    let client = ApiClient::new(&config.ingest.api_url, config.ingest_timeout())?;
    log::debug!("using api at {}", client.base_url());

    match args.command {
        Command::Serve {} => Ok(()),

        Command::Index { dir, sources } => {
            let registry = SourceRegistry::new();
            let names: Vec<String> = if sources.is_empty() {
                SourceRegistry::default_names()
                    .into_iter()
                    .map(str::to_string)
                    .collect()
            } else {
                sources
            };

            println!("Indexing directory: {}", dir.display());
            println!("Data sources: {}", names.join(", "));

            let mut documents = vec![];
            for name in &names {
                match registry.get(name) {
                    Some(source) => documents.extend(source.extract_documents(&dir)),
                    None => log::warn!(
                        "unknown source {name:?}, available: {}",
                        registry.names().join(", ")
                    ),
                }
            }

            push_documents(&config, &client, documents);
            Ok(())
        }

        Command::Vault { action } => match action {
            VaultArgs::Index {
                path,
                vault_name,
                include_hidden,
            } => {
                println!("Scanning vault: {}", path.display());
                let vault = ObsidianVault::new(vault_name, include_hidden);
                let documents = vault.extract_documents(&path);
                push_documents(&config, &client, documents);
                Ok(())
            }
            VaultArgs::Search { query, limit } => {
                let mut filter = Metadata::new();
                filter.insert("source".into(), "obsidian".into());

                let search = SearchQuery {
                    limit,
                    score_threshold: VAULT_SEARCH_THRESHOLD,
                    filter_metadata: Some(filter),
                    ..SearchQuery::new(query.clone())
                };
                let results = client.search(&search)?;

                println!("Search: {query:?}");
                print_ranked(&results);
                Ok(())
            }
        },

        Command::Crawl {
            url,
            max_depth,
            max_pages,
            any_domain,
        } => {
            let options = crawl::CrawlOptions {
                max_depth,
                max_pages,
                same_domain_only: !any_domain,
            };
            let http = reqwest::blocking::Client::builder()
                .timeout(crawl::FETCH_TIMEOUT)
                .build()
                .context("failed to build http client")?;

            let report = crawl::crawl(
                &url,
                &options,
                |page_url| crawl::fetch_page(&http, page_url),
                |doc| client.index(&doc).map(|_| ()),
            )?;

            println!(
                "Crawl complete. Visited {} pages, indexed {}, errors {}.",
                report.visited, report.indexed, report.errors
            );
            Ok(())
        }

        Command::Search {
            query,
            limit,
            threshold,
            filters,
            use_exa,
        } => {
            let filter_metadata: Option<Metadata> = if filters.is_empty() {
                None
            } else {
                Some(filters.into_iter().collect())
            };

            let search = SearchQuery {
                limit,
                score_threshold: threshold,
                filter_metadata,
                use_exa,
                ..SearchQuery::new(query)
            };
            let results = client.search(&search)?;
            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(())
        }

        Command::Stats {} => {
            let stats = client.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
    }
}
