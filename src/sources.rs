//! `qa sources` and `qa clear`.

use anyhow::Result;

use crate::config::Config;
use crate::sqlite_store::SqliteRetriever;

pub async fn list_sources(config: &Config) -> Result<()> {
    let retriever = SqliteRetriever::connect(config).await?;
    let sources = retriever.sources().await?;
    retriever.close().await;

    if sources.is_empty() {
        println!("No documents indexed. Run `qa index <PATH>` first.");
        return Ok(());
    }

    println!("{:<48} CHUNKS", "SOURCE");
    for summary in &sources {
        println!("{:<48} {}", summary.source, summary.chunks);
    }
    Ok(())
}

pub async fn clear(config: &Config) -> Result<()> {
    let retriever = SqliteRetriever::connect(config).await?;
    let removed = retriever.clear().await?;
    retriever.close().await;

    println!("Cleared {} chunk(s) from the knowledge base.", removed);
    Ok(())
}
