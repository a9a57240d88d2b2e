//! Per-run JSON output files
//!
//! Each run writes one combined array of every record plus one array per
//! site, all stamped with the run's start time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::domain::product::ProductRecord;

fn run_stamp(started_at: DateTime<Utc>) -> String {
    started_at.format("%Y%m%d_%H%M%S").to_string()
}

/// Write the combined and per-site JSON arrays. Returns the written paths.
pub async fn write_run_outputs(
    records: &[ProductRecord],
    output_dir: &Path,
    started_at: DateTime<Utc>,
) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("failed to create output dir {}", output_dir.display()))?;

    let stamp = run_stamp(started_at);
    let mut written = Vec::new();

    let combined = output_dir.join(format!("products_{stamp}.json"));
    write_json(&combined, records).await?;
    written.push(combined);

    let mut by_site: BTreeMap<&str, Vec<&ProductRecord>> = BTreeMap::new();
    for record in records {
        by_site.entry(record.site_id.as_str()).or_default().push(record);
    }
    for (site_id, site_records) in by_site {
        let path = output_dir.join(format!("{site_id}_{stamp}.json"));
        write_json(&path, &site_records).await?;
        written.push(path);
    }

    info!(files = written.len(), "run outputs written");
    Ok(written)
}

async fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let body = serde_json::to_vec_pretty(value).context("failed to serialize run output")?;
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
