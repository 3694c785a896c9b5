use crate::domain::snapshot::{DashboardSnapshot, NormalizedPoint};
use crate::pipeline::DashboardRun;
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub fn history_file_name(symbol: &str) -> String {
    format!("{symbol}_history.json")
}

/// Writes every history file, then the dashboard snapshot, so a reader that
/// sees the new snapshot also sees the matching histories.
pub async fn write_run(dir: &Path, dashboard_file: &str, run: &DashboardRun) -> anyhow::Result<PathBuf> {
    run.snapshot.validate()?;

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create snapshot dir {}", dir.display()))?;

    for (symbol, history) in &run.histories {
        write_history(dir, symbol, history).await?;
    }

    write_snapshot(dir, dashboard_file, &run.snapshot).await
}

pub async fn write_snapshot(
    dir: &Path,
    dashboard_file: &str,
    snapshot: &DashboardSnapshot,
) -> anyhow::Result<PathBuf> {
    snapshot.validate()?;
    let path = dir.join(dashboard_file);
    write_json_atomic(&path, snapshot).await?;
    Ok(path)
}

pub async fn write_history(
    dir: &Path,
    symbol: &str,
    history: &[NormalizedPoint],
) -> anyhow::Result<PathBuf> {
    anyhow::ensure!(!history.is_empty(), "history for {symbol} must be non-empty");
    let path = dir.join(history_file_name(symbol));
    write_json_atomic(&path, &history).await?;
    Ok(path)
}

/// `Ok(None)` when no snapshot has been written yet.
pub async fn load_snapshot(path: &Path) -> anyhow::Result<Option<DashboardSnapshot>> {
    let Some(snapshot) = read_json::<DashboardSnapshot>(path).await? else {
        return Ok(None);
    };
    snapshot
        .validate()
        .with_context(|| format!("invalid snapshot {}", path.display()))?;
    Ok(Some(snapshot))
}

pub async fn load_history(dir: &Path, symbol: &str) -> anyhow::Result<Option<Vec<NormalizedPoint>>> {
    read_json(&dir.join(history_file_name(symbol))).await
}

async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    let body = serde_json::to_vec_pretty(value)
        .with_context(|| format!("failed to serialize {}", path.display()))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, &body)
        .await
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("failed to move {} into place", path.display()))?;

    tracing::debug!(path = %path.display(), bytes = body.len(), "wrote json file");
    Ok(())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("failed to read {}", path.display())),
    };

    let value = serde_json::from_slice::<T>(&bytes)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(value))
}
