//! Output persistence: one pretty-printed JSON array per found table.
//!
//! Writes are atomic (temp file + rename) so a crash mid-write never leaves a
//! truncated artifact where a previous run's complete one used to be.

use crate::error::ScrapeError;
use crate::output::Record;
use std::io;
use std::path::Path;
use tracing::debug;

/// Create the output directory (and parents) if absent.
///
/// Called once from the run's setup phase, before any browser work.
pub async fn ensure_output_dir(dir: &Path) -> Result<(), ScrapeError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ScrapeError::OutputDirFailed {
            path: dir.to_path_buf(),
            source: e,
        })
}

/// Serialise `records` as a 2-space indented JSON array and write it to
/// `path` atomically.
pub async fn write_records(path: &Path, records: &[Record]) -> io::Result<()> {
    let json = serde_json::to_string_pretty(records)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    write_atomic(path, json.as_bytes()).await?;
    debug!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

/// Write raw bytes (screenshots) atomically.
pub async fn write_bytes(path: &Path, bytes: &[u8]) -> io::Result<()> {
    write_atomic(path, bytes).await
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = Path::new(&tmp_name);

    tokio::fs::write(tmp_path, bytes).await?;
    if let Err(e) = tokio::fs::rename(tmp_path, path).await {
        let _ = tokio::fs::remove_file(tmp_path).await;
        return Err(e);
    }
    Ok(())
}
