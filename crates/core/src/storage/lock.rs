use anyhow::Context;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = ".pricewatch.lock";

/// Exclusive claim on a snapshot directory for the duration of one run.
///
/// Backed by an OS advisory lock on an open file, so it ends with the
/// process even when the process is killed. The file itself is left behind.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    file: File,
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to release run lock");
        }
    }
}

impl RunLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// `Ok(None)` when another live process already holds the directory.
pub fn try_acquire_run_lock(dir: &Path) -> anyhow::Result<Option<RunLock>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create snapshot dir {}", dir.display()))?;

    let path = dir.join(LOCK_FILE);
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .with_context(|| format!("failed to open run lock {}", path.display()))?;

    if let Err(err) = file.try_lock_exclusive() {
        if err.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
            return Ok(None);
        }
        return Err(err).with_context(|| format!("failed to lock {}", path.display()));
    }

    // Informational only; the OS lock is what excludes other runs.
    file.set_len(0)
        .and_then(|_| writeln!(file, "pid={} started_at={}", std::process::id(), chrono::Utc::now()))
        .with_context(|| format!("failed to write run lock {}", path.display()))?;

    Ok(Some(RunLock { path, file }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pricewatch-lock-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn second_acquire_fails_until_release() {
        let dir = temp_dir("release");

        let first = try_acquire_run_lock(&dir).unwrap();
        assert!(first.is_some());
        assert!(try_acquire_run_lock(&dir).unwrap().is_none());

        drop(first);
        let again = try_acquire_run_lock(&dir).unwrap();
        assert!(again.is_some());

        drop(again);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn lock_file_left_by_a_dead_run_does_not_block() {
        let dir = temp_dir("stale");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(LOCK_FILE), "pid=999999 started_at=2026-01-27 21:30:00 UTC\n").unwrap();

        let lock = try_acquire_run_lock(&dir).unwrap().expect("stale lock file must be reclaimed");
        let contents = std::fs::read_to_string(lock.path()).unwrap();
        assert!(contents.starts_with(&format!("pid={} ", std::process::id())));

        drop(lock);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn lock_ends_with_the_holding_handle() {
        let dir = temp_dir("handle");
        std::fs::create_dir_all(&dir).unwrap();

        // A handle that never runs RunLock's Drop, like a killed worker's.
        let holder = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))
            .unwrap();
        holder.try_lock_exclusive().unwrap();
        assert!(try_acquire_run_lock(&dir).unwrap().is_none());

        drop(holder);
        assert!(try_acquire_run_lock(&dir).unwrap().is_some());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
