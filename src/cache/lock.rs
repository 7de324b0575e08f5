//! Cross-process lock over the credential store
//!
//! A single advisory lock file serializes every refresh. Waiters poll with
//! a randomized delay so processes started together do not retry in step.

use crate::config::schema::LockConfig;
use crate::error::{CachierError, CachierResult};
use rand::Rng;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Acquires the store lock
#[derive(Debug, Clone)]
pub struct LockCoordinator {
    path: PathBuf,
    timeout: Duration,
    backoff_min_ms: u64,
    backoff_max_ms: u64,
}

impl LockCoordinator {
    pub fn new(path: PathBuf, config: &LockConfig) -> Self {
        Self {
            path,
            timeout: config.timeout(),
            backoff_min_ms: config.backoff_min_ms,
            backoff_max_ms: config.backoff_max_ms.max(config.backoff_min_ms),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for exclusive ownership, giving up after the configured timeout
    pub async fn acquire(&self) -> CachierResult<LockGuard> {
        if let Some(parent) = self.path.parent() {
            ensure_lock_dir(parent).await?;
        }

        let started = Instant::now();
        let deadline = started + self.timeout;

        loop {
            match try_lock(&self.path, self.timeout) {
                Ok(Some(file)) => {
                    debug!("Acquired cache lock after {:?}", started.elapsed());
                    return Ok(LockGuard {
                        file: Some(file),
                        path: self.path.clone(),
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    return Err(CachierError::io(
                        format!("locking {}", self.path.display()),
                        e,
                    ))
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(CachierError::LockTimeout {
                    path: self.path.clone(),
                    waited: now - started,
                });
            }

            let delay = self.backoff().min(deadline - now);
            debug!("Cache lock busy, retrying in {:?}", delay);
            tokio::time::sleep(delay).await;
        }
    }

    fn backoff(&self) -> Duration {
        let millis = rand::thread_rng().gen_range(self.backoff_min_ms..=self.backoff_max_ms);
        Duration::from_millis(millis)
    }
}

async fn ensure_lock_dir(dir: &Path) -> CachierResult<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| CachierError::store_io(format!("creating {}", dir.display()), e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o700);
        tokio::fs::set_permissions(dir, perms)
            .await
            .map_err(|e| CachierError::store_io("setting lock dir permissions", e))?;
    }

    Ok(())
}

/// Exclusive ownership of the store lock; released on drop
#[derive(Debug)]
pub struct LockGuard {
    file: Option<File>,
    path: PathBuf,
}

impl LockGuard {
    /// Release explicitly. Dropping the guard has the same effect.
    pub fn release(mut self) {
        self.unlock();
    }

    fn unlock(&mut self) {
        if let Some(file) = self.file.take() {
            unlock(file, &self.path);
            debug!("Released cache lock");
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.unlock();
    }
}

#[cfg(unix)]
fn try_lock(path: &Path, _stale_after: Duration) -> std::io::Result<Option<File>> {
    use std::os::unix::io::AsRawFd;

    let file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;

    // SAFETY: the descriptor is owned by `file` and stays open for the call
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(Some(file));
    }

    let err = std::io::Error::last_os_error();
    match err.raw_os_error() {
        Some(code) if code == libc::EWOULDBLOCK || code == libc::EINTR => Ok(None),
        _ => Err(err),
    }
}

#[cfg(unix)]
fn unlock(file: File, _path: &Path) {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor is owned by `file`
    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

#[cfg(not(unix))]
fn try_lock(path: &Path, stale_after: Duration) -> std::io::Result<Option<File>> {
    try_create_lock(path, stale_after)
}

#[cfg(not(unix))]
fn unlock(file: File, path: &Path) {
    drop(file);
    let _ = std::fs::remove_file(path);
}

/// Lock by exclusive creation, for platforms without `flock`.
///
/// A process killed while holding the lock leaves the file behind, and
/// nothing else would ever remove it. A file older than `stale_after` (the
/// lock timeout, longer than any holder may keep it) is therefore removed
/// and creation retried once. Two waiters can both judge the same file
/// stale; the loser of the second `create_new` simply keeps waiting.
#[cfg(any(not(unix), test))]
fn try_create_lock(path: &Path, stale_after: Duration) -> std::io::Result<Option<File>> {
    match create_exclusive(path)? {
        Some(file) => Ok(Some(file)),
        None if is_stale(path, stale_after) => {
            debug!("Removing stale lock file {}", path.display());
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
            create_exclusive(path)
        }
        None => Ok(None),
    }
}

#[cfg(any(not(unix), test))]
fn create_exclusive(path: &Path) -> std::io::Result<Option<File>> {
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(file) => Ok(Some(file)),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(any(not(unix), test))]
fn is_stale(path: &Path, max_age: Duration) -> bool {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| age > max_age)
}
