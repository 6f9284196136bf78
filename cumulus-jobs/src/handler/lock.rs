use super::{BoxHandler, Handler, Middleware};
use crate::Error;
use async_trait::async_trait;
use cumulus_core::{context::RunContext, paths};
use parking_lot::Mutex;
use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::Arc,
};

/// An exclusive lock held through a file in the state directory.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl FileLock {
    pub fn try_acquire(name: &str, path: &Path) -> Result<Self, Error> {
        let file = try_lock_file(path).map_err(|e| match e {
            LockFailure::Held | LockFailure::Stale => Error::LockContention {
                name: name.to_owned(),
                path: path.to_owned(),
            },
            LockFailure::Io(e) => Error::Lock(path.to_owned(), e),
        })?;
        tracing::debug!(path = %path.display(), "acquired lock");
        Ok(FileLock {
            path: path.to_owned(),
            file: Mutex::new(Some(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(&self) -> bool {
        let file = match self.file.lock().take() {
            Some(file) => file,
            None => return false,
        };
        release_file(file, &self.path);
        tracing::debug!(path = %self.path.display(), "released lock");
        true
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        self.release();
    }
}

enum LockFailure {
    Held,
    #[cfg_attr(not(unix), allow(dead_code))]
    Stale,
    Io(std::io::Error),
}

fn open_lock_file(path: &Path) -> Result<File, LockFailure> {
    std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(LockFailure::Io)
}

fn try_lock_file(path: &Path) -> Result<File, LockFailure> {
    loop {
        match lock_opened(open_lock_file(path)?, path) {
            Err(LockFailure::Stale) => continue,
            result => return result,
        }
    }
}

#[cfg(unix)]
fn lock_opened(file: File, path: &Path) -> Result<File, LockFailure> {
    use std::os::unix::io::AsRawFd;

    let ret = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if ret != 0 {
        let error = std::io::Error::last_os_error();
        return if error.raw_os_error() == Some(libc::EWOULDBLOCK) {
            Err(LockFailure::Held)
        } else {
            Err(LockFailure::Io(error))
        };
    }
    // the previous holder may have unlinked the file between our open and flock
    if is_linked_at(&file, path).map_err(LockFailure::Io)? {
        Ok(file)
    } else {
        Err(LockFailure::Stale)
    }
}

#[cfg(unix)]
fn is_linked_at(file: &File, path: &Path) -> std::io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let held = file.metadata()?;
    match std::fs::metadata(path) {
        Ok(current) => Ok(current.dev() == held.dev() && current.ino() == held.ino()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

// Unlinking before unlocking means nobody can lock this inode after us and
// still find it at `path`.
#[cfg(unix)]
fn release_file(file: File, path: &Path) {
    use std::os::unix::io::AsRawFd;

    remove_lock_file(path);
    unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };
}

#[cfg(not(unix))]
fn lock_opened(file: File, _path: &Path) -> Result<File, LockFailure> {
    match file.try_lock() {
        Ok(()) => Ok(file),
        Err(std::fs::TryLockError::WouldBlock) => Err(LockFailure::Held),
        Err(std::fs::TryLockError::Error(e)) => Err(LockFailure::Io(e)),
    }
}

// The OS drops the lock with the handle, so a crashed holder leaves a file
// that the next run can lock again.
#[cfg(not(unix))]
fn release_file(file: File, path: &Path) {
    drop(file);
    remove_lock_file(path);
}

fn remove_lock_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), "failed to remove lock file: {}", e);
        }
    }
}

struct ReleaseOnDrop(Arc<FileLock>);

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        self.0.release();
    }
}

struct AbortOnDrop(tokio::task::JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct Lock<C: Send + 'static> {
    state_dir: PathBuf,
    name: String,
    next: BoxHandler<C>,
}

#[async_trait]
impl<C: Send + 'static> Handler<C> for Lock<C> {
    async fn handle(&self, ctx: RunContext, cmd: C) -> Result<(), Error> {
        paths::ensure_state_dir(&self.state_dir).await?;
        let path = self.state_dir.join(format!("{}.lock", self.name));
        let lock = Arc::new(FileLock::try_acquire(&self.name, &path)?);
        let _release = ReleaseOnDrop(lock.clone());

        let _listener = {
            let lock = lock.clone();
            let cancellation = ctx.cancellation().clone();
            AbortOnDrop(tokio::spawn(async move {
                cancellation.cancelled().await;
                if lock.release() {
                    tracing::info!("released lock after interrupt");
                }
            }))
        };

        self.next.handle(ctx, cmd).await
    }
}

/// Holds `<name>.lock` in `state_dir` while the inner handler runs, or until
/// the context is cancelled.
pub fn with_lock<C: Send + 'static>(state_dir: PathBuf, name: impl Into<String>) -> Middleware<C> {
    let name = name.into();
    Box::new(move |next: BoxHandler<C>| {
        Box::new(Lock {
            state_dir,
            name,
            next,
        }) as BoxHandler<C>
    })
}
