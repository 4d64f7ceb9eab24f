use crate::error::{MirrorError, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Exclusive advisory lock on a file, held until dropped. Used to keep two
/// processes from mirroring into the same tree at once.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
    file: File,
}

impl LockFile {
    pub fn try_acquire(path: &Path) -> Result<Option<Self>> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|err| MirrorError::io("creating lock directory", parent, err))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|err| MirrorError::io("opening lock file", path, err))?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                // Holder pid is informational only.
                let _ = file.set_len(0);
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Some(Self {
                    path: path.to_path_buf(),
                    file,
                }))
            }
            Err(err) if is_lock_held(&err) => Ok(None),
            Err(err) => Err(MirrorError::io("locking", path, err)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn is_lock_held(err: &std::io::Error) -> bool {
    if err.kind() == ErrorKind::WouldBlock {
        return true;
    }
    matches!(err.raw_os_error(), Some(33))
}

/// Non-blocking in-process single-flight flag.
#[derive(Debug, Default)]
pub struct RunFlag {
    running: AtomicBool,
}

impl RunFlag {
    pub fn try_enter(&self) -> Option<RunFlagGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunFlagGuard { flag: self })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct RunFlagGuard<'a> {
    flag: &'a RunFlag,
}

impl Drop for RunFlagGuard<'_> {
    fn drop(&mut self) {
        self.flag.running.store(false, Ordering::Release);
    }
}
