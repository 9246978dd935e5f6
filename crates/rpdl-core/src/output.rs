//! Delivering a successful fetch to the orchestrator.
//!
//! File output goes through a `.part` temp file that is renamed into place,
//! so the destination either holds the complete payload or is untouched.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::outcome::FetchResult;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Where the payload goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("{op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("write to stdout: {0}")]
    Stdout(#[source] io::Error),
}

/// Path for the temp file: appends `.part` to the final path (e.g. `a.png` → `a.png.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

fn mtime_to_system_time(mtime: i64) -> SystemTime {
    if mtime >= 0 {
        UNIX_EPOCH + Duration::from_secs(mtime as u64)
    } else {
        UNIX_EPOCH - Duration::from_secs(mtime.unsigned_abs())
    }
}

/// Writes the payload to `target`.
pub fn write_result(result: &FetchResult, target: &OutputTarget) -> Result<(), OutputError> {
    match target {
        OutputTarget::Stdout => {
            let mut out = io::stdout().lock();
            out.write_all(&result.data).map_err(OutputError::Stdout)?;
            out.flush().map_err(OutputError::Stdout)
        }
        OutputTarget::File(path) => write_file(result, path),
    }
}

fn write_file(result: &FetchResult, path: &Path) -> Result<(), OutputError> {
    let io_err = |op: &'static str, path: &Path| {
        let path = path.to_path_buf();
        move |source| OutputError::Io { op, path, source }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err("create directory", parent))?;
    }

    let tmp = temp_path(path);
    let written = (|| -> Result<(), OutputError> {
        let mut file = File::create(&tmp).map_err(io_err("create", &tmp))?;
        file.write_all(&result.data).map_err(io_err("write", &tmp))?;
        if let Some(mtime) = result.mtime {
            file.set_modified(mtime_to_system_time(mtime))
                .map_err(io_err("set mtime on", &tmp))?;
        }
        file.sync_all().map_err(io_err("sync", &tmp))
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    fs::rename(&tmp, path).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        OutputError::Io {
            op: "rename into",
            path: path.to_path_buf(),
            source,
        }
    })?;

    tracing::debug!(path = %path.display(), bytes = result.data.len(), "payload written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_path_appends_part() {
        let p = temp_path(Path::new("cover.png"));
        assert_eq!(p.to_string_lossy(), "cover.png.part");
        let p2 = temp_path(Path::new("/tmp/cache/a.bin"));
        assert_eq!(p2.to_string_lossy(), "/tmp/cache/a.bin.part");
    }

    #[test]
    fn writes_file_and_stamps_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cover.png");
        let result = FetchResult {
            data: b"\x89PNG payload".to_vec(),
            mtime: Some(1_577_836_800),
        };

        write_result(&result, &OutputTarget::File(path.clone())).unwrap();

        assert_eq!(fs::read(&path).unwrap(), result.data);
        assert!(!temp_path(&path).exists());
        let modified = fs::metadata(&path).unwrap().modified().unwrap();
        assert_eq!(
            modified.duration_since(UNIX_EPOCH).unwrap().as_secs(),
            1_577_836_800
        );
    }

    #[test]
    fn replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        fs::write(&path, b"old contents that are longer").unwrap();
        let result = FetchResult {
            data: b"new".to_vec(),
            mtime: None,
        };
        write_result(&result, &OutputTarget::File(path.clone())).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn failure_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // Destination is an existing directory: rename must fail.
        let path = dir.path().join("occupied");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), b"x").unwrap();
        let result = FetchResult {
            data: b"data".to_vec(),
            mtime: None,
        };
        let err = write_result(&result, &OutputTarget::File(path.clone())).unwrap_err();
        assert!(matches!(err, OutputError::Io { op: "rename into", .. }));
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn negative_mtime_is_before_epoch() {
        assert!(mtime_to_system_time(-10) < UNIX_EPOCH);
        assert_eq!(mtime_to_system_time(0), UNIX_EPOCH);
    }
}
