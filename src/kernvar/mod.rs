//! Access to kernel tunables exposed through `/proc` and `/sys`.
//!
//! Parameters are addressed the way the kernel trees lay them out: a directory
//! prefix (with trailing `/`) and a file name, e.g. `("/proc/sys/kernel/",
//! "sched_rt_runtime_us")`.
mod cpumask;
mod error;
mod version;

pub use cpumask::{format_cpumask, parse_cpumask};
pub use error::{Error, Result};
pub use version::{KernelVersion, check_kernel};

use std::io::Write;
use std::path::PathBuf;

use crate::fsutil;

/// Maximum length of `prefix + name`, including the terminating byte kept by
/// the kernel interface.
const MAX_PATH_LEN: usize = 128;

/// Key-value access to kernel virtual file system parameters.
pub trait KernelVars: Send + Sync {
    /// Reads a parameter, stripping the trailing newline.
    fn read_param(&self, prefix: &str, name: &str) -> Result<String>;

    /// Writes `value` to a parameter and returns the number of bytes written.
    ///
    /// With `dry_run` set nothing is written and the length of `value` is
    /// returned.
    fn write_param(&self, prefix: &str, name: &str, value: &str, dry_run: bool) -> Result<usize>;
}

/// [`KernelVars`] operating directly on the file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsKernelVars;

impl FsKernelVars {
    fn param_path(prefix: &str, name: &str) -> Result<PathBuf> {
        if name.is_empty() {
            return Err(Error::EmptyName);
        }
        if prefix.len() + name.len() + 1 > MAX_PATH_LEN {
            return Err(Error::PathTooLong {
                prefix: prefix.to_owned(),
                name: name.to_owned(),
                max: MAX_PATH_LEN,
            });
        }
        Ok(PathBuf::from(format!("{prefix}{name}")))
    }
}

impl KernelVars for FsKernelVars {
    fn read_param(&self, prefix: &str, name: &str) -> Result<String> {
        let path = Self::param_path(prefix, name)?;
        let mut value = fsutil::read_file(&path)?;
        if value.is_empty() {
            return Err(Error::Empty { path });
        }
        if value.ends_with('\n') {
            value.pop();
        }
        log::trace!("read `{}` = `{}`", path.display(), value);
        Ok(value)
    }

    fn write_param(&self, prefix: &str, name: &str, value: &str, dry_run: bool) -> Result<usize> {
        let path = Self::param_path(prefix, name)?;
        if dry_run {
            log::debug!("dry run, skipping write of `{value}` to `{}`", path.display());
            return Ok(value.len());
        }
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|source| Error::Write {
                path: path.clone(),
                source,
            })?;
        file.write_all(value.as_bytes())
            .map_err(|source| Error::Write {
                path: path.clone(),
                source,
            })?;
        log::debug!("wrote `{}` = `{}`", path.display(), value);
        Ok(value.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix_of(dir: &tempfile::TempDir) -> String {
        format!("{}/", dir.path().display())
    }

    #[test]
    fn test_read_param_strips_newline() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sched_rt_runtime_us"), "950000\n").unwrap();
        let value = FsKernelVars
            .read_param(&prefix_of(&dir), "sched_rt_runtime_us")
            .unwrap();
        assert_eq!(value, "950000");
    }

    #[test]
    fn test_read_param_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("empty"), "").unwrap();
        let err = FsKernelVars.read_param(&prefix_of(&dir), "empty").unwrap_err();
        assert!(matches!(err, Error::Empty { .. }));
    }

    #[test]
    fn test_read_param_missing_sets_os_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsKernelVars.read_param(&prefix_of(&dir), "missing").unwrap_err();
        assert!(matches!(err, Error::Read(_)));
        assert_eq!(err.raw_os_error(), Some(2));
    }

    #[test]
    fn test_write_param() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cpuset.cpus");
        std::fs::write(&path, "").unwrap();
        let written = FsKernelVars
            .write_param(&prefix_of(&dir), "cpuset.cpus", "0-3", false)
            .unwrap();
        assert_eq!(written, 3);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "0-3");
    }

    #[test]
    fn test_write_param_dry_run_has_no_effect() {
        let dir = tempfile::tempdir().unwrap();
        let written = FsKernelVars
            .write_param(&prefix_of(&dir), "not_there", "performance", true)
            .unwrap();
        assert_eq!(written, "performance".len());
        assert!(!dir.path().join("not_there").exists());
    }

    #[test]
    fn test_write_param_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsKernelVars
            .write_param(&prefix_of(&dir), "not_there", "1", false)
            .unwrap_err();
        assert!(matches!(err, Error::Write { .. }));
    }

    #[test]
    fn test_param_path_limits() {
        let long = "x".repeat(MAX_PATH_LEN);
        assert!(matches!(
            FsKernelVars.read_param("/proc/", &long),
            Err(Error::PathTooLong { .. })
        ));
        assert!(matches!(
            FsKernelVars.read_param("/proc/", ""),
            Err(Error::EmptyName)
        ));
    }

    #[test]
    fn test_dry_run_validates_path() {
        let long = "x".repeat(MAX_PATH_LEN);
        assert!(matches!(
            FsKernelVars.write_param("/proc/", &long, "1", true),
            Err(Error::PathTooLong { .. })
        ));
        assert!(matches!(
            FsKernelVars.write_param("/proc/", "", "1", true),
            Err(Error::EmptyName)
        ));
    }
}
