/*!
 * Mount Table Sources
 * Platform readers for the current mount table
 */

use super::parse::parse_mount_table;
use crate::core::errors::{ReloadError, ReloadResult};
use crate::core::types::MountRecord;
use std::path::{Path, PathBuf};

/// Default Linux mount table
pub const PROC_MOUNTS: &str = "/proc/self/mounts";

/// Anything that can produce the current mount table
///
/// Implementations are read-only and may fail transiently.
pub trait MountTableSource {
    fn load(&mut self) -> ReloadResult<Vec<MountRecord>>;
}

impl<F> MountTableSource for F
where
    F: FnMut() -> ReloadResult<Vec<MountRecord>>,
{
    fn load(&mut self) -> ReloadResult<Vec<MountRecord>> {
        self()
    }
}

/// Reads an fstab-formatted table such as `/proc/self/mounts`
#[derive(Debug, Clone)]
pub struct ProcMountsSource {
    path: PathBuf,
}

impl ProcMountsSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for ProcMountsSource {
    fn default() -> Self {
        Self::new(PROC_MOUNTS)
    }
}

impl MountTableSource for ProcMountsSource {
    fn load(&mut self) -> ReloadResult<Vec<MountRecord>> {
        // Mount paths are raw bytes; non-UTF-8 bytes become U+FFFD
        let bytes = std::fs::read(&self.path).map_err(|source| ReloadError::Io {
            path: self.path.clone(),
            source,
        })?;
        parse_mount_table(&String::from_utf8_lossy(&bytes))
    }
}

/// Reads the table through `getmntinfo(3)`
#[cfg(any(target_os = "freebsd", target_os = "macos"))]
#[derive(Debug, Clone, Default)]
pub struct MntInfoSource;

#[cfg(any(target_os = "freebsd", target_os = "macos"))]
impl MntInfoSource {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(any(target_os = "freebsd", target_os = "macos"))]
impl MountTableSource for MntInfoSource {
    fn load(&mut self) -> ReloadResult<Vec<MountRecord>> {
        use nix::libc;
        use std::ffi::CStr;

        let mut mounts: *mut libc::statfs = std::ptr::null_mut();
        // SAFETY: getmntinfo points `mounts` at a libc-owned array of `count`
        // entries that stays valid until the next call on this thread.
        let count = unsafe { libc::getmntinfo(&mut mounts, libc::MNT_NOWAIT) };
        if count <= 0 || mounts.is_null() {
            return Err(ReloadError::Unavailable(format!(
                "getmntinfo: {}",
                nix::errno::Errno::last()
            )));
        }

        // SAFETY: see above; count was checked to be positive.
        let entries = unsafe { std::slice::from_raw_parts(mounts, count as usize) };
        let field = |raw: &[libc::c_char]| {
            // SAFETY: the kernel NUL-terminates these fixed-size name fields.
            unsafe { CStr::from_ptr(raw.as_ptr()) }
                .to_string_lossy()
                .into_owned()
        };

        Ok(entries
            .iter()
            .map(|m| {
                MountRecord::new(
                    field(&m.f_mntfromname[..]),
                    field(&m.f_mntonname[..]),
                    field(&m.f_fstypename[..]),
                )
            })
            .collect())
    }
}

/// The host's native mount table, selected once at startup
#[derive(Debug, Clone)]
pub enum SystemTable {
    Proc(ProcMountsSource),
    #[cfg(any(target_os = "freebsd", target_os = "macos"))]
    MntInfo(MntInfoSource),
}

impl SystemTable {
    /// Pick the native reader; `proc_path` is used where the table is a file
    pub fn detect(proc_path: impl Into<PathBuf>) -> Self {
        #[cfg(any(target_os = "freebsd", target_os = "macos"))]
        let table = {
            let _: PathBuf = proc_path.into();
            SystemTable::MntInfo(MntInfoSource::new())
        };

        #[cfg(not(any(target_os = "freebsd", target_os = "macos")))]
        let table = SystemTable::Proc(ProcMountsSource::new(proc_path));

        table
    }

    pub fn name(&self) -> &'static str {
        match self {
            SystemTable::Proc(_) => "proc-mounts",
            #[cfg(any(target_os = "freebsd", target_os = "macos"))]
            SystemTable::MntInfo(_) => "getmntinfo",
        }
    }
}

impl MountTableSource for SystemTable {
    fn load(&mut self) -> ReloadResult<Vec<MountRecord>> {
        match self {
            SystemTable::Proc(source) => source.load(),
            #[cfg(any(target_os = "freebsd", target_os = "macos"))]
            SystemTable::MntInfo(source) => source.load(),
        }
    }
}
