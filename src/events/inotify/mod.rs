/*!
 * Polling File Backend
 * Watches the kernel-maintained mounts file for modification via inotify
 */

mod parser;

pub use parser::{
    Decoded, EventBuffer, RawEvent, HEADER_SIZE, IN_IGNORED, IN_MODIFY, IN_Q_OVERFLOW,
    MAX_NAME_LEN,
};

use super::traits::{EventSource, WaitOutcome};
use crate::core::errors::{WaitError, WaitResult};
use nix::errno::Errno;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Canonical mounts file watched by default
pub const DEFAULT_MOUNTS_FILE: &str = "/proc/mounts";

/// Initial read buffer: room for 1024 events with 16 name bytes each
pub const INITIAL_BUFFER_LEN: usize = 1024 * (HEADER_SIZE + 16);

/// The read buffer never grows past this
pub const MAX_BUFFER_LEN: usize = 64 * INITIAL_BUFFER_LEN;

const BACKEND: &str = "inotify";

/// OS side of the polling backend
pub trait NotifyReader {
    /// Wait until the descriptor is readable. `Ok(false)` on timeout.
    fn wait_readable(&mut self, timeout: Option<Duration>) -> Result<bool, Errno>;

    /// Read raw event bytes
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Errno>;

    fn release(&mut self) {}
}

/// Inotify-based backend
///
/// Only one watch is registered per reader, so every record except a queue
/// overflow belongs to the watched file.
pub struct PollingFileBackend<R> {
    reader: R,
    path: PathBuf,
    buffer: Vec<u8>,
    events: EventBuffer,
    parse_errors: u64,
}

impl<R: NotifyReader> PollingFileBackend<R> {
    pub fn with_reader(reader: R, path: impl Into<PathBuf>) -> Self {
        Self {
            reader,
            path: path.into(),
            buffer: vec![0; INITIAL_BUFFER_LEN],
            events: EventBuffer::new(),
            parse_errors: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current capacity of the read buffer
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Number of reads whose tail was discarded as malformed
    pub fn parse_errors(&self) -> u64 {
        self.parse_errors
    }

    fn read_available(&mut self) -> WaitResult<ReadStatus> {
        loop {
            match self.reader.read(&mut self.buffer) {
                Ok(0) | Err(Errno::EAGAIN) => return Ok(ReadStatus::Empty),
                Ok(n) => return Ok(ReadStatus::Bytes(n)),
                Err(Errno::EINTR) => return Ok(ReadStatus::Interrupted),
                // The next event does not fit; grow instead of dropping it
                Err(Errno::EINVAL) if self.buffer.len() < MAX_BUFFER_LEN => {
                    let grown = (self.buffer.len() * 2).min(MAX_BUFFER_LEN);
                    debug!(from = self.buffer.len(), to = grown, "growing inotify read buffer");
                    self.buffer.resize(grown, 0);
                }
                Err(source) => {
                    return Err(WaitError::Failed {
                        backend: BACKEND,
                        source,
                    })
                }
            }
        }
    }
}

enum ReadStatus {
    Bytes(usize),
    Empty,
    Interrupted,
}

impl<R: NotifyReader> EventSource for PollingFileBackend<R> {
    fn wait_for_change(&mut self, timeout: Option<Duration>) -> WaitResult<WaitOutcome> {
        match self.reader.wait_readable(timeout) {
            Ok(true) => {}
            Ok(false) => return Ok(WaitOutcome::TimedOut),
            Err(Errno::EINTR) => return Ok(WaitOutcome::Interrupted),
            Err(source) => {
                return Err(WaitError::Failed {
                    backend: BACKEND,
                    source,
                })
            }
        }

        let read = match self.read_available()? {
            ReadStatus::Bytes(n) => n,
            ReadStatus::Empty => return Ok(WaitOutcome::TimedOut),
            ReadStatus::Interrupted => return Ok(WaitOutcome::Interrupted),
        };

        let decoded = self.events.feed(&self.buffer[..read]);
        if let Some(error) = decoded.error {
            self.parse_errors += 1;
            warn!(error = %error, path = %self.path.display(), "discarding malformed inotify records");
        }

        let mut changed = false;
        for event in &decoded.events {
            if event.has(IN_IGNORED) {
                return Err(WaitError::WatchRemoved {
                    path: self.path.clone(),
                });
            }
            if event.has(IN_Q_OVERFLOW) {
                warn!("inotify queue overflowed, forcing a reload");
                changed = true;
            } else if event.has(IN_MODIFY) {
                changed = true;
            }
        }

        debug!(
            bytes = read,
            records = decoded.events.len(),
            pending = self.events.pending_len(),
            changed,
            "inotify read decoded"
        );

        Ok(if changed {
            WaitOutcome::Changed
        } else {
            WaitOutcome::TimedOut
        })
    }

    fn name(&self) -> &'static str {
        BACKEND
    }

    fn release(&mut self) {
        self.events.clear();
        self.reader.release();
    }
}

#[cfg(target_os = "linux")]
pub use linux::InotifyReader;

#[cfg(target_os = "linux")]
mod linux {
    use super::{NotifyReader, BACKEND};
    use crate::core::errors::{SetupError, SetupResult};
    use crate::events::poll::poll_one;
    use nix::errno::Errno;
    use nix::poll::PollFlags;
    use nix::sys::inotify::{AddWatchFlags, InitFlags, Inotify, WatchDescriptor};
    use std::os::fd::{AsFd, AsRawFd};
    use std::path::Path;
    use std::time::Duration;
    use tracing::debug;

    /// Non-blocking inotify descriptor with a single modify watch
    pub struct InotifyReader {
        inotify: Option<Inotify>,
        watch: Option<WatchDescriptor>,
    }

    impl InotifyReader {
        pub fn watch(path: &Path) -> SetupResult<Self> {
            let register = |source| SetupError::Register {
                backend: BACKEND,
                path: path.to_path_buf(),
                source,
            };

            let inotify =
                Inotify::init(InitFlags::IN_NONBLOCK | InitFlags::IN_CLOEXEC).map_err(register)?;
            let watch = inotify
                .add_watch(path, AddWatchFlags::IN_MODIFY)
                .map_err(register)?;

            debug!(path = %path.display(), "inotify watch registered");
            Ok(Self {
                inotify: Some(inotify),
                watch: Some(watch),
            })
        }
    }

    impl NotifyReader for InotifyReader {
        fn wait_readable(&mut self, timeout: Option<Duration>) -> Result<bool, Errno> {
            let inotify = self.inotify.as_ref().ok_or(Errno::EBADF)?;
            Ok(poll_one(inotify.as_fd(), PollFlags::POLLIN, timeout)?.is_some())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize, Errno> {
            let inotify = self.inotify.as_ref().ok_or(Errno::EBADF)?;
            nix::unistd::read(inotify.as_fd().as_raw_fd(), buf)
        }

        fn release(&mut self) {
            if let (Some(inotify), Some(watch)) = (self.inotify.as_ref(), self.watch.take()) {
                if let Err(e) = inotify.rm_watch(watch) {
                    debug!(error = %e, "inotify_rm_watch failed");
                }
            }
            self.inotify = None;
        }
    }

    impl Drop for InotifyReader {
        fn drop(&mut self) {
            self.release();
        }
    }
}

#[cfg(target_os = "linux")]
impl PollingFileBackend<InotifyReader> {
    /// Register an inotify modify watch on `path`
    pub fn open(path: impl AsRef<Path>) -> crate::core::errors::SetupResult<Self> {
        let path = path.as_ref();
        Ok(Self::with_reader(InotifyReader::watch(path)?, path))
    }
}
