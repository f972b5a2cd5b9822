/*!
 * Kernel Monitor Backend
 * Dedicated mount-change channel: poll(2) on /proc/self/mountinfo
 *
 * The kernel flags the descriptor with POLLPRI|POLLERR whenever the mount
 * namespace changes. A positive wake must be acknowledged (rewind and drain)
 * before the table is reloaded, otherwise the same notification is
 * re-delivered immediately.
 */

use super::traits::{EventSource, WaitOutcome};
use crate::core::errors::{WaitError, WaitResult};
use nix::errno::Errno;
use std::time::Duration;
use tracing::debug;

/// Per-process mount table that carries the change notification
pub const DEFAULT_MOUNTINFO_FILE: &str = "/proc/self/mountinfo";

const BACKEND: &str = "mountinfo";

/// OS side of the kernel monitor backend
pub trait ChangeChannel {
    /// Wait for a pending notification. `Ok(false)` on timeout.
    fn poll(&mut self, timeout: Option<Duration>) -> Result<bool, Errno>;

    /// Consume the pending notification
    fn acknowledge(&mut self) -> Result<(), Errno>;

    fn release(&mut self) {}
}

pub struct KernelMonitorBackend<C> {
    channel: C,
    acknowledged: u64,
}

impl<C: ChangeChannel> KernelMonitorBackend<C> {
    pub fn with_channel(channel: C) -> Self {
        Self {
            channel,
            acknowledged: 0,
        }
    }

    /// Notifications consumed so far
    pub fn acknowledged(&self) -> u64 {
        self.acknowledged
    }
}

impl<C: ChangeChannel> EventSource for KernelMonitorBackend<C> {
    fn wait_for_change(&mut self, timeout: Option<Duration>) -> WaitResult<WaitOutcome> {
        match self.channel.poll(timeout) {
            Ok(false) => Ok(WaitOutcome::TimedOut),
            Err(Errno::EINTR) => Ok(WaitOutcome::Interrupted),
            Err(source) => Err(WaitError::Failed {
                backend: BACKEND,
                source,
            }),
            Ok(true) => {
                self.channel
                    .acknowledge()
                    .map_err(|source| WaitError::Acknowledge {
                        backend: BACKEND,
                        source,
                    })?;
                self.acknowledged += 1;
                debug!(acknowledged = self.acknowledged, "mount change acknowledged");
                Ok(WaitOutcome::Changed)
            }
        }
    }

    fn name(&self) -> &'static str {
        BACKEND
    }

    fn release(&mut self) {
        self.channel.release();
    }
}

#[cfg(target_os = "linux")]
pub use linux::MountinfoChannel;

#[cfg(target_os = "linux")]
mod linux {
    use super::{ChangeChannel, KernelMonitorBackend, BACKEND};
    use crate::core::errors::{SetupError, SetupResult};
    use crate::events::poll::poll_one;
    use nix::errno::Errno;
    use nix::fcntl::{open, OFlag};
    use nix::poll::PollFlags;
    use nix::sys::stat::Mode;
    use nix::unistd::{lseek, read, Whence};
    use std::os::fd::{AsFd, AsRawFd, FromRawFd, OwnedFd};
    use std::path::Path;
    use std::time::Duration;

    /// Read-only descriptor on a mountinfo file
    pub struct MountinfoChannel {
        fd: Option<OwnedFd>,
        scratch: Vec<u8>,
    }

    impl MountinfoChannel {
        pub fn open(path: &Path) -> SetupResult<Self> {
            let register = |source| SetupError::Register {
                backend: BACKEND,
                path: path.to_path_buf(),
                source,
            };

            let raw = open(path, OFlag::O_RDONLY | OFlag::O_CLOEXEC, Mode::empty())
                .map_err(register)?;
            // SAFETY: `open` just returned this descriptor and nothing else owns it.
            let fd = unsafe { OwnedFd::from_raw_fd(raw) };

            let mut channel = Self {
                fd: Some(fd),
                scratch: vec![0; 16 * 1024],
            };
            // Reading once records the current namespace event count as seen
            channel.acknowledge().map_err(register)?;
            Ok(channel)
        }
    }

    impl ChangeChannel for MountinfoChannel {
        fn poll(&mut self, timeout: Option<Duration>) -> Result<bool, Errno> {
            let fd = self.fd.as_ref().ok_or(Errno::EBADF)?;
            let ready = poll_one(fd.as_fd(), PollFlags::POLLPRI, timeout)?;
            Ok(ready.is_some_and(|flags| {
                flags.intersects(PollFlags::POLLPRI | PollFlags::POLLERR)
            }))
        }

        fn acknowledge(&mut self) -> Result<(), Errno> {
            let fd = self.fd.as_ref().ok_or(Errno::EBADF)?.as_raw_fd();
            lseek(fd, 0, Whence::SeekSet)?;
            loop {
                match read(fd, &mut self.scratch) {
                    Ok(0) => return Ok(()),
                    Ok(_) | Err(Errno::EINTR) => continue,
                    Err(e) => return Err(e),
                }
            }
        }

        fn release(&mut self) {
            self.fd = None;
        }
    }

    impl KernelMonitorBackend<MountinfoChannel> {
        /// Open the kernel change channel on `path`
        pub fn open(path: impl AsRef<Path>) -> SetupResult<Self> {
            Ok(Self::with_channel(MountinfoChannel::open(path.as_ref())?))
        }
    }
}
