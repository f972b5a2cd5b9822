/*!
 * Edge-Triggered Proxy Backend
 * One-shot kqueue vnode watch used where no direct mount notification exists
 *
 * Watching a directory or device node is a heuristic: unrelated writes fire
 * it and some mounts never touch it. A fired one-shot registration is gone,
 * so it is re-registered before control returns to the caller.
 */

use super::traits::{EventSource, WaitOutcome};
use crate::core::errors::{WaitError, WaitResult};
use nix::errno::Errno;
use std::time::Duration;
use tracing::debug;

/// Node watched by default
pub const DEFAULT_PROXY_PATH: &str = "/dev";

/// Wait used when the caller passes no timeout
pub const DEFAULT_PROXY_TIMEOUT: Duration = Duration::from_secs(1);

const BACKEND: &str = "kqueue";

/// OS side of the proxy backend
pub trait OneShotQueue {
    /// Register (or re-register) the one-shot watch
    fn arm(&mut self) -> Result<(), Errno>;

    /// Wait for the watch to fire. `Ok(false)` on timeout.
    fn wait(&mut self, timeout: Duration) -> Result<bool, Errno>;

    fn release(&mut self) {}
}

pub struct EdgeTriggeredProxyBackend<Q> {
    queue: Q,
    rearms: u64,
}

impl<Q: OneShotQueue> EdgeTriggeredProxyBackend<Q> {
    /// Arm `queue` and wrap it
    pub fn with_queue(mut queue: Q) -> Result<Self, Errno> {
        queue.arm()?;
        Ok(Self { queue, rearms: 0 })
    }

    /// Re-registrations performed after a fire
    pub fn rearms(&self) -> u64 {
        self.rearms
    }
}

impl<Q: OneShotQueue> EventSource for EdgeTriggeredProxyBackend<Q> {
    fn wait_for_change(&mut self, timeout: Option<Duration>) -> WaitResult<WaitOutcome> {
        match self.queue.wait(timeout.unwrap_or(DEFAULT_PROXY_TIMEOUT)) {
            Ok(false) => Ok(WaitOutcome::TimedOut),
            Err(Errno::EINTR) => Ok(WaitOutcome::Interrupted),
            Err(source) => Err(WaitError::Failed {
                backend: BACKEND,
                source,
            }),
            Ok(true) => {
                self.queue.arm().map_err(|source| WaitError::Rearm {
                    backend: BACKEND,
                    source,
                })?;
                self.rearms += 1;
                debug!(rearms = self.rearms, "filesystem event detected, watch re-armed");
                Ok(WaitOutcome::Changed)
            }
        }
    }

    fn name(&self) -> &'static str {
        BACKEND
    }

    fn dumps_table_on_wake(&self) -> bool {
        true
    }

    fn release(&mut self) {
        self.queue.release();
    }
}

#[cfg(any(target_os = "freebsd", target_os = "macos"))]
pub use bsd::KqueueWatch;

#[cfg(any(target_os = "freebsd", target_os = "macos"))]
mod bsd {
    use super::{EdgeTriggeredProxyBackend, OneShotQueue, BACKEND};
    use crate::core::errors::{SetupError, SetupResult};
    use nix::errno::Errno;
    use nix::fcntl::{open, OFlag};
    use nix::libc;
    use nix::sys::event::{EventFilter, EventFlag, FilterFlag, KEvent, Kqueue};
    use nix::sys::stat::Mode;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
    use std::path::Path;
    use std::time::Duration;

    /// Kqueue plus the watched node's descriptor
    pub struct KqueueWatch {
        kq: Option<Kqueue>,
        node: Option<OwnedFd>,
    }

    impl KqueueWatch {
        pub fn open(path: &Path) -> SetupResult<Self> {
            let register = |source| SetupError::Register {
                backend: BACKEND,
                path: path.to_path_buf(),
                source,
            };

            let kq = Kqueue::new().map_err(register)?;
            let raw = open(path, OFlag::O_RDONLY | OFlag::O_CLOEXEC, Mode::empty())
                .map_err(register)?;
            // SAFETY: `open` just returned this descriptor and nothing else owns it.
            let node = unsafe { OwnedFd::from_raw_fd(raw) };

            Ok(Self {
                kq: Some(kq),
                node: Some(node),
            })
        }

        fn change(&self) -> Result<KEvent, Errno> {
            let node = self.node.as_ref().ok_or(Errno::EBADF)?;
            Ok(KEvent::new(
                node.as_raw_fd() as libc::uintptr_t,
                EventFilter::EVFILT_VNODE,
                EventFlag::EV_ADD | EventFlag::EV_ENABLE | EventFlag::EV_ONESHOT,
                FilterFlag::NOTE_WRITE
                    | FilterFlag::NOTE_EXTEND
                    | FilterFlag::NOTE_ATTRIB
                    | FilterFlag::NOTE_LINK
                    | FilterFlag::NOTE_RENAME
                    | FilterFlag::NOTE_REVOKE,
                0,
                0,
            ))
        }
    }

    impl OneShotQueue for KqueueWatch {
        fn arm(&mut self) -> Result<(), Errno> {
            let change = self.change()?;
            let kq = self.kq.as_ref().ok_or(Errno::EBADF)?;
            kq.kevent(&[change], &mut [], None)?;
            Ok(())
        }

        fn wait(&mut self, timeout: Duration) -> Result<bool, Errno> {
            let kq = self.kq.as_ref().ok_or(Errno::EBADF)?;
            let mut fired = [KEvent::new(
                0,
                EventFilter::EVFILT_VNODE,
                EventFlag::empty(),
                FilterFlag::empty(),
                0,
                0,
            )];
            let spec = libc::timespec {
                tv_sec: timeout.as_secs() as libc::time_t,
                tv_nsec: timeout.subsec_nanos() as libc::c_long,
            };
            let count = kq.kevent(&[], &mut fired, Some(spec))?;
            Ok(count > 0 && matches!(fired[0].filter(), Ok(EventFilter::EVFILT_VNODE)))
        }

        fn release(&mut self) {
            self.node = None;
            self.kq = None;
        }
    }

    impl EdgeTriggeredProxyBackend<KqueueWatch> {
        /// Register a one-shot vnode watch on `path`
        pub fn open(path: impl AsRef<Path>) -> SetupResult<Self> {
            let path = path.as_ref();
            let watch = KqueueWatch::open(path)?;
            Self::with_queue(watch).map_err(|source| SetupError::Register {
                backend: BACKEND,
                path: path.to_path_buf(),
                source,
            })
        }
    }
}
