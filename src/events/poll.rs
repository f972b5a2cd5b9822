/*!
 * Descriptor Polling
 * Single-descriptor poll(2) with an optional timeout
 */

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::os::fd::BorrowedFd;
use std::time::Duration;

/// Convert an optional timeout to poll's millisecond form, `None` blocks
pub(crate) fn poll_timeout(timeout: Option<Duration>) -> PollTimeout {
    match timeout {
        None => PollTimeout::NONE,
        Some(duration) => {
            let millis = i32::try_from(duration.as_millis()).unwrap_or(i32::MAX);
            PollTimeout::try_from(millis).unwrap_or(PollTimeout::MAX)
        }
    }
}

/// Wait for `interest` on one descriptor
///
/// Returns `None` on timeout, otherwise the reported events (which may
/// include `POLLERR`/`POLLHUP` even if not requested).
pub(crate) fn poll_one(
    fd: BorrowedFd<'_>,
    interest: PollFlags,
    timeout: Option<Duration>,
) -> Result<Option<PollFlags>, Errno> {
    let mut fds = [PollFd::new(fd, interest)];
    let ready = poll(&mut fds, poll_timeout(timeout))?;
    if ready == 0 {
        return Ok(None);
    }
    Ok(Some(fds[0].revents().unwrap_or(PollFlags::empty())))
}
