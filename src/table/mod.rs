/*!
 * Mount Table Module
 * Snapshot materialization, table sources and diffing
 */

mod diff;
mod parse;
mod snapshot;
mod source;

pub use diff::compare;
pub use parse::{parse_mount_line, parse_mount_table, unescape_field};
pub use snapshot::{Snapshot, TableDump};
pub use source::{MountTableSource, ProcMountsSource, SystemTable, PROC_MOUNTS};

#[cfg(any(target_os = "freebsd", target_os = "macos"))]
pub use source::MntInfoSource;
