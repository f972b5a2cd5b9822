/*!
 * Mount Table Parser
 * Reads the fstab-style text of /proc/self/mounts
 */

use crate::core::errors::{ReloadError, ReloadResult};
use crate::core::types::MountRecord;

/// Parse a whole mount table
///
/// Each line is `source target fstype [options freq passno]`. Blank lines
/// are skipped; a non-blank line with fewer than three fields is an error.
pub fn parse_mount_table(text: &str) -> ReloadResult<Vec<MountRecord>> {
    let mut records = Vec::new();

    for (number, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        records.push(parse_mount_line(line).ok_or_else(|| ReloadError::Malformed {
            line: number + 1,
            content: line.to_string(),
        })?);
    }

    Ok(records)
}

/// Parse one line, `None` if it lacks the three required fields
pub fn parse_mount_line(line: &str) -> Option<MountRecord> {
    let mut fields = line.split_ascii_whitespace();
    let source = fields.next()?;
    let target = fields.next()?;
    let fstype = fields.next()?;

    Some(MountRecord::new(
        unescape_field(source),
        unescape_field(target),
        unescape_field(fstype),
    ))
}

/// Decode the kernel's three-digit octal escapes (`\040` for space and so on)
pub fn unescape_field(field: &str) -> String {
    if !field.contains('\\') {
        return field.to_string();
    }

    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() && is_octal_escape(&bytes[i + 1..i + 4]) {
            let value = (bytes[i + 1] - b'0') as u32 * 64
                + (bytes[i + 2] - b'0') as u32 * 8
                + (bytes[i + 3] - b'0') as u32;
            if let Ok(byte) = u8::try_from(value) {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

#[inline]
fn is_octal_escape(digits: &[u8]) -> bool {
    digits.len() == 3 && digits.iter().all(|d| (b'0'..=b'7').contains(d))
}
