/*!
 * Inotify Event Buffer
 * Decodes the variable-length records returned by read(2) on an inotify fd
 *
 * Layout per record, native byte order:
 *
 * ```text
 * i32 wd | u32 mask | u32 cookie | u32 len | name[len] (NUL padded)
 * ```
 *
 * Records are decoded at an accumulated offset that advances by exactly
 * `HEADER_SIZE + len`. Bytes of a record that did not arrive yet are kept
 * and completed by the next read.
 */

use crate::core::errors::RecordParseError;

/// Size of `struct inotify_event` without its name
pub const HEADER_SIZE: usize = 16;

/// Upper bound accepted for a declared name length
pub const MAX_NAME_LEN: usize = 4096;

pub const IN_MODIFY: u32 = 0x0000_0002;
pub const IN_Q_OVERFLOW: u32 = 0x0000_4000;
pub const IN_IGNORED: u32 = 0x0000_8000;

/// One decoded `inotify_event`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub wd: i32,
    pub mask: u32,
    pub cookie: u32,
    pub name: Option<String>,
}

impl RawEvent {
    pub fn new(wd: i32, mask: u32) -> Self {
        Self {
            wd,
            mask,
            cookie: 0,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[inline]
    pub fn has(&self, flag: u32) -> bool {
        self.mask & flag != 0
    }

    /// Encode in kernel layout, NUL padding the name to a multiple of 16 bytes
    pub fn encode(&self) -> Vec<u8> {
        let name = self.name.as_deref().unwrap_or("").as_bytes();
        let len = if name.is_empty() {
            0
        } else {
            (name.len() + 1).div_ceil(16) * 16
        };

        let mut out = Vec::with_capacity(HEADER_SIZE + len);
        out.extend_from_slice(&self.wd.to_ne_bytes());
        out.extend_from_slice(&self.mask.to_ne_bytes());
        out.extend_from_slice(&self.cookie.to_ne_bytes());
        out.extend_from_slice(&(len as u32).to_ne_bytes());
        out.extend_from_slice(name);
        out.resize(HEADER_SIZE + len, 0);
        out
    }
}

/// Result of feeding one read into the buffer
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Decoded {
    pub events: Vec<RawEvent>,
    /// Set when the rest of the read had to be discarded
    pub error: Option<RecordParseError>,
}

/// Stateful decoder carrying incomplete records between reads
#[derive(Debug, Default)]
pub struct EventBuffer {
    pending: Vec<u8>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes held back waiting for the rest of a record
    #[inline]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Append freshly read bytes and decode every complete record
    pub fn feed(&mut self, bytes: &[u8]) -> Decoded {
        let joined: Vec<u8>;
        let data: &[u8] = if self.pending.is_empty() {
            bytes
        } else {
            self.pending.extend_from_slice(bytes);
            joined = std::mem::take(&mut self.pending);
            &joined
        };

        let mut decoded = Decoded::default();
        let mut offset = 0;

        while offset < data.len() {
            let remaining = data.len() - offset;
            if remaining < HEADER_SIZE {
                break;
            }

            let header = &data[offset..offset + HEADER_SIZE];
            let declared = read_u32(header, 12);
            let name_len = declared as usize;
            if name_len > MAX_NAME_LEN {
                decoded.error = Some(RecordParseError::NameTooLong {
                    offset,
                    declared,
                    limit: MAX_NAME_LEN,
                });
                offset = data.len();
                break;
            }

            let record_len = HEADER_SIZE + name_len;
            if record_len > remaining {
                break;
            }

            let name = &data[offset + HEADER_SIZE..offset + record_len];
            decoded.events.push(RawEvent {
                wd: read_u32(header, 0) as i32,
                mask: read_u32(header, 4),
                cookie: read_u32(header, 8),
                name: decode_name(name),
            });
            offset += record_len;
        }

        self.pending = data[offset..].to_vec();
        decoded
    }

    /// Drop any partial record
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[inline]
fn read_u32(header: &[u8], at: usize) -> u32 {
    u32::from_ne_bytes([header[at], header[at + 1], header[at + 2], header[at + 3]])
}

fn decode_name(field: &[u8]) -> Option<String> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    if end == 0 {
        return None;
    }
    Some(String::from_utf8_lossy(&field[..end]).into_owned())
}
