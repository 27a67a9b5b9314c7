//! Read-only access to source files.
//!
//! The content tree never inspects file contents itself: it asks this module
//! whether a file is text or binary and reads bytes through it at render
//! time.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Read buffer size for [`classify`].
const CHUNK_LEN: usize = 8 * 1024;

/// Classification of a content file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Text,
    Binary,
}

impl ResourceKind {
    pub fn is_text(self) -> bool {
        self == ResourceKind::Text
    }
}

/// Classify a file by streaming its contents.
///
/// A file is text when it contains no NUL byte and the whole file decodes
/// as UTF-8. Reading stops at the first byte that rules text out.
pub fn classify(path: &Path) -> io::Result<ResourceKind> {
    let mut file = File::open(path)?;
    let mut buf = [0u8; CHUNK_LEN];
    // bytes of a multi-byte sequence split across reads, kept at the front
    let mut carry = 0;

    loop {
        let n = file.read(&mut buf[carry..])?;
        if n == 0 {
            return Ok(if carry == 0 {
                ResourceKind::Text
            } else {
                ResourceKind::Binary
            });
        }
        let filled = carry + n;
        if buf[carry..filled].contains(&0) {
            return Ok(ResourceKind::Binary);
        }
        match std::str::from_utf8(&buf[..filled]) {
            Ok(_) => carry = 0,
            // error_len() == None means the chunk ended mid-sequence
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                buf.copy_within(valid..filled, 0);
                carry = filled - valid;
            }
            Err(_) => return Ok(ResourceKind::Binary),
        }
    }
}

/// Classify a whole file already in memory. Agrees with [`classify`].
pub fn classify_bytes(bytes: &[u8]) -> ResourceKind {
    if bytes.contains(&0) || std::str::from_utf8(bytes).is_err() {
        ResourceKind::Binary
    } else {
        ResourceKind::Text
    }
}

/// Read a whole source file.
pub fn read_bytes(path: &Path) -> io::Result<Vec<u8>> {
    std::fs::read(path)
}
