//! File helpers: atomic replacement and file name escaping
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Replace the contents of `path` with `content`, so readers see either the old or new file
pub(crate) fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    fs::create_dir_all(parent)?;
    let mut temp = tempfile::Builder::new()
        .prefix(".compass-tmp")
        .tempfile_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// Map an arbitrary id onto a file name
///
/// Bytes outside `[A-Za-z0-9._-]` are percent encoded, so distinct ids give distinct names.
pub(crate) fn escape_file_name(id: &str) -> String {
    let mut escaped = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-') {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("%{byte:02X}"));
        }
    }
    if escaped.is_empty() || escaped.chars().all(|c| c == '.') {
        // "", "." and ".." are not usable names
        escaped = escaped.replace('.', "%2E");
        escaped.insert_str(0, "%");
    }
    escaped
}
