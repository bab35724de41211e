//! Streaming domain-list input.
//!
//! Domains are read lazily, one per line, so the dispatcher can start work
//! before the whole list has been read and memory stays flat for big lists.

use crate::error::BulkDnsError;
use futures::stream::{self, Stream};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// Stream the domains found in `reader`, one per line.
///
/// Blank lines and `#` comments are skipped and surrounding whitespace is
/// trimmed. Bytes that are not UTF-8 are replaced with U+FFFD, which the
/// executor then reports as an invalid name for that domain alone. A read
/// error is yielded once as [`BulkDnsError::InputError`] and ends the
/// stream.
pub fn domain_lines<R>(reader: R) -> impl Stream<Item = Result<String, BulkDnsError>>
where
    R: AsyncBufRead + Unpin,
{
    stream::unfold(Some((reader.split(b'\n'), 0usize)), |state| async move {
        let (mut lines, mut line_no) = state?;
        loop {
            line_no += 1;
            match lines.next_segment().await {
                Ok(Some(raw)) => {
                    let line = decode_line(raw, line_no);
                    if let Some(domain) = domain_from_line(&line) {
                        return Some((Ok(domain), Some((lines, line_no))));
                    }
                }
                Ok(None) => return None,
                Err(e) => {
                    return Some((Err(BulkDnsError::input(line_no, e.to_string())), None));
                }
            }
        }
    })
}

/// Open a domain list for [`domain_lines`].
pub async fn open_domain_file<P: AsRef<Path>>(path: P) -> Result<BufReader<File>, BulkDnsError> {
    let path = path.as_ref();
    let file = File::open(path)
        .await
        .map_err(|e| BulkDnsError::file_error(path.to_string_lossy(), e.to_string()))?;
    Ok(BufReader::new(file))
}

fn decode_line(raw: Vec<u8>, line_no: usize) -> String {
    match String::from_utf8(raw) {
        Ok(line) => line,
        Err(e) => {
            tracing::warn!(line = line_no, "domain list line is not valid UTF-8");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    }
}

fn domain_from_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    // Inline comment
    let domain = line.split('#').next().unwrap_or("").trim();
    if domain.is_empty() {
        None
    } else {
        Some(domain.to_string())
    }
}
