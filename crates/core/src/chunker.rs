//! Client-side chunk encoder
//!
//! Turns the requested input sources into a lazy, ordered sequence of
//! [`SendData`] chunks, each built from at most `limit` units of source data
//! (characters for literal text, bytes for everything else). Sources are
//! drained in the order they were pushed. Nothing is read until the caller
//! pulls the next chunk, so an interactive source only blocks at a chunk
//! boundary and the caller controls pacing by sending each chunk before
//! asking for the next.
//!
//! The sequence is fused: after the first error no more chunks are produced.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use crate::escape::expand_escapes;
use crate::error::Result;
use crate::types::SendData;

/// End-of-transmission (Ctrl-D) in interactive input
const EOT: u8 = 0x04;

/// How a byte stream is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// Live terminal: text chunks, Ctrl-D terminates
    Interactive,
    /// Pipe or redirect: raw binary chunks until EOF
    Pipe,
}

enum Source {
    Text { text: String, pos: usize },
    File { path: PathBuf, file: Option<File> },
    Stream {
        reader: Box<dyn Read + Send>,
        mode: StreamMode,
        pending: Vec<u8>,
        done: bool,
    },
    Keys(VecDeque<String>),
}

/// Pull-based chunk sequence over one or more input sources
pub struct ChunkEncoder {
    limit: usize,
    sources: VecDeque<Source>,
    failed: bool,
}

impl ChunkEncoder {
    /// Create an empty encoder with the given per-chunk limit
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            sources: VecDeque::new(),
            failed: false,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Queue literal text; escapes are expanded immediately
    pub fn push_text(&mut self, text: &str) -> Result<&mut Self> {
        let text = expand_escapes(text)?;
        self.sources.push_back(Source::Text { text, pos: 0 });
        Ok(self)
    }

    /// Queue a file, sent verbatim as binary. Opened on first pull.
    pub fn push_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.sources.push_back(Source::File {
            path: path.into(),
            file: None,
        });
        self
    }

    /// Queue a byte stream such as stdin
    pub fn push_stream(&mut self, reader: impl Read + Send + 'static, mode: StreamMode) -> &mut Self {
        self.sources.push_back(Source::Stream {
            reader: Box::new(reader),
            mode,
            pending: Vec::new(),
            done: false,
        });
        self
    }

    /// Queue key events, one chunk per key spec
    pub fn push_keys<I, S>(&mut self, keys: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: VecDeque<String> = keys.into_iter().map(Into::into).collect();
        if !keys.is_empty() {
            self.sources.push_back(Source::Keys(keys));
        }
        self
    }

    fn next_from_front(&mut self) -> Option<Result<SendData>> {
        let limit = self.limit;
        while let Some(source) = self.sources.front_mut() {
            let next = match source {
                Source::Text { text, pos } => next_text(text, pos, limit).map(Ok),
                Source::File { path, file } => next_file(path, file, limit).transpose(),
                Source::Stream { reader, mode: StreamMode::Pipe, .. } => {
                    read_block(reader.as_mut(), limit)
                        .map(|block| (!block.is_empty()).then(|| SendData::Binary(block)))
                        .transpose()
                }
                Source::Stream { reader, mode: StreamMode::Interactive, pending, done } => {
                    next_interactive(reader.as_mut(), pending, done, limit).transpose()
                }
                Source::Keys(keys) => keys.pop_front().map(|k| Ok(SendData::KeyEvent(k))),
            };
            match next {
                Some(item) => return Some(item),
                None => {
                    self.sources.pop_front();
                }
            }
        }
        None
    }
}

impl Iterator for ChunkEncoder {
    type Item = Result<SendData>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.next_from_front();
        if let Some(Err(e)) = &item {
            tracing::debug!("Chunk sequence aborted: {}", e);
            self.failed = true;
            self.sources.clear();
        }
        item
    }
}

fn next_text(text: &str, pos: &mut usize, limit: usize) -> Option<SendData> {
    let rest = &text[*pos..];
    if rest.is_empty() {
        return None;
    }
    let end = rest.char_indices().nth(limit).map(|(i, _)| i).unwrap_or(rest.len());
    *pos += end;
    Some(SendData::Text(rest[..end].to_string()))
}

fn next_file(path: &Path, file: &mut Option<File>, limit: usize) -> Result<Option<SendData>> {
    if file.is_none() {
        tracing::debug!("Opening {} for sending", path.display());
        *file = Some(File::open(path)?);
    }
    let Some(f) = file.as_mut() else {
        return Ok(None);
    };
    let block = read_block(f, limit)?;
    Ok((!block.is_empty()).then(|| SendData::Binary(block)))
}

/// Read up to `limit` bytes, stopping early only at EOF
fn read_block(reader: &mut dyn Read, limit: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; limit];
    let mut filled = 0;
    while filled < limit {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    buf.truncate(filled);
    Ok(buf)
}

/// One interactive read, decoded as text
///
/// A UTF-8 sequence cut off by the read boundary is held back and prefixed
/// to the next read. Reader returning 0 bytes (EOF or idle timeout) or an
/// EOT byte ends the source without reading past it.
fn next_interactive(
    reader: &mut dyn Read,
    pending: &mut Vec<u8>,
    done: &mut bool,
    limit: usize,
) -> Result<Option<SendData>> {
    if *done {
        return Ok(None);
    }
    loop {
        let mut buf = vec![0u8; limit.saturating_sub(pending.len()).max(1)];
        let n = loop {
            match reader.read(&mut buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };

        if n == 0 {
            if pending.is_empty() {
                return Ok(None);
            }
            let text = String::from_utf8_lossy(pending).into_owned();
            pending.clear();
            return Ok(Some(SendData::Text(text)));
        }

        let mut data = std::mem::take(pending);
        data.extend_from_slice(&buf[..n]);

        let finished = match data.iter().position(|&b| b == EOT) {
            Some(at) => {
                data.truncate(at);
                true
            }
            None => false,
        };

        let text = match String::from_utf8(data) {
            Ok(text) => text,
            Err(e) => {
                let utf8 = e.utf8_error();
                let mut bytes = e.into_bytes();
                if utf8.error_len().is_none() && !finished {
                    *pending = bytes.split_off(utf8.valid_up_to());
                }
                String::from_utf8_lossy(&bytes).into_owned()
            }
        };

        if finished {
            *done = true;
            return Ok((!text.is_empty()).then(|| SendData::Text(text)));
        }
        if !text.is_empty() {
            return Ok(Some(SendData::Text(text)));
        }
    }
}
