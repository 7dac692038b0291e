//! Source: splits a byte stream into physical lines with bounded memory.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use bytes::Bytes;

/// Yields lines without their `\n` / `\r\n` terminator.
///
/// `max_line_length` counts characters. A line whose content exceeds
/// `4 * max_line_length` bytes cannot be within the limit; it is cut to
/// `4 * max_line_length + 1` bytes and the rest of it is skipped, so the
/// engine still sees it as too long without the reader ever buffering the
/// whole line.
pub struct LineSource<R> {
    reader: R,
    max_line_length: usize,
    done: bool,
}

impl LineSource<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>, max_line_length: usize) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file), max_line_length))
    }
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R, max_line_length: usize) -> Self {
        Self {
            reader,
            max_line_length,
            done: false,
        }
    }

    fn read_line(&mut self) -> io::Result<Option<Bytes>> {
        // a character is at most four bytes, plus room for "\r\n"
        let max_bytes = self.max_line_length.saturating_mul(4);
        let limit = max_bytes.saturating_add(2) as u64;
        let mut buf = Vec::new();

        let read = (&mut self.reader).take(limit).read_until(b'\n', &mut buf)?;
        if read == 0 {
            return Ok(None);
        }

        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        } else if buf.len() as u64 == limit {
            buf.truncate(max_bytes.saturating_add(1));
            self.skip_rest_of_line()?;
        }

        Ok(Some(Bytes::from(buf)))
    }

    fn skip_rest_of_line(&mut self) -> io::Result<()> {
        loop {
            let available = self.reader.fill_buf()?;
            if available.is_empty() {
                return Ok(());
            }
            match available.iter().position(|&b| b == b'\n') {
                Some(idx) => {
                    self.reader.consume(idx + 1);
                    return Ok(());
                }
                None => {
                    let len = available.len();
                    self.reader.consume(len);
                }
            }
        }
    }
}

impl<R: BufRead> Iterator for LineSource<R> {
    type Item = io::Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_line() {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
