//! Terminal input with an idle timeout
//!
//! A background thread does the blocking reads; the chunk encoder pulls
//! from [`TimedReader`], which reports end of input once no bytes arrived
//! for the configured timeout.

use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

const READ_BLOCK: usize = 1024;

/// [`Read`] adapter fed by a reader thread
pub struct TimedReader {
    rx: Receiver<io::Result<Vec<u8>>>,
    timeout: Option<Duration>,
    pending: Vec<u8>,
    done: bool,
}

impl TimedReader {
    /// Start reading `inner` on its own thread
    ///
    /// The thread stays blocked in `read` after a timeout; it ends with the
    /// process.
    pub fn spawn(mut inner: impl Read + Send + 'static, timeout: Option<Duration>) -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = [0u8; READ_BLOCK];
            loop {
                match inner.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(Ok(buf[..n].to_vec())).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            }
        });
        Self {
            rx,
            timeout,
            pending: Vec::new(),
            done: false,
        }
    }

    fn fill(&mut self) -> io::Result<()> {
        let next = match self.timeout {
            Some(timeout) => match self.rx.recv_timeout(timeout) {
                Ok(next) => Some(next),
                Err(RecvTimeoutError::Timeout) => {
                    tracing::debug!("No input for {:?}, finishing", timeout);
                    None
                }
                Err(RecvTimeoutError::Disconnected) => None,
            },
            None => self.rx.recv().ok(),
        };
        match next {
            Some(Ok(bytes)) => self.pending = bytes,
            Some(Err(e)) => {
                self.done = true;
                return Err(e);
            }
            None => self.done = true,
        }
        Ok(())
    }
}

impl Read for TimedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pending.is_empty() && !self.done {
            self.fill()?;
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    /// Yields its bytes, then blocks forever
    struct Stalls(Option<Vec<u8>>);

    impl Read for Stalls {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.take() {
                Some(bytes) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                None => loop {
                    thread::sleep(Duration::from_secs(3600));
                },
            }
        }
    }

    #[test]
    fn test_reads_until_eof() {
        let mut reader = TimedReader::spawn(io::Cursor::new(b"hello world".to_vec()), None);
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello world");
    }

    #[test]
    fn test_small_buffer_keeps_remainder() {
        let mut reader = TimedReader::spawn(io::Cursor::new(b"abcdef".to_vec()), None);
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_timeout_ends_input() {
        let timeout = Duration::from_millis(100);
        let mut reader = TimedReader::spawn(Stalls(Some(b"ls".to_vec())), Some(timeout));
        let started = Instant::now();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"ls");
        assert!(started.elapsed() >= timeout);
    }

    #[test]
    fn test_read_error_surfaces() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            }
        }
        let mut reader = TimedReader::spawn(Broken, None);
        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).unwrap_err().kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }
}
