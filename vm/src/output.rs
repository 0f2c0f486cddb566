//! Destinations for program output and diagnostics.

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

/// Where `print`/`println` and error reports end up.
///
/// The VM holds two of these, `output` and `errors`, so program text and
/// diagnostics never share a channel. `Buffer` captures bytes in memory
/// for tests and embedders.
#[derive(Debug, Clone)]
pub enum Output {
    Stdout,
    Stderr,
    Buffer(Arc<Mutex<Vec<u8>>>),
}

impl Output {
    /// A fresh in-memory sink plus a handle for reading it back.
    pub fn buffer() -> (Self, Arc<Mutex<Vec<u8>>>) {
        let shared = Arc::new(Mutex::new(Vec::new()));
        (Output::Buffer(shared.clone()), shared)
    }

    pub fn write_str(&self, text: &str) -> io::Result<()> {
        match self {
            Output::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(text.as_bytes())?;
                out.flush()
            }
            Output::Stderr => io::stderr().lock().write_all(text.as_bytes()),
            Output::Buffer(buf) => {
                buf.lock().extend_from_slice(text.as_bytes());
                Ok(())
            }
        }
    }

    /// Contents captured so far; empty for the process streams.
    pub fn contents(&self) -> String {
        match self {
            Output::Buffer(buf) => String::from_utf8_lossy(&buf.lock()).into_owned(),
            _ => String::new(),
        }
    }
}
