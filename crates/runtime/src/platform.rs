//! Platform streams
//!
//! The runtime never touches stdio directly. It writes through a `Platform`,
//! which the process-level embedding supplies: `StdPlatform` goes straight to
//! file descriptors 1 and 2 with `libc::write`, `CapturePlatform` keeps
//! everything in memory for tests and embedders.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{BufRead, Read, Write};

/// Output stream selector; the ids match the file descriptors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(Stream::Stdout),
            2 => Some(Stream::Stderr),
            _ => None,
        }
    }

    pub fn id(self) -> i64 {
        match self {
            Stream::Stdout => 1,
            Stream::Stderr => 2,
        }
    }
}

pub trait Platform {
    fn write(&self, stream: Stream, bytes: &[u8]);
    fn flush(&self, stream: Stream);
    /// Next input line with `\r\n` normalized to `\n`; `None` at end of input
    fn read_line(&self) -> Option<String>;
    /// Everything left on input
    fn read_all(&self) -> String;
    fn set_args(&self, args: Vec<String>);
    fn args(&self) -> Vec<String>;
}

/// Process stdio
pub struct StdPlatform {
    args: RefCell<Option<Vec<String>>>,
}

impl StdPlatform {
    pub fn new() -> Self {
        Self {
            args: RefCell::new(None),
        }
    }
}

impl Default for StdPlatform {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_line(mut line: String) -> String {
    if line.ends_with("\r\n") {
        line.truncate(line.len() - 2);
        line.push('\n');
    }
    line
}

impl Platform for StdPlatform {
    #[cfg(unix)]
    fn write(&self, stream: Stream, bytes: &[u8]) {
        // unbuffered, ordered with direct writes from compiled code
        let fd = stream.id() as libc::c_int;
        let mut rest = bytes;
        while !rest.is_empty() {
            let n = unsafe { libc::write(fd, rest.as_ptr() as *const libc::c_void, rest.len()) };
            if n <= 0 {
                break;
            }
            rest = &rest[n as usize..];
        }
    }

    #[cfg(not(unix))]
    fn write(&self, stream: Stream, bytes: &[u8]) {
        let _ = match stream {
            Stream::Stdout => std::io::stdout().write_all(bytes),
            Stream::Stderr => std::io::stderr().write_all(bytes),
        };
    }

    fn flush(&self, stream: Stream) {
        let _ = match stream {
            Stream::Stdout => std::io::stdout().flush(),
            Stream::Stderr => std::io::stderr().flush(),
        };
    }

    fn read_line(&self) -> Option<String> {
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(normalize_line(line)),
        }
    }

    fn read_all(&self) -> String {
        let mut out = String::new();
        let _ = std::io::stdin().lock().read_to_string(&mut out);
        out
    }

    fn set_args(&self, args: Vec<String>) {
        *self.args.borrow_mut() = Some(args);
    }

    /// Arguments handed over by `set_args`, else the process arguments
    fn args(&self) -> Vec<String> {
        match &*self.args.borrow() {
            Some(args) => args.clone(),
            None => std::env::args().collect(),
        }
    }
}

/// In-memory streams
#[derive(Default)]
pub struct CapturePlatform {
    stdout: RefCell<Vec<u8>>,
    stderr: RefCell<Vec<u8>>,
    input: RefCell<VecDeque<String>>,
    args: RefCell<Vec<String>>,
}

impl CapturePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the input side; lines keep their terminators
    pub fn with_input(input: &str) -> Self {
        let platform = Self::new();
        platform
            .input
            .borrow_mut()
            .extend(input.split_inclusive('\n').map(String::from));
        platform
    }

    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout.borrow()).into_owned()
    }

    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr.borrow()).into_owned()
    }
}

impl Platform for CapturePlatform {
    fn write(&self, stream: Stream, bytes: &[u8]) {
        match stream {
            Stream::Stdout => self.stdout.borrow_mut().extend_from_slice(bytes),
            Stream::Stderr => self.stderr.borrow_mut().extend_from_slice(bytes),
        }
    }

    fn flush(&self, _stream: Stream) {}

    fn read_line(&self) -> Option<String> {
        self.input.borrow_mut().pop_front().map(normalize_line)
    }

    fn read_all(&self) -> String {
        self.input.borrow_mut().drain(..).collect()
    }

    fn set_args(&self, args: Vec<String>) {
        *self.args.borrow_mut() = args;
    }

    fn args(&self) -> Vec<String> {
        self.args.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_ids() {
        assert_eq!(Stream::from_id(1), Some(Stream::Stdout));
        assert_eq!(Stream::from_id(2), Some(Stream::Stderr));
        assert_eq!(Stream::from_id(0), None);
        assert_eq!(Stream::Stderr.id(), 2);
    }

    #[test]
    fn test_capture_streams_are_separate() {
        let p = CapturePlatform::new();
        p.write(Stream::Stdout, b"out");
        p.write(Stream::Stderr, b"err");
        assert_eq!(p.stdout_string(), "out");
        assert_eq!(p.stderr_string(), "err");
    }

    #[test]
    fn test_read_line_normalizes_crlf() {
        let p = CapturePlatform::with_input("one\r\ntwo\nthree");
        assert_eq!(p.read_line().as_deref(), Some("one\n"));
        assert_eq!(p.read_line().as_deref(), Some("two\n"));
        assert_eq!(p.read_all(), "three");
        assert_eq!(p.read_line(), None);
    }

    #[test]
    fn test_args() {
        let p = CapturePlatform::new();
        assert!(p.args().is_empty());
        p.set_args(vec!["prog".into(), "x".into()]);
        assert_eq!(p.args(), vec!["prog", "x"]);

        let std = StdPlatform::new();
        std.set_args(vec!["a".into()]);
        assert_eq!(std.args(), vec!["a"]);
    }
}
