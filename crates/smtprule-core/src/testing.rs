//! Table doubles and log capture for tests

use crate::table::{KeyKind, LookupError, Table};
use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Exact-match table that records every key it is queried with
#[derive(Debug)]
pub struct CountingTable {
    name: String,
    kinds: Vec<KeyKind>,
    keys: HashSet<String>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl CountingTable {
    pub fn new(name: &str, kind: KeyKind, keys: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            kinds: vec![kind],
            keys: keys.iter().map(|k| k.to_string()).collect(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

impl Table for CountingTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn kinds(&self) -> &[KeyKind] {
        &self.kinds
    }

    fn lookup(&self, key: &str, _kind: KeyKind) -> Result<bool, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(key.to_string());
        Ok(self.keys.contains(key))
    }
}

/// Table whose backend is always unavailable
#[derive(Debug)]
pub struct FailingTable {
    name: String,
    kinds: Vec<KeyKind>,
    calls: AtomicUsize,
}

impl FailingTable {
    pub fn new(name: &str, kind: KeyKind) -> Self {
        Self {
            name: name.to_string(),
            kinds: vec![kind],
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Table for FailingTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn kinds(&self) -> &[KeyKind] {
        &self.kinds
    }

    fn lookup(&self, _key: &str, _kind: KeyKind) -> Result<bool, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(LookupError("backend unavailable".to_string()))
    }
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a subscriber that records formatted events, returning them
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buffer.0.lock().unwrap()).into_owned();
    (result, logs)
}
