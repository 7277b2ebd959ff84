use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::fits::{FitsHeader, HeaderSource, HeaderValue};

#[derive(Default)]
struct HeaderState {
    queued: HashMap<PathBuf, VecDeque<FitsHeader>>,
    fixed: HashMap<PathBuf, FitsHeader>,
    reads: HashMap<PathBuf, usize>,
}

/// Header source whose answers change between reads.
///
/// Queued headers are returned first, in order; after that the header
/// given to [`FlakyHeaders::set`] is returned every time. A path with
/// neither is unreadable.
#[derive(Clone, Default)]
pub struct FlakyHeaders {
    state: Arc<Mutex<HeaderState>>,
}

fn header_of(cards: &[(&str, HeaderValue)]) -> FitsHeader {
    let mut header = FitsHeader::new();
    for (key, value) in cards {
        header.insert(key, value.clone());
    }
    header
}

impl FlakyHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one read that sees a header without any cards of interest.
    pub fn push_missing(&self, path: &Path) {
        self.push(path, &[]);
    }

    pub fn push(&self, path: &Path, cards: &[(&str, HeaderValue)]) {
        self.state
            .lock()
            .unwrap()
            .queued
            .entry(path.to_path_buf())
            .or_default()
            .push_back(header_of(cards));
    }

    pub fn set(&self, path: &Path, cards: &[(&str, HeaderValue)]) {
        self.state
            .lock()
            .unwrap()
            .fixed
            .insert(path.to_path_buf(), header_of(cards));
    }

    pub fn reads(&self, path: &Path) -> usize {
        self.state
            .lock()
            .unwrap()
            .reads
            .get(path)
            .copied()
            .unwrap_or(0)
    }
}

impl HeaderSource for FlakyHeaders {
    fn read_header(&self, path: &Path) -> Result<FitsHeader> {
        let mut state = self.state.lock().unwrap();
        *state.reads.entry(path.to_path_buf()).or_default() += 1;

        if let Some(header) = state.queued.get_mut(path).and_then(VecDeque::pop_front) {
            return Ok(header);
        }
        state
            .fixed
            .get(path)
            .cloned()
            .ok_or_else(|| Error::fits(path, "no header"))
    }
}
