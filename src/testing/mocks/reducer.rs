use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::reduce::Reducer;
use crate::subprocess::ProcessError;

#[derive(Default)]
struct ReducerState {
    reduce_calls: Vec<(PathBuf, bool)>,
    bias_calls: Vec<PathBuf>,
    flat_calls: Vec<(PathBuf, bool)>,
    outputs: HashMap<PathBuf, Vec<PathBuf>>,
    failing: HashSet<PathBuf>,
    fail_masters: bool,
}

/// Records every call; returns configured outputs (none by default).
#[derive(Clone, Default)]
pub struct MockReducer {
    state: Arc<Mutex<ReducerState>>,
}

fn failure(what: &str) -> Error {
    Error::Process(ProcessError::Failed {
        command: what.to_string(),
        code: 1,
        stderr: "mock failure".to_string(),
    })
}

impl MockReducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Products returned when `frame` is reduced.
    pub fn set_outputs(&self, frame: &Path, outputs: Vec<PathBuf>) {
        self.state
            .lock()
            .unwrap()
            .outputs
            .insert(frame.to_path_buf(), outputs);
    }

    pub fn fail_reduction_of(&self, frame: &Path) {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert(frame.to_path_buf());
    }

    pub fn fail_masters(&self) {
        self.state.lock().unwrap().fail_masters = true;
    }

    pub fn reduce_calls(&self) -> Vec<(PathBuf, bool)> {
        self.state.lock().unwrap().reduce_calls.clone()
    }

    pub fn master_bias_calls(&self) -> usize {
        self.state.lock().unwrap().bias_calls.len()
    }

    pub fn master_flat_calls(&self, twilight: bool) -> usize {
        self.state
            .lock()
            .unwrap()
            .flat_calls
            .iter()
            .filter(|(_, t)| *t == twilight)
            .count()
    }
}

#[async_trait]
impl Reducer for MockReducer {
    async fn reduce_image(&self, path: &Path, cosmic: bool) -> Result<Vec<PathBuf>> {
        let mut state = self.state.lock().unwrap();
        state.reduce_calls.push((path.to_path_buf(), cosmic));
        if state.failing.contains(path) {
            return Err(failure("reduce"));
        }
        Ok(state.outputs.get(path).cloned().unwrap_or_default())
    }

    async fn create_master_bias(&self, directory: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.bias_calls.push(directory.to_path_buf());
        if state.fail_masters {
            return Err(failure("masterbias"));
        }
        Ok(())
    }

    async fn create_master_flat(&self, directory: &Path, twilight: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.flat_calls.push((directory.to_path_buf(), twilight));
        if state.fail_masters {
            return Err(failure("masterflat"));
        }
        Ok(())
    }
}
