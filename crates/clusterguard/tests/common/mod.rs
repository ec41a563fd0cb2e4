//! Scripted engine shared by the integration tests.
//!
//! State is thread-local: every test runs on its own thread and engine calls
//! happen on the caller's thread, so tests do not see each other's scripts.

#![allow(dead_code)]

use clusterguard::engine::Engine;
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::path::Path;

thread_local! {
    static NEXT_FAILURE: RefCell<Option<String>> = const { RefCell::new(None) };
    static NEXT_PANIC: RefCell<Option<String>> = const { RefCell::new(None) };
    static CONSTRUCTED: RefCell<Vec<Map<String, Value>>> = const { RefCell::new(Vec::new()) };
    static CALLS: Cell<usize> = const { Cell::new(0) };
}

/// Make the next engine operation fail with `message`.
pub fn fail_next(message: &str) {
    NEXT_FAILURE.with(|f| *f.borrow_mut() = Some(message.to_string()));
}

/// Make the next engine operation panic with `message`.
pub fn panic_next(message: &str) {
    NEXT_PANIC.with(|p| *p.borrow_mut() = Some(message.to_string()));
}

/// Mappings passed to `construct`, oldest first.
pub fn constructed() -> Vec<Map<String, Value>> {
    CONSTRUCTED.with(|c| c.borrow().clone())
}

/// Engine operations invoked so far (construct excluded).
pub fn calls() -> usize {
    CALLS.with(Cell::get)
}

fn begin_call() -> Result<(), EngineFailure> {
    CALLS.with(|c| c.set(c.get() + 1));
    if let Some(message) = NEXT_PANIC.with(|p| p.borrow_mut().take()) {
        panic!("{}", message);
    }
    match NEXT_FAILURE.with(|f| f.borrow_mut().take()) {
        Some(message) => Err(EngineFailure(message)),
        None => Ok(()),
    }
}

/// Free-text failure, as a native engine would report it.
#[derive(Debug)]
pub struct EngineFailure(pub String);

impl fmt::Display for EngineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for EngineFailure {}

/// Engine returning zero embeddings and round-robin labels.
#[derive(Debug)]
pub struct ScriptedEngine {
    params: Map<String, Value>,
}

impl ScriptedEngine {
    fn usize_param(&self, key: &str, default: usize) -> usize {
        self.params
            .get(key)
            .and_then(Value::as_u64)
            .map_or(default, |v| v as usize)
    }

    fn embed(&self, data: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let n_components = self.usize_param("n_components", 2);
        data.iter().map(|_| vec![0.0; n_components]).collect()
    }

    fn label(&self, data: &[Vec<f64>]) -> Vec<i64> {
        let n_clusters = self.usize_param("n_clusters", 1).max(1);
        (0..data.len()).map(|i| (i % n_clusters) as i64).collect()
    }
}

impl Engine for ScriptedEngine {
    type Error = EngineFailure;

    fn construct(params: &Map<String, Value>) -> Result<Self, Self::Error> {
        CONSTRUCTED.with(|c| c.borrow_mut().push(params.clone()));
        Ok(Self {
            params: params.clone(),
        })
    }

    fn fit_transform(&mut self, data: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, Self::Error> {
        begin_call()?;
        Ok(self.embed(data))
    }

    fn fit_predict(&mut self, data: &[Vec<f64>]) -> Result<Vec<i64>, Self::Error> {
        begin_call()?;
        Ok(self.label(data))
    }

    fn transform(&self, data: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, Self::Error> {
        begin_call()?;
        Ok(self.embed(data))
    }

    fn predict(&self, data: &[Vec<f64>]) -> Result<Vec<i64>, Self::Error> {
        begin_call()?;
        Ok(self.label(data))
    }

    fn save(&self, path: &Path) -> Result<(), Self::Error> {
        begin_call()?;
        let bytes =
            serde_json::to_vec(&self.params).map_err(|e| EngineFailure(e.to_string()))?;
        std::fs::write(path, bytes).map_err(|e| EngineFailure(e.to_string()))
    }

    fn load(path: &Path) -> Result<Self, Self::Error> {
        begin_call()?;
        let bytes = std::fs::read(path).map_err(|e| EngineFailure(e.to_string()))?;
        let params = serde_json::from_slice(&bytes).map_err(|e| EngineFailure(e.to_string()))?;
        Ok(Self { params })
    }
}
