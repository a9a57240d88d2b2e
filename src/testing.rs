//! Scripted test doubles for the fetch seam
//!
//! `FixtureEngine` stands in for a real fetch engine: each URL carries a
//! scripted sequence of responses (HTML bodies or failures), and the last
//! entry repeats once the sequence is exhausted. Domains can be marked as
//! failing at session open to exercise batch-level failure paths.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::ScoutError;
use crate::infrastructure::page::{FetchEngine, PageSession};

type Script = Vec<Result<String, String>>;

#[derive(Default)]
struct FixtureState {
    scripts: HashMap<String, Script>,
    positions: HashMap<String, usize>,
    failing_domains: HashSet<String>,
}

/// Fetch engine backed by canned responses.
#[derive(Default)]
pub struct FixtureEngine {
    state: Arc<Mutex<FixtureState>>,
    navigations: Arc<AtomicUsize>,
}

impl FixtureEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve this HTML body for every navigation to `url`.
    pub fn set_page(&self, url: impl Into<String>, html: impl Into<String>) {
        self.set_sequence(url, vec![Ok(html.into())]);
    }

    /// Fail every navigation to `url` with this message.
    pub fn set_failure(&self, url: impl Into<String>, message: impl Into<String>) {
        self.set_sequence(url, vec![Err(message.into())]);
    }

    /// Scripted response sequence for `url`; the last entry repeats.
    pub fn set_sequence(&self, url: impl Into<String>, script: Script) {
        let mut state = self.state.lock().expect("fixture state poisoned");
        state.scripts.insert(url.into(), script);
    }

    /// Make `open_session` fail for this domain.
    pub fn fail_domain(&self, domain: impl Into<String>) {
        let mut state = self.state.lock().expect("fixture state poisoned");
        state.failing_domains.insert(domain.into());
    }

    /// Total navigations across all sessions.
    pub fn navigation_count(&self) -> usize {
        self.navigations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FetchEngine for FixtureEngine {
    async fn open_session(&self, domain: &str) -> Result<Box<dyn PageSession>, ScoutError> {
        let failing = {
            let state = self.state.lock().expect("fixture state poisoned");
            state.failing_domains.contains(domain)
        };
        if failing {
            return Err(ScoutError::Session {
                domain: domain.to_string(),
                reason: "scripted session failure".to_string(),
            });
        }
        Ok(Box::new(FixtureSession {
            state: Arc::clone(&self.state),
            navigations: Arc::clone(&self.navigations),
        }))
    }
}

struct FixtureSession {
    state: Arc<Mutex<FixtureState>>,
    navigations: Arc<AtomicUsize>,
}

#[async_trait]
impl PageSession for FixtureSession {
    async fn navigate(&self, url: &str) -> Result<String, ScoutError> {
        self.navigations.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().expect("fixture state poisoned");
        let Some(script) = state.scripts.get(url).cloned() else {
            return Err(ScoutError::Navigation {
                url: url.to_string(),
                reason: "no fixture registered".to_string(),
            });
        };
        let position = state.positions.entry(url.to_string()).or_insert(0);
        let step = script.get(*position).or_else(|| script.last()).cloned();
        *position += 1;
        match step {
            Some(Ok(html)) => Ok(html),
            Some(Err(message)) => Err(ScoutError::Navigation {
                url: url.to_string(),
                reason: message,
            }),
            None => Err(ScoutError::Navigation {
                url: url.to_string(),
                reason: "empty fixture script".to_string(),
            }),
        }
    }
}
