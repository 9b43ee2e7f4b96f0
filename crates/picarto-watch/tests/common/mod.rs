//! Scripted probe used by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use picarto_watch::{Error, Probe, ProbeSession, Result};

/// What a single probe invocation does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Ends immediately without data.
    Eof,
    /// Produces data at once and stays live until terminated.
    Live,
    /// Produces data at once; the stream ends after the given time.
    LiveFor(Duration),
    /// Produces data after the given delay and stays live.
    DataAfter(Duration),
    /// Never produces data and never ends.
    Silent,
    /// The probe process cannot be started.
    SpawnError,
}

#[derive(Debug, Default)]
pub struct Counters {
    pub spawns: AtomicUsize,
    pub terminations: AtomicUsize,
    /// Sessions spawned and not yet terminated.
    pub active: AtomicUsize,
}

pub struct ScriptedProbe {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    fallback: Step,
    available: bool,
    pub counters: Arc<Counters>,
}

impl ScriptedProbe {
    /// Every artist follows `fallback` unless given its own script.
    pub fn new(fallback: Step) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback,
            available: true,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(Step::Silent)
        }
    }

    /// Script the next invocations for an artist; `fallback` applies after.
    pub fn with_script(self, artist: &str, steps: impl IntoIterator<Item = Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(artist.to_string(), steps.into_iter().collect());
        self
    }

    pub fn spawns(&self) -> usize {
        self.counters.spawns.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.counters.active.load(Ordering::SeqCst)
    }

    fn next_step(&self, artist: &str) -> Step {
        self.scripts
            .lock()
            .unwrap()
            .get_mut(artist)
            .and_then(VecDeque::pop_front)
            .unwrap_or(self.fallback)
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    fn check_available(&self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(Error::unavailable("scripted probe unavailable"))
        }
    }

    async fn spawn(&self, artist: &str) -> Result<Box<dyn ProbeSession>> {
        let step = self.next_step(artist);
        if step == Step::SpawnError {
            return Err(Error::ProbeSpawn(std::io::Error::other("scripted spawn failure")));
        }
        self.counters.spawns.fetch_add(1, Ordering::SeqCst);
        self.counters.active.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            step,
            counters: Arc::clone(&self.counters),
            terminated: false,
        }))
    }
}

struct ScriptedSession {
    step: Step,
    counters: Arc<Counters>,
    terminated: bool,
}

#[async_trait]
impl ProbeSession for ScriptedSession {
    async fn wait_for_data(&mut self) -> Result<()> {
        match self.step {
            Step::Eof => Err(Error::disconnected("EOF")),
            Step::Live | Step::LiveFor(_) => Ok(()),
            Step::DataAfter(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            Step::Silent | Step::SpawnError => std::future::pending().await,
        }
    }

    async fn wait_for_end(&mut self) {
        match self.step {
            Step::LiveFor(duration) => tokio::time::sleep(duration).await,
            _ => std::future::pending().await,
        }
    }

    async fn terminate(&mut self) {
        if !self.terminated {
            self.terminated = true;
            self.counters.terminations.fetch_add(1, Ordering::SeqCst);
            self.counters.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

pub fn as_probe(probe: &Arc<ScriptedProbe>) -> Arc<dyn Probe> {
    Arc::clone(probe) as Arc<dyn Probe>
}
