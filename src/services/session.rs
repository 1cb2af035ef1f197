//! Session health and rotation.
//!
//! A `Session` is owned by the pool while idle and moved into exactly one work
//! unit while in use. Handing it back applies a state transition; retired
//! sessions are dropped and never handed out again.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::models::SessionConfig;

/// Supplies the egress identity (proxy URL) bound to a new session.
pub trait ProxyProvider: Send + Sync {
    /// `None` means direct egress.
    fn proxy_for(&self, session_id: u64) -> Option<String>;
}

/// Round-robin over a fixed proxy list.
#[derive(Debug, Clone, Default)]
pub struct StaticProxyProvider {
    proxies: Vec<String>,
}

impl StaticProxyProvider {
    pub fn new(proxies: Vec<String>) -> Self {
        Self { proxies }
    }
}

impl ProxyProvider for StaticProxyProvider {
    fn proxy_for(&self, session_id: u64) -> Option<String> {
        if self.proxies.is_empty() {
            return None;
        }
        let index = (session_id as usize) % self.proxies.len();
        self.proxies.get(index).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Healthy,
    Retired,
}

/// How a request made with a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Response accepted
    Good,
    /// Timeout or connection error
    Failed,
    /// Blocking status or challenge page
    Blocked,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: u64,
    pub usage_count: u32,
    pub error_score: f64,
    /// Egress proxy, if any
    pub egress: Option<String>,
    pub state: SessionState,
}

impl Session {
    fn new(id: u64, egress: Option<String>) -> Self {
        Self {
            id,
            usage_count: 0,
            error_score: 0.0,
            egress,
            state: SessionState::Healthy,
        }
    }

    /// Apply a request outcome, retiring the session when a limit is crossed.
    pub fn transition(mut self, outcome: SessionOutcome, config: &SessionConfig) -> Self {
        if self.state == SessionState::Retired {
            return self;
        }

        self.usage_count += 1;
        match outcome {
            SessionOutcome::Good => {
                self.error_score = (self.error_score - 1.0).max(0.0);
            }
            SessionOutcome::Failed => {
                self.error_score += 1.0;
            }
            SessionOutcome::Blocked => {
                self.state = SessionState::Retired;
                return self;
            }
        }

        if self.usage_count >= config.max_usage || self.error_score >= config.max_error_score {
            self.state = SessionState::Retired;
        }
        self
    }

    pub fn is_retired(&self) -> bool {
        self.state == SessionState::Retired
    }
}

/// Owns every idle session and decides retirement.
pub struct SessionPolicy {
    config: SessionConfig,
    proxies: Box<dyn ProxyProvider>,
    idle: Mutex<Vec<Session>>,
    next_id: AtomicU64,
    retired: AtomicUsize,
}

impl SessionPolicy {
    pub fn new(config: SessionConfig, proxies: Box<dyn ProxyProvider>) -> Self {
        Self {
            config,
            proxies,
            idle: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            retired: AtomicUsize::new(0),
        }
    }

    /// Take an idle healthy session, or create a new one.
    pub fn acquire(&self) -> Session {
        if let Ok(mut idle) = self.idle.lock() {
            while let Some(session) = idle.pop() {
                if !session.is_retired() {
                    return session;
                }
            }
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Session::new(id, self.proxies.proxy_for(id))
    }

    /// Hand a session back after a request. Returns its resulting state.
    pub fn release(&self, session: Session, outcome: SessionOutcome) -> SessionState {
        let session = session.transition(outcome, &self.config);
        let state = session.state;

        if session.is_retired() {
            self.retired.fetch_add(1, Ordering::Relaxed);
            log::debug!(
                "Retired session #{} after {} uses (error score {:.1}, outcome {:?})",
                session.id,
                session.usage_count,
                session.error_score,
                outcome
            );
            return state;
        }

        if let Ok(mut idle) = self.idle.lock() {
            if idle.len() < self.config.pool_size {
                idle.push(session);
            }
        }
        state
    }

    pub fn retired_count(&self) -> usize {
        self.retired.load(Ordering::Relaxed)
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }
}
