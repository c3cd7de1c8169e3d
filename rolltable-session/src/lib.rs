//! Rolltable session registry
//!
//! A capacity-bounded map from opaque session ids to per-client
//! program clones. Each session owns its roll history and random
//! source; attaching a program deep-copies it so deck counts and
//! variables never bleed across sessions. Eviction happens on session
//! creation: first every session older than the TTL is pruned, then if
//! the registry is still full the single least-recently-used session
//! goes.
//!
//! Locking: the registry itself is behind an RW-lock (creation writes,
//! everything else reads); each session's access timestamp sits under
//! its own short mutex, and its program map under its own RW-lock.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rolltable_core::{EvalError, ExpressionResult, RollHistory, SharedRandom, ThreadRandom};
use rolltable_engine::{Evaluable, Program};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Errors surfaced by the session registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid session id {id}")]
    UnknownSession { id: String },

    #[error("no program named '{name}' attached to session")]
    UnknownProgram { name: String },

    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Injectable time source so eviction is testable.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Capacity-bounded registry of sessions.
pub struct SessionSet {
    max_sessions: usize,
    max_age: ChronoDuration,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    clock: Clock,
}

impl SessionSet {
    /// A registry holding at most `max_sessions`, pruning sessions idle
    /// longer than `max_age`.
    pub fn new(max_sessions: usize, max_age: Duration) -> Self {
        Self::with_clock(max_sessions, max_age, Arc::new(Utc::now))
    }

    /// As `new`, with a caller-supplied time source.
    pub fn with_clock(max_sessions: usize, max_age: Duration, clock: Clock) -> Self {
        let max_age = ChronoDuration::from_std(max_age).unwrap_or(ChronoDuration::MAX);
        Self {
            max_sessions,
            max_age,
            sessions: RwLock::new(HashMap::new()),
            clock,
        }
    }

    fn read_sessions(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Session>>> {
        match self.sessions.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_sessions(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Session>>> {
        match self.sessions.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Create a session, evicting first if the registry is full.
    pub fn create_session(&self) -> String {
        let now = (self.clock)();
        let mut sessions = self.write_sessions();

        if sessions.len() >= self.max_sessions {
            let cutoff = now
                .checked_sub_signed(self.max_age)
                .unwrap_or(DateTime::<Utc>::MIN_UTC);
            let stale: Vec<String> = sessions
                .iter()
                .filter(|(_, session)| session.accessed() < cutoff)
                .map(|(id, _)| id.clone())
                .collect();
            for id in &stale {
                sessions.remove(id);
            }
            if !stale.is_empty() {
                debug!(pruned = stale.len(), "pruned idle sessions");
            }

            if sessions.len() >= self.max_sessions {
                let oldest = sessions
                    .iter()
                    .min_by_key(|(_, session)| session.accessed())
                    .map(|(id, _)| id.clone());
                if let Some(id) = oldest {
                    sessions.remove(&id);
                    debug!(session = %id, "evicted least recently used session");
                }
            }
        }

        let id = Uuid::new_v4().to_string();
        sessions.insert(id.clone(), Arc::new(Session::new(now)));
        info!(session = %id, "created session");
        id
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read_sessions().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.read_sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_sessions().is_empty()
    }

    fn session(&self, id: &str) -> Result<Arc<Session>, SessionError> {
        self.read_sessions()
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownSession { id: id.to_string() })
    }

    /// Attach a program clone to a session under a caller-chosen name.
    pub fn attach_program(
        &self,
        id: &str,
        name: impl Into<String>,
        program: &Program,
    ) -> Result<(), SessionError> {
        let session = self.session(id)?;
        session.touch((self.clock)());
        let name = name.into();
        debug!(session = %id, program = %name, "attached program");
        session.attach(name, program);
        Ok(())
    }

    /// Evaluate a compiled expression against a session's named program.
    pub fn eval(
        &self,
        id: &str,
        program_name: &str,
        expr: &Arc<Evaluable>,
    ) -> Result<ExpressionResult, SessionError> {
        let session = self.session(id)?;
        session.touch((self.clock)());
        session.eval(program_name, expr)
    }

    /// The session's full roll history, oldest first.
    pub fn roll_history(&self, id: &str) -> Result<Vec<String>, SessionError> {
        let session = self.session(id)?;
        session.touch((self.clock)());
        Ok(session.history().snapshot())
    }

    /// The most recent roll line in the session, if any.
    pub fn latest_roll(&self, id: &str) -> Result<Option<String>, SessionError> {
        let session = self.session(id)?;
        session.touch((self.clock)());
        Ok(session.history().latest())
    }

    /// Names of the programs attached to a session.
    pub fn program_names(&self, id: &str) -> Result<Vec<String>, SessionError> {
        let session = self.session(id)?;
        session.touch((self.clock)());
        Ok(session.program_names())
    }

    /// Access a session's shared resources (for tests that need to pin
    /// the random source).
    pub fn with_session<T>(
        &self,
        id: &str,
        f: impl FnOnce(&Session) -> T,
    ) -> Result<T, SessionError> {
        let session = self.session(id)?;
        Ok(f(&session))
    }
}

/// One client's bundle: cloned programs, shared roll history, shared
/// random source, and a last-access timestamp.
pub struct Session {
    accessed: Mutex<DateTime<Utc>>,
    programs: RwLock<HashMap<String, Program>>,
    history: Arc<RollHistory>,
    rng: Mutex<SharedRandom>,
}

impl Session {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            accessed: Mutex::new(now),
            programs: RwLock::new(HashMap::new()),
            history: Arc::new(RollHistory::new()),
            rng: Mutex::new(ThreadRandom::shared()),
        }
    }

    /// Update the access timestamp.
    pub fn touch(&self, now: DateTime<Utc>) {
        match self.accessed.lock() {
            Ok(mut accessed) => *accessed = now,
            Err(mut poisoned) => **poisoned.get_mut() = now,
        }
    }

    /// Last access time.
    pub fn accessed(&self) -> DateTime<Utc> {
        match self.accessed.lock() {
            Ok(accessed) => *accessed,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn history(&self) -> &Arc<RollHistory> {
        &self.history
    }

    /// Replace the session's random source; programs attached after
    /// this call use the new source.
    pub fn set_random(&self, rng: SharedRandom) {
        match self.rng.lock() {
            Ok(mut current) => *current = rng,
            Err(mut poisoned) => **poisoned.get_mut() = rng,
        }
    }

    fn random(&self) -> SharedRandom {
        match self.rng.lock() {
            Ok(rng) => rng.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Deep-copy a program into this session. The clone shares the
    /// session's roll history and random source, so deck state and
    /// variables stay session-local.
    pub fn attach(&self, name: String, program: &Program) {
        let clone = program.clone_for_session(self.random(), self.history.clone());
        match self.programs.write() {
            Ok(mut programs) => {
                programs.insert(name, clone);
            }
            Err(mut poisoned) => {
                poisoned.get_mut().insert(name, clone);
            }
        }
    }

    fn program_names(&self) -> Vec<String> {
        match self.programs.read() {
            Ok(programs) => programs.keys().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().keys().cloned().collect(),
        }
    }

    /// Evaluate against one of this session's programs.
    pub fn eval(
        &self,
        program_name: &str,
        expr: &Arc<Evaluable>,
    ) -> Result<ExpressionResult, SessionError> {
        let programs = match self.programs.read() {
            Ok(programs) => programs,
            Err(poisoned) => poisoned.into_inner(),
        };
        let program = programs
            .get(program_name)
            .ok_or_else(|| SessionError::UnknownProgram {
                name: program_name.to_string(),
            })?;
        Ok(program.eval(expr)?)
    }
}
