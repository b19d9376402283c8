pub mod middleware;

pub use middleware::{admission_middleware, requires_admission, SESSION_HEADER};

use crate::error::AppError;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// How often a blocked request sweeps for expired sessions
const WAIT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    pub max_sessions: usize,
    pub session_timeout: Duration,
    pub sweep_interval: Duration,
    pub wait_timeout: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_sessions: 3,
            session_timeout: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(30),
            wait_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error("all {max_sessions} session slots are busy (waited {}s)", .waited.as_secs())]
    Busy { max_sessions: usize, waited: Duration },
}

impl From<AdmissionError> for AppError {
    fn from(err: AdmissionError) -> Self {
        AppError::ServiceBusy(err.to_string())
    }
}

/// Snapshot served by GET /api/status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionStatus {
    pub current_concurrency: usize,
    pub max_concurrency: usize,
    pub waiting: usize,
}

struct Session {
    id: u64,
    last_seen: Instant,
    /// Admitted requests of this session that have not finished
    in_flight: usize,
    /// Set once any request of the session succeeds
    confirmed: bool,
    _slot: OwnedSemaphorePermit,
}

/// Limits how many client sessions may use the generation endpoints at once.
///
/// A session owns one slot from its first admitted request until it has been
/// idle for `session_timeout`. Requests from an active session refresh it and
/// pass without taking another slot.
pub struct SessionAdmission {
    config: AdmissionConfig,
    slots: Arc<Semaphore>,
    sessions: Mutex<HashMap<String, Session>>,
    waiting: AtomicUsize,
    next_id: AtomicU64,
}

impl SessionAdmission {
    pub fn new(config: AdmissionConfig) -> Self {
        let max_sessions = config.max_sessions.max(1);
        Self {
            config: AdmissionConfig {
                max_sessions,
                ..config
            },
            slots: Arc::new(Semaphore::new(max_sessions)),
            sessions: Mutex::new(HashMap::new()),
            waiting: AtomicUsize::new(0),
            next_id: AtomicU64::new(0),
        }
    }

    /// Admit a request for `session_id`, waiting up to `wait_timeout` for a
    /// free slot when the session is new.
    pub async fn admit(self: &Arc<Self>, session_id: &str) -> Result<AdmissionTicket, AdmissionError> {
        self.sweep_expired();
        if let Some(id) = self.touch(session_id) {
            return Ok(self.ticket(session_id, id, false));
        }

        let started_at = Instant::now();
        let deadline = started_at + self.config.wait_timeout;
        let _waiting = WaitingGuard::enter(&self.waiting);

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::warn!(
                    session_id,
                    max_sessions = self.config.max_sessions,
                    "Admission timed out"
                );
                return Err(AdmissionError::Busy {
                    max_sessions: self.config.max_sessions,
                    waited: started_at.elapsed(),
                });
            }

            let poll = remaining.min(WAIT_SWEEP_INTERVAL);
            match tokio::time::timeout(poll, self.slots.clone().acquire_owned()).await {
                Ok(Ok(slot)) => return Ok(self.register(session_id, slot, started_at)),
                Ok(Err(_)) => {
                    // Semaphore is never closed
                    return Err(AdmissionError::Busy {
                        max_sessions: self.config.max_sessions,
                        waited: started_at.elapsed(),
                    });
                }
                Err(_) => {
                    self.sweep_expired();
                    if let Some(id) = self.touch(session_id) {
                        return Ok(self.ticket(session_id, id, false));
                    }
                }
            }
        }
    }

    /// Drop sessions idle for longer than `session_timeout`, freeing their slots
    pub fn sweep_expired(&self) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, session| {
            session.in_flight > 0 || session.last_seen.elapsed() <= self.config.session_timeout
        });
        let expired = before - sessions.len();
        if expired > 0 {
            tracing::info!(expired, active = sessions.len(), "Expired idle sessions");
        }
        expired
    }

    pub fn status(&self) -> AdmissionStatus {
        self.sweep_expired();
        AdmissionStatus {
            current_concurrency: self.sessions.lock().len(),
            max_concurrency: self.config.max_sessions,
            waiting: self.waiting.load(Ordering::SeqCst),
        }
    }

    /// Sweep every `sweep_interval` until the runtime shuts down
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let admission = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(admission.config.sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                admission.sweep_expired();
            }
        })
    }

    /// Refresh a known session and count the new request against it
    fn touch(&self, session_id: &str) -> Option<u64> {
        let mut sessions = self.sessions.lock();
        let session = sessions.get_mut(session_id)?;
        session.last_seen = Instant::now();
        session.in_flight += 1;
        Some(session.id)
    }

    fn register(
        self: &Arc<Self>,
        session_id: &str,
        slot: OwnedSemaphorePermit,
        started_at: Instant,
    ) -> AdmissionTicket {
        let mut sessions = self.sessions.lock();

        // Another request of the same session got in while this one waited
        if let Some(session) = sessions.get_mut(session_id) {
            session.last_seen = Instant::now();
            session.in_flight += 1;
            return self.ticket(session_id, session.id, false);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        sessions.insert(
            session_id.to_string(),
            Session {
                id,
                last_seen: Instant::now(),
                in_flight: 1,
                confirmed: false,
                _slot: slot,
            },
        );
        tracing::info!(
            session_id,
            active = sessions.len(),
            waited_ms = started_at.elapsed().as_millis() as u64,
            "Session admitted"
        );
        self.ticket(session_id, id, true)
    }

    fn ticket(self: &Arc<Self>, session_id: &str, id: u64, new_session: bool) -> AdmissionTicket {
        AdmissionTicket {
            admission: Arc::clone(self),
            session_id: session_id.to_string(),
            id,
            new_session,
            kept: false,
        }
    }

    /// A request of session `id` ended. A session with no success so far
    /// gives its slot back once its last request is done.
    fn finish(&self, session_id: &str, id: u64, kept: bool) {
        let mut sessions = self.sessions.lock();
        let Some(session) = sessions.get_mut(session_id).filter(|session| session.id == id) else {
            return;
        };
        session.in_flight = session.in_flight.saturating_sub(1);
        session.confirmed |= kept;
        if session.in_flight == 0 && !session.confirmed {
            sessions.remove(session_id);
            tracing::debug!(session_id, "Session slot released");
        }
    }
}

/// Proof of admission for one request.
///
/// Dropping the ticket ends the request. A session none of whose requests
/// was kept gives its slot back when its last ticket is dropped; a kept
/// session holds the slot until it expires.
pub struct AdmissionTicket {
    admission: Arc<SessionAdmission>,
    session_id: String,
    id: u64,
    new_session: bool,
    kept: bool,
}

impl AdmissionTicket {
    /// True when this request took a new slot for its session
    pub fn is_new_session(&self) -> bool {
        self.new_session
    }

    /// The request succeeded: keep the session's slot until it expires
    pub fn keep(mut self) {
        self.kept = true;
    }

    /// The request failed. Dropping the ticket does the release, which frees
    /// the slot unless another request of the session is still running or
    /// has succeeded.
    pub fn release(self) {}
}

impl Drop for AdmissionTicket {
    fn drop(&mut self) {
        self.admission.finish(&self.session_id, self.id, self.kept);
    }
}

struct WaitingGuard<'a>(&'a AtomicUsize);

impl<'a> WaitingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
