//! Per-phone conversation context with idle eviction.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::domain::donor::{Donor, DonorId};
use crate::flows::FlowState;

pub const DEFAULT_SESSION_IDLE_TTL_SECS: u64 = 30 * 60;
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Donor,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

/// Donor identity as flows need it at transaction time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DonorProfile {
    pub phone: String,
    pub name: String,
    pub id: Option<DonorId>,
    pub email: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Session {
    pub phone: String,
    pub donor_name: Option<String>,
    /// Profile name the chat transport reported; used until the donor
    /// registers.
    pub chat_name: Option<String>,
    pub donor_id: Option<DonorId>,
    pub donor_email: Option<String>,
    /// Set once the donor directory has been consulted for this session.
    pub donor_checked: bool,
    pub flow: Option<FlowState>,
    pub last_activity: Instant,
    history: VecDeque<Turn>,
    history_limit: usize,
}

impl Session {
    pub fn new(phone: impl Into<String>, history_limit: usize, now: Instant) -> Self {
        Self {
            phone: phone.into(),
            donor_name: None,
            chat_name: None,
            donor_id: None,
            donor_email: None,
            donor_checked: false,
            flow: None,
            last_activity: now,
            history: VecDeque::new(),
            history_limit: history_limit.max(1),
        }
    }

    pub fn history(&self) -> impl Iterator<Item = &Turn> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn record(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.history.push_back(Turn { speaker, text: text.into() });
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
    }

    pub fn is_registered(&self) -> bool {
        self.donor_id.is_some()
    }

    pub fn remember_donor(&mut self, donor: &Donor) {
        self.donor_id = Some(donor.id.clone());
        self.donor_name = Some(donor.name.clone());
        self.donor_email = donor.email.clone();
        self.donor_checked = true;
    }

    /// Registered name first, then the chat profile name.
    pub fn display_name(&self) -> Option<&str> {
        self.donor_name.as_deref().or(self.chat_name.as_deref())
    }

    pub fn has_active_flow(&self) -> bool {
        self.flow.is_some()
    }

    pub fn donor_profile(&self, fallback_name: &str) -> DonorProfile {
        DonorProfile {
            phone: self.phone.clone(),
            name: self.display_name().unwrap_or(fallback_name).to_string(),
            id: self.donor_id.clone(),
            email: self.donor_email.clone(),
        }
    }
}

#[derive(Debug)]
struct SessionEntry {
    session: Arc<Mutex<Session>>,
    last_access: Instant,
}

/// Handle returned by [`SessionStore::acquire`]; lock it for the whole event
/// so messages from the same phone are processed one after another.
#[derive(Clone, Debug)]
pub struct SessionLease {
    pub session: Arc<Mutex<Session>>,
    pub created: bool,
}

/// Concurrency-safe session map keyed by normalized phone number.
///
/// Eviction is both lazy (an idle entry found on access is replaced by a fresh
/// session) and explicit through [`SessionStore::sweep`], which the server
/// runs periodically. Entries currently leased are never swept.
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<String, SessionEntry>,
    idle_ttl: Duration,
    history_limit: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_SESSION_IDLE_TTL_SECS), DEFAULT_HISTORY_LIMIT)
    }
}

impl SessionStore {
    pub fn new(idle_ttl: Duration, history_limit: usize) -> Self {
        Self { sessions: DashMap::new(), idle_ttl, history_limit }
    }

    pub fn idle_ttl(&self) -> Duration {
        self.idle_ttl
    }

    pub fn acquire(&self, phone: &str) -> SessionLease {
        self.acquire_at(phone, Instant::now())
    }

    pub fn acquire_at(&self, phone: &str, now: Instant) -> SessionLease {
        match self.sessions.entry(phone.to_string()) {
            Entry::Occupied(mut entry) => {
                let expired = now.saturating_duration_since(entry.get().last_access) >= self.idle_ttl;
                if expired {
                    let fresh = self.fresh_entry(phone, now);
                    let session = fresh.session.clone();
                    entry.insert(fresh);
                    SessionLease { session, created: true }
                } else {
                    let current = entry.get_mut();
                    current.last_access = now;
                    SessionLease { session: current.session.clone(), created: false }
                }
            }
            Entry::Vacant(entry) => {
                let fresh = self.fresh_entry(phone, now);
                let session = fresh.session.clone();
                entry.insert(fresh);
                SessionLease { session, created: true }
            }
        }
    }

    pub fn contains(&self, phone: &str) -> bool {
        self.sessions.contains_key(phone)
    }

    pub fn remove(&self, phone: &str) -> bool {
        self.sessions.remove(phone).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Drops idle sessions and returns how many were evicted.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| {
            let in_use = Arc::strong_count(&entry.session) > 1;
            in_use || now.saturating_duration_since(entry.last_access) < self.idle_ttl
        });
        before.saturating_sub(self.sessions.len())
    }

    fn fresh_entry(&self, phone: &str, now: Instant) -> SessionEntry {
        SessionEntry {
            session: Arc::new(Mutex::new(Session::new(phone, self.history_limit, now))),
            last_access: now,
        }
    }
}
