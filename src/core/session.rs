//! Per-subscriber session state shared between the command loop and the
//! subscriber's screener task.
//!
//! Settings sit behind a `RwLock` and the screener clones them once per
//! cycle, so an evaluation always sees either the old or the new rule set,
//! never a mix of both.

use crate::models::{Interval, RuleSet, SubscriberId};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub rules: Option<Arc<RuleSet>>,
    pub interval: Interval,
}

/// Handle on a running screener task.
pub(crate) struct ScreenTask {
    pub(crate) stop: watch::Sender<bool>,
    pub(crate) handle: JoinHandle<()>,
}

impl ScreenTask {
    fn is_live(&self) -> bool {
        !self.handle.is_finished()
    }
}

pub struct Session {
    id: SubscriberId,
    settings: RwLock<SessionSettings>,
    pub(crate) screen: Mutex<Option<ScreenTask>>,
}

impl Session {
    pub fn new(id: SubscriberId, interval: Interval) -> Self {
        Self {
            id,
            settings: RwLock::new(SessionSettings {
                rules: None,
                interval,
            }),
            screen: Mutex::new(None),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Consistent copy of the current settings.
    pub async fn settings(&self) -> SessionSettings {
        self.settings.read().await.clone()
    }

    pub async fn set_rules(&self, rules: RuleSet) {
        self.settings.write().await.rules = Some(Arc::new(rules));
    }

    pub async fn clear_rules(&self) {
        self.settings.write().await.rules = None;
    }

    pub async fn set_interval(&self, interval: Interval) {
        self.settings.write().await.interval = interval;
    }

    /// Whether a screener task is currently live for this session.
    pub async fn is_running(&self) -> bool {
        self.screen
            .lock()
            .await
            .as_ref()
            .is_some_and(ScreenTask::is_live)
    }
}

/// All sessions keyed by subscriber. Sessions are created on first contact.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<SubscriberId, Arc<Session>>>,
    default_interval: Interval,
}

impl SessionStore {
    pub fn new(default_interval: Interval) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            default_interval,
        }
    }

    pub fn get_or_create(&self, id: SubscriberId) -> Arc<Session> {
        self.sessions
            .entry(id)
            .or_insert_with(|| Arc::new(Session::new(id, self.default_interval)))
            .clone()
    }

    pub fn default_interval(&self) -> Interval {
        self.default_interval
    }

    pub fn get(&self, id: SubscriberId) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|s| Arc::clone(s.value()))
    }

    /// Detach a session. The caller is responsible for stopping its screener.
    pub fn remove(&self, id: SubscriberId) -> Option<Arc<Session>> {
        self.sessions.remove(&id).map(|(_, session)| session)
    }

    pub fn all(&self) -> Vec<Arc<Session>> {
        self.sessions.iter().map(|s| Arc::clone(s.value())).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
