//! Change Notifier
//!
//! Tracks the highest config id seen (the "total id") and tells listeners
//! when an update actually moved it forward.

use crate::resolver::OnUpdate;
use crate::types::RuntimeConfig;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Read access to a set of configs
pub trait ConfigSource {
    fn keys(&self) -> Vec<String>;
    fn raw(&self, key: &str) -> Option<&RuntimeConfig>;
}

/// Handle returned by [`ConfigChangeNotifier::add_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn() + Send + Sync>;

/// A non-negative decimal id of any length.
///
/// Held as digits without leading zeros and ordered numerically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TotalId(String);

impl TotalId {
    /// Parse a decimal id. Negative or non-numeric input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let digits = raw.strip_prefix('+').unwrap_or(raw);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let trimmed = digits.trim_start_matches('0');
        Some(Self(if trimmed.is_empty() { "0".to_string() } else { trimmed.to_string() }))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TotalId {
    fn default() -> Self {
        Self("0".to_string())
    }
}

impl Ord for TotalId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.len().cmp(&other.0.len()).then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for TotalId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TotalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Default)]
struct NotifierState {
    initialized: bool,
    last_total_id: TotalId,
    next_listener: u64,
    listeners: Vec<(ListenerId, Listener)>,
}

/// Fires listeners when the total id of a config source increases.
///
/// Cloning yields another handle to the same listeners and state.
#[derive(Clone, Default)]
pub struct ConfigChangeNotifier {
    state: Arc<Mutex<NotifierState>>,
}

impl ConfigChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the source's current total id as the baseline.
    pub fn init(&self, source: &dyn ConfigSource) {
        let total_id = total_id(source);
        let mut state = self.state.lock();
        state.initialized = true;
        state.last_total_id = total_id;
    }

    /// Recompute the total id and notify if it grew. Calls made before
    /// [`init`](Self::init) are skipped.
    pub fn handle_update(&self, source: &dyn ConfigSource) {
        let listeners = {
            let mut state = self.state.lock();
            if !state.initialized {
                reforge_log::warn!("ConfigChangeNotifier.handle_update called before init. Skipping.");
                return;
            }

            let keys = source.keys();
            let total_id = total_id(source);
            let changed = total_id > state.last_total_id;

            if !keys.is_empty() {
                state.last_total_id = total_id;
            }

            if !changed {
                return;
            }

            reforge_log::debug!("config total id advanced to {}", state.last_total_id);
            state
                .listeners
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect::<Vec<_>>()
        };

        for listener in listeners {
            listener();
        }
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut state = self.state.lock();
        let id = ListenerId(state.next_listener);
        state.next_listener += 1;
        state.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Unsubscribe one listener; returns whether it was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut state = self.state.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(listener_id, _)| *listener_id != id);
        state.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    /// The last recorded total id, as a decimal string
    pub fn last_total_id(&self) -> String {
        self.state.lock().last_total_id.to_string()
    }

    /// A resolver `on_update` callback feeding this notifier
    pub fn hook(&self) -> OnUpdate {
        let notifier = self.clone();
        Arc::new(move |source: &dyn ConfigSource, _batch: &[RuntimeConfig]| {
            notifier.handle_update(source)
        })
    }
}

/// Highest numeric config id; missing or non-numeric ids are skipped.
pub fn total_id(source: &dyn ConfigSource) -> TotalId {
    source
        .keys()
        .iter()
        .filter_map(|key| source.raw(key))
        .filter_map(|config| config.id.as_deref())
        .filter_map(TotalId::parse)
        .fold(TotalId::default(), TotalId::max)
}
