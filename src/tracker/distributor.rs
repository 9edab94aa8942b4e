use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use super::snapshot::StateSnapshot;

/// A snapshot together with its text rendering, published as one unit.
#[derive(Debug)]
pub struct Frame {
    pub snapshot: Arc<StateSnapshot>,
    pub text: Arc<str>,
}

/// Latest-value fan-out of tracking state to any number of readers.
///
/// Publishing swaps a handle and never waits on readers; a slow reader just
/// sees the newest frame next time it looks.
pub struct StateDistributor {
    frame: watch::Sender<Arc<Frame>>,
    selected: Mutex<Option<u32>>,
}

impl Default for StateDistributor {
    fn default() -> Self {
        Self::new()
    }
}

impl StateDistributor {
    pub fn new() -> Self {
        let initial = Frame {
            snapshot: Arc::new(StateSnapshot::empty()),
            text: Arc::from("Waiting for first update...\n"),
        };
        let (frame, _) = watch::channel(Arc::new(initial));
        Self {
            frame,
            selected: Mutex::new(None),
        }
    }

    pub fn publish(&self, snapshot: StateSnapshot, text: String) {
        self.frame.send_replace(Arc::new(Frame {
            snapshot: Arc::new(snapshot),
            text: Arc::from(text),
        }));
    }

    pub fn latest(&self) -> Arc<StateSnapshot> {
        Arc::clone(&self.frame.borrow().snapshot)
    }

    pub fn rendered(&self) -> Arc<str> {
        Arc::clone(&self.frame.borrow().text)
    }

    /// Receiver notified on every publish.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Frame>> {
        self.frame.subscribe()
    }

    /// Record the point of interest. Last write wins.
    pub fn select(&self, norad_id: u32) {
        *self.selected.lock().unwrap_or_else(PoisonError::into_inner) = Some(norad_id);
    }

    pub fn selected(&self) -> Option<u32> {
        *self.selected.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
