//! Observer that records every callback.

use std::sync::{Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;

use crate::deal::FlightDeal;
use crate::orchestrator::{SearchEvent, SearchObserver};

/// Records deals, status messages and progress in arrival order.
///
/// Optionally cancels a token once a given number of deals has arrived,
/// which makes cancellation points reproducible in tests.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<SearchEvent>>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel `token` when the `deals`-th deal arrives.
    pub fn cancel_after_deals(deals: usize, token: CancellationToken) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            cancel_after: Some((deals, token)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SearchEvent>> {
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn events(&self) -> Vec<SearchEvent> {
        self.lock().clone()
    }

    pub fn deals(&self) -> Vec<FlightDeal> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                SearchEvent::Deal(deal) => Some(deal.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                SearchEvent::Status(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// `(completed, total)` pairs in arrival order.
    pub fn progress(&self) -> Vec<(usize, usize)> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                SearchEvent::Progress { completed, total } => Some((*completed, *total)),
                _ => None,
            })
            .collect()
    }
}

impl SearchObserver for RecordingObserver {
    fn on_deal(&self, deal: &FlightDeal) {
        let count = {
            let mut events = self.lock();
            events.push(SearchEvent::Deal(deal.clone()));
            events
                .iter()
                .filter(|e| matches!(e, SearchEvent::Deal(_)))
                .count()
        };
        if let Some((limit, token)) = &self.cancel_after {
            if count >= *limit {
                token.cancel();
            }
        }
    }

    fn on_status(&self, message: &str) {
        self.lock().push(SearchEvent::Status(message.to_string()));
    }

    fn on_progress(&self, completed: usize, total: usize) {
        self.lock().push(SearchEvent::Progress { completed, total });
    }
}
