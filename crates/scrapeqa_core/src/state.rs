use std::collections::HashSet;
use std::time::Duration;

use crate::view_model::{AnswerView, AppViewModel, ProgressView, View};
use crate::{ProgressChannel, ReconnectPolicy, RequestId, RequestRegistry};

/// Tunables of the session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Age after which a pending request earns a "still waiting" notice.
    pub stall_threshold: Duration,
    pub reconnect: ReconnectPolicy,
    /// How long a completed progress run stays visible.
    pub progress_hide_delay: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            stall_threshold: Duration::from_secs(20),
            reconnect: ReconnectPolicy::default(),
            progress_hide_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    pub identity: Option<String>,
    pub scraped_urls: Vec<String>,
    pub has_scraped_content: bool,
}

impl SessionState {
    pub fn scraped_url_count(&self) -> usize {
        self.scraped_urls.len()
    }
}

/// Everything the controller owns. Mutated only through [`crate::update`]
/// and the intent methods.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub(crate) session: SessionState,
    pub(crate) registry: RequestRegistry,
    pub(crate) channel: ProgressChannel,
    pub(crate) settings: ControllerSettings,
    pub(crate) view: View,
    pub(crate) progress: Option<ProgressView>,
    pub(crate) progress_run: u64,
    pub(crate) answer: Option<AnswerView>,
    pub(crate) stall_warned: HashSet<RequestId>,
    pub(crate) refresh_queued: bool,
    pub(crate) listing_revision: u64,
    pub(crate) announce_restored: bool,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: ControllerSettings) -> Self {
        Self {
            channel: ProgressChannel::new(settings.reconnect),
            settings,
            ..Self::default()
        }
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            view: self.view,
            busy: self.is_busy(),
            identity: self.session.identity.clone(),
            scraped_urls: self.session.scraped_urls.clone(),
            scraped_url_count: self.session.scraped_url_count(),
            has_scraped_content: self.session.has_scraped_content,
            listing_revision: self.listing_revision,
            pending: self.registry.pending_types(),
            progress: self.progress.clone(),
            answer: self.answer.clone(),
            channel: self.channel.state(),
            dirty: self.dirty,
        }
    }

    /// True while any user-initiated operation is in flight.
    pub fn is_busy(&self) -> bool {
        self.registry.has_user_initiated()
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn registry(&self) -> &RequestRegistry {
        &self.registry
    }

    pub fn channel(&self) -> &ProgressChannel {
        &self.channel
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// The run number of the visible progress display.
    pub fn progress_run(&self) -> u64 {
        self.progress_run
    }

    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}
