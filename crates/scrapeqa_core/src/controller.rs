//! Session controller: turns intents into registry-guarded backend calls and
//! folds their results back into [`AppState`].
//!
//! Every completion handler starts by retiring its registry entry. A
//! completion whose handle is no longer current (cancelled or superseded)
//! is dropped without touching state.
use std::time::Instant;

use client_logging::{client_debug, client_info, client_warn, short_id};

use crate::progress::parse_progress_event;
use crate::view_model::{AnswerView, ProgressView, View};
use crate::{
    AppState, AskRequest, AskResponse, ChannelCommand, ChannelState, ClientError, DropOutcome,
    Effect, IntentError, LogicalType, Notification, Phase, ProgressEvent, RemoveUrlRequest,
    RemoveUrlResponse, RequestHandle, ScrapeRequest, ScrapeResponse, UrlList,
};

const SCRAPE_FAILED: &str = "Failed to scrape URLs";
const ASK_FAILED: &str = "Failed to get answer";
const REMOVE_FAILED: &str = "Failed to remove URL";
const LIST_FAILED: &str = "Failed to load URLs";

impl AppState {
    pub fn submit_scrape(
        &mut self,
        urls: &[String],
        use_enhanced_rendering: bool,
    ) -> Result<Vec<Effect>, IntentError> {
        let urls: Vec<String> = urls
            .iter()
            .map(|url| url.trim())
            .filter(|url| !url.is_empty())
            .map(ToOwned::to_owned)
            .collect();
        if urls.is_empty() {
            return Err(IntentError::Validation(
                "Please enter at least one URL".to_string(),
            ));
        }

        let request = self.registry.try_begin(LogicalType::Scrape)?;
        client_info!(
            "{} scrape of {} url(s), enhanced={}",
            request.id(),
            urls.len(),
            use_enhanced_rendering
        );
        self.mark_dirty();

        let mut effects = self.channel_effects_for_open();
        effects.push(Effect::Scrape {
            request,
            payload: ScrapeRequest {
                urls,
                use_enhanced_rendering,
            },
            session_id: self.session.identity.clone(),
        });
        Ok(effects)
    }

    pub fn submit_question(&mut self, question: &str) -> Result<Vec<Effect>, IntentError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(IntentError::Validation(
                "Please enter a question".to_string(),
            ));
        }
        if !self.session.has_scraped_content {
            return Err(IntentError::NoContent);
        }

        let request = self.registry.try_begin(LogicalType::Ask)?;
        client_info!("{} ask ({} chars)", request.id(), question.len());
        self.answer = None;
        self.mark_dirty();

        Ok(vec![Effect::Ask {
            request,
            payload: AskRequest {
                question: question.to_string(),
            },
            session_id: self.session.identity.clone(),
        }])
    }

    pub fn remove_url(&mut self, url: &str) -> Result<Vec<Effect>, IntentError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(IntentError::Validation("No URL given".to_string()));
        }

        let request = self.registry.try_begin(LogicalType::remove_url(url))?;
        client_info!("{} remove {}", request.id(), url);
        self.mark_dirty();

        Ok(vec![Effect::RemoveUrl {
            request,
            payload: RemoveUrlRequest {
                url: url.to_string(),
            },
            session_id: self.session.identity.clone(),
        }])
    }

    /// Requests a full listing. Without an identity there is nothing to list.
    pub fn refresh_urls(&mut self) -> Result<Vec<Effect>, IntentError> {
        let Some(session_id) = self.session.identity.clone() else {
            client_debug!("skipping url refresh: no session identifier yet");
            return Ok(Vec::new());
        };

        let request = self.registry.try_begin(LogicalType::LoadUrls)?;
        client_debug!("{} list urls for {}", request.id(), short_id(&session_id));
        self.mark_dirty();

        Ok(vec![Effect::ListUrls {
            request,
            session_id: Some(session_id),
        }])
    }

    /// Aborts every pending request and closes the progress channel.
    pub fn cancel_all(&mut self) -> Vec<Effect> {
        let cancelled = self.registry.cancel_all();
        self.stall_warned.clear();
        self.refresh_queued = false;
        self.announce_restored = false;
        self.progress = None;
        self.mark_dirty();

        let mut effects: Vec<Effect> = self
            .channel
            .close()
            .into_iter()
            .map(Effect::Channel)
            .collect();
        if cancelled > 0 {
            client_info!("cancelled {} pending request(s)", cancelled);
            effects.push(Effect::Notify(Notification::info(format!(
                "Cancelled {cancelled} pending request(s)"
            ))));
        }
        effects
    }

    /// Aborts the pending request of one logical type.
    ///
    /// Cancelling a scrape also drops its progress display and the channel.
    pub fn cancel_request(&mut self, logical_type: &LogicalType) -> Vec<Effect> {
        if !self.registry.cancel(logical_type) {
            return vec![Effect::Notify(Notification::info(format!(
                "Nothing to cancel for {}",
                logical_type.describe()
            )))];
        }
        client_info!("cancelled pending {}", logical_type);
        self.mark_dirty();

        let mut effects = Vec::new();
        match logical_type {
            LogicalType::Scrape => {
                self.progress = None;
                effects.extend(self.channel.close().into_iter().map(Effect::Channel));
            }
            LogicalType::LoadUrls => self.refresh_queued = false,
            LogicalType::Ask | LogicalType::RemoveUrl(_) => {}
        }
        effects.push(Effect::Notify(Notification::info(format!(
            "Cancelled {}",
            logical_type.describe()
        ))));
        effects
    }

    pub(crate) fn restore_identity(&mut self, identity: Option<String>) -> Vec<Effect> {
        let identity = identity.filter(|id| !id.trim().is_empty());
        let Some(identity) = identity else {
            return Vec::new();
        };
        client_info!("restored session {}", short_id(&identity));
        self.session.identity = Some(identity);
        self.announce_restored = true;
        self.mark_dirty();
        self.refresh_urls().unwrap_or_else(|err| {
            client_debug!("startup refresh skipped: {}", err);
            Vec::new()
        })
    }

    pub(crate) fn select_view(&mut self, view: View) -> Vec<Effect> {
        if view == self.view || self.is_busy() {
            return Vec::new();
        }
        self.view = view;
        self.mark_dirty();
        if view == View::Manage {
            self.request_refresh()
        } else {
            Vec::new()
        }
    }

    pub(crate) fn finish_scrape(
        &mut self,
        request: &RequestHandle,
        result: Result<ScrapeResponse, ClientError>,
    ) -> Vec<Effect> {
        if !self.retire(request) {
            return Vec::new();
        }
        match result {
            Ok(response) => {
                let mut effects = Vec::new();
                if let Some(session_id) = response.session_id.filter(|id| !id.is_empty()) {
                    client_info!("{} scrape ok, session {}", request.id(), short_id(&session_id));
                    effects.push(Effect::PersistIdentity {
                        session_id: session_id.clone(),
                    });
                    self.session.identity = Some(session_id);
                }
                effects.extend(self.channel_effects_for_open());
                self.session.has_scraped_content = true;
                self.view = View::Ask;
                effects.push(Effect::Notify(Notification::success(response.message)));
                effects
            }
            Err(err) => {
                client_warn!("{} scrape failed: {}", request.id(), err);
                self.progress = None;
                vec![Effect::Notify(Notification::error(
                    err.user_message(SCRAPE_FAILED),
                ))]
            }
        }
    }

    pub(crate) fn finish_ask(
        &mut self,
        request: &RequestHandle,
        result: Result<AskResponse, ClientError>,
    ) -> Vec<Effect> {
        if !self.retire(request) {
            return Vec::new();
        }
        match result {
            Ok(response) => {
                client_info!(
                    "{} answer received with {} source(s)",
                    request.id(),
                    response.source_documents.len()
                );
                self.answer = Some(AnswerView {
                    text: response.answer,
                    sources: response.source_documents,
                });
                Vec::new()
            }
            Err(err) => {
                client_warn!("{} ask failed: {}", request.id(), err);
                vec![Effect::Notify(Notification::error(err.user_message(ASK_FAILED)))]
            }
        }
    }

    pub(crate) fn finish_listing(
        &mut self,
        request: &RequestHandle,
        result: Result<UrlList, ClientError>,
    ) -> Vec<Effect> {
        if !self.retire(request) {
            return Vec::new();
        }
        let announce = std::mem::take(&mut self.announce_restored);
        let mut effects = Vec::new();
        match result {
            Ok(listing) => {
                client_debug!("{} listed {} url(s)", request.id(), listing.urls.len());
                self.session.has_scraped_content = !listing.urls.is_empty();
                self.session.scraped_urls = listing.urls;
                self.listing_revision += 1;
                if announce && self.session.has_scraped_content {
                    effects.push(Effect::Notify(Notification::success(
                        "Loaded your existing scraped content",
                    )));
                }
            }
            Err(err) => {
                client_warn!("{} listing failed: {}", request.id(), err);
                // The startup check stays quiet; explicit refreshes report.
                if !announce {
                    effects.push(Effect::Notify(Notification::error(
                        err.user_message(LIST_FAILED),
                    )));
                }
            }
        }
        if std::mem::take(&mut self.refresh_queued) {
            effects.extend(self.request_refresh());
        }
        effects
    }

    pub(crate) fn finish_removal(
        &mut self,
        request: &RequestHandle,
        result: Result<RemoveUrlResponse, ClientError>,
    ) -> Vec<Effect> {
        if !self.retire(request) {
            return Vec::new();
        }
        match result {
            Ok(response) => {
                client_info!("{} removed ({})", request.id(), request.logical_type());
                let mut effects = vec![Effect::Notify(Notification::success(response.message))];
                effects.extend(self.request_refresh());
                effects
            }
            Err(err) => {
                client_warn!("{} removal failed: {}", request.id(), err);
                vec![Effect::Notify(Notification::error(
                    err.user_message(REMOVE_FAILED),
                ))]
            }
        }
    }

    pub(crate) fn channel_established(&mut self, generation: u64) -> Vec<Effect> {
        if self.channel.on_established(generation) {
            client_debug!("progress channel open (generation {})", generation);
            self.mark_dirty();
        }
        Vec::new()
    }

    pub(crate) fn channel_dropped(&mut self, generation: u64) -> Vec<Effect> {
        let scrape_pending = self.registry.is_pending(&LogicalType::Scrape);
        let (outcome, commands) = self.channel.on_transport_closed(generation, scrape_pending);
        let mut effects: Vec<Effect> = commands.into_iter().map(Effect::Channel).collect();
        match outcome {
            DropOutcome::Ignored => return effects,
            DropOutcome::Reconnecting => client_info!(
                "progress channel dropped, reconnect attempt {}",
                self.channel.attempts()
            ),
            DropOutcome::Closed => client_debug!("progress channel closed by peer"),
            DropOutcome::GaveUp => {
                client_warn!("progress channel gave up after {} attempts", self.channel.attempts());
                effects.push(Effect::Notify(Notification::error(
                    "Lost connection to progress updates",
                )));
            }
        }
        self.mark_dirty();
        effects
    }

    pub(crate) fn reconnect_due(&mut self, generation: u64) -> Vec<Effect> {
        let commands = self.channel.on_backoff_elapsed(generation);
        if !commands.is_empty() {
            self.mark_dirty();
        }
        commands.into_iter().map(Effect::Channel).collect()
    }

    /// Frames count only from the current connection while it is open.
    pub(crate) fn channel_message(&mut self, generation: u64, payload: &str) -> Vec<Effect> {
        if generation != self.channel.generation() || self.channel.state() != ChannelState::Open {
            client_debug!("dropping progress frame from closed connection {}", generation);
            return Vec::new();
        }
        match parse_progress_event(payload) {
            Ok(event) => self.apply_progress(event),
            Err(err) => {
                client_warn!("dropping progress payload: {}", err);
                Vec::new()
            }
        }
    }

    /// Folds one progress event into the visible progress display.
    pub fn apply_progress(&mut self, event: ProgressEvent) -> Vec<Effect> {
        let starts_run = self
            .progress
            .as_ref()
            .map_or(true, |progress| progress.phase.is_terminal());
        if starts_run {
            self.progress_run += 1;
        }
        let mut effects = Vec::new();
        match event.phase {
            Phase::Complete => effects.push(Effect::ScheduleProgressHide {
                run: self.progress_run,
                delay: self.settings.progress_hide_delay,
            }),
            Phase::Error => {
                let message = match (&event.message, &event.subject_url) {
                    (Some(message), Some(url)) => format!("{url}: {message}"),
                    (Some(message), None) => message.clone(),
                    (None, Some(url)) => format!("Failed to process {url}"),
                    (None, None) => "A page failed to process".to_string(),
                };
                effects.push(Effect::Notify(Notification::error(message)));
            }
            Phase::Starting | Phase::Fetching | Phase::Processing => {}
        }
        self.progress = Some(ProgressView {
            phase: event.phase,
            percent: event.percent(),
            current: event.current,
            total: event.total,
            subject_url: event.subject_url,
        });
        self.mark_dirty();
        effects
    }

    pub(crate) fn hide_progress(&mut self, run: u64) -> Vec<Effect> {
        let completed = self
            .progress
            .as_ref()
            .is_some_and(|progress| progress.phase.is_terminal());
        if run != self.progress_run || !completed {
            return Vec::new();
        }
        self.progress = None;
        self.mark_dirty();
        if self.registry.is_pending(&LogicalType::Scrape) {
            return Vec::new();
        }
        self.channel.close().into_iter().map(Effect::Channel).collect()
    }

    pub(crate) fn sweep_stalled(&mut self, at: Instant) -> Vec<Effect> {
        let threshold = self.settings.stall_threshold;
        let mut effects = Vec::new();
        for pending in self.registry.list_stalled_at(threshold, at) {
            if !self.stall_warned.insert(pending.id) {
                continue;
            }
            let waited = pending.age(at).as_secs();
            client_info!("{} ({}) stalled for {}s", pending.id, pending.logical_type, waited);
            effects.push(Effect::Notify(Notification::info(format!(
                "Still waiting for {} ({waited}s so far)",
                pending.logical_type.describe()
            ))));
        }
        effects
    }

    /// Refresh now, or once the in-flight listing settles.
    fn request_refresh(&mut self) -> Vec<Effect> {
        if self.registry.is_pending(&LogicalType::LoadUrls) {
            self.refresh_queued = true;
            return Vec::new();
        }
        self.refresh_urls().unwrap_or_else(|err| {
            client_debug!("refresh skipped: {}", err);
            Vec::new()
        })
    }

    fn channel_effects_for_open(&mut self) -> Vec<Effect> {
        let session_id = self.session.identity.clone();
        let commands: Vec<ChannelCommand> = self.channel.open(session_id.as_deref());
        if !commands.is_empty() {
            self.mark_dirty();
        }
        commands.into_iter().map(Effect::Channel).collect()
    }

    fn retire(&mut self, request: &RequestHandle) -> bool {
        if !self.registry.end(request) {
            client_debug!("ignoring late result of {} ({})", request.id(), request.logical_type());
            return false;
        }
        self.stall_warned.remove(&request.id());
        self.mark_dirty();
        true
    }
}
