use client_logging::client_debug;

use crate::view_model::View;
use crate::{AppState, Effect, IntentError, Msg, Notification};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::Started { identity } => state.restore_identity(identity),
        Msg::ScrapeSubmitted {
            urls,
            use_enhanced_rendering,
        } => {
            let outcome = state.submit_scrape(&urls, use_enhanced_rendering);
            intent_effects(&mut state, outcome)
        }
        Msg::QuestionSubmitted(question) => {
            let outcome = state.submit_question(&question);
            intent_effects(&mut state, outcome)
        }
        Msg::RemoveUrlClicked(url) => {
            let outcome = state.remove_url(&url);
            intent_effects(&mut state, outcome)
        }
        Msg::RefreshUrlsRequested => {
            let outcome = state.refresh_urls();
            intent_effects(&mut state, outcome)
        }
        Msg::ViewSelected(view) => state.select_view(view),
        Msg::CancelRequested(logical_type) => state.cancel_request(&logical_type),
        Msg::CancelAllRequested => state.cancel_all(),
        Msg::ShutdownRequested => {
            let mut effects = state.cancel_all();
            effects.push(Effect::Shutdown);
            effects
        }
        Msg::ScrapeFinished { request, result } => state.finish_scrape(&request, result),
        Msg::AskFinished { request, result } => state.finish_ask(&request, result),
        Msg::UrlsListed { request, result } => state.finish_listing(&request, result),
        Msg::UrlRemoved { request, result } => state.finish_removal(&request, result),
        Msg::ChannelEstablished { generation } => state.channel_established(generation),
        Msg::ChannelMessage {
            generation,
            payload,
        } => state.channel_message(generation, &payload),
        Msg::ChannelDropped { generation } => state.channel_dropped(generation),
        Msg::ReconnectDue { generation } => state.reconnect_due(generation),
        Msg::ProgressHideDue { run } => state.hide_progress(run),
        Msg::StallCheck { at } => state.sweep_stalled(at),
    };

    (state, effects)
}

/// Duplicate intents are dropped silently; other rejections become notices.
fn intent_effects(state: &mut AppState, outcome: Result<Vec<Effect>, IntentError>) -> Vec<Effect> {
    match outcome {
        Ok(effects) => effects,
        Err(IntentError::AlreadyBusy(rejected)) => {
            client_debug!("dropping duplicate intent: {}", rejected);
            Vec::new()
        }
        Err(IntentError::NoContent) => {
            let mut effects = vec![Effect::Notify(Notification::error(
                "Please scrape content first",
            ))];
            effects.extend(state.select_view(View::Scrape));
            effects
        }
        Err(IntentError::Validation(message)) => {
            vec![Effect::Notify(Notification::error(message))]
        }
    }
}
