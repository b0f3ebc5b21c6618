//! Scrape QA core: pure request-lifecycle state machine and view-model helpers.
mod api;
mod channel;
mod controller;
mod effect;
mod error;
mod msg;
mod progress;
mod registry;
mod state;
mod update;
mod view_model;

pub use api::{
    AskRequest, AskResponse, RemoveUrlRequest, RemoveUrlResponse, ScrapeRequest, ScrapeResponse,
    UrlList,
};
pub use channel::{ChannelCommand, ChannelState, DropOutcome, ProgressChannel, ReconnectPolicy};
pub use effect::{Effect, NoticeLevel, Notification};
pub use error::{ClientError, IntentError};
pub use msg::Msg;
pub use progress::{parse_progress_event, Phase, ProgressEvent, ProgressParseError};
pub use registry::{
    LogicalType, PendingRequest, Rejected, RequestHandle, RequestId, RequestRegistry,
};
pub use state::{AppState, ControllerSettings, SessionState};
pub use update::update;
pub use view_model::{AnswerView, AppViewModel, ProgressView, View};
