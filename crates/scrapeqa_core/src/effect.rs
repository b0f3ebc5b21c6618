use std::time::Duration;

use crate::{AskRequest, ChannelCommand, RemoveUrlRequest, RequestHandle, ScrapeRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Scrape {
        request: RequestHandle,
        payload: ScrapeRequest,
        session_id: Option<String>,
    },
    Ask {
        request: RequestHandle,
        payload: AskRequest,
        session_id: Option<String>,
    },
    ListUrls {
        request: RequestHandle,
        session_id: Option<String>,
    },
    RemoveUrl {
        request: RequestHandle,
        payload: RemoveUrlRequest,
        session_id: Option<String>,
    },
    PersistIdentity {
        session_id: String,
    },
    Channel(ChannelCommand),
    /// Hide the progress display of `run` after `delay`.
    ScheduleProgressHide {
        run: u64,
        delay: Duration,
    },
    Notify(Notification),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}
