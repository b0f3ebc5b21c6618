use std::time::Instant;

use crate::{
    AskResponse, ClientError, LogicalType, RemoveUrlResponse, RequestHandle, ScrapeResponse,
    UrlList, View,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Runtime started; carries the persisted session identifier, if any.
    Started { identity: Option<String> },
    /// User submitted URLs for scraping.
    ScrapeSubmitted {
        urls: Vec<String>,
        use_enhanced_rendering: bool,
    },
    /// User asked a question.
    QuestionSubmitted(String),
    /// User asked to drop a scraped URL.
    RemoveUrlClicked(String),
    /// User asked for the scraped URL list.
    RefreshUrlsRequested,
    /// User switched views.
    ViewSelected(View),
    /// User aborted the pending request of one type.
    CancelRequested(LogicalType),
    /// Hard reset: abort everything in flight.
    CancelAllRequested,
    ShutdownRequested,
    ScrapeFinished {
        request: RequestHandle,
        result: Result<ScrapeResponse, ClientError>,
    },
    AskFinished {
        request: RequestHandle,
        result: Result<AskResponse, ClientError>,
    },
    UrlsListed {
        request: RequestHandle,
        result: Result<UrlList, ClientError>,
    },
    UrlRemoved {
        request: RequestHandle,
        result: Result<RemoveUrlResponse, ClientError>,
    },
    /// Progress transport finished its handshake.
    ChannelEstablished { generation: u64 },
    /// Raw text frame from the progress transport.
    ChannelMessage { generation: u64, payload: String },
    /// Progress transport closed without being asked to.
    ChannelDropped { generation: u64 },
    /// Reconnect delay elapsed.
    ReconnectDue { generation: u64 },
    /// Hide delay of a completed progress run elapsed.
    ProgressHideDue { run: u64 },
    /// Periodic stall sweep.
    StallCheck { at: Instant },
}
