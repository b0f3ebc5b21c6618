use crate::{ChannelState, LogicalType, Phase};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Scrape,
    Ask,
    Manage,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub view: View,
    pub busy: bool,
    pub identity: Option<String>,
    pub scraped_urls: Vec<String>,
    pub scraped_url_count: usize,
    pub has_scraped_content: bool,
    /// Bumped on every successful listing, even when the list is unchanged.
    pub listing_revision: u64,
    pub pending: Vec<LogicalType>,
    pub progress: Option<ProgressView>,
    pub answer: Option<AnswerView>,
    pub channel: ChannelState,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressView {
    pub phase: Phase,
    pub percent: u8,
    pub current: u64,
    pub total: u64,
    pub subject_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerView {
    pub text: String,
    pub sources: Vec<String>,
}
