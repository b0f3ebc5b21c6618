//! State machine for the push connection that delivers progress events.
//!
//! The machine never touches a socket. It returns [`ChannelCommand`]s for
//! the runtime to carry out, and it learns about the transport through
//! `on_*` calls tagged with the generation of the connection attempt that
//! produced them. Events from an older generation are ignored.
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    #[default]
    Closed,
    Connecting,
    Open,
    Reconnecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    /// Consecutive reconnects allowed before giving up; `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_attempts: Some(12),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelCommand {
    Connect { generation: u64, session_id: String },
    Disconnect { generation: u64 },
    ScheduleReconnect { generation: u64, delay: Duration },
}

/// What an unexpected transport closure led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    Ignored,
    Reconnecting,
    Closed,
    GaveUp,
}

#[derive(Debug, Clone, Default)]
pub struct ProgressChannel {
    state: ChannelState,
    session_id: Option<String>,
    generation: u64,
    attempts: u32,
    policy: ReconnectPolicy,
}

impl ProgressChannel {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Starts a connection for `session_id`. An absent or empty id is a no-op,
    /// as is reopening a live connection for the same session.
    pub fn open(&mut self, session_id: Option<&str>) -> Vec<ChannelCommand> {
        let Some(session_id) = session_id.filter(|id| !id.is_empty()) else {
            return Vec::new();
        };
        match self.state {
            ChannelState::Connecting | ChannelState::Open
                if self.session_id.as_deref() == Some(session_id) =>
            {
                Vec::new()
            }
            ChannelState::Connecting | ChannelState::Open => {
                let mut commands = vec![ChannelCommand::Disconnect {
                    generation: self.generation,
                }];
                self.attempts = 0;
                commands.push(self.connect(session_id.to_string()));
                commands
            }
            ChannelState::Closed | ChannelState::Reconnecting => {
                self.attempts = 0;
                vec![self.connect(session_id.to_string())]
            }
        }
    }

    /// The transport for `generation` finished its handshake.
    pub fn on_established(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.state != ChannelState::Connecting {
            return false;
        }
        self.state = ChannelState::Open;
        self.attempts = 0;
        true
    }

    /// The transport for `generation` went away without being asked to.
    pub fn on_transport_closed(
        &mut self,
        generation: u64,
        scrape_pending: bool,
    ) -> (DropOutcome, Vec<ChannelCommand>) {
        if generation != self.generation
            || !matches!(self.state, ChannelState::Connecting | ChannelState::Open)
        {
            return (DropOutcome::Ignored, Vec::new());
        }
        if !scrape_pending {
            self.state = ChannelState::Closed;
            return (DropOutcome::Closed, Vec::new());
        }
        if let Some(max) = self.policy.max_attempts {
            if self.attempts >= max {
                self.state = ChannelState::Closed;
                return (DropOutcome::GaveUp, Vec::new());
            }
        }
        self.attempts += 1;
        self.state = ChannelState::Reconnecting;
        (
            DropOutcome::Reconnecting,
            vec![ChannelCommand::ScheduleReconnect {
                generation,
                delay: self.policy.delay,
            }],
        )
    }

    /// The reconnect delay scheduled for `generation` has elapsed.
    pub fn on_backoff_elapsed(&mut self, generation: u64) -> Vec<ChannelCommand> {
        if generation != self.generation || self.state != ChannelState::Reconnecting {
            return Vec::new();
        }
        match self.session_id.clone() {
            Some(session_id) => vec![self.connect(session_id)],
            None => {
                self.state = ChannelState::Closed;
                Vec::new()
            }
        }
    }

    pub fn close(&mut self) -> Vec<ChannelCommand> {
        let previous = std::mem::replace(&mut self.state, ChannelState::Closed);
        self.attempts = 0;
        match previous {
            ChannelState::Connecting | ChannelState::Open => vec![ChannelCommand::Disconnect {
                generation: self.generation,
            }],
            ChannelState::Closed | ChannelState::Reconnecting => Vec::new(),
        }
    }

    fn connect(&mut self, session_id: String) -> ChannelCommand {
        self.generation += 1;
        self.state = ChannelState::Connecting;
        self.session_id = Some(session_id.clone());
        ChannelCommand::Connect {
            generation: self.generation,
            session_id,
        }
    }
}
