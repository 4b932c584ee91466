use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Open,
    Errored,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Open
    }
}

/// Inputs to the push-channel state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEvent {
    StartRequested,
    Opened,
    TransportFailed,
    RetryElapsed,
    AuthRejected,
    StopRequested,
}

/// What the driver has to do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelAction {
    OpenConnection,
    ScheduleReconnect { attempt: u32 },
    CloseConnection,
}

/// Push-channel lifecycle: `Disconnected -> Connecting -> Open <-> Errored`.
///
/// At most one connection attempt is live per machine: starting while
/// connecting, open or waiting to reconnect does nothing. Each start opens a
/// new epoch so drivers can recognise events from a run that was stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMachine {
    state: ConnectionState,
    failures: u32,
    epoch: u64,
}

impl ChannelMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Consecutive failures since the last successful open.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn handle(&mut self, event: ChannelEvent) -> Option<ChannelAction> {
        use ChannelEvent as E;
        use ConnectionState as S;

        match (self.state, event) {
            (S::Disconnected, E::StartRequested) => {
                self.epoch += 1;
                self.failures = 0;
                self.state = S::Connecting;
                Some(ChannelAction::OpenConnection)
            }
            (S::Connecting | S::Open | S::Errored, E::StartRequested) => None,
            (S::Connecting, E::Opened) => {
                self.failures = 0;
                self.state = S::Open;
                None
            }
            (S::Connecting | S::Open, E::TransportFailed) => {
                self.failures = self.failures.saturating_add(1);
                self.state = S::Errored;
                Some(ChannelAction::ScheduleReconnect {
                    attempt: self.failures,
                })
            }
            (S::Errored, E::RetryElapsed) => {
                self.state = S::Connecting;
                Some(ChannelAction::OpenConnection)
            }
            (S::Connecting | S::Open, E::AuthRejected) => {
                self.state = S::Disconnected;
                Some(ChannelAction::CloseConnection)
            }
            (S::Disconnected, E::StopRequested) => None,
            (_, E::StopRequested) => {
                self.state = S::Disconnected;
                Some(ChannelAction::CloseConnection)
            }
            // Late or duplicate signals from the transport are ignored.
            (_, E::Opened | E::TransportFailed | E::RetryElapsed | E::AuthRejected) => None,
        }
    }
}

/// Delay between losing the channel and the next connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    Fixed(Duration),
    Exponential { initial: Duration, max: Duration },
}

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Fixed(DEFAULT_RECONNECT_DELAY)
    }
}

impl ReconnectPolicy {
    /// `attempt` is 1 for the first retry after a failure.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match *self {
            ReconnectPolicy::Fixed(delay) => delay,
            ReconnectPolicy::Exponential { initial, max } => {
                let shift = attempt.saturating_sub(1).min(31);
                initial
                    .checked_mul(1u32 << shift)
                    .map_or(max, |delay| delay.min(max))
            }
        }
    }
}
