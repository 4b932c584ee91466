use std::time::Duration;

use crawlwatch_core::{
    ChannelAction, ChannelEvent, ChannelMachine, ConnectionState, ReconnectPolicy,
};

fn open_machine() -> ChannelMachine {
    let mut machine = ChannelMachine::new();
    machine.handle(ChannelEvent::StartRequested);
    machine.handle(ChannelEvent::Opened);
    machine
}

#[test]
fn starts_disconnected_and_connects_on_start() {
    let mut machine = ChannelMachine::new();
    assert_eq!(machine.state(), ConnectionState::Disconnected);

    let action = machine.handle(ChannelEvent::StartRequested);
    assert_eq!(action, Some(ChannelAction::OpenConnection));
    assert_eq!(machine.state(), ConnectionState::Connecting);
    assert_eq!(machine.epoch(), 1);

    assert_eq!(machine.handle(ChannelEvent::Opened), None);
    assert!(machine.state().is_connected());
}

#[test]
fn start_while_active_is_a_noop() {
    let mut machine = ChannelMachine::new();
    machine.handle(ChannelEvent::StartRequested);
    assert_eq!(machine.handle(ChannelEvent::StartRequested), None);
    assert_eq!(machine.epoch(), 1);

    machine.handle(ChannelEvent::Opened);
    assert_eq!(machine.handle(ChannelEvent::StartRequested), None);

    machine.handle(ChannelEvent::TransportFailed);
    assert_eq!(machine.handle(ChannelEvent::StartRequested), None);
    assert_eq!(machine.state(), ConnectionState::Errored);
    assert_eq!(machine.epoch(), 1);
}

#[test]
fn error_schedules_retry_then_reconnects() {
    let mut machine = open_machine();

    let action = machine.handle(ChannelEvent::TransportFailed);
    assert_eq!(action, Some(ChannelAction::ScheduleReconnect { attempt: 1 }));
    assert!(!machine.state().is_connected());

    assert_eq!(
        machine.handle(ChannelEvent::RetryElapsed),
        Some(ChannelAction::OpenConnection)
    );
    assert_eq!(machine.state(), ConnectionState::Connecting);

    let action = machine.handle(ChannelEvent::TransportFailed);
    assert_eq!(action, Some(ChannelAction::ScheduleReconnect { attempt: 2 }));

    machine.handle(ChannelEvent::RetryElapsed);
    machine.handle(ChannelEvent::Opened);
    assert!(machine.state().is_connected());
    assert_eq!(machine.failures(), 0);
}

#[test]
fn stop_is_idempotent_from_every_state() {
    for steps in [
        vec![],
        vec![ChannelEvent::StartRequested],
        vec![ChannelEvent::StartRequested, ChannelEvent::Opened],
        vec![
            ChannelEvent::StartRequested,
            ChannelEvent::Opened,
            ChannelEvent::TransportFailed,
        ],
    ] {
        let mut machine = ChannelMachine::new();
        for step in &steps {
            machine.handle(*step);
        }
        let was_active = machine.state() != ConnectionState::Disconnected;

        let first = machine.handle(ChannelEvent::StopRequested);
        assert_eq!(first.is_some(), was_active);
        assert_eq!(machine.state(), ConnectionState::Disconnected);

        assert_eq!(machine.handle(ChannelEvent::StopRequested), None);
        assert_eq!(machine.state(), ConnectionState::Disconnected);
    }
}

#[test]
fn late_transport_signals_after_stop_are_ignored() {
    let mut machine = open_machine();
    machine.handle(ChannelEvent::StopRequested);

    for late in [
        ChannelEvent::Opened,
        ChannelEvent::TransportFailed,
        ChannelEvent::RetryElapsed,
        ChannelEvent::AuthRejected,
    ] {
        assert_eq!(machine.handle(late), None);
        assert_eq!(machine.state(), ConnectionState::Disconnected);
    }
}

#[test]
fn restart_after_stop_opens_a_new_epoch() {
    let mut machine = open_machine();
    machine.handle(ChannelEvent::StopRequested);
    machine.handle(ChannelEvent::StartRequested);
    assert_eq!(machine.epoch(), 2);
}

#[test]
fn auth_rejection_disconnects_without_retry() {
    let mut machine = ChannelMachine::new();
    machine.handle(ChannelEvent::StartRequested);
    assert_eq!(
        machine.handle(ChannelEvent::AuthRejected),
        Some(ChannelAction::CloseConnection)
    );
    assert_eq!(machine.state(), ConnectionState::Disconnected);
}

#[test]
fn fixed_policy_never_grows() {
    let policy = ReconnectPolicy::default();
    assert_eq!(policy.delay_for(1), Duration::from_secs(5));
    assert_eq!(policy.delay_for(40), Duration::from_secs(5));
}

#[test]
fn exponential_policy_doubles_up_to_cap() {
    let policy = ReconnectPolicy::Exponential {
        initial: Duration::from_millis(500),
        max: Duration::from_secs(4),
    };
    assert_eq!(policy.delay_for(1), Duration::from_millis(500));
    assert_eq!(policy.delay_for(2), Duration::from_secs(1));
    assert_eq!(policy.delay_for(4), Duration::from_secs(4));
    assert_eq!(policy.delay_for(5), Duration::from_secs(4));
    assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(4));
}
