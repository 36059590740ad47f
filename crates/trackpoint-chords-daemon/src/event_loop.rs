//! The daemon's single wait point
//!
//! One loop multiplexes device input, the idle timeout and shutdown requests.
//! Events are decoded and handled one at a time in arrival order; every
//! collaborator call finishes before the next wait starts.

use std::io;

use tokio::time::Instant;

use crate::diff::KeySink;
use crate::error::DaemonError;
use crate::input::{decode, InputSource, RawEvent};
use crate::machine::{Machine, ModeSwitch};
use crate::shutdown::ShutdownFlag;

enum Waited {
    Event(RawEvent),
    TimedOut,
    Failed(io::Error),
}

/// Run until shutdown is requested or the device keeps failing.
///
/// Either way the machine is force-deactivated before returning, so no
/// modifier stays held and native clicks are back on.
pub async fn run<S, K, M>(
    source: &mut S,
    machine: &mut Machine<K, M>,
    shutdown: &mut ShutdownFlag,
    max_read_errors: u32,
) -> Result<(), DaemonError>
where
    S: InputSource,
    K: KeySink,
    M: ModeSwitch,
{
    let mut read_errors = 0;

    let outcome = loop {
        if shutdown.pending().is_some() {
            break Ok(());
        }

        // Deadline stays fixed across retries, so an interrupted wait resumes
        // with whatever budget is left
        let deadline = machine.idle_deadline();

        let waited = tokio::select! {
            biased;
            _ = shutdown.requested() => continue,
            waited = wait_for_event(source, deadline) => waited,
        };

        match waited {
            Waited::TimedOut => machine.activate().await,
            Waited::Event(raw) => {
                read_errors = 0;
                let event = decode(raw);
                tracing::trace!("{:?} -> {:?} ({:?})", raw, event, machine.mode());
                machine.handle(event).await;
            }
            Waited::Failed(e) if e.kind() == io::ErrorKind::Interrupted => {
                tracing::debug!("Wait interrupted, resuming");
            }
            Waited::Failed(e) => {
                read_errors += 1;
                tracing::warn!(
                    "Failed to read input event ({}/{}): {}",
                    read_errors,
                    max_read_errors,
                    e
                );
                if read_errors >= max_read_errors {
                    break Err(DaemonError::InputFailed {
                        attempts: read_errors,
                        source: e,
                    });
                }
            }
        }
    };

    machine.shutdown().await;
    outcome
}

async fn wait_for_event<S: InputSource>(source: &mut S, deadline: Option<Instant>) -> Waited {
    let next = source.next_event();

    let result = match deadline {
        Some(deadline) => match tokio::time::timeout_at(deadline, next).await {
            Ok(result) => result,
            Err(_) => return Waited::TimedOut,
        },
        None => next.await,
    };

    match result {
        Ok(raw) => Waited::Event(raw),
        Err(e) => Waited::Failed(e),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use nix::sys::signal::Signal;
    use trackpoint_chords_config::TimingConfig;

    use super::*;
    use crate::chord::ButtonState;
    use crate::chord::ModifierKey::*;
    use crate::machine::ActivationMode;
    use crate::shutdown::{self, ShutdownTrigger};
    use crate::testing::*;

    fn timing() -> TimingConfig {
        TimingConfig {
            idle_timeout: Duration::from_millis(300),
            retry_backoff: Duration::from_millis(1000),
            max_read_errors: 3,
        }
    }

    fn setup(log: &CallLog) -> (Machine<RecordingKeys, RecordingSwitch>, ShutdownTrigger, ShutdownFlag) {
        let machine = Machine::new(RecordingKeys::new(log), RecordingSwitch::new(log), &timing());
        let (trigger, flag) = shutdown::channel();
        (machine, trigger, flag)
    }

    fn shutdown_at(trigger: ShutdownTrigger, at_ms: u64) {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(at_ms)).await;
            trigger.request(Signal::SIGTERM);
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_chord_session() {
        let log = CallLog::default();
        let (mut machine, trigger, mut flag) = setup(&log);
        let mut input = ScriptedInput::new()
            .event_at(0, left(true))
            .event_at(0, SYN)
            .event_at(1000, middle(true))
            .event_at(1000, SYN)
            .event_at(2000, MOTION)
            .event_at(2000, SYN);
        shutdown_at(trigger, 2100);

        run(&mut input, &mut machine, &mut flag, 3).await.unwrap();

        assert_eq!(
            log.take(),
            vec![
                Call::Clicks(false),
                Call::Cursor(false),
                Call::Release(Control),
                Call::Press(Level5),
                Call::Release(Level5),
                Call::Clicks(true),
                Call::Cursor(true),
            ]
        );
        assert_eq!(machine.mode(), ActivationMode::Inactive);
        assert_eq!(machine.state(), ButtonState::RELEASED);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_activates_once() {
        let log = CallLog::default();
        let (mut machine, trigger, mut flag) = setup(&log);
        let mut input = ScriptedInput::new();
        shutdown_at(trigger, 5000);

        run(&mut input, &mut machine, &mut flag, 3).await.unwrap();

        // Activation, then the forced deactivation at shutdown
        assert_eq!(
            log.take(),
            vec![
                Call::Clicks(false),
                Call::Cursor(false),
                Call::Clicks(true),
                Call::Cursor(true),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_continuous_motion_never_activates() {
        let log = CallLog::default();
        let (mut machine, trigger, mut flag) = setup(&log);
        let mut input = ScriptedInput::new();
        for t in (0..2000).step_by(200) {
            input = input.event_at(t, MOTION);
        }
        // Last motion at 1800ms, so the budget would run out at 2100ms
        input = input.event_at(2050, right(true));
        shutdown_at(trigger, 2080);

        run(&mut input, &mut machine, &mut flag, 3).await.unwrap();

        assert!(log.take().is_empty());
        assert_eq!(machine.mode(), ActivationMode::Inactive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_button_while_inactive_does_not_delay_activation() {
        let log = CallLog::default();
        let (mut machine, trigger, mut flag) = setup(&log);
        let mut input = ScriptedInput::new()
            .event_at(0, MOTION)
            .event_at(250, right(true))
            .event_at(350, right(false));
        shutdown_at(trigger, 400);

        run(&mut input, &mut machine, &mut flag, 3).await.unwrap();

        // Activated at 300ms with right held, so its release drops Shift
        assert_eq!(
            log.take(),
            vec![
                Call::Clicks(false),
                Call::Cursor(false),
                Call::Release(Shift),
                Call::Clicks(true),
                Call::Cursor(true),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupted_wait_keeps_remaining_budget() {
        let log = CallLog::default();
        let (mut machine, trigger, mut flag) = setup(&log);
        let mut input = ScriptedInput::new()
            .error_at(100, io::ErrorKind::Interrupted)
            .error_at(200, io::ErrorKind::Interrupted)
            .event_at(350, right(true));
        shutdown_at(trigger, 400);

        run(&mut input, &mut machine, &mut flag, 3).await.unwrap();

        // Still activated at 300ms despite two interruptions
        assert_eq!(
            log.take(),
            vec![
                Call::Clicks(false),
                Call::Cursor(false),
                Call::Press(Shift),
                Call::Release(Shift),
                Call::Clicks(true),
                Call::Cursor(true),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_error_skipped() {
        let log = CallLog::default();
        let (mut machine, trigger, mut flag) = setup(&log);
        let mut input = ScriptedInput::new()
            .error_at(400, io::ErrorKind::Other)
            .event_at(500, left(true));
        shutdown_at(trigger, 600);

        run(&mut input, &mut machine, &mut flag, 3).await.unwrap();

        assert_eq!(
            log.take()[2..],
            [
                Call::Press(Control),
                Call::Release(Control),
                Call::Clicks(true),
                Call::Cursor(true)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_read_errors_are_fatal() {
        let log = CallLog::default();
        let (mut machine, _trigger, mut flag) = setup(&log);
        let mut input = ScriptedInput::new()
            .event_at(400, right(true))
            .error_at(500, io::ErrorKind::Other)
            .error_at(500, io::ErrorKind::Other)
            .error_at(500, io::ErrorKind::Other);

        let err = run(&mut input, &mut machine, &mut flag, 3).await.unwrap_err();

        assert!(matches!(err, DaemonError::InputFailed { attempts: 3, .. }));
        // Forced deactivation still ran
        assert_eq!(
            log.take(),
            vec![
                Call::Clicks(false),
                Call::Cursor(false),
                Call::Press(Shift),
                Call::Release(Shift),
                Call::Clicks(true),
                Call::Cursor(true),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_read_resets_error_count() {
        let log = CallLog::default();
        let (mut machine, trigger, mut flag) = setup(&log);
        let mut input = ScriptedInput::new()
            .error_at(10, io::ErrorKind::Other)
            .error_at(20, io::ErrorKind::Other)
            .event_at(30, SYN)
            .error_at(40, io::ErrorKind::Other)
            .error_at(50, io::ErrorKind::Other);
        shutdown_at(trigger, 100);

        assert!(run(&mut input, &mut machine, &mut flag, 3).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_already_pending() {
        let log = CallLog::default();
        let (mut machine, trigger, mut flag) = setup(&log);
        let mut input = ScriptedInput::new().event_at(0, left(true));
        trigger.request(Signal::SIGINT);

        run(&mut input, &mut machine, &mut flag, 3).await.unwrap();

        assert!(log.take().is_empty());
        assert_eq!(machine.state(), ButtonState::RELEASED);
        assert_eq!(flag.pending(), Some(Signal::SIGINT));
    }
}
