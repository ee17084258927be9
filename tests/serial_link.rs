//! The supervisor driving the real serial connector, with no device attached.

use std::{sync::Arc, time::Duration};

use color_eyre::Result;
use minitel_sender::{
    config::{Config, TransmissionConfig},
    link::serial::SerialConnector,
    signals::RunFlags,
    supervisor::{Outcome, State, Supervisor},
};
use pretty_assertions::assert_eq;

const ABSENT: &str = "/dev/ttyMinitelAbsent";

fn transmission(one_shot: bool) -> TransmissionConfig {
    TransmissionConfig::new(file!(), ABSENT, Duration::from_micros(1_000), one_shot)
}

#[tokio::test(start_paused = true)]
async fn absent_device_exhausts_the_retry_budget() -> Result<()> {
    let flags = Arc::new(RunFlags::default());
    let start = tokio::time::Instant::now();

    let mut supervisor =
        Supervisor::new(SerialConnector, transmission(true), Config::default(), flags);
    let outcome = supervisor_run(&mut supervisor).await;

    assert_eq!(outcome, Outcome::RetriesExhausted);
    assert_eq!(outcome.exit_code(), 1);
    assert!(start.elapsed() >= Duration::from_secs(20));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stop_while_waiting_for_absent_device() -> Result<()> {
    let flags = Arc::new(RunFlags::default());

    let stopper = flags.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(12)).await;
        stopper.request_stop();
    });

    let mut supervisor =
        Supervisor::new(SerialConnector, transmission(false), Config::default(), flags);
    let outcome = supervisor_run(&mut supervisor).await;

    // Third attempt was at 10 s, the budget was not spent
    assert_eq!(outcome, Outcome::Stopped);
    assert_eq!(supervisor.retry_count(), 3);

    Ok(())
}

/// Step through states by hand so the supervisor can be inspected afterwards.
async fn supervisor_run(supervisor: &mut Supervisor<SerialConnector>) -> Outcome {
    let mut state = State::Closed;
    loop {
        state = match supervisor.step(state).await {
            State::Terminated(outcome) => return outcome,
            next => next,
        };
    }
}
