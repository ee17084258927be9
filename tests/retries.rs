use std::{sync::Arc, time::Duration};

use color_eyre::Result;
use common::{one_shot, run, run_with_config, source, text};
use minitel_sender::{
    config::Config, link::mock::MockBuilder, signals::RunFlags, supervisor::Outcome,
};
use pretty_assertions::assert_eq;

mod common;

#[tokio::test(start_paused = true)]
async fn five_failed_opens_are_fatal() -> Result<()> {
    let flags = Arc::new(RunFlags::default());
    let connector = MockBuilder::new("absent").always_fail_opens().build();
    let device = connector.device();
    let path = source("absent", &text(10));
    let start = tokio::time::Instant::now();

    let outcome = run(connector, one_shot(&path), flags).await;

    assert_eq!(outcome, Outcome::RetriesExhausted);
    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(device.open_attempts(), 5);
    assert!(device.wire().is_empty());

    // Four waits between five attempts
    assert!(start.elapsed() >= Duration::from_secs(20));
    assert!(start.elapsed() < Duration::from_secs(25));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn four_failed_opens_are_not_fatal() -> Result<()> {
    let flags = Arc::new(RunFlags::default());
    let connector = MockBuilder::new("slow-start").fail_opens(4).build();
    let device = connector.device();
    let path = source("slow-start", &text(10));

    let outcome = run(connector, one_shot(&path), flags).await;

    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(device.open_attempts(), 5);
    assert_eq!(device.opens(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn budget_comes_from_config() -> Result<()> {
    let flags = Arc::new(RunFlags::default());
    let connector = MockBuilder::new("budget").always_fail_opens().build();
    let device = connector.device();
    let path = source("budget", &text(10));
    let config = Config {
        max_retries: 2,
        retry_delay_ms: 100,
        ..Default::default()
    };

    let outcome = run_with_config(connector, one_shot(&path), config, flags).await;

    assert_eq!(outcome, Outcome::RetriesExhausted);
    assert_eq!(device.open_attempts(), 2);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stop_during_retry_wait_is_clean() -> Result<()> {
    let flags = Arc::new(RunFlags::default());
    let connector = MockBuilder::new("stop-waiting").always_fail_opens().build();
    let device = connector.device();
    let path = source("stop-waiting", &text(10));

    let stopper = flags.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(7)).await;
        stopper.request_stop();
    });

    let outcome = run(connector, one_shot(&path), flags).await;

    assert_eq!(outcome, Outcome::Stopped);
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(device.open_attempts(), 2);

    Ok(())
}
