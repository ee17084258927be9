use std::sync::Arc;

use color_eyre::Result;
use common::{one_shot, run, source, text, INIT_LEN, TRAILER_LEN};
use minitel_sender::{link::mock::MockBuilder, signals::RunFlags, supervisor::Outcome};
use pretty_assertions::assert_eq;

mod common;

#[tokio::test(start_paused = true)]
async fn one_pass_of_150_bytes() -> Result<()> {
    let flags = Arc::new(RunFlags::default());
    let connector = MockBuilder::new("one-pass").build();
    let device = connector.device();
    let body = text(150);
    let path = source("one-pass", &body);

    let outcome = run(connector, one_shot(&path), flags.clone()).await;

    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(outcome.exit_code(), 0);
    assert!(!flags.keep_running());

    let mut expected = vec![0x0C];
    expected.extend([b'\n'; 10]);
    expected.extend(&body[..80]);
    expected.extend(b"\r\n");
    expected.extend(&body[80..]);
    expected.push(b'\r');
    expected.extend([b'\n'; 70]);

    assert_eq!(device.wire(), expected);
    assert_eq!(device.wire().len(), INIT_LEN + 150 + 2 + TRAILER_LEN);
    assert_eq!(device.opens(), 1);
    assert_eq!(device.closes(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn line_feeds_in_source_are_dropped() -> Result<()> {
    let flags = Arc::new(RunFlags::default());
    let connector = MockBuilder::new("line-feeds").build();
    let device = connector.device();
    let path = source("line-feeds", b"Bonjour\nle\nMinitel\n");

    let outcome = run(connector, one_shot(&path), flags).await;
    assert_eq!(outcome, Outcome::Completed);

    let wire = device.wire();
    let body = &wire[INIT_LEN..wire.len() - TRAILER_LEN];
    assert_eq!(body, b"BonjourleMinitel");

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn missing_source_keeps_retrying_until_stopped() -> Result<()> {
    let flags = Arc::new(RunFlags::default());
    let connector = MockBuilder::new("missing-source").build();
    let device = connector.device();
    let path = std::path::PathBuf::from("/definitely/not/a/poem.txt");

    let stopper = flags.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        stopper.request_stop();
    });

    let outcome = run(connector, one_shot(&path), flags).await;

    // A missing file is recoverable: the link is cycled and the file tried again
    assert_eq!(outcome, Outcome::Stopped);
    assert!(device.opens() > 1);
    assert_eq!(device.opens(), device.closes());

    Ok(())
}
