//! Idle timeout handling.

mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::Harness;
use holdfast::DelayError;
use holdfast::http::response::StatusCode;

#[tokio::test(start_paused = true)]
async fn test_timeout_with_cancel_observer() {
    let mut h = Harness::new("/wait");
    let status = h.response.clone().unwrap();
    let mut delay = h.delay();

    let cancels = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(AtomicUsize::new(0));
    let (c, e) = (cancels.clone(), errors.clone());
    delay
        .on_cancel(move |ctx| {
            c.fetch_add(1, Ordering::SeqCst);
            ctx.response.end();
        })
        .on_error(move |_, _| {
            e.fetch_add(1, Ordering::SeqCst);
        });

    let completion = delay.wait(Some(Duration::from_millis(50))).unwrap();
    delay.run().await.unwrap();

    assert_eq!(status.status(), StatusCode::Accepted);
    assert_eq!(cancels.load(Ordering::SeqCst), 1);
    assert_eq!(errors.load(Ordering::SeqCst), 0);
    assert!(!completion.done("too late"));

    drop(status);
    let written = h.finish().await;
    assert_eq!(written.status, 202);
    assert!(written.body.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_reaches_error_observer() {
    let mut h = Harness::new("/wait");
    let mut delay = h.delay();
    let caught = Arc::new(Mutex::new(None));
    let slot = caught.clone();
    delay.on_error(move |ctx, err| {
        *slot.lock().unwrap() = err.downcast_ref::<DelayError>().cloned();
        ctx.response.end();
    });

    delay.wait(Some(Duration::from_millis(30))).unwrap();
    delay.run().await.unwrap();

    assert_eq!(
        *caught.lock().unwrap(),
        Some(DelayError::Timeout(Duration::from_millis(30)))
    );
    assert_eq!(h.finish().await.status, 202);
}

#[tokio::test(start_paused = true)]
async fn test_unhandled_timeout_faults_run() {
    let mut h = Harness::new("/wait");
    let mut delay = h.delay();
    delay.wait(Some(Duration::from_millis(10))).unwrap();

    let err = delay.run().await.unwrap_err();
    let timeout = err.downcast_ref::<DelayError>().unwrap();
    assert!(timeout.is_timeout());
    assert_eq!(timeout.as_label(), "timeout");
}

#[tokio::test(start_paused = true)]
async fn test_completion_before_timeout_keeps_status() {
    let mut h = Harness::new("/wait");
    let mut delay = h.delay();
    let completion = delay.wait(Some(Duration::from_millis(100))).unwrap();
    let run = tokio::spawn(delay.run());

    tokio::time::sleep(Duration::from_millis(40)).await;
    completion.done("fast");
    run.await.unwrap().unwrap();

    let written = h.finish().await;
    assert_eq!(written.status, 200);
    assert_eq!(written.body_str(), "fast");
}

#[tokio::test(start_paused = true)]
async fn test_timeout_during_polling_cancels_heartbeat() {
    let mut h = Harness::new("/poll");
    let mut delay = h.delay();
    let polls = Arc::new(AtomicUsize::new(0));
    let seen = polls.clone();
    delay
        .on_poll(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .on_cancel(|ctx| {
            ctx.response.write("timeout");
            ctx.response.end();
        });

    delay
        .start(
            Some(Duration::from_millis(10)),
            None,
            Some(Duration::from_millis(45)),
        )
        .unwrap();
    delay.run().await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(polls.load(Ordering::SeqCst), 3);
    assert_eq!(h.finish().await.body_str(), "   timeout");
}

#[tokio::test(start_paused = true)]
async fn test_timeout_drops_outstanding_job() {
    let mut h = Harness::new("/wait");
    let mut delay = h.delay();
    delay.on_cancel(|ctx| {
        ctx.response.end();
    });
    let completion = delay.wait(Some(Duration::from_millis(50))).unwrap();

    let finished = Arc::new(AtomicBool::new(false));
    let flag = finished.clone();
    let job = completion.settle(async move {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        flag.store(true, Ordering::SeqCst);
        Ok::<_, anyhow::Error>("done")
    });
    delay.run().await.unwrap();

    assert!(!job.await.unwrap());
    tokio::time::sleep(Duration::from_secs(3601)).await;
    assert!(!finished.load(Ordering::SeqCst));
    assert_eq!(h.finish().await.status, 202);
}
