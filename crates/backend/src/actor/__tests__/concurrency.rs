//! Concurrency tests for the session actor.
//!
//! Many callers share one handle; the backend is slowed down so that any
//! overlap between compiles would be observed by its instrumentation.

#[cfg(test)]
mod tests {
  use std::{sync::atomic::Ordering, time::Duration};

  use pretty_assertions::assert_eq;

  use crate::actor::{
    SessionActorConfig, SessionError,
    __tests__::helpers::{APP_A, APP_B, APP_PROJECT, FakeBackend, SessionTestContext, init_params},
  };

  fn slow_app_backend() -> FakeBackend {
    let backend = FakeBackend::with_delay(Duration::from_millis(10));
    backend.add_project(APP_PROJECT, &[APP_A, APP_B]);
    backend
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn test_compiles_never_overlap() {
    let ctx = SessionTestContext::new(slow_app_backend());

    let mut tasks = Vec::new();
    for i in 0..24 {
      let handle = ctx.handle.clone();
      tasks.push(tokio::spawn(async move {
        if i % 6 == 0 {
          handle.project_changed(init_params(APP_PROJECT)).await.map(|r| r.is_ok())
        } else {
          let file = if i % 2 == 0 { APP_A } else { APP_B };
          // Before the first init lands these fail with "No active session"; either way they get a reply
          handle.compile_file(file).await.map(|_| true)
        }
      }));
    }

    for task in tasks {
      let replied = task.await.expect("caller task");
      assert!(replied.is_ok(), "every queued request gets a reply");
    }

    assert_eq!(ctx.backend.max_active(), 1, "backend operations overlapped");
    assert_eq!(ctx.backend.project_compiles.load(Ordering::SeqCst), 4);
  }

  #[tokio::test]
  async fn test_requests_served_in_arrival_order() {
    let ctx = SessionTestContext::new(slow_app_backend());
    ctx.handle.project_changed(init_params(APP_PROJECT)).await.unwrap().unwrap();

    // join! polls in argument order, so the sends enqueue in this order
    let (b, a, reinit, b2) = tokio::join!(
      ctx.handle.compile_file(APP_B),
      ctx.handle.compile_file(APP_A),
      ctx.handle.project_changed(init_params(APP_PROJECT)),
      ctx.handle.compile_file(APP_B),
    );
    assert!(b.unwrap().is_ok());
    assert!(a.unwrap().is_ok());
    assert!(reinit.unwrap().is_ok());
    assert!(b2.unwrap().unwrap()[APP_B].contains("generation 2"));

    let calls = ctx.backend.calls();
    assert_eq!(
      calls[2..],
      [
        format!("compile_file:{APP_B}"),
        format!("compile_file:{APP_A}"),
        format!("crack_project:{APP_PROJECT}"),
        format!("compile_project:{APP_PROJECT}"),
        format!("compile_file:{APP_B}"),
      ]
    );
  }

  #[tokio::test]
  async fn test_disconnect_during_compile_finishes_current_request() {
    let ctx = SessionTestContext::new(FakeBackend::with_delay(Duration::from_millis(50)));
    ctx.backend.add_project(APP_PROJECT, &[APP_A, APP_B]);

    let handle = ctx.handle.clone();
    let in_flight = tokio::spawn(async move { handle.project_changed(init_params(APP_PROJECT)).await });

    // Let the actor pick up the init before queueing behind it
    while ctx.backend.calls().is_empty() {
      tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let (disconnected, queued) = tokio::join!(ctx.handle.disconnect(), ctx.handle.compile_file(APP_A));
    assert!(disconnected.is_ok());
    assert_eq!(queued, Err(SessionError::Disconnected));

    let finished = in_flight.await.expect("caller task").expect("in-flight request is answered");
    assert!(finished.is_ok());
    assert_eq!(ctx.backend.file_compiles.load(Ordering::SeqCst), 0);
    ctx.join().await;
  }

  #[tokio::test]
  async fn test_small_mailbox_applies_backpressure() {
    let config = SessionActorConfig {
      mailbox_capacity: 1,
      ..SessionActorConfig::default()
    };
    let ctx = SessionTestContext::with_config(slow_app_backend(), config);
    ctx.handle.project_changed(init_params(APP_PROJECT)).await.unwrap().unwrap();

    let results = futures::future::join_all((0..8).map(|_| ctx.handle.compile_file(APP_A))).await;

    assert!(results.iter().all(|r| matches!(r, Ok(Ok(_)))));
    assert_eq!(ctx.backend.file_compiles.load(Ordering::SeqCst), 8);
    assert_eq!(ctx.backend.max_active(), 1);
  }
}
