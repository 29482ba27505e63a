//! State machine tests for the session actor.
//!
//! Covers the transitions between Uninitialized and Ready, recovery after a
//! failed project compile, and what happens to requests after Disconnect.

#[cfg(test)]
mod tests {
  use std::sync::atomic::Ordering;

  use pretty_assertions::assert_eq;

  use crate::actor::{
    NO_ACTIVE_SESSION, SessionError,
    __tests__::helpers::{APP_A, APP_B, APP_PROJECT, FakeBackend, SessionTestContext, init_params},
  };

  // ==========================================================================
  // Project compile
  // ==========================================================================

  #[tokio::test]
  async fn test_init_compiles_every_source_file() {
    let ctx = SessionTestContext::with_app_project();

    let (project, output) = ctx
      .handle
      .project_changed(init_params(APP_PROJECT))
      .await
      .expect("actor alive")
      .expect("init should succeed");

    assert_eq!(project.source_files, vec![APP_A, APP_B]);
    assert_eq!(output.keys().cloned().collect::<Vec<_>>(), vec![APP_A, APP_B]);

    let output = ctx
      .handle
      .compile_file(APP_A)
      .await
      .expect("actor alive")
      .expect("compile should succeed");
    assert!(output.contains_key(APP_A));
  }

  #[tokio::test]
  async fn test_init_missing_project_reports_path() {
    let ctx = SessionTestContext::new(FakeBackend::new());

    let err = ctx
      .handle
      .project_changed(init_params("/nowhere/Missing.fsproj"))
      .await
      .expect("actor alive")
      .unwrap_err();
    assert!(err.contains("/nowhere/Missing.fsproj"), "got: {err}");

    // Still serving, and still uninitialized
    let err = ctx.handle.compile_file("/nowhere/A.fs").await.expect("actor alive").unwrap_err();
    assert_eq!(err, NO_ACTIVE_SESSION);
  }

  #[tokio::test]
  async fn test_init_rejects_empty_project_path() {
    let ctx = SessionTestContext::with_app_project();

    let result = ctx.handle.project_changed(init_params("")).await.expect("actor alive");
    assert!(result.is_err());
    assert!(ctx.backend.calls().is_empty(), "backend must not be called");
  }

  #[tokio::test]
  async fn test_init_normalizes_backslashes() {
    let ctx = SessionTestContext::with_app_project();

    let result = ctx
      .handle
      .project_changed(init_params("\\p\\App.fsproj"))
      .await
      .expect("actor alive");
    assert!(result.is_ok(), "got: {result:?}");
  }

  // ==========================================================================
  // File compile
  // ==========================================================================

  #[tokio::test]
  async fn test_compile_before_init_fails_cleanly() {
    let ctx = SessionTestContext::with_app_project();

    let err = ctx.handle.compile_file(APP_A).await.expect("actor alive").unwrap_err();

    assert_eq!(err, NO_ACTIVE_SESSION);
    assert_eq!(ctx.backend.file_compiles.load(Ordering::SeqCst), 0);
    assert!(!ctx.handle.is_closed());
  }

  #[tokio::test]
  async fn test_compile_twice_is_idempotent() {
    let ctx = SessionTestContext::with_app_project();
    ctx.handle.project_changed(init_params(APP_PROJECT)).await.unwrap().unwrap();

    let first = ctx.handle.compile_file(APP_B).await.unwrap().unwrap();
    let second = ctx.handle.compile_file(APP_B).await.unwrap().unwrap();

    assert_eq!(first, second);
    assert_eq!(ctx.backend.checkers_created(), 1, "file compiles reuse the session checker");
  }

  #[tokio::test]
  async fn test_compile_normalizes_path() {
    let ctx = SessionTestContext::with_app_project();
    ctx.handle.project_changed(init_params(APP_PROJECT)).await.unwrap().unwrap();

    let output = ctx.handle.compile_file("\\p\\A.fs").await.unwrap().unwrap();
    assert!(output.contains_key(APP_A));
  }

  #[tokio::test]
  async fn test_compile_folds_dot_segments() {
    let ctx = SessionTestContext::with_app_project();
    ctx.handle.project_changed(init_params(APP_PROJECT)).await.unwrap().unwrap();

    for spelling in ["/p/src/../A.fs", "/p/./A.fs"] {
      let output = ctx.handle.compile_file(spelling).await.unwrap();
      assert!(output.expect("equivalent path is in the project").contains_key(APP_A), "{spelling}");
    }
  }

  #[tokio::test]
  async fn test_compile_error_keeps_session() {
    let backend = FakeBackend::new();
    backend.add_project(APP_PROJECT, &[APP_A, APP_B]);
    let ctx = SessionTestContext::new(backend);
    ctx.handle.project_changed(init_params(APP_PROJECT)).await.unwrap().unwrap();

    ctx.backend.break_file(APP_B);
    let err = ctx.handle.compile_file(APP_B).await.unwrap().unwrap_err();
    assert!(err.contains("type mismatch"), "got: {err}");

    let output = ctx.handle.compile_file(APP_A).await.unwrap().unwrap();
    assert!(output.contains_key(APP_A));
  }

  #[tokio::test]
  async fn test_backend_panic_becomes_error_reply() {
    let backend = FakeBackend::new();
    backend.add_project(APP_PROJECT, &[APP_A, APP_B]);
    let ctx = SessionTestContext::new(backend);
    ctx.handle.project_changed(init_params(APP_PROJECT)).await.unwrap().unwrap();

    ctx.backend.panic_on(APP_B);
    let err = ctx.handle.compile_file(APP_B).await.expect("actor survives").unwrap_err();
    assert!(err.contains("emitter crashed"), "got: {err}");

    let output = ctx.handle.compile_file(APP_A).await.expect("actor survives").unwrap();
    assert!(output.contains_key(APP_A));
  }

  // ==========================================================================
  // Session replacement
  // ==========================================================================

  #[tokio::test]
  async fn test_failed_reinit_keeps_previous_session() {
    let ctx = SessionTestContext::with_app_project();
    ctx.handle.project_changed(init_params(APP_PROJECT)).await.unwrap().unwrap();
    let before = ctx.handle.compile_file(APP_A).await.unwrap().unwrap();

    // Same project, now unresolvable
    ctx.backend.remove_project(APP_PROJECT);
    let err = ctx.handle.project_changed(init_params(APP_PROJECT)).await.unwrap().unwrap_err();
    assert!(err.contains(APP_PROJECT), "got: {err}");

    let after = ctx.handle.compile_file(APP_A).await.unwrap().unwrap();
    assert_eq!(before, after, "old session should serve unchanged");
  }

  #[tokio::test]
  async fn test_failed_project_compile_keeps_previous_session() {
    let ctx = SessionTestContext::with_app_project();
    ctx.handle.project_changed(init_params(APP_PROJECT)).await.unwrap().unwrap();

    ctx.backend.break_file(APP_B);
    let err = ctx.handle.project_changed(init_params(APP_PROJECT)).await.unwrap().unwrap_err();
    assert!(err.contains(APP_B), "got: {err}");

    let output = ctx.handle.compile_file(APP_A).await.unwrap().unwrap();
    assert!(output[APP_A].contains("generation 1"), "got: {}", output[APP_A]);
  }

  #[tokio::test]
  async fn test_reinit_other_project_replaces_session() {
    let backend = FakeBackend::new();
    backend.add_project(APP_PROJECT, &[APP_A, APP_B]);
    backend.add_project("/q/Other.fsproj", &["/q/X.fs"]);
    let ctx = SessionTestContext::new(backend);

    ctx.handle.project_changed(init_params(APP_PROJECT)).await.unwrap().unwrap();
    let (project, output) = ctx
      .handle
      .project_changed(init_params("/q/Other.fsproj"))
      .await
      .unwrap()
      .unwrap();
    assert_eq!(project.source_files, vec!["/q/X.fs"]);
    assert_eq!(output.len(), 1);

    let err = ctx.handle.compile_file(APP_A).await.unwrap().unwrap_err();
    assert!(err.contains(APP_A), "got: {err}");

    let output = ctx.handle.compile_file("/q/X.fs").await.unwrap().unwrap();
    assert!(output["/q/X.fs"].contains("generation 2"), "fresh checker expected");
  }

  #[tokio::test]
  async fn test_reinit_creates_fresh_checker() {
    let ctx = SessionTestContext::with_app_project();

    ctx.handle.project_changed(init_params(APP_PROJECT)).await.unwrap().unwrap();
    ctx.handle.project_changed(init_params(APP_PROJECT)).await.unwrap().unwrap();

    assert_eq!(ctx.backend.checkers_created(), 2);
    let output = ctx.handle.compile_file(APP_A).await.unwrap().unwrap();
    assert!(output[APP_A].contains("generation 2"));
  }

  // ==========================================================================
  // Disconnect and shutdown
  // ==========================================================================

  #[tokio::test]
  async fn test_disconnect_abandons_later_requests() {
    let ctx = SessionTestContext::with_app_project();
    ctx.handle.project_changed(init_params(APP_PROJECT)).await.unwrap().unwrap();

    ctx.handle.disconnect().await.expect("disconnect is accepted");
    let result = ctx.handle.compile_file(APP_A).await;

    assert_eq!(result, Err(SessionError::Disconnected));
    assert_eq!(ctx.backend.file_compiles.load(Ordering::SeqCst), 0);
    ctx.join().await;
  }

  #[tokio::test]
  async fn test_cancel_stops_actor() {
    let ctx = SessionTestContext::with_app_project();
    ctx.cancel.cancel();

    let result = ctx.handle.project_changed(init_params(APP_PROJECT)).await;
    assert_eq!(result.err(), Some(SessionError::Disconnected));
    assert!(ctx.backend.calls().is_empty());
    ctx.join().await;
  }

  #[tokio::test]
  async fn test_actor_stops_when_handles_dropped() {
    let ctx = SessionTestContext::with_app_project();
    let SessionTestContext { handle, task, .. } = ctx;

    drop(handle);
    tokio::time::timeout(std::time::Duration::from_secs(5), task)
      .await
      .expect("actor should stop")
      .expect("actor task should not panic");
  }
}
