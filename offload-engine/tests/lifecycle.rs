//! Job lifecycle against a mock scheduler

use base64::Engine as _;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use offload_client::SessionStore;
use offload_core::artifact::{ERROR_FILE, RESULT_FILE};
use offload_core::{Credentials, JobHandle, JobOutcome, JobRef, JobState, SessionToken};
use offload_engine::{
    DownloadOutcome, Engine, EngineConfig, EngineError, Interrupt, SubmitMode, WaitOutcome,
    WorkUnit,
};

const SERVICE: &str = "/platform/webservice/pacclient";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn engine_in(dir: &tempfile::TempDir, poll_interval: Duration) -> Engine {
    let config = EngineConfig::new(dir.path().join("ws")).with_poll_interval(poll_interval);
    Engine::new(config).unwrap()
}

fn credentials(server: &MockServer) -> Credentials {
    Credentials::new("alice", "s3cret&", "127.0.0.1", server.address().port())
}

async fn logged_in(server: &MockServer, poll_interval: Duration) -> (tempfile::TempDir, Engine) {
    init_tracing();
    Mock::given(method("GET"))
        .and(path(format!("{}/logon/", SERVICE)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<User><token>abc</token><jtoken>J1</jtoken></User>"),
        )
        .mount(server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let engine = engine_in(&dir, poll_interval);
    engine.logon(&credentials(server)).await.unwrap();
    (dir, engine)
}

async fn mount_submit(server: &MockServer, id: u64) {
    Mock::given(method("POST"))
        .and(path(format!("{}/submitapp", SERVICE)))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(format!("<Job><id>{}</id></Job>", id)),
        )
        .mount(server)
        .await;
}

async fn mount_status(server: &MockServer, id: u64, status: &str, expected: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path(format!("{}/jobs", SERVICE)))
        .and(query_param("id", id.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "<Jobs><Job><id>{}</id><name>job</name><status>{}</status></Job></Jobs>",
            id, status
        )));
    match expected {
        Some(n) => mock.expect(n).mount(server).await,
        None => mock.mount(server).await,
    }
}

fn retrieval_body(files: &[(&str, &str)]) -> String {
    let boundary = "--uuid:5d1f0c2e";
    let mut body = boundary.to_string();
    for (name, content) in files {
        body.push_str(&format!(
            "\r\nContent-Type: application/octet-stream\r\nContent-ID: <{}>\r\n\r\n{}\r\n",
            name, content
        ));
        body.push_str(boundary);
    }
    body.push_str("--\r\n");
    body
}

async fn mount_files(server: &MockServer, id: u64, files: &[(&str, &str)]) {
    Mock::given(method("GET"))
        .and(path(format!("{}/file/{}", SERVICE, id)))
        .respond_with(ResponseTemplate::new(200).set_body_string(retrieval_body(files)))
        .mount(server)
        .await;
}

async fn mount_kill(server: &MockServer, id: u64) {
    Mock::given(method("GET"))
        .and(path(format!("{}/jobOperation/kill/{}", SERVICE, id)))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "<actionMsg>Job &lt;{}&gt; is being terminated</actionMsg>",
            id
        )))
        .mount(server)
        .await;
}

async fn requests_to(server: &MockServer, suffix: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path().ends_with(suffix))
        .count()
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

fn unit() -> WorkUnit {
    WorkUnit::new("python3 -c").arg("print(6 * 7)")
}

#[tokio::test]
async fn test_logon_persists_token_with_secondary() {
    let server = MockServer::start().await;
    let (dir, engine) = logged_in(&server, Duration::from_secs(1)).await;

    assert!(engine.is_logged_in());
    let token = engine.current_token().unwrap();
    assert_eq!(token.token, "abc");
    assert_eq!(token.secondary_token.as_deref(), Some("J1"));
    assert_eq!(
        token.server_url,
        format!("http://127.0.0.1:{}/platform/", server.address().port())
    );

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body).into_owned();
    assert!(body.contains("<pass>s3cret&amp;</pass>"));
    drop(dir);
}

#[tokio::test]
async fn test_rejected_logon_leaves_no_session() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/logon/", SERVICE)))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<Error><errMsg>bad password</errMsg></Error>"),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let engine = engine_in(&dir, Duration::from_secs(1));
    let err = engine.logon(&credentials(&server)).await.unwrap_err();

    assert_eq!(err.to_string(), "Logon rejected: bad password");
    assert!(!engine.is_logged_in());
    assert!(engine.current_token().is_none());
}

#[tokio::test]
async fn test_submit_without_session_makes_no_request() {
    init_tracing();
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_in(&dir, Duration::from_secs(1));

    let err = engine
        .submit(&unit(), &[], SubmitMode::detached())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::NotAuthenticated));
    assert_eq!(request_count(&server).await, 0);
}

#[tokio::test]
async fn test_submit_then_get_is_pending() {
    let server = MockServer::start().await;
    let (_dir, engine) = logged_in(&server, Duration::from_secs(1)).await;
    mount_submit(&server, 42).await;
    mount_status(&server, 42, "RUN", None).await;

    let submission = engine
        .submit(&unit(), &[], SubmitMode::detached())
        .await
        .unwrap();
    assert!(submission.waited.is_none());

    let record = engine.record(JobRef::Handle(submission.handle)).unwrap();
    assert_eq!(record.state, JobState::Sent);
    assert_eq!(record.remote_id, Some(42));

    let outcome = engine.get(JobRef::Handle(submission.handle)).await.unwrap();
    assert_eq!(outcome, JobOutcome::Pending);

    let requests = server.received_requests().await.unwrap();
    let submit = requests
        .iter()
        .find(|r| r.url.path().ends_with("/submitapp"))
        .unwrap();
    let body = String::from_utf8_lossy(&submit.body).into_owned();
    assert!(body.contains("<id>COMMANDTORUN</id>"));
    assert!(body.contains("<value>sh job.sh</value>"));
    assert!(body.contains("<value>./lsf.errput</value>"));
    assert!(body.contains("Content-ID: <job.sh>"));
}

#[tokio::test]
async fn test_blocking_submit_returns_within_one_interval() {
    let server = MockServer::start().await;
    let interval = Duration::from_secs(1);
    let (_dir, engine) = logged_in(&server, interval).await;
    mount_submit(&server, 42).await;
    mount_status(&server, 42, "Done", Some(1)).await;
    let encoded = base64::engine::general_purpose::STANDARD.encode(b"42");
    mount_files(&server, 42, &[(RESULT_FILE, &encoded)]).await;

    let started = Instant::now();
    let submission = engine
        .submit(&unit(), &[], SubmitMode::blocking(interval))
        .await
        .unwrap();

    assert!(started.elapsed() < interval);
    assert_eq!(
        submission.waited,
        Some(WaitOutcome::Completed(JobOutcome::Done(b"42".to_vec())))
    );

    // Terminal results come from cache.
    let before = request_count(&server).await;
    let first = engine.get(JobRef::Handle(submission.handle)).await.unwrap();
    let second = engine.get(JobRef::Handle(submission.handle)).await.unwrap();
    assert_eq!(first, JobOutcome::Done(b"42".to_vec()));
    assert_eq!(first, second);
    assert_eq!(request_count(&server).await, before);
}

#[tokio::test]
async fn test_exit_reports_error_artifact() {
    let server = MockServer::start().await;
    let (dir, engine) = logged_in(&server, Duration::from_secs(1)).await;
    mount_submit(&server, 43).await;
    mount_status(&server, 43, "Exit", None).await;
    mount_files(&server, 43, &[(ERROR_FILE, "boom")]).await;

    let submission = engine
        .submit(&unit(), &[], SubmitMode::detached())
        .await
        .unwrap();
    let outcome = engine.get(JobRef::Handle(submission.handle)).await.unwrap();

    assert_eq!(outcome, JobOutcome::Exit("boom".to_string()));
    let record = engine.record(JobRef::Remote(43)).unwrap();
    assert_eq!(record.state, JobState::Exit);

    let artifact = dir
        .path()
        .join("ws")
        .join(submission.handle.to_string())
        .join(ERROR_FILE);
    assert_eq!(std::fs::read_to_string(artifact).unwrap(), "boom");
}

#[tokio::test]
async fn test_timeout_cancels_and_kills() {
    let server = MockServer::start().await;
    let (_dir, engine) = logged_in(&server, Duration::from_millis(100)).await;
    mount_submit(&server, 44).await;
    mount_status(&server, 44, "PEND", None).await;
    Mock::given(method("GET"))
        .and(path(format!("{}/jobOperation/kill/44", SERVICE)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<actionMsg>Job &lt;44&gt; is being terminated</actionMsg>"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let submission = engine
        .submit(
            &unit(),
            &[],
            SubmitMode::blocking(Duration::from_millis(350)),
        )
        .await
        .unwrap();

    assert_eq!(
        submission.waited,
        Some(WaitOutcome::TimedOut(submission.handle))
    );
    let record = engine.record(JobRef::Handle(submission.handle)).unwrap();
    assert_eq!(record.state, JobState::Cancelled);
    assert_eq!(
        engine.get(JobRef::Handle(submission.handle)).await.unwrap(),
        JobOutcome::Cancelled
    );
}

#[tokio::test]
async fn test_failed_submit_rolls_back_workspace() {
    let server = MockServer::start().await;
    let (dir, engine) = logged_in(&server, Duration::from_secs(1)).await;
    Mock::given(method("POST"))
        .and(path(format!("{}/submitapp", SERVICE)))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = engine
        .submit(&unit(), &[], SubmitMode::detached())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::RemoteActionFailed { .. }));
    assert!(engine.is_logged_in());

    let job_dirs = std::fs::read_dir(dir.path().join("ws"))
        .unwrap()
        .filter(|e| e.as_ref().unwrap().path().is_dir())
        .count();
    assert_eq!(job_dirs, 0);
    assert!(engine.records().is_empty());
}

#[tokio::test]
async fn test_invalid_dependency_makes_no_request() {
    let server = MockServer::start().await;
    let (dir, engine) = logged_in(&server, Duration::from_secs(1)).await;
    let before = request_count(&server).await;

    let missing = dir.path().join("missing.csv");
    let err = engine
        .submit(&unit(), &[missing], SubmitMode::detached())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::InvalidInput(_)));
    assert_eq!(request_count(&server).await, before);
}

#[tokio::test]
async fn test_logout_marker_downgrades_session() {
    let server = MockServer::start().await;
    let (_dir, engine) = logged_in(&server, Duration::from_secs(1)).await;
    Mock::given(method("GET"))
        .and(path(format!("{}/jobOperation/kill/45", SERVICE)))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<Error><errMsg>Your current login session was logout</errMsg></Error>",
        ))
        .mount(&server)
        .await;

    let err = engine.cancel(JobRef::Remote(45)).await.unwrap_err();
    assert!(matches!(err, EngineError::SessionExpired(_)));
    assert!(engine.current_token().is_none());
    assert!(!engine.is_logged_in());

    let before = request_count(&server).await;
    let err = engine.list_jobs("").await.unwrap_err();
    assert!(matches!(err, EngineError::NotAuthenticated));
    let err = engine.get(JobRef::Remote(46)).await.unwrap_err();
    assert!(matches!(err, EngineError::NotAuthenticated));
    assert_eq!(request_count(&server).await, before);
}

#[tokio::test]
async fn test_download_rejects_bad_names_before_any_request() {
    let server = MockServer::start().await;
    let (_dir, engine) = logged_in(&server, Duration::from_secs(1)).await;
    let before = request_count(&server).await;

    for name in ["/etc/passwd", "a/b/c", "dir/a.txt"] {
        let err = engine
            .download(JobRef::Remote(47), &[name.to_string()], None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)), "{}", name);
    }
    assert_eq!(request_count(&server).await, before);
}

#[tokio::test]
async fn test_download_to_default_directory() {
    let server = MockServer::start().await;
    let (dir, engine) = logged_in(&server, Duration::from_secs(1)).await;
    mount_files(&server, 48, &[("a.txt", "hello")]).await;

    let outcome = engine
        .download(JobRef::Remote(48), &["./a.txt".to_string()], None, false)
        .await
        .unwrap();

    let expected: PathBuf = dir.path().join("ws").join("48").join("a.txt");
    assert_eq!(outcome, DownloadOutcome::Written(vec![expected.clone()]));
    assert_eq!(std::fs::read_to_string(expected).unwrap(), "hello");

    let requests = server.received_requests().await.unwrap();
    let file_request = requests.last().unwrap();
    assert_eq!(String::from_utf8_lossy(&file_request.body), "./a.txt");
}

#[tokio::test]
async fn test_download_rejects_missing_destination() {
    let server = MockServer::start().await;
    let (dir, engine) = logged_in(&server, Duration::from_secs(1)).await;

    let missing = dir.path().join("nowhere");
    let err = engine
        .download(
            JobRef::Remote(49),
            &["a.txt".to_string()],
            Some(&missing),
            false,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn test_get_adopts_unknown_remote_id() {
    let server = MockServer::start().await;
    let (_dir, engine) = logged_in(&server, Duration::from_secs(1)).await;
    mount_status(&server, 77, "Done", Some(1)).await;
    let encoded = base64::engine::general_purpose::STANDARD.encode(b"seventy-seven");
    mount_files(&server, 77, &[(RESULT_FILE, &encoded)]).await;

    let outcome = engine.get(JobRef::Remote(77)).await.unwrap();
    assert_eq!(outcome.output_text().as_deref(), Some("seventy-seven"));

    let record = engine.record(JobRef::Remote(77)).unwrap();
    assert_eq!(record.state, JobState::Done);
    assert_eq!(
        engine.get(JobRef::Handle(record.handle)).await.unwrap(),
        outcome
    );
}

#[tokio::test]
async fn test_background_upload() {
    let server = MockServer::start().await;
    let (dir, engine) = logged_in(&server, Duration::from_secs(1)).await;
    mount_submit(&server, 50).await;
    mount_status(&server, 50, "RUN", None).await;

    let data = dir.path().join("data.csv");
    std::fs::write(&data, "a,b\n1,2\n").unwrap();

    let submission = engine
        .submit(&unit(), &[data], SubmitMode::background_upload())
        .await
        .unwrap();
    assert_eq!(
        engine.get(JobRef::Handle(submission.handle)).await.unwrap(),
        JobOutcome::Pending
    );

    engine.shutdown().await;
    let record = engine.record(JobRef::Handle(submission.handle)).unwrap();
    assert_eq!(record.state, JobState::Sent);
    assert_eq!(record.remote_id, Some(50));

    let requests = server.received_requests().await.unwrap();
    let submit = requests
        .iter()
        .find(|r| r.url.path().ends_with("/submitapp"))
        .unwrap();
    let body = String::from_utf8_lossy(&submit.body).into_owned();
    assert!(body.contains("<id>0INPUT_FILE</id>"));
    assert!(body.contains("Content-ID: <data.csv>"));
}

#[tokio::test]
async fn test_get_recovers_from_workspace() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_in(&dir, Duration::from_secs(1));

    let failed = JobHandle::new();
    let failed_dir = dir.path().join("ws").join(failed.to_string());
    std::fs::create_dir_all(&failed_dir).unwrap();
    std::fs::write(failed_dir.join(ERROR_FILE), "boom").unwrap();

    let finished = JobHandle::new();
    let finished_dir = dir.path().join("ws").join(finished.to_string());
    std::fs::create_dir_all(&finished_dir).unwrap();
    std::fs::write(finished_dir.join(RESULT_FILE), "42").unwrap();

    assert_eq!(
        engine.get(JobRef::Handle(failed)).await.unwrap(),
        JobOutcome::Exit("boom".to_string())
    );
    assert_eq!(
        engine.record(JobRef::Handle(failed)).unwrap().state,
        JobState::Exit
    );
    assert_eq!(
        engine.get(JobRef::Handle(finished)).await.unwrap(),
        JobOutcome::Done(b"42".to_vec())
    );
    assert!(matches!(
        engine.get(JobRef::Handle(JobHandle::new())).await,
        Err(EngineError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_restore_session_verifies_token() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/jobs", SERVICE)))
        .respond_with(ResponseTemplate::new(200).set_body_string("<Jobs></Jobs>"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("ws");
    std::fs::create_dir_all(&root).unwrap();
    SessionStore::new(&root)
        .save(&SessionToken::new(
            format!("http://127.0.0.1:{}/platform/", server.address().port()),
            "abc",
        ))
        .unwrap();

    let engine = engine_in(&dir, Duration::from_secs(1));
    assert!(!engine.is_logged_in());
    assert!(engine.restore_session().await);
    assert!(engine.is_logged_in());
}

#[tokio::test]
async fn test_logout_always_removes_token() {
    let server = MockServer::start().await;
    let (_dir, engine) = logged_in(&server, Duration::from_secs(1)).await;
    Mock::given(method("GET"))
        .and(path(format!("{}/logout/", SERVICE)))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    engine.logout().await;
    assert!(!engine.is_logged_in());
    assert!(engine.current_token().is_none());
}

#[tokio::test]
async fn test_cancel_during_wait_stays_cancelled() {
    let server = MockServer::start().await;
    let (_dir, engine) = logged_in(&server, Duration::from_millis(100)).await;
    mount_submit(&server, 60).await;
    Mock::given(method("GET"))
        .and(path(format!("{}/jobs", SERVICE)))
        .and(query_param("id", "60"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<Jobs><Job><id>60</id><status>RUN</status></Job></Jobs>",
        ))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_status(&server, 60, "Exit", None).await;
    mount_files(&server, 60, &[(ERROR_FILE, "killed")]).await;
    mount_kill(&server, 60).await;

    let handle = engine
        .submit(&unit(), &[], SubmitMode::detached())
        .await
        .unwrap()
        .handle;

    let waiter = engine.clone();
    let waiting =
        tokio::spawn(async move { waiter.wait(handle, Duration::from_secs(5), None).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let message = engine.cancel(JobRef::Handle(handle)).await.unwrap();
    assert!(message.contains("being terminated"));

    let waited = waiting.await.unwrap().unwrap();
    assert_eq!(waited, WaitOutcome::Completed(JobOutcome::Cancelled));
    assert_eq!(
        engine.record(JobRef::Handle(handle)).unwrap().state,
        JobState::Cancelled
    );
    assert_eq!(
        engine.get(JobRef::Handle(handle)).await.unwrap(),
        JobOutcome::Cancelled
    );
}

#[tokio::test]
async fn test_interrupted_wait_cancels_and_kills() {
    let server = MockServer::start().await;
    let (_dir, engine) = logged_in(&server, Duration::from_millis(100)).await;
    mount_submit(&server, 61).await;
    mount_status(&server, 61, "RUN", None).await;
    mount_kill(&server, 61).await;

    let handle = engine
        .submit(&unit(), &[], SubmitMode::detached())
        .await
        .unwrap()
        .handle;

    let interrupt = Interrupt::new();
    let raiser = interrupt.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        raiser.raise();
    });

    let started = Instant::now();
    let waited = engine
        .wait(handle, Duration::from_secs(5), Some(&interrupt))
        .await
        .unwrap();

    assert_eq!(waited, WaitOutcome::Interrupted(handle));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(
        engine.record(JobRef::Handle(handle)).unwrap().state,
        JobState::Cancelled
    );
    assert_eq!(requests_to(&server, "/jobOperation/kill/61").await, 1);
}

#[tokio::test]
async fn test_async_download_lands_after_shutdown() {
    let server = MockServer::start().await;
    let (_dir, engine) = logged_in(&server, Duration::from_secs(1)).await;
    mount_files(&server, 62, &[("a.txt", "hello")]).await;
    let destination = tempfile::tempdir().unwrap();

    let outcome = engine
        .download(
            JobRef::Remote(62),
            &["a.txt".to_string()],
            Some(destination.path()),
            true,
        )
        .await
        .unwrap();
    assert_eq!(outcome, DownloadOutcome::Scheduled);

    engine.shutdown().await;
    let written = destination.path().join("a.txt");
    assert_eq!(std::fs::read_to_string(written).unwrap(), "hello");
}

#[tokio::test]
async fn test_download_error_status_is_action_failure() {
    let server = MockServer::start().await;
    let (dir, engine) = logged_in(&server, Duration::from_secs(1)).await;
    Mock::given(method("GET"))
        .and(path(format!("{}/file/63", SERVICE)))
        .respond_with(
            ResponseTemplate::new(500).set_body_string(retrieval_body(&[("a.txt", "partial")])),
        )
        .mount(&server)
        .await;

    let err = engine
        .download(JobRef::Remote(63), &["a.txt".to_string()], None, false)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::RemoteActionFailed { .. }));
    assert!(engine.is_logged_in());
    assert!(!dir.path().join("ws").join("63").join("a.txt").exists());
}

#[tokio::test]
async fn test_unreachable_scheduler_drops_session() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/logon/", SERVICE)))
        .respond_with(ResponseTemplate::new(200).set_body_string("<User><token>abc</token></User>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/jobs", SERVICE)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<Jobs></Jobs>")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig::new(dir.path().join("ws"))
        .with_request_timeout(Some(Duration::from_millis(200)));
    let engine = Engine::new(config).unwrap();
    engine.logon(&credentials(&server)).await.unwrap();

    let err = engine.list_jobs("").await.unwrap_err();
    assert!(matches!(err, EngineError::Unreachable(_)));
    assert!(!engine.is_logged_in());
    assert!(engine.current_token().is_none());

    let err = engine.list_jobs("").await.unwrap_err();
    assert!(matches!(err, EngineError::NotAuthenticated));
}

#[tokio::test]
async fn test_concurrent_adoption_tracks_one_record() {
    let server = MockServer::start().await;
    let (_dir, engine) = logged_in(&server, Duration::from_secs(1)).await;
    mount_status(&server, 64, "RUN", None).await;

    let (first, second) = tokio::join!(
        engine.get(JobRef::Remote(64)),
        engine.get(JobRef::Remote(64))
    );

    assert_eq!(first.unwrap(), JobOutcome::Pending);
    assert_eq!(second.unwrap(), JobOutcome::Pending);
    let tracked: Vec<_> = engine
        .records()
        .into_iter()
        .filter(|r| r.remote_id == Some(64))
        .collect();
    assert_eq!(tracked.len(), 1);
}
