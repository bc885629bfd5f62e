//! # 进程管理集成测试
//!
//! 使用 `sh` 脚本充当后台子进程，验证就绪握手、重复启动与存活探测

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use keeper::error::{ErrorKind, ProxyError};
use keeper::logging::Logger;
use keeper::supervisor::{
    Launcher, LockMarker, ProcessProbe, ProcessRecord, ProcessSupervisor, ServerStatus, SignalProbe,
    StartOutcome, read_record, write_record,
};
use keeper::testing::test_runtime_config;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn supervisor(state_dir: &Path) -> ProcessSupervisor {
    ProcessSupervisor::new(
        test_runtime_config(state_dir),
        "127.0.0.1",
        Arc::new(SignalProbe),
        Logger::noop(),
    )
}

/// 以 `sh -c <script>` 作为后台程序，`start --port P` 依次成为 `$0 $1 $2`
fn script_launcher(script: String) -> Launcher {
    Launcher::new("sh").arg("-c").arg(script)
}

#[tokio::test]
async fn test_second_start_is_already_running() {
    let temp_dir = TempDir::new().unwrap();
    let first = supervisor(temp_dir.path());
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let (ready_tx, ready_rx) = tokio::sync::oneshot::channel::<u16>();

    let running = tokio::spawn(async move {
        first
            .start(0, false, move |listener| async move {
                let port = listener.local_addr()?.port();
                let _ = ready_tx.send(port);
                let _ = stop_rx.await;
                Ok::<(), ProxyError>(())
            })
            .await
    });

    let port = ready_rx.await.unwrap();
    let second = supervisor(temp_dir.path());
    let err = second
        .start(0, false, |_listener| async { Ok::<(), ProxyError>(()) })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyRunning);

    let record = read_record(&second.runtime().process_path()).unwrap().unwrap();
    assert_eq!(record.port, port.to_string());
    assert!(!record.is_detached);

    stop_tx.send(()).unwrap();
    let outcome = running.await.unwrap().unwrap();
    assert!(matches!(outcome, StartOutcome::Exited(_)));
    assert_eq!(second.status().unwrap(), ServerStatus::Stopped);
}

#[tokio::test]
async fn test_held_lock_without_record_is_lock_held() {
    let temp_dir = TempDir::new().unwrap();
    let supervisor = supervisor(temp_dir.path());
    std::fs::create_dir_all(temp_dir.path()).unwrap();

    // 另一个实例已拿到锁但尚未写入进程记录
    let _holder = LockMarker::acquire(&supervisor.runtime().lock_path()).unwrap();
    assert_eq!(supervisor.status().unwrap(), ServerStatus::Stopped);

    let served = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let flag = Arc::clone(&served);
    let err = supervisor
        .start(0, false, move |_listener| async move {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok::<(), ProxyError>(())
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::LockHeld);
    assert!(!served.load(std::sync::atomic::Ordering::SeqCst));
    assert!(!supervisor.runtime().process_path().exists());
    assert!(supervisor.runtime().lock_path().exists());
}

#[tokio::test]
async fn test_leftover_lock_file_does_not_block_start() {
    let temp_dir = TempDir::new().unwrap();
    let supervisor = supervisor(temp_dir.path());
    std::fs::create_dir_all(temp_dir.path()).unwrap();

    // 崩溃的实例留下了锁文件，内核早已释放其锁
    std::fs::write(supervisor.runtime().lock_path(), "4242\n").unwrap();

    let outcome = supervisor
        .start(0, false, |_listener| async { Ok::<(), ProxyError>(()) })
        .await
        .unwrap();
    assert!(matches!(outcome, StartOutcome::Exited(_)));
    assert!(!supervisor.runtime().lock_path().exists());
}

#[tokio::test]
async fn test_killed_process_reports_stopped() {
    let temp_dir = TempDir::new().unwrap();
    let supervisor = supervisor(temp_dir.path());
    std::fs::create_dir_all(temp_dir.path()).unwrap();

    let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
    let pid = i32::try_from(child.id()).unwrap();
    write_record(
        &supervisor.runtime().process_path(),
        &ProcessRecord::new(pid, false, "8080"),
    )
    .unwrap();

    let ServerStatus::Running(record) = supervisor.status().unwrap() else {
        panic!("expected running status");
    };
    assert_eq!(record.pid, pid);
    assert_eq!(record.port, "8080");

    child.kill().unwrap();
    child.wait().unwrap();

    assert_eq!(supervisor.status().unwrap(), ServerStatus::Stopped);
    assert_eq!(supervisor.stop().unwrap_err().kind(), ErrorKind::NotRunning);
    assert!(supervisor.runtime().process_path().exists());
}

#[tokio::test]
async fn test_detached_start_waits_for_child_record() {
    let temp_dir = TempDir::new().unwrap();
    let process_path = temp_dir.path().join("process.json");
    let script = format!(
        r#"printf '{{"pid":%d,"start_time":"2024-01-01T00:00:00+00:00","is_detached":true,"port":"%s"}}' $$ "$2" > "{tmp}" && mv "{tmp}" "{path}"; exec sleep 30"#,
        tmp = temp_dir.path().join("process.json.tmp").display(),
        path = process_path.display(),
    );
    let supervisor = supervisor(temp_dir.path()).with_launcher(script_launcher(script));

    let outcome = supervisor
        .start(18_080, true, |_listener| async { Ok::<(), ProxyError>(()) })
        .await
        .unwrap();
    let StartOutcome::Detached(record) = outcome else {
        panic!("expected detached outcome");
    };
    assert_eq!(record.port, "18080");
    assert!(record.is_detached);
    assert!(SignalProbe.is_alive(record.pid));

    let ServerStatus::Running(status) = supervisor.status().unwrap() else {
        panic!("expected running status");
    };
    assert_eq!(status.pid, record.pid);

    let stopped = supervisor.stop().unwrap();
    assert_eq!(stopped.pid, record.pid);
    assert!(!process_path.exists());
    assert!(temp_dir.path().join("keeper.log").exists());
}

#[tokio::test]
async fn test_detached_child_exiting_early_is_start_error() {
    let temp_dir = TempDir::new().unwrap();
    let supervisor = supervisor(temp_dir.path())
        .with_launcher(script_launcher("echo boom >&2; exit 3".to_string()));

    let err = supervisor
        .start(18_081, true, |_listener| async { Ok::<(), ProxyError>(()) })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServerStart);

    let log = std::fs::read_to_string(temp_dir.path().join("keeper.log")).unwrap();
    assert!(log.contains("boom"));
}

#[tokio::test]
async fn test_detached_child_without_record_is_unconfirmed() {
    let temp_dir = TempDir::new().unwrap();
    let mut runtime = test_runtime_config(temp_dir.path());
    runtime.ready_timeout_ms = 300;
    let supervisor =
        ProcessSupervisor::new(runtime, "127.0.0.1", Arc::new(SignalProbe), Logger::noop())
            .with_launcher(script_launcher("exec sleep 30".to_string()));

    let err = supervisor
        .start(18_082, true, |_listener| async { Ok::<(), ProxyError>(()) })
        .await
        .unwrap_err();
    assert!(err.is_unconfirmed_start());

    let ProxyError::DetachedStartUnconfirmed { pid } = err else {
        panic!("expected unconfirmed start");
    };
    SignalProbe.terminate(i32::try_from(pid).unwrap()).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(supervisor.status().unwrap(), ServerStatus::Stopped);
}
