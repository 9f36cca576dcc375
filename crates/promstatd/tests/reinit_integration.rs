//! Re-initialization tests.
//!
//! A host reloads its configuration by calling `initialize` again on the
//! same `StatusServer`. These tests check the socket handover: the path
//! stays put, the old listener is gone before the new one binds, and the
//! new configuration takes effect.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.

use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::Path;

use promstat_core::StatusConfig;
use promstat_protocol::Command;
use promstatd::client::MetricsClient;
use promstatd::StatusServer;

fn config(dir: &Path) -> StatusConfig {
    StatusConfig {
        label_names: "method".to_string(),
        tmp_folder: Some(dir.to_path_buf()),
        ..Default::default()
    }
}

fn effective_ids() -> (u32, u32) {
    // SAFETY: geteuid/getegid cannot fail
    unsafe { (libc::geteuid(), libc::getegid()) }
}

async fn scrape(path: &Path) -> String {
    let bytes = MetricsClient::new(path).scrape().await.expect("scrape");
    String::from_utf8(bytes).unwrap()
}

#[tokio::test]
async fn test_single_socket_file_after_reloads() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = config(temp_dir.path());
    let mut status = StatusServer::new();

    for _ in 0..5 {
        status.initialize(&config).await.unwrap();
    }

    let entries: Vec<_> = std::fs::read_dir(temp_dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(Some(entries[0].as_path()), status.socket_path());
    assert!(std::fs::metadata(&entries[0]).unwrap().file_type().is_socket());

    status.shutdown().await;
}

#[tokio::test]
async fn test_reload_applies_new_owner() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (euid, egid) = effective_ids();

    // Only root may hand the socket to another user
    let second_uid = if euid == 0 { 65534 } else { euid };

    let mut status = StatusServer::new();
    let first = status
        .initialize(&StatusConfig {
            uid: Some(euid),
            gid: Some(egid),
            ..config(temp_dir.path())
        })
        .await
        .unwrap();
    assert_eq!(std::fs::metadata(&first).unwrap().uid(), euid);

    let second = status
        .initialize(&StatusConfig {
            uid: Some(second_uid),
            gid: Some(egid),
            ..config(temp_dir.path())
        })
        .await
        .unwrap();

    assert_eq!(first, second);
    let metadata = std::fs::metadata(&second).unwrap();
    assert_eq!(metadata.uid(), second_uid);
    assert_eq!(metadata.gid(), egid);

    status.shutdown().await;
}

#[tokio::test]
async fn test_reload_starts_from_fresh_registry() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = config(temp_dir.path());
    let mut status = StatusServer::new();

    let path = status.initialize(&config).await.unwrap();
    MetricsClient::new(&path)
        .push(&[Command::ServerUpdate("busy_workers 4")])
        .await
        .unwrap();

    status.initialize(&config).await.unwrap();

    let snapshot = scrape(&path).await;
    assert!(snapshot.contains("httpd_server_info"));
    assert!(!snapshot.contains("httpd_server_busy_workers"));

    status.shutdown().await;
}

#[tokio::test]
async fn test_reload_with_new_namespace() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut status = StatusServer::new();

    let path = status.initialize(&config(temp_dir.path())).await.unwrap();
    assert!(scrape(&path).await.contains("httpd_server_info"));

    status
        .initialize(&StatusConfig {
            namespace: "apache".to_string(),
            ..config(temp_dir.path())
        })
        .await
        .unwrap();

    let snapshot = scrape(&path).await;
    assert!(snapshot.contains("apache_server_info"));
    assert!(!snapshot.contains("httpd_server_info"));

    status.shutdown().await;
}

#[tokio::test]
async fn test_rejected_schema_keeps_previous_collector() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut status = StatusServer::new();

    let path = status.initialize(&config(temp_dir.path())).await.unwrap();

    let bad = StatusConfig {
        time_buckets: "1;oops".to_string(),
        ..config(temp_dir.path())
    };
    assert_eq!(status.initialize_for_host(&bad).await, "");

    // Registration fails before the listener is touched
    assert!(status.is_listening());
    assert!(scrape(&path).await.contains("httpd_server_info"));

    let restored = status.initialize(&config(temp_dir.path())).await.unwrap();
    assert_eq!(restored, path);
    assert!(scrape(&path).await.contains("httpd_server_info"));

    status.shutdown().await;
}
