//! End-to-end tests: the real key server router on a loopback port, driven
//! through the uploader's public API.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use keyserver::auth::CredentialRegistry;
use keyserver::keystore::{KeyStore, MemoryKeyStore};
use keyserver::server::{router, state::AppState};
use keyserver::uploads::UploadStore;
use tempfile::TempDir;
use uploader::config::RemoteConfig;
use uploader::{encrypt_and_upload_dir, fetch_decrypted, files, ApiClient, TransferError};
use zeroize::Zeroizing;

struct TestServer {
    addr: SocketAddr,
    store: Arc<MemoryKeyStore>,
    uploads: TempDir,
}

async fn spawn_server() -> TestServer {
    spawn_server_with(router::Limits::default()).await
}

async fn spawn_server_with(limits: router::Limits) -> TestServer {
    let uploads = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryKeyStore::new());
    let creds = CredentialRegistry::from_yaml("alice: wonderland\nbob: builder\n").unwrap();
    let key_store: Arc<dyn KeyStore> = store.clone();
    let state = AppState::new(creds, key_store, UploadStore::new(uploads.path()));
    let app = router::build(state, limits);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        addr,
        store,
        uploads,
    }
}

fn client_for(addr: SocketAddr, user: &str, password: &str, timeout: Duration) -> ApiClient {
    ApiClient::new(&RemoteConfig {
        server_url: format!("http://{addr}"),
        username: user.into(),
        password: Zeroizing::new(password.into()),
        request_timeout: timeout,
    })
    .unwrap()
}

fn alice(server: &TestServer) -> ApiClient {
    client_for(server.addr, "alice", "wonderland", Duration::from_secs(10))
}

fn exts() -> Vec<String> {
    vec!["h5".into(), "keras".into()]
}

fn model_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 256) as u8).collect()
}

fn write_model(dir: &Path, name: &str, data: &[u8]) {
    std::fs::write(dir.join(name), data).unwrap();
}

#[tokio::test]
async fn upload_then_server_decrypt_round_trips() {
    let server = spawn_server().await;
    let client = alice(&server);
    let models = tempfile::tempdir().unwrap();
    let original = model_bytes(10 * 1024);
    write_model(models.path(), "model.h5", &original);
    write_model(models.path(), "readme.txt", b"not a model");

    let report = encrypt_and_upload_dir(&client, models.path(), &exts())
        .await
        .unwrap();
    assert!(report.is_success());
    assert_eq!(report.uploaded.len(), 1);
    assert_eq!(report.uploaded[0].remote_path, "alice/model.h5.enc");

    let local_blob = std::fs::read(models.path().join("model.h5.enc")).unwrap();
    let server_blob = std::fs::read(server.uploads.path().join("alice/model.h5.enc")).unwrap();
    assert_eq!(local_blob, server_blob);
    assert_ne!(local_blob, original);

    let output = fetch_decrypted(&client, &models.path().join("model.h5.enc"))
        .await
        .unwrap();
    assert_eq!(output, models.path().join("model.h5.dec"));
    assert_eq!(std::fs::read(output).unwrap(), original);
}

#[tokio::test]
async fn fetched_key_decrypts_offline() {
    let server = spawn_server().await;
    let client = alice(&server);
    let models = tempfile::tempdir().unwrap();
    let original = model_bytes(4096);
    write_model(models.path(), "net.keras", &original);

    encrypt_and_upload_dir(&client, models.path(), &exts())
        .await
        .unwrap();

    // The batch key is the one the server now holds for alice.
    let record = server.store.lookup("alice").unwrap().unwrap();
    let output = files::decrypt_file(&models.path().join("net.keras.enc"), &record.key)
        .await
        .unwrap();
    assert_eq!(std::fs::read(output).unwrap(), original);
}

#[tokio::test]
async fn wrong_password_fails_before_any_encryption() {
    let server = spawn_server().await;
    let client = client_for(server.addr, "alice", "looking-glass", Duration::from_secs(10));
    let models = tempfile::tempdir().unwrap();
    write_model(models.path(), "model.h5", &model_bytes(128));

    let err = encrypt_and_upload_dir(&client, models.path(), &exts())
        .await
        .unwrap_err();
    match err {
        TransferError::KeyRequestFailed(reason) => assert!(reason.contains("401")),
        other => panic!("expected KeyRequestFailed, got {other:?}"),
    }
    assert!(!models.path().join("model.h5.enc").exists());
    assert_eq!(server.store.count().unwrap(), 0);
}

#[tokio::test]
async fn empty_directory_makes_no_key_request() {
    let server = spawn_server().await;
    let client = alice(&server);
    let models = tempfile::tempdir().unwrap();

    let report = encrypt_and_upload_dir(&client, models.path(), &exts())
        .await
        .unwrap();
    assert!(report.is_success());
    assert!(report.uploaded.is_empty());
    assert_eq!(server.store.count().unwrap(), 0);
}

#[tokio::test]
async fn one_failing_file_does_not_abort_the_batch() {
    let server = spawn_server().await;
    let client = alice(&server);
    let models = tempfile::tempdir().unwrap();
    write_model(models.path(), "a.h5", &model_bytes(256));
    write_model(models.path(), "b.h5", &model_bytes(512));
    // A directory where a.h5's output should go makes that write fail.
    std::fs::create_dir(models.path().join("a.h5.enc")).unwrap();

    let report = encrypt_and_upload_dir(&client, models.path(), &exts())
        .await
        .unwrap();
    assert!(!report.is_success());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].source, models.path().join("a.h5"));
    assert!(matches!(report.failures[0].error, TransferError::Io { .. }));

    assert_eq!(report.uploaded.len(), 1);
    assert!(server.uploads.path().join("alice/b.h5.enc").is_file());
}

#[tokio::test]
async fn rotation_invalidates_earlier_ciphertext() {
    let server = spawn_server().await;
    let client = alice(&server);
    let models = tempfile::tempdir().unwrap();
    write_model(models.path(), "model.h5", &model_bytes(1024));

    encrypt_and_upload_dir(&client, models.path(), &exts())
        .await
        .unwrap();
    client.fetch_key().await.unwrap();

    let err = fetch_decrypted(&client, &models.path().join("model.h5.enc"))
        .await
        .unwrap_err();
    match err {
        TransferError::DecryptRequestFailed(reason) => assert!(reason.contains("422")),
        other => panic!("expected DecryptRequestFailed, got {other:?}"),
    }
    assert!(!models.path().join("model.h5.dec").exists());
}

#[tokio::test]
async fn principals_cannot_decrypt_each_others_uploads() {
    let server = spawn_server().await;
    let models = tempfile::tempdir().unwrap();
    write_model(models.path(), "model.h5", &model_bytes(1024));

    encrypt_and_upload_dir(&alice(&server), models.path(), &exts())
        .await
        .unwrap();

    let bob = client_for(server.addr, "bob", "builder", Duration::from_secs(10));
    let err = fetch_decrypted(&bob, &models.path().join("model.h5.enc"))
        .await
        .unwrap_err();
    match err {
        // bob has never fetched a key
        TransferError::DecryptRequestFailed(reason) => assert!(reason.contains("404")),
        other => panic!("expected DecryptRequestFailed, got {other:?}"),
    }
}

/// Accept connections and hold them open without ever answering.
async fn spawn_silent_listener() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

#[tokio::test]
async fn unresponsive_server_times_out() {
    let addr = spawn_silent_listener().await;
    let client = client_for(addr, "alice", "wonderland", Duration::from_secs(1));
    let models = tempfile::tempdir().unwrap();
    write_model(models.path(), "model.h5", &model_bytes(64));

    let err = tokio::time::timeout(
        Duration::from_secs(10),
        encrypt_and_upload_dir(&client, models.path(), &exts()),
    )
    .await
    .expect("client must give up on its own")
    .unwrap_err();
    match err {
        TransferError::KeyRequestFailed(reason) => assert!(reason.contains("timed out")),
        other => panic!("expected KeyRequestFailed, got {other:?}"),
    }
    assert!(!models.path().join("model.h5.enc").exists());
}

#[tokio::test]
async fn unresponsive_decrypt_endpoint_times_out() {
    let addr = spawn_silent_listener().await;
    let client = client_for(addr, "alice", "wonderland", Duration::from_secs(1));
    let models = tempfile::tempdir().unwrap();
    let encrypted = models.path().join("model.h5.enc");
    std::fs::write(&encrypted, model_bytes(64)).unwrap();

    let err = tokio::time::timeout(Duration::from_secs(10), fetch_decrypted(&client, &encrypted))
        .await
        .expect("client must give up on its own")
        .unwrap_err();
    match err {
        TransferError::DecryptRequestFailed(reason) => assert!(reason.contains("timed out")),
        other => panic!("expected DecryptRequestFailed, got {other:?}"),
    }
    assert!(!models.path().join("model.h5.dec").exists());
}

#[tokio::test]
async fn rejected_upload_does_not_abort_the_batch() {
    let server = spawn_server_with(router::Limits {
        max_body_bytes: 4096,
        ..router::Limits::default()
    })
    .await;
    let client = alice(&server);
    let models = tempfile::tempdir().unwrap();
    write_model(models.path(), "a.h5", &model_bytes(64 * 1024));
    write_model(models.path(), "b.h5", &model_bytes(100));

    let report = encrypt_and_upload_dir(&client, models.path(), &exts())
        .await
        .unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].source, models.path().join("a.h5"));
    match &report.failures[0].error {
        TransferError::UploadFailed { file, reason } => {
            assert_eq!(file, "a.h5.enc");
            assert!(reason.contains("413"), "unexpected reason: {reason}");
        }
        other => panic!("expected UploadFailed, got {other:?}"),
    }

    assert_eq!(report.uploaded.len(), 1);
    assert_eq!(report.uploaded[0].remote_path, "alice/b.h5.enc");
    assert!(!server.uploads.path().join("alice/a.h5.enc").exists());
    assert!(server.uploads.path().join("alice/b.h5.enc").is_file());
}

#[cfg(unix)]
#[tokio::test]
async fn symlinked_models_are_uploaded_and_dangling_links_reported() {
    let server = spawn_server().await;
    let client = alice(&server);
    let models = tempfile::tempdir().unwrap();
    let elsewhere = tempfile::tempdir().unwrap();
    let original = model_bytes(2048);
    write_model(elsewhere.path(), "weights.h5", &original);
    let link = |target: &str, name: &str| {
        std::os::unix::fs::symlink(elsewhere.path().join(target), models.path().join(name))
            .unwrap();
    };
    link("weights.h5", "linked.h5");
    link("absent.h5", "broken.h5");

    let report = encrypt_and_upload_dir(&client, models.path(), &exts())
        .await
        .unwrap();
    assert_eq!(report.uploaded.len(), 1);
    assert_eq!(report.uploaded[0].remote_path, "alice/linked.h5.enc");
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].source, models.path().join("broken.h5"));
    assert!(matches!(report.failures[0].error, TransferError::Io { .. }));

    let output = fetch_decrypted(&client, &models.path().join("linked.h5.enc"))
        .await
        .unwrap();
    assert_eq!(std::fs::read(output).unwrap(), original);
}
