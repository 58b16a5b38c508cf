//! Bootstrap strategy cache and install-order behaviour.

use std::path::Path;
use std::sync::Arc;

use steward_core::config::{BootstrapConfig, Payload};
use steward_core::test_utils::ScriptedRunner;
use steward_core::{AcquisitionStrategy, Invocation};
use steward_tools_bootstrap::BootstrapStrategy;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// Nothing listens on the discard port, so any download attempt fails fast.
const DEAD_HOST: &str = "http://127.0.0.1:9";

fn config(cache: &Path, base_url: &str) -> BootstrapConfig {
    BootstrapConfig {
        enabled: true,
        cache_dir: Some(cache.to_path_buf()),
        main: Payload::new(format!("{base_url}/main.msixbundle"), "main.msixbundle"),
        dependencies: vec![
            Payload::new(format!("{base_url}/vclibs.appx"), "vclibs.appx"),
            Payload::new(format!("{base_url}/xaml.appx"), "xaml.appx"),
        ],
        install_command: vec!["installer".to_string(), "{path}".to_string()],
    }
}

fn install_key(cache: &Path, name: &str) -> String {
    format!("installer {}", cache.join(name).display())
}

fn seed_cache(cache: &Path) {
    for name in ["main.msixbundle", "vclibs.appx", "xaml.appx"] {
        std::fs::write(cache.join(name), b"payload").unwrap();
    }
}

/// Serve `body` to every request on a local port and return the base URL.
async fn serve(body: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let mut buf = [0u8; 2048];
            let _ = stream.read(&mut buf).await;
            let head = format!(
                "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(head.as_bytes()).await;
            let _ = stream.write_all(body).await;
        }
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_cache_hit_installs_dependencies_before_main() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path();
    seed_cache(cache);

    let runner = Arc::new(ScriptedRunner::new());
    for name in ["vclibs.appx", "xaml.appx", "main.msixbundle"] {
        runner.respond(&install_key(cache, name), Invocation::new(0, "", ""));
    }

    let strategy = BootstrapStrategy::new(runner.clone(), &config(cache, DEAD_HOST));
    assert!(strategy.attempt().await);
    assert_eq!(
        runner.calls(),
        vec![
            install_key(cache, "vclibs.appx"),
            install_key(cache, "xaml.appx"),
            install_key(cache, "main.msixbundle"),
        ]
    );
}

#[tokio::test]
async fn test_dependency_failure_does_not_stop_main_install() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path();
    seed_cache(cache);

    let runner = Arc::new(ScriptedRunner::new());
    runner.respond(
        &install_key(cache, "vclibs.appx"),
        Invocation::new(1, "", "newer version installed"),
    );
    runner.respond(&install_key(cache, "xaml.appx"), Invocation::new(0, "", ""));
    runner.respond(&install_key(cache, "main.msixbundle"), Invocation::new(0, "", ""));

    let strategy = BootstrapStrategy::new(runner.clone(), &config(cache, DEAD_HOST));
    assert!(strategy.attempt().await);
    assert_eq!(runner.calls().len(), 3);
}

#[tokio::test]
async fn test_main_install_failure_is_false() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path();
    seed_cache(cache);

    let runner = Arc::new(ScriptedRunner::new());
    runner.respond(&install_key(cache, "vclibs.appx"), Invocation::new(0, "", ""));
    runner.respond(&install_key(cache, "xaml.appx"), Invocation::new(0, "", ""));
    runner.respond(&install_key(cache, "main.msixbundle"), Invocation::new(1, "", ""));

    let strategy = BootstrapStrategy::new(runner, &config(cache, DEAD_HOST));
    assert!(!strategy.attempt().await);
}

#[tokio::test]
async fn test_download_failure_installs_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::new());

    let strategy = BootstrapStrategy::new(runner.clone(), &config(dir.path(), DEAD_HOST));
    assert!(!strategy.attempt().await);
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_missing_payloads_are_downloaded_into_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("nested").join("cache");
    let base = serve(b"payload-bytes").await;

    let runner = Arc::new(ScriptedRunner::new());
    for name in ["vclibs.appx", "xaml.appx", "main.msixbundle"] {
        runner.respond(&install_key(&cache, name), Invocation::new(0, "", ""));
    }

    let strategy = BootstrapStrategy::new(runner, &config(&cache, &base));
    assert!(strategy.attempt().await);

    for name in ["vclibs.appx", "xaml.appx", "main.msixbundle"] {
        assert_eq!(std::fs::read(cache.join(name)).unwrap(), b"payload-bytes");
        assert!(!cache.join(format!("{name}.partial")).exists());
    }
}
