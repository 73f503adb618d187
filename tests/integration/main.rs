//! Integration tests for flipcache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn flipcache() -> Command {
        cargo_bin_cmd!("flipcache")
    }

    /// Write an isolated config: disk stores under the temp dir, no
    /// journal, nothing to fetch on install
    fn write_config(dir: &Path, version: &str) -> PathBuf {
        let path = dir.join("config.toml");
        let stores = dir.join("stores");
        let content = format!(
            r#"
[general]
journal = false

[cache]
version = "{}"
origin = "https://book.example"
backend = "disk"
dir = "{}"
quota_mb = 1

[install]
manifest = []
models = []
"#,
            version,
            stores.display().to_string().replace('\\', "\\\\")
        );
        std::fs::write(&path, content).unwrap();
        path
    }

    fn with_config(config: &Path) -> Command {
        let mut cmd = flipcache();
        cmd.arg("--config").arg(config).env_remove("RUST_LOG");
        cmd
    }

    #[test]
    fn help_displays() {
        flipcache()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("asset cache manager"));
    }

    #[test]
    fn version_displays() {
        flipcache()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("flipcache"));
    }

    #[test]
    fn config_path() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path(), "v1");
        with_config(&config)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path(), "v9");
        with_config(&config)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"))
            .stdout(predicate::str::contains("version = \"v9\""));
    }

    #[test]
    fn unsafe_version_tag_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path(), "../v1");
        with_config(&config)
            .args(["stores", "list"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("cache.version"));
        assert!(!dir.path().join("stores").exists());
    }

    #[test]
    fn config_init_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        flipcache()
            .arg("--config")
            .arg(&path)
            .args(["config", "init"])
            .assert()
            .success();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[install]"));
    }

    #[test]
    fn classify_static_asset_before_image() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path(), "v1");
        with_config(&config)
            .args(["classify", "https://cdn.example/app/logo.png", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("static-assets CACHE_FIRST static-v1"));
    }

    #[test]
    fn classify_reports_matched_part() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path(), "v1");
        with_config(&config)
            .args(["classify", "https://models.example/weights.bin", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"route\": \"ai-models\""))
            .stdout(predicate::str::contains("\"matched_on\": \"full url\""));
    }

    #[test]
    fn classify_post_bypasses() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path(), "v1");
        with_config(&config)
            .args(["classify", "-X", "POST", "https://book.example/api/share", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("bypass"));
    }

    #[test]
    fn classify_invalid_url_fails() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path(), "v1");
        with_config(&config)
            .args(["classify", "not a url"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid URL"));
    }

    #[test]
    fn offline_image_gets_placeholder() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path(), "v1");
        with_config(&config)
            .args([
                "fetch",
                "https://book.example/photos/p1.webp",
                "--destination",
                "image",
                "--offline",
                "--format",
                "json",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"status\": 200"))
            .stdout(predicate::str::contains("\"kind\": \"fallback\""))
            .stdout(predicate::str::contains("image/svg+xml"));
    }

    #[test]
    fn offline_document_gets_offline_page() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path(), "v1");
        with_config(&config)
            .args([
                "fetch",
                "https://book.example/gallery.html",
                "--destination",
                "document",
                "--offline",
                "--format",
                "plain",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("offline"));
    }

    #[test]
    fn offline_script_fails() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path(), "v1");
        with_config(&config)
            .args(["fetch", "https://book.example/api/pages", "--offline"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Offline and no cached response"));
    }

    #[test]
    fn stores_list_empty() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path(), "v1");
        with_config(&config)
            .args(["stores", "list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[]"));
    }

    #[test]
    fn stores_keys_missing_store() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path(), "v1");
        with_config(&config)
            .args(["stores", "keys", "images-v1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Cache store not found"));
    }

    #[test]
    fn install_then_upgrade_purges_old_stores() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path(), "v1");
        with_config(&config).args(["install", "--offline"]).assert().success();

        with_config(&config)
            .args(["stores", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("static-v1"));

        with_config(&config)
            .args(["status", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"state\": \"active\""));

        let config = write_config(dir.path(), "v2");
        with_config(&config).args(["install", "--offline"]).assert().success();

        with_config(&config)
            .args(["stores", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("static-v2"))
            .stdout(predicate::str::contains("static-v1").not());
    }

    #[test]
    fn install_twice_is_noop() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path(), "v1");
        with_config(&config).args(["install", "--offline"]).assert().success();
        with_config(&config)
            .args(["install", "--offline"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already active"));
    }

    #[test]
    fn stores_clear_with_yes() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path(), "v1");
        with_config(&config).args(["install", "--offline"]).assert().success();

        with_config(&config)
            .args(["stores", "clear", "static-v1", "--yes"])
            .assert()
            .success();

        with_config(&config)
            .args(["stores", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("static-v1").not());
    }

    #[test]
    fn message_reports_usage() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path(), "v1");
        with_config(&config)
            .args(["message", r#"{"type":"GET_CACHE_SIZE"}"#])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"quota\":1048576"));
    }

    #[test]
    fn message_from_stdin() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path(), "v1");
        with_config(&config)
            .arg("message")
            .write_stdin(r#"{"type":"CLEAR_CACHE","cacheName":"images-v1"}"#)
            .assert()
            .success()
            .stdout(predicate::str::contains(r#"{"success":true}"#));
    }

    #[test]
    fn message_rejects_unknown_type() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path(), "v1");
        with_config(&config)
            .args(["message", r#"{"type":"REBOOT"}"#])
            .assert()
            .failure()
            .stderr(predicate::str::contains("JSON error"));
    }
}

mod scenarios {
    //! End-to-end cache behavior through the public library API

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use flipcache::clock::ManualClock;
    use flipcache::lifecycle::{InstallPlan, LifecycleController};
    use flipcache::network::Fetcher;
    use flipcache::request::{Destination, Request, Response};
    use flipcache::routes::RouteClassifier;
    use flipcache::store::{CacheStorage, MemoryStorage};
    use flipcache::strategy::CachePolicyExecutor;
    use flipcache::{CacheError, CacheResult};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Network {
        online: AtomicBool,
        calls: AtomicUsize,
    }

    impl Network {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                online: AtomicBool::new(true),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for Network {
        async fn fetch(&self, request: &Request) -> CacheResult<Response> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.online.load(Ordering::SeqCst) {
                return Err(CacheError::network(request.key(), "offline"));
            }
            Ok(Response::from_network(
                request.key(),
                200,
                None,
                format!("v{}", n).into_bytes(),
            ))
        }
    }

    #[tokio::test]
    async fn cache_first_freshness_and_bound() {
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
        let network = Network::new();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let executor = CachePolicyExecutor::new(storage.clone(), network.clone(), clock.clone());
        let classifier = RouteClassifier::new("v1").unwrap();

        let request = Request::get("https://cdn.example/app/logo.png").unwrap();
        let policy = classifier.classify(&request).unwrap().clone();

        executor.execute(&request, &policy).await.unwrap();
        clock.advance(Duration::days(6));
        let hit = executor.execute(&request, &policy).await.unwrap();
        assert!(hit.from_cache());
        assert_eq!(network.calls(), 1);

        clock.advance(Duration::days(1));
        let refreshed = executor.execute(&request, &policy).await.unwrap();
        assert!(!refreshed.from_cache());
        assert_eq!(network.calls(), 2);

        // Fill past the static bound; only the newest entries survive
        for i in 0..(policy.max_entries + 5) {
            let request = Request::get(&format!("https://cdn.example/js/chunk{}.js", i)).unwrap();
            executor.execute(&request, &policy).await.unwrap();
        }
        let keys = storage.open(&policy.store).await.unwrap().keys().await.unwrap();
        assert_eq!(keys.len(), policy.max_entries);
        assert_eq!(
            keys.last().map(String::as_str),
            Some(format!("https://cdn.example/js/chunk{}.js", policy.max_entries + 4).as_str())
        );
    }

    #[tokio::test]
    async fn offline_after_install_serves_shell_and_placeholders() {
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
        let network = Network::new();
        let controller = LifecycleController::new(
            "v1",
            storage,
            network.clone(),
            Arc::new(ManualClock::default()),
            InstallPlan {
                origin: "https://book.example".to_string(),
                manifest: vec!["/".to_string(), "/index.html".to_string()],
                models: vec![],
            },
        )
        .unwrap();

        controller.on_install().await.unwrap();
        controller.on_activate().await.unwrap();
        network.online.store(false, Ordering::SeqCst);

        let page = Request::get("https://book.example/share/abc")
            .unwrap()
            .with_destination(Destination::Document);
        assert!(controller.fetch(&page).await.unwrap().from_cache());

        let image = Request::get("https://book.example/uploads/p.jpeg")
            .unwrap()
            .with_destination(Destination::Image);
        assert!(controller.fetch(&image).await.unwrap().is_fallback());
    }
}
