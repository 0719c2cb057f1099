//! Orchestrator tests against local mock CDNs

use super::*;
use crate::downloader::DownloadConfigBuilder;
use crate::manifest::Side;
use std::sync::Mutex;
use tempfile::{TempDir, tempdir};
use wiremock::{
    Mock, MockServer, Request, Respond, ResponseTemplate,
    matchers::{any, method, path},
};

struct Fixture {
    primary: MockServer,
    fallback: MockServer,
    dir: TempDir,
}

impl Fixture {
    async fn new() -> Self {
        Self {
            primary: MockServer::start().await,
            fallback: MockServer::start().await,
            dir: tempdir().unwrap(),
        }
    }

    fn config(&self) -> DownloadConfigBuilder {
        DownloadConfigBuilder::new()
            .curseforge_host(self.primary.uri())
            .curseforge_fallback_host(self.fallback.uri())
            .modrinth_host(self.primary.uri())
    }

    fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.config().build()).unwrap()
    }

    fn mods(&self) -> CategoryTarget {
        CategoryTarget::new("mods", self.dir.path(), &[".jar"])
    }

    fn touch(&self, name: &str) {
        std::fs::write(self.dir.path().join(name), b"existing").unwrap();
    }

    fn has(&self, name: &str) -> bool {
        self.dir.path().join(name).is_file()
    }
}

async fn serve(server: &MockServer, route: &str, status: u16, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_bytes(body.to_vec()))
        .expect(1)
        .mount(server)
        .await;
}

async fn expect_no_requests(server: &MockServer) {
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(server)
        .await;
}

#[test]
fn managed_extension_matching() {
    let target = CategoryTarget::new("shaderpacks", "/tmp", &[".ZIP"]);
    assert!(target.is_managed("pack.zip"));
    assert!(target.is_managed("Pack.ZIP.disabled"));
    assert!(!target.is_managed("pack.zip.part"));
    assert!(!target.is_managed("notes.txt"));
    assert!(!target.is_managed("mod.jar"));
}

#[tokio::test]
async fn downloads_missing_curseforge_file() {
    let fx = Fixture::new().await;
    serve(&fx.primary, "/files/5246/236/cloth-config-12.0.jar", 200, b"cloth").await;
    expect_no_requests(&fx.fallback).await;

    let entries = vec![ContentEntry::curseforge("cloth-config-12.0.jar", 308769, 5246236, Side::Both)];
    let report = fx.orchestrator().apply(&fx.mods(), &entries, SideFilter::All).await;

    assert_eq!(report.downloaded, 1);
    assert_eq!(report.bytes, 5);
    assert_eq!(report.deleted, 0);
    assert_eq!(report.renamed, 0);
    assert!(report.failed.is_empty());
    assert!(!report.deadline_exceeded);
    assert_eq!(
        std::fs::read(fx.dir.path().join("cloth-config-12.0.jar")).unwrap(),
        b"cloth"
    );
}

#[tokio::test]
async fn deletes_unlisted_managed_files_only() {
    let fx = Fixture::new().await;
    expect_no_requests(&fx.primary).await;
    fx.touch("foo.jar");
    fx.touch("old.jar.disabled");
    fx.touch("readme.txt");
    fx.touch("pack.zip");
    std::fs::create_dir(fx.dir.path().join("nested.jar")).unwrap();

    let report = fx.orchestrator().apply(&fx.mods(), &[], SideFilter::Server).await;

    assert_eq!(report.deleted, 2);
    assert!(!fx.has("foo.jar"));
    assert!(!fx.has("old.jar.disabled"));
    assert!(fx.has("readme.txt"));
    assert!(fx.has("pack.zip"));
    assert!(fx.dir.path().join("nested.jar").is_dir());
}

#[tokio::test]
async fn disabled_entry_renames_instead_of_downloading() {
    let fx = Fixture::new().await;
    expect_no_requests(&fx.primary).await;
    fx.touch("bar.jar");

    let entries = vec![ContentEntry::modrinth("bar.jar.disabled", "abc", "v1", Side::Both)];
    let report = fx.orchestrator().apply(&fx.mods(), &entries, SideFilter::All).await;

    assert_eq!(report.downloaded, 0);
    assert_eq!(report.already_present, 1);
    assert_eq!(report.renamed, 1);
    assert_eq!(report.deleted, 0);
    assert!(fx.has("bar.jar.disabled"));
    assert!(!fx.has("bar.jar"));
}

#[tokio::test]
async fn side_filtered_entry_is_neither_fetched_nor_deleted() {
    let fx = Fixture::new().await;
    expect_no_requests(&fx.primary).await;
    fx.touch("shared.jar");

    let entries = vec![
        ContentEntry::curseforge("shared.jar", 1, 1000001, Side::Both),
        ContentEntry::curseforge("missing-shared.jar", 2, 1000002, Side::Both),
    ];
    let report = fx.orchestrator().apply(&fx.mods(), &entries, SideFilter::ClientOnly).await;

    assert_eq!(report.skipped, 2);
    assert_eq!(report.downloaded, 0);
    assert_eq!(report.deleted, 0);
    assert!(fx.has("shared.jar"));
    assert!(!fx.has("missing-shared.jar"));
}

#[tokio::test]
async fn curseforge_failure_retries_fallback_once() {
    let fx = Fixture::new().await;
    serve(&fx.primary, "/files/4567/890/jei.jar", 404, b"").await;
    serve(&fx.fallback, "/files/4567/890/jei.jar", 200, b"jei bytes").await;

    let events = Arc::new(Mutex::new(Vec::<ProgressEvent>::new()));
    let sink = Arc::clone(&events);
    let orchestrator = fx.orchestrator().with_progress(Arc::new(move |event: ProgressEvent| {
        sink.lock().unwrap().push(event);
    }));

    let entries = vec![ContentEntry::curseforge("jei.jar", 238222, 4567890, Side::Client)];
    let report = orchestrator.apply(&fx.mods(), &entries, SideFilter::Client).await;

    assert_eq!(report.downloaded, 1);
    assert_eq!(report.downloaded_via_fallback, 1);
    assert!(fx.has("jei.jar"));

    let events = events.lock().unwrap();
    assert!(events.iter().any(|e| matches!(e, ProgressEvent::FallbackAttempt { file, .. } if file == "jei.jar")));
    assert!(events.iter().any(|e| matches!(e, ProgressEvent::DownloadComplete { file, .. } if file == "jei.jar")));
}

#[tokio::test]
async fn fallback_failure_abandons_file() {
    let fx = Fixture::new().await;
    serve(&fx.primary, "/files/4567/890/jei.jar", 404, b"").await;
    serve(&fx.fallback, "/files/4567/890/jei.jar", 404, b"").await;

    let entries = vec![ContentEntry::curseforge("jei.jar", 238222, 4567890, Side::Both)];
    let report = fx.orchestrator().apply(&fx.mods(), &entries, SideFilter::All).await;

    assert_eq!(report.downloaded, 0);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].filename, "jei.jar");
    assert!(!fx.has("jei.jar"));
}

#[tokio::test]
async fn modrinth_failure_has_no_fallback_and_does_not_stop_batch() {
    let fx = Fixture::new().await;
    serve(&fx.primary, "/data/gone/versions/v1/gone.jar", 404, b"").await;
    serve(&fx.primary, "/data/ok/versions/v2/ok.jar", 200, b"ok").await;
    expect_no_requests(&fx.fallback).await;

    let entries = vec![
        ContentEntry::modrinth("gone.jar", "gone", "v1", Side::Both),
        ContentEntry::modrinth("ok.jar", "ok", "v2", Side::Both),
    ];
    let report = fx.orchestrator().apply(&fx.mods(), &entries, SideFilter::All).await;

    assert_eq!(report.downloaded, 1);
    assert_eq!(report.downloaded_via_fallback, 0);
    assert_eq!(
        report.failed.iter().map(|f| f.filename.as_str()).collect::<Vec<_>>(),
        ["gone.jar"]
    );
    assert!(fx.has("ok.jar"));
    assert!(!fx.has("gone.jar"));
}

#[tokio::test]
async fn unresolvable_entries_are_reported_and_kept() {
    let fx = Fixture::new().await;
    expect_no_requests(&fx.primary).await;
    fx.touch("handmade.jar");

    let entries = vec![
        ContentEntry::curseforge("short-id.jar", 1, 524623, Side::Both),
        ContentEntry::unresolved("handmade.jar", Side::Both),
        ContentEntry::unresolved("absent.jar", Side::Both),
    ];
    let report = fx.orchestrator().apply(&fx.mods(), &entries, SideFilter::All).await;

    assert_eq!(
        report.unresolvable.iter().map(|f| f.filename.as_str()).collect::<Vec<_>>(),
        ["short-id.jar", "absent.jar"]
    );
    assert_eq!(report.already_present, 1);
    assert_eq!(report.deleted, 0);
    assert!(fx.has("handmade.jar"));
}

#[tokio::test]
async fn reserved_names_survive_orphan_pass() {
    let fx = Fixture::new().await;
    fx.touch("rejected-row.jar");
    fx.touch("stale.jar");

    let target = fx.mods().with_reserved_names(["rejected-row.jar"]);
    let report = fx.orchestrator().apply(&target, &[], SideFilter::All).await;

    assert_eq!(report.deleted, 1);
    assert!(fx.has("rejected-row.jar"));
    assert!(!fx.has("stale.jar"));
}

#[tokio::test]
async fn both_variants_on_disk_keeps_marked_file() {
    let fx = Fixture::new().await;
    fx.touch("a.jar");
    fx.touch("a.jar.disabled");

    let entries = vec![ContentEntry::modrinth("a.jar.disabled", "a", "v1", Side::Both)];
    let report = fx.orchestrator().apply(&fx.mods(), &entries, SideFilter::All).await;

    assert_eq!(report.renamed, 0);
    assert_eq!(report.deleted, 1);
    assert!(fx.has("a.jar.disabled"));
    assert!(!fx.has("a.jar"));
}

#[tokio::test]
async fn join_deadline_proceeds_to_cleanup() {
    let fx = Fixture::new().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"slow".to_vec())
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&fx.primary)
        .await;
    fx.touch("orphan.jar");

    let orchestrator = Orchestrator::new(fx.config().join_timeout(Duration::from_millis(200)).build()).unwrap();
    let entries = vec![ContentEntry::modrinth("slow.jar", "slow", "v1", Side::Both)];
    let report = orchestrator.apply(&fx.mods(), &entries, SideFilter::All).await;

    assert!(report.deadline_exceeded);
    assert_eq!(report.pending, 1);
    assert_eq!(report.downloaded, 0);
    assert_eq!(report.deleted, 1);
    assert!(!fx.has("slow.jar"));
}

#[tokio::test]
async fn pool_handles_more_files_than_workers() {
    let fx = Fixture::new().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
        .expect(25)
        .mount(&fx.primary)
        .await;

    let orchestrator = Orchestrator::new(fx.config().max_concurrent_downloads(3).build()).unwrap();
    let entries: Vec<ContentEntry> = (0..25)
        .map(|i| ContentEntry::modrinth(format!("m{}.jar", i), format!("id{}", i), "v", Side::Both))
        .collect();
    let report = orchestrator.apply(&fx.mods(), &entries, SideFilter::All).await;

    assert_eq!(report.downloaded, 25);
    assert_eq!(report.bytes, 25);
    assert!((0..25).all(|i| fx.has(&format!("m{}.jar", i))));
}

/// Records when each request arrived and answers after a fixed delay
struct Arrivals {
    seen: Arc<Mutex<Vec<std::time::Instant>>>,
    delay: Duration,
}

impl Respond for Arrivals {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.seen.lock().unwrap().push(std::time::Instant::now());
        ResponseTemplate::new(200)
            .set_body_bytes(b"x".to_vec())
            .set_delay(self.delay)
    }
}

#[tokio::test]
async fn pool_never_exceeds_worker_limit() {
    let fx = Fixture::new().await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let delay = Duration::from_millis(300);
    Mock::given(method("GET"))
        .respond_with(Arrivals {
            seen: Arc::clone(&seen),
            delay,
        })
        .mount(&fx.primary)
        .await;

    let workers = 3;
    let orchestrator = Orchestrator::new(fx.config().max_concurrent_downloads(workers).build()).unwrap();
    let entries: Vec<ContentEntry> = (0..9)
        .map(|i| ContentEntry::modrinth(format!("w{}.jar", i), format!("id{}", i), "v", Side::Both))
        .collect();
    let report = orchestrator.apply(&fx.mods(), &entries, SideFilter::All).await;
    assert_eq!(report.downloaded, 9);

    // a request can only start once an earlier one has finished, so no window
    // shorter than the response delay holds more starts than there are workers
    let mut seen = seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen.len(), 9);
    let window = delay / 2;
    let peak = seen
        .iter()
        .map(|start| seen.iter().filter(|t| **t >= *start && **t - *start < window).count())
        .max()
        .unwrap();
    assert!(peak <= workers, "{} requests started within {:?}", peak, window);
    assert_eq!(peak, workers);
}
