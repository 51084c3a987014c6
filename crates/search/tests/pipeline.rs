//! End-to-end pipeline tests over in-memory doubles
//!
//! The orchestrator and resolver run against the in-memory cache store
//! and scripted indexer/debrid doubles, exercising the caching tiers,
//! the single-flight lock, the download state machine, and the
//! working-link upgrade pass.

use async_trait::async_trait;
use base64::Engine;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use streamarr_core::keys;
use streamarr_core::models::{
    AnnouncedFile, AvailabilityAnnouncement, MediaKind, MediaRequest, PlaybackQuery, Privacy,
    RawResult, StreamDescriptor, UserConfig,
};
use streamarr_core::traits::{
    CacheStore, DebridClient, DebridSelector, IndexerClient, IndexerSelector, MagnetAdd,
    ProviderKind,
};
use streamarr_core::Result;
use streamarr_infrastructure::MemoryStore;
use streamarr_search::{PlaybackResolver, SearchOrchestrator, SearchSettings};
use tokio::sync::Mutex;

fn test_config() -> UserConfig {
    let json = r#"{
        "addonHost": "https://addon.example.com",
        "minCachedResults": 5,
        "maxResults": 20,
        "resultsPerQuality": 10
    }"#;
    let encoded = base64::engine::general_purpose::STANDARD
        .encode(json)
        .replace('=', "%3D");
    UserConfig::decode_b64(&encoded).unwrap()
}

fn movie() -> MediaRequest {
    MediaRequest::Movie {
        id: "tt0111161".to_string(),
        titles: vec![],
        year: Some(1994),
        languages: vec!["fr".to_string()],
    }
}

fn raw(hash: &str, title: &str) -> RawResult {
    RawResult {
        raw_title: title.to_string(),
        info_hash: hash.to_string(),
        size_bytes: 1_000_000,
        magnet: Some(format!("magnet:?xt=urn:btih:{hash}")),
        torrent_file_url: None,
        seeders: 5,
        languages: vec![],
        indexer_name: "scripted".to_string(),
        privacy: Privacy::Public,
    }
}

fn hash(c: char) -> String {
    c.to_string().repeat(40)
}

struct ScriptedIndexer {
    label: String,
    results: Vec<RawResult>,
    calls: AtomicU32,
}

impl ScriptedIndexer {
    fn new(label: &str, results: Vec<RawResult>) -> Arc<Self> {
        Arc::new(ScriptedIndexer {
            label: label.to_string(),
            results,
            calls: AtomicU32::new(0),
        })
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndexerClient for ScriptedIndexer {
    fn name(&self) -> &str {
        &self.label
    }

    async fn search(&self, _media: &MediaRequest) -> Result<Vec<RawResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.results.clone())
    }
}

struct FixedIndexers(Vec<Arc<dyn IndexerClient>>);

impl IndexerSelector for FixedIndexers {
    fn for_config(&self, _config: &UserConfig) -> Vec<Arc<dyn IndexerClient>> {
        self.0.clone()
    }
}

struct ScriptedDebrid {
    service_code: String,
    kind: ProviderKind,
    announcements: HashMap<String, AvailabilityAnnouncement>,
    link: Mutex<Option<String>>,
    add_calls: AtomicU32,
    caching_calls: AtomicU32,
}

impl ScriptedDebrid {
    fn new(code: &str, kind: ProviderKind) -> Arc<Self> {
        Arc::new(ScriptedDebrid {
            service_code: code.to_string(),
            kind,
            announcements: HashMap::new(),
            link: Mutex::new(None),
            add_calls: AtomicU32::new(0),
            caching_calls: AtomicU32::new(0),
        })
    }

    fn with_announcements(
        code: &str,
        kind: ProviderKind,
        announcements: HashMap<String, AvailabilityAnnouncement>,
    ) -> Arc<Self> {
        Arc::new(ScriptedDebrid {
            service_code: code.to_string(),
            kind,
            announcements,
            link: Mutex::new(None),
            add_calls: AtomicU32::new(0),
            caching_calls: AtomicU32::new(0),
        })
    }

    async fn set_link(&self, link: &str) {
        *self.link.lock().await = Some(link.to_string());
    }
}

#[async_trait]
impl DebridClient for ScriptedDebrid {
    fn code(&self) -> String {
        self.service_code.clone()
    }

    fn provider_kind(&self) -> ProviderKind {
        self.kind
    }

    async fn check_availability_bulk(
        &self,
        hashes: &[String],
        _client_ip: Option<&str>,
    ) -> Result<HashMap<String, AvailabilityAnnouncement>> {
        Ok(hashes
            .iter()
            .filter_map(|h| self.announcements.get(h).map(|a| (h.clone(), a.clone())))
            .collect())
    }

    async fn add_magnet(&self, _magnet: &str, _client_ip: Option<&str>) -> Result<MagnetAdd> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        Ok(MagnetAdd {
            id: "m1".to_string(),
            files: vec![],
        })
    }

    async fn get_stream_link(
        &self,
        _query: &PlaybackQuery,
        _client_ip: Option<&str>,
    ) -> Result<Option<String>> {
        Ok(self.link.lock().await.clone())
    }

    async fn start_background_caching(&self, _magnet: &str) -> bool {
        self.caching_calls.fetch_add(1, Ordering::SeqCst);
        true
    }
}

struct SingleDebrid(Arc<ScriptedDebrid>);

impl DebridSelector for SingleDebrid {
    fn all_for(&self, _config: &UserConfig) -> Vec<Arc<dyn DebridClient>> {
        vec![self.0.clone()]
    }

    fn for_service(&self, _config: &UserConfig, _service: &str) -> Result<Arc<dyn DebridClient>> {
        Ok(self.0.clone())
    }

    fn downloader_for(&self, _config: &UserConfig) -> Result<Arc<dyn DebridClient>> {
        Ok(self.0.clone())
    }
}

/// Like [`SingleDebrid`], but remembers which service codes playback
/// asked for.
struct RecordingSelector {
    inner: Arc<ScriptedDebrid>,
    requested: std::sync::Mutex<Vec<String>>,
}

impl RecordingSelector {
    fn new(inner: Arc<ScriptedDebrid>) -> Arc<Self> {
        Arc::new(RecordingSelector {
            inner,
            requested: std::sync::Mutex::new(Vec::new()),
        })
    }

    fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl DebridSelector for RecordingSelector {
    fn all_for(&self, _config: &UserConfig) -> Vec<Arc<dyn DebridClient>> {
        vec![self.inner.clone()]
    }

    fn for_service(&self, _config: &UserConfig, service: &str) -> Result<Arc<dyn DebridClient>> {
        self.requested.lock().unwrap().push(service.to_string());
        Ok(self.inner.clone())
    }

    fn downloader_for(&self, _config: &UserConfig) -> Result<Arc<dyn DebridClient>> {
        Ok(self.inner.clone())
    }
}

fn fast_settings() -> SearchSettings {
    SearchSettings {
        search_deadline: Duration::from_secs(30),
        prefetch_deadline: Duration::from_secs(8),
        lock_poll_interval: Duration::from_millis(10),
        lock_poll_attempts: 5,
        prefetch_enabled: false,
    }
}

fn orchestrator(
    store: Arc<dyn CacheStore>,
    indexers: Vec<Arc<dyn IndexerClient>>,
    debrid: Arc<ScriptedDebrid>,
) -> Arc<SearchOrchestrator> {
    Arc::new(SearchOrchestrator::new(
        store,
        Arc::new(FixedIndexers(indexers)),
        Arc::new(SingleDebrid(debrid)),
        fast_settings(),
    ))
}

fn descriptor(name: &str, service: &str, info_hash: &str) -> StreamDescriptor {
    StreamDescriptor {
        name: name.to_string(),
        description: "desc".to_string(),
        url: Some("https://addon.example.com/playback/x/y".to_string()),
        info_hash: Some(info_hash.to_string()),
        file_index: None,
        service: Some(service.to_string()),
        binge_group: format!("stream-{info_hash}"),
        filename: "file.mkv".to_string(),
    }
}

#[tokio::test]
async fn test_stream_cache_hit_skips_indexers() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    let config = test_config();
    let media = movie();
    let stream_key = keys::stream_key(&config.user_identifier("1.2.3.4"), &media);
    let cached = vec![
        descriptor("⚡RD+\n(1080p)", "RD", &hash('a')),
        descriptor("⚡RD+\n(720p)", "RD", &hash('b')),
        descriptor("⬇️PM\n(1080p)", "PM", &hash('c')),
    ];
    store
        .as_ref()
        .set_json(&stream_key, &cached, Duration::from_secs(600))
        .await
        .unwrap();

    let indexer = ScriptedIndexer::new("primary", vec![raw(&hash('d'), "Movie.1080p")]);
    let debrid = ScriptedDebrid::new("RD", ProviderKind::RealDebrid);
    let orchestrator = orchestrator(store, vec![indexer.clone()], debrid);

    let results = orchestrator.search(&media, &config, "1.2.3.4").await.unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(indexer.call_count(), 0);
}

#[tokio::test]
async fn test_result_floor_gates_second_indexer() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    let config = test_config();

    let first_results: Vec<RawResult> = "abcde"
        .chars()
        .map(|c| raw(&hash(c), &format!("Movie.{c}.1080p")))
        .collect();
    let first = ScriptedIndexer::new("first", first_results);
    let second = ScriptedIndexer::new("second", vec![raw(&hash('f'), "Movie.f.1080p")]);
    let debrid = ScriptedDebrid::new("RD", ProviderKind::RealDebrid);
    let orchestrator = orchestrator(
        store,
        vec![first.clone(), second.clone()],
        debrid,
    );

    // First indexer meets the floor of 5; the second must stay idle
    let results = orchestrator.search(&movie(), &config, "1.2.3.4").await.unwrap();
    assert_eq!(results.len(), 5);
    assert_eq!(first.call_count(), 1);
    assert_eq!(second.call_count(), 0);
}

#[tokio::test]
async fn test_floor_unmet_invokes_next_indexer() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    let config = test_config();

    let first = ScriptedIndexer::new("first", vec![raw(&hash('a'), "Movie.a.1080p")]);
    let second = ScriptedIndexer::new("second", vec![raw(&hash('b'), "Movie.b.1080p")]);
    let orchestrator = orchestrator(
        store,
        vec![first.clone(), second.clone()],
        ScriptedDebrid::new("RD", ProviderKind::RealDebrid),
    );

    let results = orchestrator.search(&movie(), &config, "1.2.3.4").await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(first.call_count(), 1);
    assert_eq!(second.call_count(), 1);
}

#[tokio::test]
async fn test_short_and_duplicate_hashes_discarded() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    let config = test_config();

    let results = vec![
        raw(&hash('a'), "Movie.ok.1080p"),
        raw(&"a".repeat(39), "Movie.short-hash.1080p"),
        raw(&hash('a'), "Movie.duplicate.1080p"),
        raw("", "Movie.no-hash.1080p"),
    ];
    let indexer = ScriptedIndexer::new("primary", results);
    let orchestrator = orchestrator(
        store,
        vec![indexer],
        ScriptedDebrid::new("RD", ProviderKind::RealDebrid),
    );

    let descriptors = orchestrator.search(&movie(), &config, "1.2.3.4").await.unwrap();
    assert_eq!(descriptors.len(), 1);
    assert_eq!(descriptors[0].info_hash.as_deref(), Some(hash('a').as_str()));
}

#[tokio::test]
async fn test_availability_reflected_in_names() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    let config = test_config();

    let mut announcements = HashMap::new();
    announcements.insert(
        hash('a'),
        AvailabilityAnnouncement {
            info_hash: hash('a'),
            files: vec![AnnouncedFile {
                file_index: 0,
                file_name: "movie.mkv".to_string(),
                size_bytes: 1_000,
            }],
            cached: true,
            store: "realdebrid".to_string(),
        },
    );
    let debrid =
        ScriptedDebrid::with_announcements("RD", ProviderKind::RealDebrid, announcements);
    let indexer = ScriptedIndexer::new(
        "primary",
        vec![
            raw(&hash('a'), "Movie.cached.1080p"),
            raw(&hash('b'), "Movie.unknown.1080p"),
        ],
    );
    let orchestrator = orchestrator(store, vec![indexer], debrid);

    let descriptors = orchestrator.search(&movie(), &config, "1.2.3.4").await.unwrap();
    let cached = descriptors
        .iter()
        .find(|d| d.info_hash.as_deref() == Some(hash('a').as_str()))
        .unwrap();
    assert!(cached.name.starts_with("⚡RD+"));
    let unknown = descriptors
        .iter()
        .find(|d| d.info_hash.as_deref() == Some(hash('b').as_str()))
        .unwrap();
    assert!(unknown.name.starts_with("⬇️"));
    assert_eq!(unknown.service.as_deref(), Some("DL"));
}

#[tokio::test]
async fn test_media_cache_reused_after_stream_expiry() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    let config = test_config();
    let media = movie();

    let indexer = ScriptedIndexer::new("primary", vec![raw(&hash('a'), "Movie.1080p")]);
    let orchestrator = orchestrator(
        store.clone(),
        vec![indexer.clone()],
        ScriptedDebrid::new("RD", ProviderKind::RealDebrid),
    );

    orchestrator.search(&media, &config, "1.2.3.4").await.unwrap();
    // Drop the descriptor tier; the raw tier must satisfy the re-search
    let stream_key = keys::stream_key(&config.user_identifier("1.2.3.4"), &media);
    store.delete(&stream_key).await.unwrap();
    orchestrator.search(&media, &config, "1.2.3.4").await.unwrap();
    assert_eq!(indexer.call_count(), 1);
}

#[tokio::test]
async fn test_lock_contention_times_out_busy() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    let config = test_config();
    let media = movie();
    let stream_key = keys::stream_key(&config.user_identifier("1.2.3.4"), &media);

    // Simulate another process holding the search lock with no result
    assert!(store
        .try_lock(&keys::search_lock_key(&stream_key), Duration::from_secs(60))
        .await
        .unwrap());

    let orchestrator = orchestrator(
        store,
        vec![ScriptedIndexer::new("primary", vec![])],
        ScriptedDebrid::new("RD", ProviderKind::RealDebrid),
    );
    let outcome = orchestrator.search(&media, &config, "1.2.3.4").await;
    assert!(matches!(
        outcome,
        Err(streamarr_core::StreamarrError::ServiceBusy { .. })
    ));
}

#[tokio::test]
async fn test_lock_loser_picks_up_cached_result() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    let config = test_config();
    let media = movie();
    let stream_key = keys::stream_key(&config.user_identifier("1.2.3.4"), &media);

    assert!(store
        .try_lock(&keys::search_lock_key(&stream_key), Duration::from_secs(60))
        .await
        .unwrap());

    // The lock holder publishes its result while we poll
    let publisher_store = store.clone();
    let publisher_key = stream_key.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        publisher_store
            .as_ref()
            .set_json(
                &publisher_key,
                &vec![descriptor("⚡RD+\n(1080p)", "RD", &hash('a'))],
                Duration::from_secs(60),
            )
            .await
            .unwrap();
    });

    let orchestrator = orchestrator(
        store,
        vec![ScriptedIndexer::new("primary", vec![])],
        ScriptedDebrid::new("RD", ProviderKind::RealDebrid),
    );
    let results = orchestrator.search(&media, &config, "1.2.3.4").await.unwrap();
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn test_working_link_upgrade_rewrites_cache() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    let config = test_config();
    let media = movie();
    let stream_key = keys::stream_key(&config.user_identifier("1.2.3.4"), &media);
    let h = hash('e');

    store
        .as_ref()
        .set_json(
            &stream_key,
            &vec![descriptor("⬇️ST:AD\n(1080p)", "ST:AD", &h)],
            Duration::from_secs(600),
        )
        .await
        .unwrap();
    store
        .set_raw(&keys::working_key("AD", &h), "1", Duration::from_secs(600))
        .await
        .unwrap();

    let indexer = ScriptedIndexer::new("primary", vec![]);
    let orchestrator = orchestrator(
        store.clone(),
        vec![indexer.clone()],
        ScriptedDebrid::new("RD", ProviderKind::RealDebrid),
    );
    let results = orchestrator.search(&media, &config, "1.2.3.4").await.unwrap();
    assert_eq!(results[0].name, "⚡ST:AD+\n(1080p)");
    assert_eq!(indexer.call_count(), 0);

    // The upgraded list must be re-cached
    let recached: Vec<StreamDescriptor> = store
        .as_ref()
        .get_json(&stream_key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(recached[0].name, "⚡ST:AD+\n(1080p)");
}

#[tokio::test]
async fn test_force_refresh_flag_bypasses_stream_cache() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    let config = test_config();
    let media = movie();
    let stream_key = keys::stream_key(&config.user_identifier("1.2.3.4"), &media);

    store
        .as_ref()
        .set_json(
            &stream_key,
            &vec![descriptor("⚡RD+\n(1080p)", "RD", &hash('a'))],
            Duration::from_secs(600),
        )
        .await
        .unwrap();
    store
        .set_raw(&keys::force_refresh_key(), "1", Duration::from_secs(60))
        .await
        .unwrap();

    let indexer = ScriptedIndexer::new("primary", vec![raw(&hash('b'), "Movie.fresh.1080p")]);
    let orchestrator = orchestrator(
        store,
        vec![indexer.clone()],
        ScriptedDebrid::new("RD", ProviderKind::RealDebrid),
    );
    let results = orchestrator.search(&media, &config, "1.2.3.4").await.unwrap();
    assert_eq!(indexer.call_count(), 1);
    assert_eq!(results[0].info_hash.as_deref(), Some(hash('b').as_str()));
}

#[tokio::test]
async fn test_download_flag_lifecycle() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    let config = test_config();
    let debrid = ScriptedDebrid::new("TB", ProviderKind::Torbox);
    let resolver = PlaybackResolver::new(
        store.clone(),
        Arc::new(SingleDebrid(debrid.clone())),
        "https://addon.example.com/static/nocache.mp4".to_string(),
    )
    .with_poll_policy(Duration::from_millis(10), 3);

    let query = PlaybackQuery {
        magnet: Some(format!("magnet:?xt=urn:btih:{}", hash('a'))),
        info_hash: None,
        media_kind: MediaKind::Movie,
        season: None,
        episode: None,
        file_index: None,
        torrent_download: None,
        service: "DL".to_string(),
        privacy: None,
        cached: None,
        always_show: None,
    };
    let decoded = serde_json::to_string(&query).unwrap();
    let user = config.user_identifier("1.2.3.4");
    let query_hash = keys::hash16(&decoded);

    // First request: flags the download, kicks the provider, placeholder back
    let link = resolver
        .resolve(&config, &query, &decoded, "1.2.3.4")
        .await
        .unwrap();
    assert_eq!(link, "https://addon.example.com/static/nocache.mp4");
    assert_eq!(
        store
            .get_raw(&keys::download_key(&user, &query_hash))
            .await
            .unwrap()
            .as_deref(),
        Some("IN_PROGRESS")
    );
    assert_eq!(debrid.caching_calls.load(Ordering::SeqCst), 1);
    assert_eq!(debrid.add_calls.load(Ordering::SeqCst), 0);

    // Provider finished in the background; second request promotes to READY
    debrid.set_link("https://cdn.example.com/movie.mkv").await;
    let link = resolver
        .resolve(&config, &query, &decoded, "1.2.3.4")
        .await
        .unwrap();
    assert_eq!(link, "https://cdn.example.com/movie.mkv");
    assert_eq!(
        store
            .get_raw(&keys::download_key(&user, &query_hash))
            .await
            .unwrap(),
        None
    );
    assert_eq!(
        store
            .get_raw(&keys::ready_key(&user, &query_hash))
            .await
            .unwrap()
            .as_deref(),
        Some("READY")
    );
    assert_eq!(
        store
            .get_raw(&keys::direct_link_key(&user, &query_hash))
            .await
            .unwrap()
            .as_deref(),
        Some("https://cdn.example.com/movie.mkv")
    );

    // Third request is served from the direct-link cache
    let link = resolver
        .resolve(&config, &query, &decoded, "1.2.3.4")
        .await
        .unwrap();
    assert_eq!(link, "https://cdn.example.com/movie.mkv");
}

#[tokio::test]
async fn test_resolution_writes_working_marker_and_refresh_flag() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    let config = test_config();
    let debrid = ScriptedDebrid::new("ST:AD", ProviderKind::Aggregator);
    debrid.set_link("https://cdn.example.com/file.mkv").await;
    let resolver = PlaybackResolver::new(
        store.clone(),
        Arc::new(SingleDebrid(debrid)),
        "https://addon.example.com/static/nocache.mp4".to_string(),
    );

    let query = PlaybackQuery {
        magnet: Some(format!("magnet:?xt=urn:btih:{}", hash('b'))),
        info_hash: None,
        media_kind: MediaKind::Movie,
        season: None,
        episode: None,
        file_index: None,
        torrent_download: None,
        service: "ST:AD".to_string(),
        privacy: None,
        cached: None,
        always_show: None,
    };
    let decoded = serde_json::to_string(&query).unwrap();

    let link = resolver
        .resolve(&config, &query, &decoded, "1.2.3.4")
        .await
        .unwrap();
    assert_eq!(link, "https://cdn.example.com/file.mkv");
    assert!(store
        .exists(&keys::working_key("AD", &hash('b')))
        .await
        .unwrap());
    assert!(store.exists(&keys::force_refresh_key()).await.unwrap());
}

#[tokio::test]
async fn test_binge_pin_overrides_query_service() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    let config = test_config();
    let debrid = ScriptedDebrid::new("RD", ProviderKind::RealDebrid);
    debrid.set_link("https://cdn.example.com/e02.mkv").await;
    let selector = RecordingSelector::new(debrid);
    let resolver = PlaybackResolver::new(
        store.clone(),
        selector.clone(),
        "https://addon.example.com/static/nocache.mp4".to_string(),
    );

    let query = PlaybackQuery {
        magnet: Some(format!("magnet:?xt=urn:btih:{}", hash('d'))),
        info_hash: None,
        media_kind: MediaKind::Series,
        season: Some(1),
        episode: Some(2),
        file_index: None,
        torrent_download: None,
        service: "ST:AD".to_string(),
        privacy: None,
        cached: None,
        always_show: None,
    };
    let decoded = serde_json::to_string(&query).unwrap();
    let user = config.user_identifier("1.2.3.4");

    // A previous episode of this pack resolved through RD; the pin
    // keeps the binge session on that source.
    store
        .set_raw(
            &keys::current_source_key(&user, &format!("stream-{}", hash('d')), "ST:AD"),
            "RD",
            Duration::from_secs(60),
        )
        .await
        .unwrap();

    let link = resolver
        .resolve(&config, &query, &decoded, "1.2.3.4")
        .await
        .unwrap();
    assert_eq!(link, "https://cdn.example.com/e02.mkv");
    assert_eq!(selector.requested(), vec!["RD".to_string()]);
}

#[tokio::test]
async fn test_successful_resolution_pins_binge_source() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    let config = test_config();
    let debrid = ScriptedDebrid::new("RD", ProviderKind::RealDebrid);
    debrid.set_link("https://cdn.example.com/e01.mkv").await;
    let resolver = PlaybackResolver::new(
        store.clone(),
        Arc::new(SingleDebrid(debrid)),
        "https://addon.example.com/static/nocache.mp4".to_string(),
    );

    let query = PlaybackQuery {
        magnet: Some(format!("magnet:?xt=urn:btih:{}", hash('f'))),
        info_hash: None,
        media_kind: MediaKind::Series,
        season: Some(1),
        episode: Some(1),
        file_index: None,
        torrent_download: None,
        service: "RD".to_string(),
        privacy: None,
        cached: None,
        always_show: None,
    };
    let decoded = serde_json::to_string(&query).unwrap();
    let user = config.user_identifier("1.2.3.4");

    resolver
        .resolve(&config, &query, &decoded, "1.2.3.4")
        .await
        .unwrap();

    let pin = store
        .get_raw(&keys::current_source_key(
            &user,
            &format!("stream-{}", hash('f')),
            "RD",
        ))
        .await
        .unwrap();
    assert_eq!(pin.as_deref(), Some("RD"));
}

#[tokio::test]
async fn test_resolver_lock_losers_poll_cache() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    let config = test_config();
    let debrid = ScriptedDebrid::new("RD", ProviderKind::RealDebrid);
    let resolver = PlaybackResolver::new(
        store.clone(),
        Arc::new(SingleDebrid(debrid)),
        "https://addon.example.com/static/nocache.mp4".to_string(),
    )
    .with_poll_policy(Duration::from_millis(10), 5);

    let query = PlaybackQuery {
        magnet: Some(format!("magnet:?xt=urn:btih:{}", hash('c'))),
        info_hash: None,
        media_kind: MediaKind::Movie,
        season: None,
        episode: None,
        file_index: None,
        torrent_download: None,
        service: "RD".to_string(),
        privacy: None,
        cached: None,
        always_show: None,
    };
    let decoded = serde_json::to_string(&query).unwrap();
    let user = config.user_identifier("1.2.3.4");

    // Another request holds the lock; it publishes the link while we wait
    assert!(store
        .try_lock(
            &keys::stream_lock_key(&user, &decoded),
            Duration::from_secs(60)
        )
        .await
        .unwrap());
    let publisher_store = store.clone();
    let link_key = keys::stream_link_key(&user, &decoded);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        publisher_store
            .set_raw(
                &link_key,
                "https://cdn.example.com/other.mkv",
                Duration::from_secs(60),
            )
            .await
            .unwrap();
    });

    let link = resolver
        .resolve(&config, &query, &decoded, "1.2.3.4")
        .await
        .unwrap();
    assert_eq!(link, "https://cdn.example.com/other.mkv");
}
