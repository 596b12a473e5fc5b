//! End-to-end tests: config file, cache directory, router, verdicts.

use std::fs;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use zoneauth::server::{self, Reply};
use zoneauth::{
    AddressSet, Config, DecisionEngine, ExclusionList, RangeIndex, Reason, Refresher, ZoneStore,
};

/// Write a config pointing at `cache_dir` and an unreachable remote.
fn write_config(dir: &std::path::Path, block_anonymizers: bool) -> std::path::PathBuf {
    let path = dir.join("zoneauth.json");
    let json = format!(
        r#"{{
            "listenAddress": "127.0.0.1",
            "port": 0,
            "cacheDirectory": {:?},
            "allowedCountries": ["US", "fr"],
            "blockAnonymizers": {},
            "zoneBaseUrl": "http://127.0.0.1:1/zones",
            "anonymizerUrl": "http://127.0.0.1:1/exits",
            "fetchTimeoutSecs": 1
        }}"#,
        dir.join("cache"),
        block_anonymizers
    );
    fs::write(&path, json).unwrap();
    path
}

/// Seed the cache with fresh files so no download is attempted.
fn seed_cache(dir: &std::path::Path) {
    let cache = dir.join("cache");
    fs::create_dir_all(&cache).unwrap();
    fs::write(
        cache.join("us-aggregated.zone"),
        "203.0.113.0/24\n198.51.100.0/24\n2001:db8::/32\n",
    )
    .unwrap();
    fs::write(cache.join("fr-aggregated.zone"), "192.0.2.0/24\n").unwrap();
    fs::write(
        cache.join("anonymizer-exits.list"),
        "198.51.100.7\n2001:db8::dead\n",
    )
    .unwrap();
}

fn engine_from_config(config: &Config) -> DecisionEngine {
    let store = Arc::new(ZoneStore::new());
    let refresher = Refresher::from_config(config, Arc::clone(&store));
    let report = refresher.refresh_all(&config.allowed_countries, config.block_anonymizers);
    assert!(report.is_success(), "{}", report);
    assert_eq!(report.downloads(), 0);
    DecisionEngine::new(store, config.block_anonymizers)
}

#[test]
fn test_config_driven_startup_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    seed_cache(dir.path());
    let config = Config::load(write_config(dir.path(), true)).unwrap();
    assert_eq!(config.allowed_countries, vec!["us", "fr"]);

    let engine = engine_from_config(&config);

    assert!(engine.decide("us", "203.0.113.5"));
    assert!(engine.decide("fr", "192.0.2.44"));
    assert!(!engine.decide("us", "192.0.2.44"));
    assert!(!engine.decide("de", "203.0.113.5"));

    let verdict = engine.evaluate("us", "198.51.100.7");
    assert_eq!(verdict.reason, Reason::AnonymizerExit);
    assert!(!engine.decide("us", "2001:db8::dead"));
    assert!(engine.decide("us", "2001:db8::beef"));
}

#[test]
fn test_unreachable_remote_leaves_country_unknown() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(write_config(dir.path(), false)).unwrap();

    let store = Arc::new(ZoneStore::new());
    let refresher = Refresher::from_config(&config, Arc::clone(&store));
    let report = refresher.refresh_all(&config.allowed_countries, false);

    assert_eq!(report.failures(), 2);
    assert!(store.countries().is_empty());

    let engine = DecisionEngine::new(store, false);
    for ip in ["203.0.113.5", "192.0.2.1", "::1"] {
        assert_eq!(engine.evaluate("us", ip).reason, Reason::UnknownCountry);
    }
}

#[test]
fn test_unknown_country_is_always_denied() {
    let store = Arc::new(ZoneStore::new());
    store.install("us", RangeIndex::build(["0.0.0.0/0", "::/0"]));
    let engine = DecisionEngine::new(store, false);

    for ip in ["1.2.3.4", "203.0.113.5", "::1", "not an ip", ""] {
        assert!(!engine.decide("de", ip));
    }
    assert!(engine.decide("us", "1.2.3.4"));
}

#[test]
fn test_malformed_lines_match_valid_only_build() {
    let valid = ["203.0.113.0/24", "10.0.0.0/8", "2001:db8::/48"];
    let mixed = [
        "203.0.113.0/24",
        "garbage",
        "10.0.0.0/8",
        "300.1.1.1/8",
        "10.0.0.0/33",
        "2001:db8::/48",
        "",
        "# comment",
    ];

    let a = RangeIndex::build(valid);
    let b = RangeIndex::build(mixed);
    assert_eq!(a.block_count(), b.block_count());

    let probes: Vec<IpAddr> = [
        "203.0.113.0",
        "203.0.113.255",
        "203.0.114.0",
        "10.255.255.255",
        "11.0.0.0",
        "2001:db8::1",
        "2001:db8:1::1",
        "::ffff:10.1.2.3",
    ]
    .iter()
    .map(|s| s.parse().unwrap())
    .collect();

    for ip in probes {
        assert_eq!(a.contains(ip), b.contains(ip), "{}", ip);
    }
}

#[test]
fn test_empty_index_matches_nothing() {
    let index = RangeIndex::build(Vec::<String>::new());
    assert!(index.is_empty());
    for ip in ["0.0.0.0", "255.255.255.255", "::", "ffff::1"] {
        assert!(!index.contains_str(ip));
    }
}

#[test]
fn test_exclusion_toggle() {
    let store = Arc::new(ZoneStore::new());
    store.install("us", RangeIndex::build(["198.51.100.0/24"]));
    store.install_exclusions(ExclusionList::build(["198.51.100.7"]));

    assert!(!DecisionEngine::new(Arc::clone(&store), true).decide("us", "198.51.100.7"));
    assert!(DecisionEngine::new(store, false).decide("us", "198.51.100.7"));
}

/// Issue a GET over a fresh connection; returns status and body.
async fn get(addr: std::net::SocketAddr, uri: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: localhost\r\nX-Real-IP: 203.0.113.5\r\nConnection: close\r\n\r\n",
        uri
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();

    let status = raw
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap();
    let body = raw
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default();
    (status, body)
}

#[tokio::test]
async fn test_router_end_to_end() {
    let store = Arc::new(ZoneStore::new());
    store.install("us", RangeIndex::build(["203.0.113.0/24"]));
    let app = server::router(Arc::new(DecisionEngine::new(store, false)));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    assert_eq!(get(addr, "/").await, (200, "Welcome!\n".to_string()));

    let cases = [
        ("/allowbycountry/us/203.0.113.5", 200, "Authorized for country us"),
        ("/allowbycountry/US/8.8.8.8", 403, "UnAuthorized for country us"),
        ("/allowbycountry/de/203.0.113.5", 403, "UnAuthorized for country de"),
    ];
    for (uri, status, text) in cases {
        let (code, body) = get(addr, uri).await;
        assert_eq!(code, status, "{}", uri);
        let reply: Reply = serde_json::from_str(&body).unwrap();
        assert_eq!(reply.code, status);
        assert_eq!(reply.text, text);
    }

    let (code, _) = get(addr, "/allowbycountry/us").await;
    assert_eq!(code, 404);
}
