//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the results service and run
//! the full crawl cycle end-to-end: probes, retries, fetches, checkpoints
//! and snapshots.

use furlong::config::{
    Config, CrawlerConfig, OutputConfig, RetryConfig, RunPlan, ServiceConfig, UserAgentConfig,
};
use furlong::crawler::Coordinator;
use furlong::{Place, RaceId};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ABSENT_PAGE: &str =
    "<html><body><div class=\"race_info\"><p>レース情報がありません</p></div></body></html>";

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, out: &Path) -> Config {
    Config {
        service: ServiceConfig {
            base_url: format!("{}/race/", base_url),
            request_timeout_secs: 5,
            connect_timeout_secs: 5,
        },
        retry: RetryConfig {
            max_attempts: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
        },
        crawler: CrawlerConfig {
            batch_size: 3,
            inter_batch_pause_secs: 0,
            jitter_every: 0,
            jitter_min_ms: 0,
            jitter_max_ms: 0,
            snapshot_multiplier: 1000,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            directory: out.to_path_buf(),
            save_debug_html: false,
        },
    }
}

fn tokyo_plan() -> RunPlan {
    RunPlan {
        year: 2024,
        places: vec![Place::Tokyo],
        max_items: None,
        reset_places: vec![],
    }
}

fn tokyo(meeting: u8, day: u8, race: u8) -> RaceId {
    RaceId::new(2024, Place::Tokyo, meeting, day, race)
}

fn race_path(id: RaceId) -> String {
    format!("/race/{}/", id)
}

fn result_page(id: RaceId) -> String {
    format!(
        r#"<html><body>
        <dl class="racedata"><dd><h1>Race {race}</h1></dd></dl>
        <table class="race_table_01">
          <tr><th>着順</th><th>馬名</th></tr>
          <tr><td>1</td><td><a href="/horse/2020100{race:03}/">Winner {race}</a></td></tr>
          <tr><td>2</td><td><a href="/horse/2020200{race:03}/">Second {race}</a></td></tr>
        </table>
        </body></html>"#,
        race = id.race()
    )
}

fn html(body: impl AsRef<[u8]>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_ref().to_vec(), "text/html; charset=utf-8")
}

/// Mounts a page that must be requested exactly `times` times
async fn mount_page(server: &MockServer, id: RaceId, body: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(race_path(id)))
        .respond_with(html(body))
        .expect(times)
        .mount(server)
        .await;
}

/// Files in `dir` whose names start with `prefix` and end with `suffix`
fn files_matching(dir: &Path, prefix: &str, suffix: &str) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| {
            let name = p.file_name().unwrap().to_string_lossy();
            name.starts_with(prefix) && name.ends_with(suffix)
        })
        .collect();
    found.sort();
    found
}

#[tokio::test]
async fn test_full_crawl_single_place() {
    let mock_server = MockServer::start().await;
    let out = TempDir::new().unwrap();

    for race in 1..=5 {
        let id = tokyo(1, 1, race);
        // One request per race: the fetch reuses the probe's body
        mount_page(&mock_server, id, &result_page(id), 1).await;
    }
    for id in [tokyo(1, 1, 6), tokyo(1, 2, 1), tokyo(2, 1, 1)] {
        mount_page(&mock_server, id, ABSENT_PAGE, 1).await;
    }

    let config = create_test_config(&mock_server.uri(), out.path());
    let mut coordinator = Coordinator::new(config, tokyo_plan(), "hash".to_string()).unwrap();
    let stats = coordinator.run().await.unwrap();

    assert_eq!(stats.probed, 8);
    assert_eq!(stats.discovered, 5);
    assert_eq!(stats.fetched, 5);
    assert_eq!(stats.absent, 3);
    assert!(stats.is_complete());

    let log = fs::read_to_string(out.path().join("progress_2024.txt")).unwrap();
    assert_eq!(
        log,
        "202405010101\n202405010102\n202405010103\n202405010104\n202405010105\n\
         202405010106\tabsent\n202405010201\tabsent\n202405020101\tabsent\n"
    );

    let csvs = files_matching(out.path(), "races_2024_", ".csv");
    assert_eq!(csvs.len(), 1);
    let csv = fs::read_to_string(&csvs[0]).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines[0],
        "race_id,place_code,place_name,meeting,day,race,race_name,row,着順,馬名"
    );
    assert_eq!(lines.len(), 11);
    assert_eq!(lines[1], "202405010101,05,Tokyo,1,1,1,Race 1,1,1,Winner 1");

    let json: serde_json::Value =
        serde_json::from_slice(&fs::read(csvs[0].with_extension("json")).unwrap()).unwrap();
    assert_eq!(json["kind"], "final");
    assert_eq!(json["record_count"], 5);
    assert_eq!(json["row_count"], 10);
    assert_eq!(json["config_hash"], "hash");
    assert_eq!(json["horse_ids"][0], "2020100001");
    assert_eq!(json["statistics"]["probed"], 8);
}

#[tokio::test]
async fn test_transient_failure_is_undetermined() {
    let mock_server = MockServer::start().await;
    let out = TempDir::new().unwrap();

    // Every attempt fails: three attempts, then the probe gives up
    Mock::given(method("GET"))
        .and(path(race_path(tokyo(1, 1, 1))))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;
    for id in [tokyo(1, 1, 2), tokyo(1, 2, 1), tokyo(2, 1, 1)] {
        mount_page(&mock_server, id, ABSENT_PAGE, 1).await;
    }

    let config = create_test_config(&mock_server.uri(), out.path());
    let mut coordinator = Coordinator::new(config, tokyo_plan(), "hash".to_string()).unwrap();
    let stats = coordinator.run().await.unwrap();

    assert_eq!(stats.undetermined, vec![tokyo(1, 1, 1)]);
    assert!(!stats.is_complete());

    let log = fs::read_to_string(out.path().join("progress_2024.txt")).unwrap();
    assert!(!log.lines().any(|line| line.starts_with("202405010101")));

    // Nothing fetched, so no final snapshot
    assert!(files_matching(out.path(), "races_", ".csv").is_empty());
}

#[tokio::test]
async fn test_retry_then_success() {
    let mock_server = MockServer::start().await;
    let out = TempDir::new().unwrap();
    let first = tokyo(1, 1, 1);

    Mock::given(method("GET"))
        .and(path(race_path(first)))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, first, &result_page(first), 1).await;
    for id in [tokyo(1, 1, 2), tokyo(1, 2, 1), tokyo(2, 1, 1)] {
        mount_page(&mock_server, id, ABSENT_PAGE, 1).await;
    }

    let config = create_test_config(&mock_server.uri(), out.path());
    let mut coordinator = Coordinator::new(config, tokyo_plan(), "hash".to_string()).unwrap();
    let stats = coordinator.run().await.unwrap();

    assert_eq!(stats.fetched, 1);
    assert!(stats.undetermined.is_empty());
}

#[tokio::test]
async fn test_not_found_is_not_absent() {
    let mock_server = MockServer::start().await;
    let out = TempDir::new().unwrap();

    // 404 is not retried, and does not prune the place
    Mock::given(method("GET"))
        .and(path(race_path(tokyo(1, 1, 1))))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;
    for id in [tokyo(1, 1, 2), tokyo(1, 2, 1), tokyo(2, 1, 1)] {
        mount_page(&mock_server, id, ABSENT_PAGE, 1).await;
    }

    let config = create_test_config(&mock_server.uri(), out.path());
    let mut coordinator = Coordinator::new(config, tokyo_plan(), "hash".to_string()).unwrap();
    let stats = coordinator.run().await.unwrap();

    assert_eq!(stats.undetermined, vec![tokyo(1, 1, 1)]);
    assert_eq!(stats.absent, 3);
}

#[tokio::test]
async fn test_resume_skips_checkpointed_ids() {
    let mock_server = MockServer::start().await;
    let out = TempDir::new().unwrap();

    fs::write(
        out.path().join("progress_2024.txt"),
        "202405010101\n202405010102\n202405010103\n202405010104\n202405010105\n\
         202405010106\tabsent\n",
    )
    .unwrap();

    for race in 1..=6 {
        mount_page(&mock_server, tokyo(1, 1, race), ABSENT_PAGE, 0).await;
    }
    for id in [tokyo(1, 2, 1), tokyo(2, 1, 1)] {
        mount_page(&mock_server, id, ABSENT_PAGE, 1).await;
    }

    let config = create_test_config(&mock_server.uri(), out.path());
    let mut coordinator = Coordinator::new(config, tokyo_plan(), "hash".to_string()).unwrap();
    let stats = coordinator.run().await.unwrap();

    assert_eq!(stats.skipped, 6);
    assert_eq!(stats.probed, 2);
    assert_eq!(stats.fetched, 0);
}

#[tokio::test]
async fn test_reset_places_recrawls_only_that_place() {
    let mock_server = MockServer::start().await;
    let out = TempDir::new().unwrap();
    let log_path = out.path().join("progress_2024.txt");

    fs::write(
        &log_path,
        "202405010101\n202406010101\n202405010102\tabsent\n202406010102\tabsent\n",
    )
    .unwrap();

    mount_page(&mock_server, tokyo(1, 1, 1), ABSENT_PAGE, 1).await;

    let config = create_test_config(&mock_server.uri(), out.path());
    let plan = RunPlan {
        reset_places: vec![Place::Tokyo],
        ..tokyo_plan()
    };
    let mut coordinator = Coordinator::new(config, plan, "hash".to_string()).unwrap();
    let stats = coordinator.run().await.unwrap();

    assert_eq!(stats.probed, 1);
    assert_eq!(
        fs::read_to_string(&log_path).unwrap(),
        "202406010101\n202406010102\tabsent\n202405010101\tabsent\n"
    );
}

#[tokio::test]
async fn test_malformed_page_is_checkpointed() {
    let mock_server = MockServer::start().await;
    let out = TempDir::new().unwrap();

    let unusable = r#"<table class="race_table_01">
        <tr><th>Notice</th></tr><tr><td>Results are being prepared</td></tr>
    </table>"#;
    mount_page(&mock_server, tokyo(1, 1, 1), unusable, 1).await;
    for id in [tokyo(1, 1, 2), tokyo(1, 2, 1), tokyo(2, 1, 1)] {
        mount_page(&mock_server, id, ABSENT_PAGE, 1).await;
    }

    let config = create_test_config(&mock_server.uri(), out.path());
    let mut coordinator = Coordinator::new(config, tokyo_plan(), "hash".to_string()).unwrap();
    let stats = coordinator.run().await.unwrap();

    assert_eq!(stats.discovered, 1);
    assert_eq!(stats.fetched, 0);
    assert_eq!(stats.malformed, vec![tokyo(1, 1, 1)]);

    let log = fs::read_to_string(out.path().join("progress_2024.txt")).unwrap();
    assert!(log.starts_with("202405010101\n"));
}

#[tokio::test]
async fn test_user_agent_and_debug_html() {
    let mock_server = MockServer::start().await;
    let out = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path(race_path(tokyo(1, 1, 1))))
        .and(header(
            "user-agent",
            "TestBot/1.0.0 (+https://example.com/contact; test@example.com)",
        ))
        .respond_with(html(ABSENT_PAGE))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&mock_server.uri(), out.path());
    config.output.save_debug_html = true;
    let mut coordinator = Coordinator::new(config, tokyo_plan(), "hash".to_string()).unwrap();
    let stats = coordinator.run().await.unwrap();

    assert_eq!(stats.absent, 1);
    let saved = out
        .path()
        .join("debug_html")
        .join("race_202405010101.html");
    assert_eq!(fs::read_to_string(saved).unwrap(), ABSENT_PAGE);
}

#[tokio::test]
async fn test_max_items_caps_fetched_records() {
    let mock_server = MockServer::start().await;
    let out = TempDir::new().unwrap();

    for race in 1..=2 {
        let id = tokyo(1, 1, race);
        mount_page(&mock_server, id, &result_page(id), 1).await;
    }
    mount_page(&mock_server, tokyo(1, 1, 3), ABSENT_PAGE, 0).await;

    let config = create_test_config(&mock_server.uri(), out.path());
    let plan = RunPlan {
        max_items: Some(2),
        ..tokyo_plan()
    };
    let mut coordinator = Coordinator::new(config, plan, "hash".to_string()).unwrap();
    let stats = coordinator.run().await.unwrap();

    assert!(stats.capped);
    assert_eq!(stats.fetched, 2);
    assert_eq!(files_matching(out.path(), "races_2024_", ".csv").len(), 1);
}
