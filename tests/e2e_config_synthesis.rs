//! 端到端：快照 -> 子域名绑定 -> Xray 文档 + nginx 文件

use std::time::{Duration, UNIX_EPOCH};

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use xraypanel::app::{BindOutcome, Panel, SubdomainAllocator};
use xraypanel::config::PanelConfig;
use xraypanel::model::{
    Domain, DomainType, Inbound, Outbound, OutboundSettings, OutboundType, Protocol, RoutingRule,
    RuleType, Snapshot, Transport, User,
};
use xraypanel::nginx::{JsonRecordStore, MemoryRecordStore, RecordStore};
use xraypanel::xray::Generator;

fn panel_in(dir: &std::path::Path) -> Panel {
    let mut config = PanelConfig::default();
    config.nginx.config_dir = dir.to_string_lossy().into_owned();
    config.xray.config_path = dir.join("config.json").to_string_lossy().into_owned();
    Panel::new(config)
}

fn wildcard_domain() -> Domain {
    Domain::new("*.example.com", DomainType::Direct)
        .unwrap()
        .with_cert("/root/.acme.sh/example.com/fullchain.cer", "/root/.acme.sh/example.com/example.com.key")
}

#[test]
fn wildcard_ws_inbound_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let panel = panel_in(dir.path());

    let domain = wildcard_domain();
    let mut inbound = Inbound::new(Protocol::Vless, Transport::Ws, 10001).with_path("/ray");
    let mut alloc = SubdomainAllocator::with_rng(ChaCha20Rng::seed_from_u64(42));
    let outcome = alloc.bind(&mut inbound, Some(&domain)).unwrap();
    assert!(matches!(outcome, BindOutcome::Allocated(_)));

    let snapshot = Snapshot {
        users: vec![User::new("alice")],
        inbounds: vec![inbound.clone()],
        domains: vec![domain],
        ..Default::default()
    };

    // nginx：恰好一个文件，server_name 为 <label>.example.com
    let mut store = MemoryRecordStore::new();
    let report = panel.sync_nginx(&snapshot, &mut store);
    assert!(report.is_success());
    assert_eq!(report.written.len(), 1);

    let files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".conf"))
        .collect();
    assert_eq!(files.len(), 1);

    let label = files[0]
        .strip_suffix(".example.com.conf")
        .expect("file named after allocated subdomain");
    assert!((6..=8).contains(&label.len()));
    assert!(label
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));

    let content = std::fs::read_to_string(&report.written[0]).unwrap();
    assert!(content.contains(&format!("server_name {}.example.com;", label)));
    assert!(content.contains("location /ray {"));

    // xray：一个代理入站，network ws，security none
    let document = panel.generate_xray(&snapshot).unwrap();
    let v = serde_json::to_value(&document).unwrap();
    let proxies: Vec<_> = v["inbounds"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|i| i["tag"] != "api")
        .collect();
    assert_eq!(proxies.len(), 1);
    assert_eq!(proxies[0]["streamSettings"]["network"], "ws");
    assert_eq!(proxies[0]["streamSettings"]["security"], "none");
}

#[test]
fn full_document_from_snapshot_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");

    let warp = Outbound::new(OutboundType::WireGuard)
        .with_tag("warp")
        .with_settings(OutboundSettings {
            server: "engage.cloudflareclient.com".into(),
            port: 2408,
            wg_reserved: "12,34,56".into(),
            ..Default::default()
        });
    let rules = vec![
        RoutingRule::new("streaming", RuleType::GeoSite, "warp")
            .with_value("netflix")
            .with_priority(50),
        RoutingRule::new("ads", RuleType::GeoSite, "block")
            .with_value("category-ads")
            .with_priority(10),
    ];
    let snapshot = Snapshot {
        users: vec![User::new("alice"), User::new("bob")],
        inbounds: vec![
            Inbound::new(Protocol::Vless, Transport::Grpc, 10001).with_service_name("grpc"),
            Inbound::new(Protocol::Trojan, Transport::Xhttp, 10002),
        ],
        outbounds: vec![warp],
        rules,
        domains: vec![],
    };
    snapshot.save(&path).unwrap();

    let loaded = Snapshot::load(&path).unwrap();
    let document = Generator::default().generate(&loaded).unwrap();
    let v = serde_json::to_value(&document).unwrap();

    assert_eq!(v["inbounds"].as_array().unwrap().len(), 3);
    assert_eq!(v["inbounds"][1]["settings"]["clients"].as_array().unwrap().len(), 2);
    assert_eq!(v["inbounds"][2]["protocol"], "trojan");
    assert_eq!(v["outbounds"][2]["tag"], "warp");
    assert_eq!(v["outbounds"][2]["settings"]["reserved"], serde_json::json!([12, 34, 56]));

    let rules = v["routing"]["rules"].as_array().unwrap();
    assert_eq!(rules[0]["outboundTag"], "api");
    assert_eq!(rules[1]["domain"], serde_json::json!(["geosite:category-ads"]));
    assert_eq!(rules[2]["domain"], serde_json::json!(["geosite:netflix"]));
}

#[test]
fn expired_user_with_traffic_left_is_not_a_client() {
    let now = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    let expired = User::new("expired")
        .with_traffic_limit(100 << 30)
        .with_expiry(now - Duration::from_secs(60));
    let live = User::new("live").with_expiry(now + Duration::from_secs(86_400));

    let snapshot = Snapshot {
        users: vec![expired.clone(), live.clone()],
        inbounds: vec![Inbound::new(Protocol::Trojan, Transport::Ws, 10001)],
        ..Default::default()
    };
    let document = Generator::default().generate_at(&snapshot, now).unwrap();
    let json = document.to_json_pretty().unwrap();
    assert!(json.contains(&live.uuid));
    assert!(!json.contains(&expired.uuid));
}

#[test]
fn unknown_transport_rejects_whole_document() {
    let dir = tempfile::tempdir().unwrap();
    let panel = panel_in(dir.path());
    let snapshot = Snapshot {
        inbounds: vec![
            Inbound::new(Protocol::Vless, Transport::Ws, 10001),
            Inbound::new(Protocol::Vless, "h2".to_string().into(), 10002).with_tag("h2-in"),
        ],
        ..Default::default()
    };
    let err = panel.write_xray_config(&snapshot, None).unwrap_err();
    assert!(err.to_string().contains("h2-in"));
    assert!(!dir.path().join("config.json").exists());
}

#[test]
fn json_records_survive_between_runs() {
    let dir = tempfile::tempdir().unwrap();
    let nginx_dir = dir.path().join("conf.d");
    std::fs::create_dir_all(&nginx_dir).unwrap();
    let panel = panel_in(&nginx_dir);
    let records = dir.path().join("records.json");

    let domain = Domain::new("proxy.example.com", DomainType::Cdn)
        .unwrap()
        .with_cert("/c.cer", "/c.key");
    let mut inbound = Inbound::new(Protocol::Vless, Transport::Xhttp, 10001);
    panel.bind_domain(&mut inbound, Some(&domain)).unwrap();
    assert_eq!(inbound.actual_domain.as_deref(), Some("proxy.example.com"));

    let snapshot = Snapshot {
        inbounds: vec![inbound.clone()],
        domains: vec![domain],
        ..Default::default()
    };
    {
        let mut store = JsonRecordStore::open(&records).unwrap();
        assert!(panel.sync_nginx(&snapshot, &mut store).is_success());
    }

    let mut store = JsonRecordStore::open(&records).unwrap();
    assert_eq!(store.find_by_inbound(&inbound.id).unwrap().len(), 1);
    let report = panel.cleanup_inbound(&inbound.id, &mut store).unwrap();
    assert_eq!(report.removed, vec![nginx_dir.join("proxy.example.com.conf")]);
    assert!(JsonRecordStore::open(&records).unwrap().all().unwrap().is_empty());
}
