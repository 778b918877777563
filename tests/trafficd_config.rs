use std::sync::Mutex;

use tempfile::NamedTempFile;

use traffic_witness::{EvictionPolicy, TrafficConfig};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "TRAFFIC_CONFIG",
        "TRAFFIC_API_ADDR",
        "TRAFFIC_DB_PATH",
        "TRAFFIC_MQTT_ADDR",
        "TRAFFIC_SAMPLE_INTERVAL_SECS",
        "TRAFFIC_IOU_THRESHOLD",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_apply_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = TrafficConfig::load().expect("load config");

    assert_eq!(cfg.db_path, "traffic.db");
    assert_eq!(cfg.api_addr, "127.0.0.1:8799");
    assert!(cfg.mqtt.is_none());
    assert_eq!(cfg.sample_interval_secs, 2.0);
    assert_eq!(cfg.iou_threshold, 0.5);
    assert_eq!(cfg.eviction, EvictionPolicy::None);

    clear_env();
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "db_path": "traffic_prod.db",
        "api": { "addr": "0.0.0.0:9000" },
        "mqtt": {
            "addr": "127.0.0.1:1883",
            "topic": "traffic/records",
            "allow_remote": false
        },
        "pipeline": {
            "sample_interval_secs": 1.5,
            "iou_threshold": 0.4,
            "max_tracks": 500
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("TRAFFIC_CONFIG", file.path());
    std::env::set_var("TRAFFIC_API_ADDR", "127.0.0.1:9100");
    std::env::set_var("TRAFFIC_IOU_THRESHOLD", "0.6");

    let cfg = TrafficConfig::load().expect("load config");

    assert_eq!(cfg.db_path, "traffic_prod.db");
    // Env wins over the file.
    assert_eq!(cfg.api_addr, "127.0.0.1:9100");
    assert_eq!(cfg.iou_threshold, 0.6);

    let mqtt = cfg.mqtt.expect("mqtt settings");
    assert_eq!(mqtt.addr, "127.0.0.1:1883");
    assert_eq!(mqtt.topic, "traffic/records");
    assert!(!mqtt.allow_remote);

    assert_eq!(cfg.sample_interval_secs, 1.5);
    assert_eq!(cfg.eviction, EvictionPolicy::MaxTracks(500));

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("TRAFFIC_SAMPLE_INTERVAL_SECS", "0");
    assert!(TrafficConfig::load().is_err());
    clear_env();

    std::env::set_var("TRAFFIC_IOU_THRESHOLD", "1.5");
    assert!(TrafficConfig::load().is_err());
    clear_env();

    std::env::set_var("TRAFFIC_IOU_THRESHOLD", "not-a-number");
    assert!(TrafficConfig::load().is_err());
    clear_env();
}

#[test]
fn rejects_conflicting_eviction_policies() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "pipeline": { "max_tracks": 10, "max_age_frames": 5 }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    std::env::set_var("TRAFFIC_CONFIG", file.path());

    assert!(TrafficConfig::load().is_err());

    clear_env();
}
