//! trafficd - vehicle detection daemon
//!
//! This daemon:
//! 1. Opens the sqlite detection store
//! 2. Connects the MQTT publisher when a broker is configured
//! 3. Serves the HTTP control surface (/start_detection, /detections)
//! 4. Dispatches pipeline runs onto background threads as requests arrive

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;

use traffic_witness::{
    api::{ApiConfig, ApiServer},
    MqttPublisher, NullPublisher, SharedPublisher, SharedStore, SqliteDetectionStore,
    TrafficConfig,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = TrafficConfig::load()?;

    let store: SharedStore = Arc::new(Mutex::new(SqliteDetectionStore::open(&cfg.db_path)?));

    let publisher: SharedPublisher = match &cfg.mqtt {
        Some(mqtt) => {
            let publisher = MqttPublisher::connect(
                &mqtt.addr,
                &mqtt.topic,
                &mqtt.client_id,
                mqtt.allow_remote,
            )?;
            log::info!(
                "publishing detections to mqtt broker {} topic {}",
                mqtt.addr,
                mqtt.topic
            );
            Arc::new(Mutex::new(publisher))
        }
        None => {
            log::info!("no mqtt broker configured; records are persisted only");
            Arc::new(Mutex::new(NullPublisher))
        }
    };

    let api_config = ApiConfig {
        addr: cfg.api_addr.clone(),
    };
    let api_handle = ApiServer::new(api_config, store, publisher, cfg.pipeline_config()).spawn()?;
    log::info!("detection api listening on {}", api_handle.addr);
    log::info!(
        "trafficd running. writing to {}, sampling every {}s, iou threshold {}",
        cfg.db_path,
        cfg.sample_interval_secs,
        cfg.iou_threshold
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_handler = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_handler.store(true, Ordering::SeqCst);
    })?;

    while !shutdown.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(200));
    }

    log::info!("shutting down");
    api_handle.stop()?;
    Ok(())
}
