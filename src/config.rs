use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

use crate::pipeline::{PipelineConfig, DEFAULT_SAMPLE_INTERVAL_SECS};
use crate::track::{EvictionPolicy, DEFAULT_IOU_THRESHOLD};

const DEFAULT_DB_PATH: &str = "traffic.db";
const DEFAULT_API_ADDR: &str = "127.0.0.1:8799";
const DEFAULT_MQTT_TOPIC: &str = "traffic/detections";
const DEFAULT_MQTT_CLIENT_ID: &str = "trafficd";

#[derive(Debug, Deserialize, Default)]
struct TrafficConfigFile {
    db_path: Option<String>,
    api: Option<ApiConfigFile>,
    mqtt: Option<MqttConfigFile>,
    pipeline: Option<PipelineConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfigFile {
    addr: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct MqttConfigFile {
    addr: Option<String>,
    topic: Option<String>,
    client_id: Option<String>,
    allow_remote: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    sample_interval_secs: Option<f64>,
    iou_threshold: Option<f32>,
    max_tracks: Option<usize>,
    max_age_frames: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct TrafficConfig {
    pub db_path: String,
    pub api_addr: String,
    pub mqtt: Option<MqttSettings>,
    pub sample_interval_secs: f64,
    pub iou_threshold: f32,
    pub eviction: EvictionPolicy,
}

#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub addr: String,
    pub topic: String,
    pub client_id: String,
    pub allow_remote: bool,
}

impl TrafficConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("TRAFFIC_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: TrafficConfigFile) -> Result<Self> {
        let db_path = file.db_path.unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let api_addr = file
            .api
            .and_then(|api| api.addr)
            .unwrap_or_else(|| DEFAULT_API_ADDR.to_string());
        let mqtt = file.mqtt.and_then(|mqtt| {
            mqtt.addr.map(|addr| MqttSettings {
                addr,
                topic: mqtt.topic.unwrap_or_else(|| DEFAULT_MQTT_TOPIC.to_string()),
                client_id: mqtt
                    .client_id
                    .unwrap_or_else(|| DEFAULT_MQTT_CLIENT_ID.to_string()),
                allow_remote: mqtt.allow_remote.unwrap_or(false),
            })
        });

        let pipeline = file.pipeline.unwrap_or_default();
        let eviction = match (pipeline.max_tracks, pipeline.max_age_frames) {
            (Some(_), Some(_)) => {
                return Err(anyhow!(
                    "configure at most one of pipeline.max_tracks and pipeline.max_age_frames"
                ))
            }
            (Some(max), None) => EvictionPolicy::MaxTracks(max),
            (None, Some(frames)) => EvictionPolicy::MaxAge { frames },
            (None, None) => EvictionPolicy::None,
        };

        Ok(Self {
            db_path,
            api_addr,
            mqtt,
            sample_interval_secs: pipeline
                .sample_interval_secs
                .unwrap_or(DEFAULT_SAMPLE_INTERVAL_SECS),
            iou_threshold: pipeline.iou_threshold.unwrap_or(DEFAULT_IOU_THRESHOLD),
            eviction,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("TRAFFIC_API_ADDR") {
            if !addr.trim().is_empty() {
                self.api_addr = addr;
            }
        }
        if let Ok(path) = std::env::var("TRAFFIC_DB_PATH") {
            if !path.trim().is_empty() {
                self.db_path = path;
            }
        }
        if let Ok(addr) = std::env::var("TRAFFIC_MQTT_ADDR") {
            if !addr.trim().is_empty() {
                let existing = self.mqtt.take();
                self.mqtt = Some(MqttSettings {
                    addr,
                    topic: existing
                        .as_ref()
                        .map(|m| m.topic.clone())
                        .unwrap_or_else(|| DEFAULT_MQTT_TOPIC.to_string()),
                    client_id: existing
                        .as_ref()
                        .map(|m| m.client_id.clone())
                        .unwrap_or_else(|| DEFAULT_MQTT_CLIENT_ID.to_string()),
                    allow_remote: existing.map(|m| m.allow_remote).unwrap_or(false),
                });
            }
        }
        if let Ok(interval) = std::env::var("TRAFFIC_SAMPLE_INTERVAL_SECS") {
            self.sample_interval_secs = interval.parse().map_err(|_| {
                anyhow!("TRAFFIC_SAMPLE_INTERVAL_SECS must be a number of seconds")
            })?;
        }
        if let Ok(threshold) = std::env::var("TRAFFIC_IOU_THRESHOLD") {
            self.iou_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("TRAFFIC_IOU_THRESHOLD must be a number"))?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if !self.sample_interval_secs.is_finite() || self.sample_interval_secs <= 0.0 {
            return Err(anyhow!("sample interval must be greater than zero"));
        }
        if !(self.iou_threshold > 0.0 && self.iou_threshold < 1.0) {
            return Err(anyhow!("iou threshold must be within (0, 1)"));
        }
        if let EvictionPolicy::MaxTracks(0) = self.eviction {
            return Err(anyhow!("pipeline.max_tracks must be greater than zero"));
        }
        Ok(())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            sample_interval_secs: self.sample_interval_secs,
            iou_threshold: self.iou_threshold,
            eviction: self.eviction,
        }
    }
}

fn read_config_file(path: &Path) -> Result<TrafficConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
