//! Record publishing.
//!
//! Publishing is at-most-once and fire-and-forget: the pipeline hands each
//! record to a publisher and moves on. A failed publish is logged by the
//! caller and never halts a run.

use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use rumqttc::v5::{mqttbytes::QoS, Client, MqttOptions};

use crate::record::DetectionRecord;

pub trait RecordPublisher: Send {
    fn publish(&mut self, record: &DetectionRecord) -> Result<()>;
}

/// Publisher shared between the API server and pipeline runs.
pub type SharedPublisher = Arc<Mutex<dyn RecordPublisher>>;

/// Per-call locking adapter, mirror of `StoreHandle`.
pub struct PublisherHandle(pub SharedPublisher);

impl RecordPublisher for PublisherHandle {
    fn publish(&mut self, record: &DetectionRecord) -> Result<()> {
        self.0
            .lock()
            .map_err(|_| anyhow!("publisher lock poisoned"))?
            .publish(record)
    }
}

/// Drops every record. Used when no broker is configured.
pub struct NullPublisher;

impl RecordPublisher for NullPublisher {
    fn publish(&mut self, _record: &DetectionRecord) -> Result<()> {
        Ok(())
    }
}

/// Collects records in memory. Test tooling.
#[derive(Default)]
pub struct MemoryPublisher {
    pub records: Vec<DetectionRecord>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordPublisher for MemoryPublisher {
    fn publish(&mut self, record: &DetectionRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }
}

/// MQTT publisher: JSON records to a fixed topic, QoS 0.
///
/// The broker connection is driven by a background thread; connection-level
/// errors are logged there and surface to the pipeline only as failed
/// publishes.
pub struct MqttPublisher {
    client: Client,
    topic: String,
}

impl MqttPublisher {
    pub fn connect(
        broker_addr: &str,
        topic: &str,
        client_id: &str,
        allow_remote: bool,
    ) -> Result<Self> {
        let (host, port) = parse_broker_addr(broker_addr)?;
        if !allow_remote && !is_loopback_host(&host) {
            return Err(anyhow!(
                "mqtt broker '{}' is not loopback; set allow_remote to permit it",
                broker_addr
            ));
        }

        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(30));
        let (client, mut connection) = Client::new(options, 16);

        std::thread::spawn(move || {
            for event in connection.iter() {
                if let Err(err) = event {
                    log::warn!("mqtt connection error: {}", err);
                    std::thread::sleep(Duration::from_secs(1));
                }
            }
        });

        Ok(Self {
            client,
            topic: topic.to_string(),
        })
    }
}

impl RecordPublisher for MqttPublisher {
    fn publish(&mut self, record: &DetectionRecord) -> Result<()> {
        let payload = serde_json::to_vec(record)?;
        self.client
            .publish(self.topic.as_str(), QoS::AtMostOnce, false, payload)
            .context("mqtt publish failed")?;
        Ok(())
    }
}

fn parse_broker_addr(addr: &str) -> Result<(String, u16)> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("mqtt broker address must be host:port, got '{}'", addr))?;
    let port: u16 = port
        .parse()
        .map_err(|_| anyhow!("invalid mqtt broker port in '{}'", addr))?;
    if host.is_empty() {
        return Err(anyhow!("empty mqtt broker host in '{}'", addr));
    }
    Ok((host.to_string(), port))
}

fn is_loopback_host(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    host.parse::<IpAddr>()
        .map(|ip| ip.is_loopback())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Detection;
    use crate::geometry::BoundingBox;

    #[test]
    fn memory_publisher_collects_records() {
        let b = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let record = DetectionRecord::from_detections(&[Detection::new(5, 0.9, b)]);

        let mut publisher = MemoryPublisher::new();
        publisher.publish(&record).unwrap();
        publisher.publish(&record).unwrap();

        assert_eq!(publisher.records.len(), 2);
        assert_eq!(publisher.records[0], record);
    }

    #[test]
    fn broker_addr_parsing() {
        assert_eq!(
            parse_broker_addr("127.0.0.1:1883").unwrap(),
            ("127.0.0.1".to_string(), 1883)
        );
        assert!(parse_broker_addr("127.0.0.1").is_err());
        assert!(parse_broker_addr(":1883").is_err());
        assert!(parse_broker_addr("broker:notaport").is_err());
    }

    #[test]
    fn loopback_hosts_recognized() {
        assert!(is_loopback_host("localhost"));
        assert!(is_loopback_host("127.0.0.1"));
        assert!(is_loopback_host("::1"));
        assert!(!is_loopback_host("192.168.1.20"));
        assert!(!is_loopback_host("broker.example.com"));
    }
}
