//! Core type definitions for medgate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::{Host, Url};

/// Compute target that serves an inference request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeTarget {
    /// Local always-available backend on a loopback address
    Cpu,
    /// Remote accelerated backend, usually reached through a tunnel
    Gpu,
}

impl ComputeTarget {
    /// Classify a base URL by its host.
    ///
    /// Loopback hosts (127.0.0.1, localhost, ::1) are served by the local
    /// backend and classify as `Cpu`; everything else is `Gpu`. Unparseable
    /// URLs classify as `Gpu` since only remote tunnel URLs take exotic
    /// shapes.
    pub fn classify(url: &str) -> ComputeTarget {
        match Url::parse(url) {
            Ok(parsed) => match parsed.host() {
                Some(Host::Domain(host)) => {
                    if host.eq_ignore_ascii_case("localhost") {
                        ComputeTarget::Cpu
                    } else {
                        ComputeTarget::Gpu
                    }
                }
                Some(Host::Ipv4(ip)) => {
                    if ip.is_loopback() {
                        ComputeTarget::Cpu
                    } else {
                        ComputeTarget::Gpu
                    }
                }
                Some(Host::Ipv6(ip)) => {
                    if ip.is_loopback() {
                        ComputeTarget::Cpu
                    } else {
                        ComputeTarget::Gpu
                    }
                }
                None => ComputeTarget::Gpu,
            },
            Err(_) => ComputeTarget::Gpu,
        }
    }
}

impl std::str::FromStr for ComputeTarget {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cpu" => Ok(ComputeTarget::Cpu),
            "gpu" => Ok(ComputeTarget::Gpu),
            _ => Err(format!("Unknown compute target: {}", s)),
        }
    }
}

impl fmt::Display for ComputeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeTarget::Cpu => write!(f, "cpu"),
            ComputeTarget::Gpu => write!(f, "gpu"),
        }
    }
}

/// Last-known liveness of a registered endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EndpointStatus {
    /// Endpoint answered its most recent check
    Active,
    /// Endpoint failed its most recent check
    Inactive,
    /// Endpoint has never been checked
    #[default]
    Unknown,
}

impl std::str::FromStr for EndpointStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(EndpointStatus::Active),
            "inactive" => Ok(EndpointStatus::Inactive),
            "unknown" => Ok(EndpointStatus::Unknown),
            _ => Err(format!("Unknown endpoint status: {}", s)),
        }
    }
}

impl fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointStatus::Active => write!(f, "active"),
            EndpointStatus::Inactive => write!(f, "inactive"),
            EndpointStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// A registered backend endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointRecord {
    /// Stable identifier, unique key within the registry
    pub id: String,

    /// Optional display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Base URL of the backend
    pub url: String,

    /// Last-known liveness
    #[serde(default)]
    pub status: EndpointStatus,

    /// Stamped on every write
    pub updated_at: DateTime<Utc>,
}

/// Currently selected compute target (singleton document)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeMode {
    /// Selected target
    pub target: ComputeTarget,

    /// GPU base URL, present only when `target` is gpu
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_url: Option<String>,

    /// Stamped on every write
    pub updated_at: DateTime<Utc>,
}

/// Entries of the append-only runtime event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    /// The runtime mode was rewritten
    ModeChange {
        target: ComputeTarget,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gpu_url: Option<String>,
        ts: DateTime<Utc>,
    },
    /// A failed dispatch was silently served by the other target
    Fallback {
        from: ComputeTarget,
        to: ComputeTarget,
        ts: DateTime<Utc>,
    },
    /// Telemetry sampled from a GPU backend's companion metrics endpoint
    GpuMetrics {
        data: serde_json::Value,
        ts: DateTime<Utc>,
    },
}

impl RuntimeEvent {
    /// Record a mode rewrite
    pub fn mode_change(target: ComputeTarget, gpu_url: Option<String>) -> Self {
        RuntimeEvent::ModeChange {
            target,
            gpu_url,
            ts: Utc::now(),
        }
    }

    /// Record a silent downgrade
    pub fn fallback(from: ComputeTarget, to: ComputeTarget) -> Self {
        RuntimeEvent::Fallback {
            from,
            to,
            ts: Utc::now(),
        }
    }

    /// Record a GPU telemetry sample
    pub fn gpu_metrics(data: serde_json::Value) -> Self {
        RuntimeEvent::GpuMetrics {
            data,
            ts: Utc::now(),
        }
    }

    /// Timestamp of the event
    pub fn ts(&self) -> DateTime<Utc> {
        match self {
            RuntimeEvent::ModeChange { ts, .. } => *ts,
            RuntimeEvent::Fallback { ts, .. } => *ts,
            RuntimeEvent::GpuMetrics { ts, .. } => *ts,
        }
    }
}

/// Entries of the append-only registry change log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryLogEntry {
    /// A new endpoint was registered
    Add {
        id: String,
        url: String,
        status: EndpointStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        ts: DateTime<Utc>,
    },
    /// An existing endpoint was replaced
    Update {
        id: String,
        url: String,
        status: EndpointStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        ts: DateTime<Utc>,
    },
    /// An endpoint was refreshed by its notebook-side announcer
    ColabUpdate {
        id: String,
        url: String,
        ts: DateTime<Utc>,
    },
}

impl RegistryLogEntry {
    /// Timestamp of the entry
    pub fn ts(&self) -> DateTime<Utc> {
        match self {
            RegistryLogEntry::Add { ts, .. } => *ts,
            RegistryLogEntry::Update { ts, .. } => *ts,
            RegistryLogEntry::ColabUpdate { ts, .. } => *ts,
        }
    }
}

/// One sample per completed proxied request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Target that actually answered, or was last attempted
    pub mode: ComputeTarget,

    /// Wall clock for the dispatch including any retry
    pub duration_ms: u64,

    /// Whether usable content was extracted
    pub ok: bool,

    /// Completion time
    pub ts: DateTime<Utc>,

    /// Logical name of the proxied operation
    pub endpoint: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_target_parsing() {
        assert_eq!("cpu".parse::<ComputeTarget>().unwrap(), ComputeTarget::Cpu);
        assert_eq!("GPU".parse::<ComputeTarget>().unwrap(), ComputeTarget::Gpu);
        assert!("tpu".parse::<ComputeTarget>().is_err());
    }

    #[test]
    fn test_compute_target_classify() {
        assert_eq!(
            ComputeTarget::classify("http://127.0.0.1:8000"),
            ComputeTarget::Cpu
        );
        assert_eq!(
            ComputeTarget::classify("http://localhost:8000/v1"),
            ComputeTarget::Cpu
        );
        assert_eq!(ComputeTarget::classify("http://[::1]:9000"), ComputeTarget::Cpu);
        assert_eq!(
            ComputeTarget::classify("https://abc.ngrok-free.dev"),
            ComputeTarget::Gpu
        );
        assert_eq!(ComputeTarget::classify("not a url"), ComputeTarget::Gpu);
    }

    #[test]
    fn test_endpoint_status_default() {
        assert_eq!(EndpointStatus::default(), EndpointStatus::Unknown);
        assert_eq!(
            "active".parse::<EndpointStatus>().unwrap(),
            EndpointStatus::Active
        );
    }

    #[test]
    fn test_runtime_event_wire_format() {
        let event = RuntimeEvent::fallback(ComputeTarget::Gpu, ComputeTarget::Cpu);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "fallback");
        assert_eq!(json["from"], "gpu");
        assert_eq!(json["to"], "cpu");

        let event = RuntimeEvent::mode_change(ComputeTarget::Cpu, None);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "mode_change");
        assert_eq!(json["target"], "cpu");
        assert!(json.get("gpu_url").is_none());
    }

    #[test]
    fn test_registry_log_entry_wire_format() {
        let entry = RegistryLogEntry::ColabUpdate {
            id: "colab-ngrok".to_string(),
            url: "https://x.ngrok-free.dev".to_string(),
            ts: Utc::now(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "colab_update");
        assert_eq!(json["id"], "colab-ngrok");
    }

    #[test]
    fn test_endpoint_record_roundtrip() {
        let record = EndpointRecord {
            id: "colab-ngrok".to_string(),
            name: None,
            url: "https://x.ngrok-free.dev".to_string(),
            status: EndpointStatus::Active,
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("name"));
        let parsed: EndpointRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_metric_sample_roundtrip() {
        let sample = MetricSample {
            mode: ComputeTarget::Gpu,
            duration_ms: 420,
            ok: true,
            ts: Utc::now(),
            endpoint: "friend-chat".to_string(),
        };
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["mode"], "gpu");
        assert_eq!(json["duration_ms"], 420);
    }
}
