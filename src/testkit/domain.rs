//! Builders for domain primitives used across tests.

use url::Url;

use crate::domain::app::AppDescriptor;
use crate::domain::network::{EffectiveType, NetworkSample};

/// Descriptor with a conventional entry URL, container, and route prefix.
pub fn descriptor(name: &str) -> AppDescriptor {
    let entry = Url::parse(&format!("https://apps.example.com/{name}/index.html"))
        .expect("valid test entry url");
    AppDescriptor::new(name, entry, format!("#{name}"), format!("/{name}"))
}

/// Descriptor owning an explicit route prefix.
pub fn descriptor_for_rule(name: &str, active_rule: &str) -> AppDescriptor {
    let mut desc = descriptor(name);
    desc.active_rule = active_rule.to_string();
    desc
}

/// A healthy 4g reading.
pub fn fast_sample() -> NetworkSample {
    NetworkSample {
        effective_type: EffectiveType::FourG,
        downlink_mbps: 10.0,
        rtt_ms: 50,
        save_data: false,
    }
}

/// A degraded reading: 3g, thin downlink, high round-trip time.
pub fn slow_sample() -> NetworkSample {
    NetworkSample {
        effective_type: EffectiveType::ThreeG,
        downlink_mbps: 1.0,
        rtt_ms: 350,
        save_data: false,
    }
}

/// A fast reading with the data-saver flag set.
pub fn save_data_sample() -> NetworkSample {
    NetworkSample {
        save_data: true,
        ..fast_sample()
    }
}
