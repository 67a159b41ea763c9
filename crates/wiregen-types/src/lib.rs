//! wiregen-types: Document types for the wiregen mesh generator.
//!
//! A [`MeshConfig`] is what gets loaded, regenerated and written back between
//! runs. Field names follow the camelCase keys of existing mesh documents so
//! that previously generated files keep loading.

#![warn(missing_docs)]

use serde::{Deserialize, Serialize};

/// A full mesh document: the parameters of the last run plus every peer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MeshConfig {
    /// Tweakable parameters, some of which erase or preserve peer fields
    /// between subsequent runs.
    pub generation_params: GenerationParams,
    /// Every peer of the network, index `i` holding the record with id `i + 1`.
    pub peers: Vec<PeerRecord>,
}

/// Per-run inputs controlling how peers are generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationParams {
    /// Network CIDR in aligned form, e.g. `10.0.0.0/24`.
    pub cidr: String,
    /// DNS server handed to peers.
    pub dns: String,
    /// Address of the server, inside `cidr`.
    pub server: String,
    /// Host interface the server masquerades through (eth0, eno1, ...).
    pub server_interface: String,
    /// Public hostname or address peers connect to.
    pub endpoint: String,
    /// Publicly exposed port, also used as the server's listen port.
    pub endpoint_port: u16,
    /// MTU for every connection.
    pub mtu: u16,
    /// Routes peers send through the tunnel.
    #[serde(rename = "allowedIPs")]
    pub allowed_ips: String,
    /// Keepalive interval in seconds; 0 disables it.
    #[serde(rename = "persistentKeepAlive")]
    pub persistent_keepalive: u32,
    /// Placeholder name template, supports `${id}`.
    pub name: String,
    /// Placeholder description template, supports `${id}` and `${name}`.
    pub description: String,
    /// Extra interface lines template, supports `${id}` and `${name}`.
    pub extra: String,
    /// Generate new keys for every peer instead of reusing them.
    pub regenerate_keys: bool,
    /// Discard every existing peer before generating.
    pub reset_all: bool,
    /// Overwrite every peer's allowed IPs.
    #[serde(rename = "forceAllowedIPs")]
    pub force_allowed_ips: bool,
    /// Overwrite every peer's keepalive.
    #[serde(rename = "forcePersistentKeepAlive")]
    pub force_persistent_keepalive: bool,
    /// Overwrite every peer's MTU.
    pub force_mtu: bool,
    /// Overwrite every peer's endpoint host.
    pub force_endpoint: bool,
    /// Overwrite every peer's endpoint port.
    pub force_endpoint_port: bool,
    /// Overwrite every non-server peer's DNS.
    pub force_dns: bool,
    /// Overwrite every peer's name.
    pub force_name: bool,
    /// Overwrite every peer's description.
    pub force_description: bool,
    /// Overwrite every peer's extra lines.
    pub force_extra: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            cidr: "10.0.0.0/16".into(),
            dns: "10.0.0.1".into(),
            server: "10.0.0.1".into(),
            server_interface: "eth0".into(),
            endpoint: "5.5.5.5".into(),
            endpoint_port: 51820,
            mtu: 1280,
            allowed_ips: "0.0.0.0/0".into(),
            persistent_keepalive: 25,
            name: String::new(),
            description: String::new(),
            extra: String::new(),
            regenerate_keys: false,
            reset_all: false,
            force_allowed_ips: false,
            force_persistent_keepalive: false,
            force_mtu: false,
            force_endpoint: false,
            force_endpoint_port: false,
            force_dns: false,
            force_name: false,
            force_description: false,
            force_extra: false,
        }
    }
}

/// One generated peer (or the server) of the mesh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PeerRecord {
    /// 1-based ordinal of the address within the CIDR.
    pub id: u64,
    /// Rendered wg-quick configuration; regenerated every run.
    pub config: String,
    /// Human-readable name (e.g. "laptop-01").
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Extra lines placed in the `[Interface]` section verbatim.
    pub extra: String,
    /// Tunnel address of this peer.
    pub ip: String,
    /// Routes this peer sends through the tunnel.
    #[serde(rename = "allowedIPs")]
    pub allowed_ips: String,
    /// Keepalive interval in seconds; 0 disables it.
    #[serde(rename = "persistentKeepAlive")]
    pub persistent_keepalive: u32,
    /// Interface MTU.
    pub mtu: u16,
    /// Server host this peer connects to.
    pub endpoint: String,
    /// Server port this peer connects to.
    pub endpoint_port: u16,
    /// DNS server; never set by generation on the server record.
    pub dns: String,
    /// Whether this record is the server. Determined by the parameters.
    pub is_server: bool,
    /// Base64 x25519 private key.
    pub private_key: String,
    /// Base64 x25519 public key.
    pub public_key: String,
    /// Base64 256-bit pre-shared key.
    pub pre_shared_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn sample() -> MeshConfig {
        MeshConfig {
            generation_params: GenerationParams {
                cidr: "10.0.0.0/24".into(),
                force_dns: true,
                ..GenerationParams::default()
            },
            peers: vec![PeerRecord {
                id: 1,
                name: "home-pi".into(),
                ip: "10.0.0.1".into(),
                allowed_ips: "0.0.0.0/0".into(),
                is_server: true,
                config: "[Interface]\nPrivateKey = a\n".into(),
                ..PeerRecord::default()
            }],
        }
    }

    #[test]
    fn serializes_legacy_key_names() {
        let json = serde_json::to_string(&sample()).unwrap();
        for key in [
            "generationParams",
            "allowedIPs",
            "persistentKeepAlive",
            "forceDns",
            "forceMtu",
            "forceAllowedIPs",
            "isServer",
            "preSharedKey",
            "serverInterface",
        ] {
            assert!(json.contains(key), "missing key {key} in {json}");
        }
    }

    #[test_case("json"; "json document")]
    #[test_case("toml"; "toml document")]
    fn round_trips_losslessly(format: &str) {
        let config = sample();
        let parsed: MeshConfig = match format {
            "json" => serde_json::from_str(&serde_json::to_string(&config).unwrap()).unwrap(),
            _ => toml::from_str(&toml::to_string_pretty(&config).unwrap()).unwrap(),
        };
        assert_eq!(parsed, config);
    }

    #[test]
    fn partial_document_uses_defaults() {
        let parsed: MeshConfig =
            serde_json::from_str(r#"{"generationParams":{"cidr":"192.168.1.0/24"}}"#).unwrap();
        assert_eq!(parsed.generation_params.cidr, "192.168.1.0/24");
        assert_eq!(parsed.generation_params.endpoint_port, 51820);
        assert!(parsed.peers.is_empty());
    }
}
