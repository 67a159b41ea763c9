use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};
use wiregen_types::MeshConfig;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read document: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse document: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize document: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to (de)serialize json document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to (de)serialize yaml document: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// On-disk encoding of a mesh document, picked by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Json,
    Yaml,
}

impl Format {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            Some(ext) if ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml") => {
                Self::Yaml
            }
            _ => Self::Toml,
        }
    }
}

pub fn decode(contents: &str, format: Format) -> Result<MeshConfig, DocumentError> {
    Ok(match format {
        Format::Toml => toml::from_str(contents)?,
        Format::Json => serde_json::from_str(contents)?,
        Format::Yaml => serde_yaml::from_str(contents)?,
    })
}

pub fn encode(config: &MeshConfig, format: Format) -> Result<String, DocumentError> {
    Ok(match format {
        Format::Toml => toml::to_string_pretty(config)?,
        Format::Json => serde_json::to_string_pretty(config)?,
        Format::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Load a mesh document. A missing file yields a fresh document with the
/// default generation parameters.
pub async fn load(path: &Path) -> Result<MeshConfig, DocumentError> {
    debug!(path = %path.display(), "loading document");

    match tokio::fs::read_to_string(path).await {
        Ok(contents) => {
            let config = decode(&contents, Format::for_path(path))?;
            info!(
                path = %path.display(),
                peer_count = config.peers.len(),
                cidr = %config.generation_params.cidr,
                "loaded document"
            );
            Ok(config)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "document not found, will create a new one");
            Ok(MeshConfig::default())
        }
        Err(e) => Err(DocumentError::Read(e)),
    }
}

pub async fn save(path: &Path, config: &MeshConfig) -> Result<(), DocumentError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let contents = encode(config, Format::for_path(path))?;
    tokio::fs::write(path, &contents).await?;
    info!(
        path = %path.display(),
        bytes = contents.len(),
        peer_count = config.peers.len(),
        "saved document"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("mesh.toml", Format::Toml ; "toml extension")]
    #[test_case("mesh.json", Format::Json ; "json extension")]
    #[test_case("mesh.JSON", Format::Json ; "uppercase json")]
    #[test_case("mesh", Format::Toml ; "no extension")]
    #[test_case("output.yml", Format::Yaml ; "yml extension")]
    #[test_case("mesh.YAML", Format::Yaml ; "uppercase yaml")]
    #[test_case("mesh.conf", Format::Toml ; "unknown extension")]
    fn picks_format(path: &str, expected: Format) {
        assert_eq!(Format::for_path(Path::new(path)), expected);
    }

    #[test]
    fn parse_empty_toml() {
        let parsed = decode("", Format::Toml).unwrap();
        assert_eq!(parsed, MeshConfig::default());
    }

    #[test]
    fn parse_params_only() {
        let parsed = decode(
            "[generationParams]\ncidr = \"192.168.1.0/24\"\nserver = \"192.168.1.1\"\nforceDns = true\n",
            Format::Toml,
        )
        .unwrap();
        assert_eq!(parsed.generation_params.cidr, "192.168.1.0/24");
        assert!(parsed.generation_params.force_dns);
        assert_eq!(parsed.generation_params.server_interface, "eth0");
    }

    #[test]
    fn parse_legacy_yaml() {
        let parsed = decode(
            r#"generationParams:
  cidr: 10.0.0.0/24
  server: 10.0.0.1
  serverInterface: eno1
  persistentKeepAlive: 0
  forceAllowedIPs: true
  forceMtu: true
peers:
  - id: 1
    ip: 10.0.0.1
    allowedIPs: 0.0.0.0/0
    persistentKeepAlive: 25
    mtu: 1420
    endpointPort: 51820
    isServer: true
    privateKey: priv
    publicKey: pub
    preSharedKey: psk
"#,
            Format::Yaml,
        )
        .unwrap();

        let params = &parsed.generation_params;
        assert_eq!(params.cidr, "10.0.0.0/24");
        assert_eq!(params.server_interface, "eno1");
        assert_eq!(params.persistent_keepalive, 0);
        assert!(params.force_allowed_ips);
        assert!(params.force_mtu);
        assert_eq!(params.endpoint_port, 51820);

        let server = &parsed.peers[0];
        assert!(server.is_server);
        assert_eq!(server.mtu, 1420);
        assert_eq!(server.persistent_keepalive, 25);
        assert_eq!(server.pre_shared_key, "psk");
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(decode("peers = 3", Format::Toml).is_err());
        assert!(decode("{", Format::Json).is_err());
        assert!(decode("peers: [", Format::Yaml).is_err());
    }
}
