// Copyright (C) 2025 Joseph Sacchini
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU Affero General Public License as published by the Free
// Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more
// details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use std::net::IpAddr;

use ipnetwork::IpNetwork;
use wiregen_types::{GenerationParams, PeerRecord};

use crate::spool::{Spool, SpoolError};
use crate::walker::host_prefix;

/// wg-quick config for a single peer connecting to `server`.
pub fn render_peer(peer: &PeerRecord, server: &PeerRecord) -> String {
    let mut config = String::from("[Interface]\n");
    push_extra(&mut config, &peer.extra);
    config.push_str(&format!("PrivateKey = {}\n", peer.private_key));
    config.push_str(&format!("Address = {}/{}\n", peer.ip, host_bits(&peer.ip)));
    if !peer.dns.is_empty() {
        config.push_str(&format!("DNS = {}\n", peer.dns));
    }
    config.push_str(&format!("MTU = {}\n", peer.mtu));

    config.push_str("\n[Peer]\n");
    config.push_str(&format!("PublicKey = {}\n", server.public_key));
    config.push_str(&format!("PresharedKey = {}\n", peer.pre_shared_key));
    config.push_str(&format!("Endpoint = {}:{}\n", peer.endpoint, peer.endpoint_port));
    config.push_str(&format!("AllowedIPs = {}\n", peer.allowed_ips));
    if peer.persistent_keepalive > 0 {
        config.push_str(&format!("PersistentKeepalive = {}\n", peer.persistent_keepalive));
    }

    config
}

/// The server-side `[Peer]` entry routing a single host to `peer`.
pub fn render_stanza(peer: &PeerRecord) -> String {
    format!(
        "[Peer]\nPublicKey = {}\nAllowedIPs = {}/{}\nPresharedKey = {}\n\n",
        peer.public_key,
        peer.ip,
        host_bits(&peer.ip),
        peer.pre_shared_key,
    )
}

/// wg-quick config for the server, followed by every spooled peer stanza.
/// Port and MTU come from the generation parameters, not the record. A DNS
/// value left on the record from when it was a peer is not rendered.
pub fn render_server(
    server: &PeerRecord,
    params: &GenerationParams,
    network: IpNetwork,
    spool: &Spool,
) -> Result<String, SpoolError> {
    let iface = &params.server_interface;

    let mut config = String::from("[Interface]\n");
    push_extra(&mut config, &server.extra);
    config.push_str(&format!("PrivateKey = {}\n", server.private_key));
    config.push_str(&format!("Address = {}/{}\n", server.ip, network.prefix()));
    config.push_str(&format!("ListenPort = {}\n", params.endpoint_port));
    config.push_str(&format!("MTU = {}\n", params.mtu));
    config.push_str(&format!(
        "PostUp = iptables -A FORWARD -i %i -j ACCEPT; iptables -A FORWARD -o %i -j ACCEPT; iptables -t nat -A POSTROUTING -o {iface} -j MASQUERADE\n"
    ));
    config.push_str(&format!(
        "PostDown = iptables -D FORWARD -i %i -j ACCEPT; iptables -D FORWARD -o %i -j ACCEPT; iptables -t nat -D POSTROUTING -o {iface} -j MASQUERADE\n"
    ));
    config.push('\n');

    spool.write_into(&mut config)?;
    Ok(config)
}

fn push_extra(config: &mut String, extra: &str) {
    if !extra.is_empty() {
        config.push_str(extra);
        if !extra.ends_with('\n') {
            config.push('\n');
        }
    }
}

fn host_bits(ip: &str) -> u8 {
    ip.parse::<IpAddr>().map_or(32, host_prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spool::SpoolEntry;

    fn server() -> PeerRecord {
        PeerRecord {
            id: 1,
            ip: "10.0.0.1".into(),
            is_server: true,
            mtu: 1280,
            private_key: "server-private".into(),
            public_key: "server-public".into(),
            ..PeerRecord::default()
        }
    }

    fn peer() -> PeerRecord {
        PeerRecord {
            id: 2,
            ip: "10.0.0.2".into(),
            dns: "1.1.1.1".into(),
            mtu: 1280,
            endpoint: "vpn.example.com".into(),
            endpoint_port: 51820,
            allowed_ips: "0.0.0.0/0".into(),
            persistent_keepalive: 15,
            private_key: "peer-private".into(),
            public_key: "peer-public".into(),
            pre_shared_key: "peer-psk".into(),
            ..PeerRecord::default()
        }
    }

    #[test]
    fn peer_block_layout() {
        let expected = "[Interface]\n\
            PrivateKey = peer-private\n\
            Address = 10.0.0.2/32\n\
            DNS = 1.1.1.1\n\
            MTU = 1280\n\
            \n\
            [Peer]\n\
            PublicKey = server-public\n\
            PresharedKey = peer-psk\n\
            Endpoint = vpn.example.com:51820\n\
            AllowedIPs = 0.0.0.0/0\n\
            PersistentKeepalive = 15\n";
        assert_eq!(render_peer(&peer(), &server()), expected);
    }

    #[test]
    fn keepalive_omitted_when_zero() {
        let peer = PeerRecord {
            persistent_keepalive: 0,
            ..peer()
        };
        assert!(!render_peer(&peer, &server()).contains("PersistentKeepalive"));
    }

    #[test]
    fn extra_follows_interface_header() {
        let peer = PeerRecord {
            extra: "# laptop".into(),
            dns: String::new(),
            ..peer()
        };
        let config = render_peer(&peer, &server());
        assert!(config.starts_with("[Interface]\n# laptop\nPrivateKey"));
        assert!(!config.contains("DNS"));
    }

    #[test]
    fn ipv6_peer_uses_host_prefix() {
        let peer = PeerRecord {
            ip: "fd00::2".into(),
            ..peer()
        };
        assert!(render_peer(&peer, &server()).contains("Address = fd00::2/128\n"));
        assert!(render_stanza(&peer).contains("AllowedIPs = fd00::2/128\n"));
    }

    #[test]
    fn stanza_layout() {
        assert_eq!(
            render_stanza(&peer()),
            "[Peer]\nPublicKey = peer-public\nAllowedIPs = 10.0.0.2/32\nPresharedKey = peer-psk\n\n"
        );
    }

    #[test]
    fn server_mtu_follows_params() {
        let params = GenerationParams {
            mtu: 1420,
            ..GenerationParams::default()
        };
        let config =
            render_server(&server(), &params, "10.0.0.0/24".parse().unwrap(), &Spool::default())
                .unwrap();
        assert!(config.contains("\nMTU = 1420\n"));
        assert!(!config.contains("MTU = 1280"));
    }

    #[test]
    fn server_block_embeds_stanzas() {
        let params = GenerationParams {
            server_interface: "eno1".into(),
            endpoint_port: 51821,
            ..GenerationParams::default()
        };
        let server = PeerRecord {
            dns: "9.9.9.9".into(),
            ..server()
        };
        let mut spool = Spool::default();
        spool.push(SpoolEntry::seal(render_stanza(&peer()), false).unwrap());

        let config =
            render_server(&server, &params, "10.0.0.0/24".parse().unwrap(), &spool).unwrap();
        assert!(config.starts_with("[Interface]\nPrivateKey = server-private\nAddress = 10.0.0.1/24\nListenPort = 51821\nMTU = 1280\n"));
        assert!(config.contains("POSTROUTING -o eno1 -j MASQUERADE\n"));
        assert!(!config.contains("DNS"));
        assert!(config.ends_with(&format!("\n\n{}", render_stanza(&peer()))));
    }
}
