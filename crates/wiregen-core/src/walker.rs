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

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnetwork::{IpNetwork, IpNetworkError};
use thiserror::Error;
use tracing::debug;

use crate::progress::{Progress, Stage};

/// How many walked addresses are reported to the progress observer at once.
const SCAN_REPORT_EVERY: u64 = 4096;

/// Largest network (before filtering) a run will walk: an IPv4 /6 or an
/// IPv6 /102.
pub const DEFAULT_MAX_ADDRESSES: u64 = 1 << 26;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("cidr {0} has no prefix length")]
    MissingPrefix(String),

    #[error("failed to parse cidr {cidr}: {source}")]
    Cidr {
        cidr: String,
        #[source]
        source: IpNetworkError,
    },

    #[error("cidr {given} is not a correctly aligned subnet; use the correctly aligned subnet {aligned} instead")]
    Misaligned { given: String, aligned: String },

    #[error("server is not an ip address: {0}")]
    ServerAddress(String),

    #[error("server must be an ip address within the range {cidr}: {server}")]
    ServerOutOfRange { cidr: String, server: String },

    #[error("server {0} ends in .0 or .255 and is not a usable address")]
    ServerNotUsable(String),

    #[error("cidr {cidr} spans {size} addresses, more than the limit of {max}")]
    TooLarge { cidr: String, size: u128, max: u64 },
}

/// One usable address of the walked range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// 1-based ordinal among usable addresses; doubles as the record id.
    pub id: u64,
    pub addr: IpAddr,
    pub is_server: bool,
}

/// Result of a full pass over the address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scan {
    pub usable: usize,
    pub server: Slot,
}

/// A validated CIDR together with the configured server address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressSpace {
    network: IpNetwork,
    server: IpAddr,
}

impl AddressSpace {
    pub fn parse(cidr: &str, server: &str) -> Result<Self, InputError> {
        if !cidr.contains('/') {
            return Err(InputError::MissingPrefix(cidr.to_string()));
        }
        let network: IpNetwork = cidr.parse().map_err(|source| InputError::Cidr {
            cidr: cidr.to_string(),
            source,
        })?;

        let aligned = format!("{}/{}", network.network(), network.prefix());
        if aligned != cidr {
            return Err(InputError::Misaligned {
                given: cidr.to_string(),
                aligned,
            });
        }

        let server_addr: IpAddr = server
            .parse()
            .map_err(|_| InputError::ServerAddress(server.to_string()))?;
        if !network.contains(server_addr) {
            return Err(InputError::ServerOutOfRange {
                cidr: cidr.to_string(),
                server: server.to_string(),
            });
        }

        Ok(Self {
            network,
            server: server_addr,
        })
    }

    pub fn network(&self) -> IpNetwork {
        self.network
    }

    pub fn server(&self) -> IpAddr {
        self.server
    }

    /// Lazily walk every usable address in order. Each call starts over.
    pub fn walk(&self) -> Walk {
        let (first, last) = bounds(self.network);
        Walk {
            cursor: Some(first),
            last,
            v4: self.network.is_ipv4(),
            server: self.server,
            next_id: 1,
        }
    }

    /// Count usable addresses and locate the server slot in one pass.
    /// Networks spanning more than `max_addresses` are rejected up front.
    pub fn scan(&self, max_addresses: u64, progress: &dyn Progress) -> Result<Scan, InputError> {
        let size = estimate_size(self.network);
        if size > u128::from(max_addresses) {
            return Err(InputError::TooLarge {
                cidr: self.network.to_string(),
                size,
                max: max_addresses,
            });
        }
        progress.start(Stage::Scan, size as u64);

        let mut usable: u64 = 0;
        let mut server = None;
        for slot in self.walk() {
            usable += 1;
            if slot.is_server {
                server = Some(slot);
            }
            if usable % SCAN_REPORT_EVERY == 0 {
                progress.advance(Stage::Scan, SCAN_REPORT_EVERY);
            }
        }
        progress.advance(Stage::Scan, usable % SCAN_REPORT_EVERY);
        progress.finish(Stage::Scan);

        let server = server.ok_or_else(|| InputError::ServerNotUsable(self.server.to_string()))?;
        let usable = usize::try_from(usable).map_err(|_| InputError::TooLarge {
            cidr: self.network.to_string(),
            size,
            max: max_addresses,
        })?;

        debug!(network = %self.network, usable, server_id = server.id, "scanned address space");
        Ok(Scan { usable, server })
    }
}

/// Iterator over the usable addresses of an [`AddressSpace`].
#[derive(Debug, Clone)]
pub struct Walk {
    cursor: Option<u128>,
    last: u128,
    v4: bool,
    server: IpAddr,
    next_id: u64,
}

impl Iterator for Walk {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        loop {
            let current = self.cursor?;
            if current > self.last {
                self.cursor = None;
                return None;
            }
            self.cursor = current.checked_add(1);

            // .0 and .255 are skipped everywhere in the range, not only at
            // the network and broadcast addresses.
            if self.v4 && matches!(current & 0xff, 0 | 255) {
                continue;
            }

            let addr = from_u128(current, self.v4);
            let slot = Slot {
                id: self.next_id,
                addr,
                is_server: addr == self.server,
            };
            self.next_id += 1;
            return Some(slot);
        }
    }
}

/// Unfiltered size of the network, 2^(bits - prefix), saturating at
/// `u128::MAX` for `::/0`. Only suitable for progress estimates.
pub fn estimate_size(network: IpNetwork) -> u128 {
    let host_bits = u32::from(max_prefix(network) - network.prefix());
    1u128.checked_shl(host_bits).unwrap_or(u128::MAX)
}

/// Host prefix length for single-address routes of this family.
pub fn host_prefix(addr: IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn max_prefix(network: IpNetwork) -> u8 {
    host_prefix(network.ip())
}

fn bounds(network: IpNetwork) -> (u128, u128) {
    let first = to_u128(network.network());
    let host_bits = u32::from(max_prefix(network) - network.prefix());
    let span = 1u128.checked_shl(host_bits).map_or(u128::MAX, |n| n - 1);
    (first, first | span)
}

fn to_u128(addr: IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u128::from(u32::from(v4)),
        IpAddr::V6(v6) => u128::from(v6),
    }
}

fn from_u128(n: u128, v4: bool) -> IpAddr {
    if v4 {
        IpAddr::V4(Ipv4Addr::from(n as u32))
    } else {
        IpAddr::V6(Ipv6Addr::from(n))
    }
}
