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

//! Rule passes that turn a previous record into this run's record.
//!
//! Each pass takes the record by value and returns the updated one:
//!
//! 1. [`apply_soft`] fills empty fields from the parameters, so user edits
//!    from earlier runs survive.
//! 2. [`apply_forced`] overwrites fields whose force flag is set.
//! 3. [`apply_keys`] generates key material that is missing or must be
//!    regenerated.

use wiregen_types::{GenerationParams, PeerRecord};

use crate::keys::{self, Entropy, KeyError};
use crate::walker::Slot;

pub const DEFAULT_ALLOWED_IPS: &str = "0.0.0.0/0";
pub const DEFAULT_MTU: u16 = 1280;

/// Run all passes for the record at `slot`, starting from whatever the
/// previous run stored under the same id.
pub fn merge(
    previous: PeerRecord,
    slot: &Slot,
    params: &GenerationParams,
    entropy: &dyn Entropy,
) -> Result<PeerRecord, KeyError> {
    let record = PeerRecord {
        id: slot.id,
        ip: slot.addr.to_string(),
        is_server: slot.is_server,
        ..previous
    };

    let record = apply_soft(record, params);
    let record = apply_forced(record, params);
    apply_keys(record, params, entropy)
}

pub fn apply_soft(mut record: PeerRecord, params: &GenerationParams) -> PeerRecord {
    if record.name.is_empty() {
        record.name = substitute(&params.name, record.id, None);
    }
    if record.description.is_empty() {
        record.description = substitute(&params.description, record.id, Some(&record.name));
    }
    if record.extra.is_empty() {
        record.extra = substitute(&params.extra, record.id, Some(&record.name));
    }

    if record.allowed_ips.is_empty() {
        record.allowed_ips = if params.allowed_ips.is_empty() {
            DEFAULT_ALLOWED_IPS.to_string()
        } else {
            params.allowed_ips.clone()
        };
    }

    // the server never gets a DNS entry
    if record.dns.is_empty() && !record.is_server {
        record.dns = params.dns.clone();
    }

    if record.persistent_keepalive == 0 {
        record.persistent_keepalive = params.persistent_keepalive;
    }
    if record.mtu == 0 {
        record.mtu = DEFAULT_MTU;
    }
    if record.endpoint.is_empty() {
        record.endpoint = params.endpoint.clone();
    }
    if record.endpoint_port == 0 {
        record.endpoint_port = params.endpoint_port;
    }

    record
}

pub fn apply_forced(mut record: PeerRecord, params: &GenerationParams) -> PeerRecord {
    if params.force_allowed_ips {
        record.allowed_ips = params.allowed_ips.clone();
    }
    if params.force_persistent_keepalive {
        record.persistent_keepalive = params.persistent_keepalive;
    }
    if params.force_mtu {
        record.mtu = params.mtu;
    }
    if params.force_endpoint {
        record.endpoint = params.endpoint.clone();
    }
    if params.force_endpoint_port {
        record.endpoint_port = params.endpoint_port;
    }
    if params.force_dns && !record.is_server {
        record.dns = params.dns.clone();
    }

    if params.force_name {
        record.name = substitute(&params.name, record.id, None);
    }
    if params.force_description {
        record.description = substitute(&params.description, record.id, Some(&record.name));
    }
    if params.force_extra {
        record.extra = substitute(&params.extra, record.id, Some(&record.name));
    }

    record
}

pub fn apply_keys(
    mut record: PeerRecord,
    params: &GenerationParams,
    entropy: &dyn Entropy,
) -> Result<PeerRecord, KeyError> {
    if record.private_key.is_empty() || record.public_key.is_empty() || params.regenerate_keys {
        let pair = keys::generate_keypair(entropy)?;
        record.private_key = pair.private_key;
        record.public_key = pair.public_key;
    }

    if record.pre_shared_key.is_empty() || params.regenerate_keys {
        record.pre_shared_key = keys::generate_psk(entropy)?;
    }

    Ok(record)
}

fn substitute(template: &str, id: u64, name: Option<&str>) -> String {
    let out = template.replace("${id}", &id.to_string());
    match name {
        Some(name) => out.replace("${name}", name),
        None => out,
    }
}
