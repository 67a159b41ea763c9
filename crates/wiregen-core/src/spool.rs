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

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpoolError {
    #[error("failed to gzip stanza: {0}")]
    Compress(#[source] std::io::Error),

    #[error("failed to gunzip stanza: {0}")]
    Decompress(#[source] std::io::Error),
}

/// A rendered server-side peer stanza, optionally gzipped to trade CPU for
/// memory while large networks are processed.
#[derive(Debug, Clone)]
pub enum SpoolEntry {
    Plain(String),
    Gzip(Vec<u8>),
}

impl SpoolEntry {
    pub fn seal(stanza: String, compress: bool) -> Result<Self, SpoolError> {
        if !compress {
            return Ok(Self::Plain(stanza));
        }
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(stanza.as_bytes())
            .map_err(SpoolError::Compress)?;
        encoder.finish().map(Self::Gzip).map_err(SpoolError::Compress)
    }

    fn write_into(&self, out: &mut String) -> Result<(), SpoolError> {
        match self {
            Self::Plain(stanza) => out.push_str(stanza),
            Self::Gzip(bytes) => {
                GzDecoder::new(&bytes[..])
                    .read_to_string(out)
                    .map_err(SpoolError::Decompress)?;
            }
        }
        Ok(())
    }
}

/// Ordered holding area for stanzas awaiting the server config.
#[derive(Debug, Default)]
pub struct Spool {
    entries: Vec<SpoolEntry>,
}

impl Spool {
    pub fn push(&mut self, entry: SpoolEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append every stanza to `out` in insertion order.
    pub fn write_into(&self, out: &mut String) -> Result<(), SpoolError> {
        for entry in &self.entries {
            entry.write_into(out)?;
        }
        Ok(())
    }
}
