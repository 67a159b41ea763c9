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

//! wiregen-core: the peer generation engine.
//!
//! Walks every usable address of a CIDR, merges the previous run's records
//! with the current [`GenerationParams`](wiregen_types::GenerationParams),
//! generates key material in bounded concurrent batches and renders wg-quick
//! configurations for every peer plus the aggregate server configuration.

pub mod generate;
pub mod keys;
pub mod merge;
pub mod progress;
pub mod render;
pub mod spool;
pub mod store;
pub mod walker;

pub use generate::{GenerateError, Generator, RecordError};
pub use keys::{Entropy, KeyError, KeyPair, OsEntropy};
pub use progress::{Progress, Stage};
