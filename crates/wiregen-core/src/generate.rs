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

use std::sync::Arc;

use thiserror::Error;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info};
use wiregen_types::{GenerationParams, MeshConfig, PeerRecord};

use crate::keys::{Entropy, KeyError};
use crate::merge;
use crate::progress::{Progress, Stage};
use crate::render;
use crate::spool::{Spool, SpoolEntry, SpoolError};
use crate::store::{PeerStore, ValidationError};
use crate::walker::{AddressSpace, DEFAULT_MAX_ADDRESSES, InputError, Slot};

pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to generate server keys: {0}")]
    Key(#[from] KeyError),

    #[error("failed to render server config: {0}")]
    Spool(#[from] SpoolError),

    #[error("error configuring peer {id}: {source}")]
    Record {
        id: u64,
        #[source]
        source: RecordError,
    },

    #[error("peer task failed: {0}")]
    Task(#[from] JoinError),
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Spool(#[from] SpoolError),
}

/// Read-only inputs shared by every peer task of a run.
struct PeerContext<E> {
    params: GenerationParams,
    server: PeerRecord,
    entropy: Arc<E>,
    compress: bool,
}

/// Output of one peer task, applied to the store by the coordinator.
struct PreparedPeer {
    record: PeerRecord,
    stanza: SpoolEntry,
}

/// Runs the peer generation pipeline over a whole address space.
pub struct Generator<E, P = ()> {
    entropy: Arc<E>,
    progress: P,
    batch_size: usize,
    max_addresses: u64,
    compress: bool,
}

impl<E: Entropy> Generator<E> {
    pub fn new(entropy: E) -> Self {
        Self {
            entropy: Arc::new(entropy),
            progress: (),
            batch_size: DEFAULT_BATCH_SIZE,
            max_addresses: DEFAULT_MAX_ADDRESSES,
            compress: false,
        }
    }
}

impl<E: Entropy, P: Progress> Generator<E, P> {
    pub fn with_progress<Q: Progress>(self, progress: Q) -> Generator<E, Q> {
        Generator {
            entropy: self.entropy,
            progress,
            batch_size: self.batch_size,
            max_addresses: self.max_addresses,
            compress: self.compress,
        }
    }

    /// Maximum number of peers processed concurrently. Clamped to at least 1.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Largest network, counted before filtering, that a run will walk.
    pub fn max_addresses(mut self, max_addresses: u64) -> Self {
        self.max_addresses = max_addresses;
        self
    }

    /// Gzip server stanzas while they wait for the server config.
    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Regenerate every peer of `config` for its current parameters.
    ///
    /// The server is merged first since every peer config embeds its public
    /// key. The remaining peers run in sequential batches of concurrent tasks.
    /// Any failure abandons the whole run.
    #[tracing::instrument(skip_all, fields(cidr = %config.generation_params.cidr))]
    pub async fn generate(&self, config: MeshConfig) -> Result<MeshConfig, GenerateError> {
        let MeshConfig {
            generation_params: params,
            peers,
        } = config;

        let space = AddressSpace::parse(&params.cidr, &params.server)?;
        let scan = space.scan(self.max_addresses, &self.progress)?;
        info!(
            usable = scan.usable,
            server_id = scan.server.id,
            "scanned address space"
        );

        let mut store = PeerStore::reconcile(peers, scan.usable, params.reset_all)?;
        self.progress.start(Stage::Configure, scan.usable as u64);

        let server = merge::merge(
            store.take(scan.server.id),
            &scan.server,
            &params,
            self.entropy.as_ref(),
        )?;
        store.put(server)?;
        self.progress.advance(Stage::Configure, 1);

        let server = store.resolve_server()?.clone();
        info!(id = server.id, address = %server.ip, "server resolved");

        let ctx = Arc::new(PeerContext {
            params,
            server,
            entropy: Arc::clone(&self.entropy),
            compress: self.compress,
        });

        let mut spool = Spool::default();
        let mut slots = space.walk().filter(|slot| !slot.is_server);
        let mut batch_no = 0usize;
        loop {
            let batch: Vec<Slot> = slots.by_ref().take(self.batch_size).collect();
            if batch.is_empty() {
                break;
            }
            batch_no += 1;
            debug!(batch = batch_no, size = batch.len(), "dispatching batch");
            self.run_batch(batch, &ctx, &mut store, &mut spool).await?;
        }
        self.progress.finish(Stage::Configure);

        let mut server = store.take(ctx.server.id);
        server.config = render::render_server(&server, &ctx.params, space.network(), &spool)?;
        store.put(server)?;
        drop(spool);

        self.progress.start(Stage::Collect, store.len() as u64);
        let peers = store.into_records();
        self.progress.advance(Stage::Collect, peers.len() as u64);
        self.progress.finish(Stage::Collect);

        info!(peers = peers.len(), batches = batch_no, "generation complete");

        let params = match Arc::try_unwrap(ctx) {
            Ok(ctx) => ctx.params,
            Err(ctx) => ctx.params.clone(),
        };
        Ok(MeshConfig {
            generation_params: params,
            peers,
        })
    }

    async fn run_batch(
        &self,
        batch: Vec<Slot>,
        ctx: &Arc<PeerContext<E>>,
        store: &mut PeerStore,
        spool: &mut Spool,
    ) -> Result<(), GenerateError> {
        let mut tasks = JoinSet::new();
        for slot in batch {
            let previous = store.take(slot.id);
            let ctx = Arc::clone(ctx);
            tasks.spawn(async move {
                prepare_peer(previous, &slot, &ctx).map_err(|source| GenerateError::Record {
                    id: slot.id,
                    source,
                })
            });
        }

        // Dropping the join set on error aborts whatever is still running.
        let mut prepared = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            prepared.push(joined??);
        }

        // completion order is arbitrary; the server config lists peers by id
        prepared.sort_unstable_by_key(|peer| peer.record.id);
        let count = prepared.len() as u64;
        for peer in prepared {
            spool.push(peer.stanza);
            store.put(peer.record)?;
        }
        self.progress.advance(Stage::Configure, count);
        Ok(())
    }
}

fn prepare_peer<E: Entropy>(
    previous: PeerRecord,
    slot: &Slot,
    ctx: &PeerContext<E>,
) -> Result<PreparedPeer, RecordError> {
    let mut record = merge::merge(previous, slot, &ctx.params, ctx.entropy.as_ref())?;
    record.config = render::render_peer(&record, &ctx.server);
    let stanza = SpoolEntry::seal(render::render_stanza(&record), ctx.compress)?;
    Ok(PreparedPeer { record, stanza })
}
