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

pub mod document;
pub mod progress;
pub mod qr;

use std::path::PathBuf;

use thiserror::Error;
use tracing::info;
use wiregen_core::{GenerateError, Generator, OsEntropy};
use wiregen_types::MeshConfig;

use crate::document::DocumentError;
use crate::progress::TerminalProgress;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("failed to generate: {0}")]
    Generate(#[from] GenerateError),
}

/// Everything one invocation needs, resolved from the command line.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Existing document to regenerate; `None` starts from the defaults.
    pub input: Option<PathBuf>,
    pub output: PathBuf,
    pub interactive: bool,
    pub compress: bool,
    pub batch_size: usize,
    pub max_addresses: u64,
}

/// Load, regenerate and save a mesh document. The output file is only
/// written when generation succeeds.
#[tracing::instrument(skip_all, fields(output = %opts.output.display()))]
pub async fn run(opts: &RunOptions) -> Result<MeshConfig, CliError> {
    let config = match &opts.input {
        Some(path) => document::load(path).await?,
        None => MeshConfig::default(),
    };

    let generator = Generator::new(OsEntropy)
        .batch_size(opts.batch_size)
        .max_addresses(opts.max_addresses)
        .compress(opts.compress);

    let config = if opts.interactive {
        generator
            .with_progress(TerminalProgress::new())
            .generate(config)
            .await?
    } else {
        generator.generate(config).await?
    };

    document::save(&opts.output, &config).await?;
    info!(peers = config.peers.len(), "done");
    Ok(config)
}
