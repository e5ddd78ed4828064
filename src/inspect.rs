//! The inspection pipeline: parse, classify, estimate, decide

use crate::car::{CarError, Parser};
use crate::codec::DecodeError;
use crate::config::ProbeConfig;
use crate::decide::{self, FetchDecision};
use crate::size;
use crate::walk::{self, Structure, WalkError};
use ipld_core::cid::Cid;
use std::collections::HashMap;

/// Metadata key that may carry a previously recorded structure
pub const STRUCTURE_KEY: &str = "structure";

#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error(transparent)]
    Car(#[from] CarError),
    #[error(transparent)]
    Walk(#[from] WalkError),
    #[error("Failed to estimate dag size: {0}")]
    Estimate(#[source] DecodeError),
}

/// Where a structure verdict came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureSource {
    /// Computed by walking the blocks
    Walked,
    /// Taken on trust from caller-supplied metadata, because the root's codec
    /// can't be walked. Not verified.
    Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectionResult {
    pub root: Cid,
    pub structure: Structure,
    pub structure_source: StructureSource,
    /// Only known for dag-pb roots
    pub estimated_size: Option<u64>,
}

/// Runs inspections with one set of limits
#[derive(Debug, Clone, Default)]
pub struct Inspector {
    config: ProbeConfig,
}

impl Inspector {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Inspect one CAR payload
    ///
    /// `metadata` is the object's stored metadata. Its `structure` entry is
    /// only consulted when the root block's own codec is unsupported; an
    /// unsupported codec anywhere below the root still fails the inspection.
    pub async fn inspect(
        &self,
        bytes: &[u8],
        metadata: &HashMap<String, String>,
    ) -> Result<InspectionResult, InspectError> {
        let archive = Parser::new()
            .with_max_block_size(self.config.max_block_size)
            .parse(bytes)
            .await?;
        let root = archive.root;

        let (structure, structure_source) = match walk::classify(&root, &archive.blocks) {
            Ok(structure) => (structure, StructureSource::Walked),
            Err(WalkError::Decode(DecodeError::UnsupportedCodec(cid))) if cid == root => {
                let Some(structure) = metadata_structure(metadata) else {
                    return Err(WalkError::Decode(DecodeError::UnsupportedCodec(cid)).into());
                };
                log::warn!(
                    "root {root} has an unsupported codec, trusting metadata structure={structure} unverified"
                );
                (structure, StructureSource::Metadata)
            }
            Err(e) => return Err(e.into()),
        };

        let estimated_size = match archive.root_block() {
            Some(block) => size::estimate(block).map_err(InspectError::Estimate)?,
            None => None,
        };

        log::debug!("inspected {root}: structure={structure} estimated_size={estimated_size:?}");
        Ok(InspectionResult {
            root,
            structure,
            structure_source,
            estimated_size,
        })
    }

    /// Decide on a gateway fetch given the bytes stored under the root's prefix
    pub fn decide(&self, result: &InspectionResult, stored: u64) -> FetchDecision {
        decide::decide(
            result.structure,
            result.estimated_size,
            self.config.size_ceiling,
            stored,
        )
    }
}

fn metadata_structure(metadata: &HashMap<String, String>) -> Option<Structure> {
    let value = metadata.get(STRUCTURE_KEY)?;
    match value.parse() {
        Ok(structure) => Some(structure),
        Err(e) => {
            log::warn!("ignoring metadata: {e}");
            None
        }
    }
}
