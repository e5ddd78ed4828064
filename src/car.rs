//! Parse a CAR payload into its single root and the blocks it carries

use futures::TryStreamExt;
use ipld_core::cid::Cid;
use iroh_car::CarReader;
use serde::Deserialize;
use std::convert::Infallible;

/// Largest block payload we are willing to hold: 1 MiB
pub const MAX_BLOCK_SIZE: usize = 1024 * 1024;

/// Malformed-input failures. These are always fatal for the inspection.
#[derive(Debug, thiserror::Error)]
pub enum CarError {
    #[error("Failed to read CAR: {0}")]
    Car(#[from] iroh_car::Error),
    #[error("Failed to decode CAR header: {0}")]
    BadHeader(String),
    #[error("CAR header version {0} is not supported")]
    UnsupportedVersion(u64),
    #[error("CAR file requires a root to be present")]
    MissingRoot,
    #[error("CAR file declares {0} roots, only single-root archives are supported")]
    MultipleRoots(usize),
    #[error("CAR file has no blocks")]
    EmptyArchive,
    #[error("The root block {0} was not found in the CAR")]
    MissingRootBlock(Cid),
    /// `cid` is `None` when the frame was too big to even be read
    #[error(
        "Block {} is {size} bytes, larger than the {max} byte limit",
        .cid.map_or_else(|| "(unread)".to_string(), |c| c.to_string())
    )]
    BlockTooLarge {
        cid: Option<Cid>,
        size: usize,
        max: usize,
    },
}

/// A content-addressed block, as read from the CAR
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub cid: Cid,
    pub data: Vec<u8>,
}

/// One parsed CAR: exactly one root plus its blocks in the order they were read
#[derive(Debug, Clone)]
pub struct CarArchive {
    pub root: Cid,
    pub blocks: Vec<Block>,
}

impl CarArchive {
    /// The first block carrying the root CID
    pub fn root_block(&self) -> Option<&Block> {
        self.blocks.iter().find(|b| b.cid == self.root)
    }
}

#[derive(Debug, Deserialize)]
struct Header {
    #[serde(default)]
    roots: Vec<Cid>,
    version: u64,
}

/// CAR parser with a configurable block size ceiling
#[derive(Debug, Clone)]
pub struct Parser {
    max_block_size: usize,
}

impl Default for Parser {
    fn default() -> Self {
        Self {
            max_block_size: MAX_BLOCK_SIZE,
        }
    }
}

impl Parser {
    pub fn new() -> Self {
        Default::default()
    }

    /// Reject blocks with payloads over `max` bytes
    ///
    /// Default: 1 MiB
    pub fn with_max_block_size(mut self, max: usize) -> Self {
        self.max_block_size = max;
        self
    }

    /// Parse a whole CAR payload
    ///
    /// Fails fast: nothing is returned for an archive that breaks any of the
    /// single-root, bounded-block rules.
    pub async fn parse(&self, bytes: &[u8]) -> Result<CarArchive, CarError> {
        // iroh-car refuses rootless headers with a generic parse error, so the
        // root count is checked on our side first
        let root = single_root(bytes)?;

        let reader = CarReader::new(bytes).await?;
        let mut stream = std::pin::pin!(reader.stream());

        let mut blocks = vec![];
        while let Some((cid, data)) = stream
            .try_next()
            .await
            .map_err(|e| self.frame_error(e))?
        {
            if data.len() > self.max_block_size {
                return Err(CarError::BlockTooLarge {
                    cid: Some(cid),
                    size: data.len(),
                    max: self.max_block_size,
                });
            }
            blocks.push(Block { cid, data });
        }

        if blocks.is_empty() {
            return Err(CarError::EmptyArchive);
        }
        if !blocks.iter().any(|b| b.cid == root) {
            return Err(CarError::MissingRootBlock(root));
        }

        log::debug!("parsed car with root {root} and {} blocks", blocks.len());
        Ok(CarArchive { root, blocks })
    }

    // iroh-car refuses frames over its own (larger) cap before we see them;
    // those are still oversized blocks, just without a readable cid
    fn frame_error(&self, e: iroh_car::Error) -> CarError {
        match e {
            iroh_car::Error::LdReadTooLarge(size) => CarError::BlockTooLarge {
                cid: None,
                size,
                max: self.max_block_size,
            },
            e => e.into(),
        }
    }
}

/// Parse a CAR payload with the default limits
pub async fn parse(bytes: &[u8]) -> Result<CarArchive, CarError> {
    Parser::default().parse(bytes).await
}

fn single_root(bytes: &[u8]) -> Result<Cid, CarError> {
    let (len, rest) =
        unsigned_varint::decode::usize(bytes).map_err(|e| CarError::BadHeader(e.to_string()))?;
    let header_bytes = rest
        .get(..len)
        .ok_or_else(|| CarError::BadHeader(format!("header claims {len} bytes")))?;
    let header: Header = serde_ipld_dagcbor::from_slice(header_bytes)
        .map_err(|e: serde_ipld_dagcbor::DecodeError<Infallible>| {
            CarError::BadHeader(e.to_string())
        })?;

    if header.version != 1 {
        return Err(CarError::UnsupportedVersion(header.version));
    }
    match header.roots.as_slice() {
        [] => Err(CarError::MissingRoot),
        [root] => Ok(*root),
        roots => Err(CarError::MultipleRoots(roots.len())),
    }
}
