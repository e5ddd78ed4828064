//! Expected DAG size from a dag-pb root's declared link sizes

use crate::car::Block;
use crate::codec::{self, DAG_PB, DecodeError, PbNode};

/// The root's own length plus every link's declared subtree size
///
/// Links without a size count as 0. Only the root is looked at, so the result
/// is the same however many of the DAG's blocks happen to be present.
pub fn estimate_size(root_bytes: &[u8], root: &PbNode) -> u64 {
    root.links
        .iter()
        .filter_map(|link| link.size)
        .fold(root_bytes.len() as u64, u64::saturating_add)
}

/// Estimate the DAG size under a root block, if its codec declares sizes
///
/// Only dag-pb roots do: raw and dag-cbor roots (and codecs we can't decode)
/// give `None`.
pub fn estimate(root: &Block) -> Result<Option<u64>, DecodeError> {
    if root.cid.codec() != DAG_PB {
        return Ok(None);
    }
    let node = codec::decode_dag_pb(&root.cid, &root.data)?;
    Ok(Some(estimate_size(&root.data, &node)))
}
