//! Depth-first completeness walk over the DAG under a CAR root

use crate::car::Block;
use crate::codec::{self, DecodeError, RAW};
use ipld_core::cid::Cid;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Errors that can happen while walking
#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    #[error("Failed to decode a block while walking: {0}")]
    Decode(#[from] DecodeError),
}

/// Whether every block reachable from the root is present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Structure {
    Complete,
    Partial,
}

impl fmt::Display for Structure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Structure::Complete => write!(f, "complete"),
            Structure::Partial => write!(f, "partial"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown structure value: {0:?}")]
pub struct UnknownStructure(String);

impl FromStr for Structure {
    type Err = UnknownStructure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "complete" => Ok(Structure::Complete),
            "partial" => Ok(Structure::Partial),
            _ => Err(UnknownStructure(s.to_string())),
        }
    }
}

/// Walker state: the CIDs still to be checked, next one on top
#[derive(Debug)]
pub struct Walker {
    stack: Vec<Cid>,
}

impl Walker {
    pub fn new(root: Cid) -> Self {
        Self { stack: vec![root] }
    }

    /// Walk until a link is missing or everything reachable has been seen
    ///
    /// Link `i`'s whole subtree is visited before link `i + 1` is even looked
    /// up, so the first missing block found is the same one a recursive walk
    /// would stop at.
    pub fn walk(&mut self, blocks: &HashMap<Cid, &[u8]>) -> Result<Structure, WalkError> {
        while let Some(cid) = self.stack.pop() {
            let Some(data) = blocks.get(&cid) else {
                log::trace!("block {cid} is missing, dag is partial");
                return Ok(Structure::Partial);
            };
            let node = codec::decode(&cid, data)?;
            push_links(&mut self.stack, node.links());
            log::trace!("walked {cid}, depth={}", self.stack.len());
        }
        Ok(Structure::Complete)
    }
}

fn push_links(stack: &mut Vec<Cid>, mut links: Vec<Cid>) {
    links.reverse();
    stack.append(&mut links);
}

/// Classify the DAG under `root` as complete or partial given the blocks at hand
pub fn classify(root: &Cid, blocks: &[Block]) -> Result<Structure, WalkError> {
    // a lone raw leaf is its own whole dag
    if blocks.len() == 1 && root.codec() == RAW {
        return Ok(Structure::Complete);
    }

    let mut index = HashMap::with_capacity(blocks.len());
    for block in blocks {
        index.entry(block.cid).or_insert(block.data.as_slice());
    }

    let structure = Walker::new(*root).walk(&index)?;
    log::debug!("dag under {root} is {structure}");
    Ok(structure)
}

#[cfg(test)]
mod test {
    use super::*;

    fn cid1() -> Cid {
        "bafyreihixenvk3ahqbytas4hk4a26w43bh6eo3w6usjqtxkpzsvi655a3m"
            .parse()
            .unwrap()
    }
    fn cid2() -> Cid {
        "bafyreif3tfdpr5n4jdrbielmcapwvbpcthepfkwq2vwonmlhirbjmotedi"
            .parse()
            .unwrap()
    }
    fn cid3() -> Cid {
        "bafyreicnokmhmrnlp2wjhyk2haep4tqxiptwfrp2rrs7rzq7uk766chqvq"
            .parse()
            .unwrap()
    }

    #[test]
    fn test_push_links_first_link_on_top() {
        let mut stack = vec![];
        push_links(&mut stack, vec![cid1(), cid2(), cid3()]);
        assert_eq!(stack.last(), Some(&cid1()));
        assert_eq!(stack, vec![cid3(), cid2(), cid1()]);
    }

    #[test]
    fn test_push_no_links() {
        let mut stack = vec![cid1()];
        push_links(&mut stack, vec![]);
        assert_eq!(stack, vec![cid1()]);
    }

    #[test]
    fn test_walk_empty_index_is_partial() {
        let mut walker = Walker::new(cid1());
        assert_eq!(walker.walk(&HashMap::new()).unwrap(), Structure::Partial);
    }

    #[test]
    fn test_lone_raw_leaf_is_complete() {
        let root = Cid::new_v1(RAW, *cid1().hash());
        let blocks = vec![Block {
            cid: root,
            data: b"just a leaf".to_vec(),
        }];
        assert_eq!(classify(&root, &blocks).unwrap(), Structure::Complete);
    }

    #[test]
    fn test_structure_strings() {
        assert_eq!("complete".parse::<Structure>().unwrap(), Structure::Complete);
        assert_eq!("Partial".parse::<Structure>().unwrap(), Structure::Partial);
        assert!("done".parse::<Structure>().is_err());
        assert_eq!(Structure::Partial.to_string(), "partial");
    }
}
