#![allow(dead_code)]

use car_probe::codec::{DAG_PB, PbLink, RAW, encode_dag_pb};
use ipld_core::cid::Cid;
use multihash_codetable::{Code, MultihashDigest};
use serde::Serialize;

pub type RawBlock = (Cid, Vec<u8>);

pub fn cid_of(codec: u64, data: &[u8]) -> Cid {
    Cid::new_v1(codec, Code::Sha2_256.digest(data))
}

pub fn raw_block(data: &[u8]) -> RawBlock {
    (cid_of(RAW, data), data.to_vec())
}

pub fn pb_block(links: &[PbLink], data: &[u8]) -> RawBlock {
    let bytes = encode_dag_pb(links, Some(data)).unwrap();
    (cid_of(DAG_PB, &bytes), bytes)
}

#[derive(Serialize)]
struct Header<'a> {
    roots: &'a [Cid],
    version: u64,
}

fn push_varint(out: &mut Vec<u8>, n: usize) {
    let mut buf = unsigned_varint::encode::usize_buffer();
    out.extend_from_slice(unsigned_varint::encode::usize(n, &mut buf));
}

/// Encode a CARv1 with exactly these roots and blocks, in order
pub fn car(roots: &[Cid], blocks: &[RawBlock]) -> Vec<u8> {
    let header = serde_ipld_dagcbor::to_vec(&Header { roots, version: 1 }).unwrap();
    let mut out = vec![];
    push_varint(&mut out, header.len());
    out.extend_from_slice(&header);
    for (cid, data) in blocks {
        let cid_bytes = cid.to_bytes();
        push_varint(&mut out, cid_bytes.len() + data.len());
        out.extend_from_slice(&cid_bytes);
        out.extend_from_slice(data);
    }
    out
}

/// A file packed as raw leaves under a dag-pb file node, wrapped in a
/// one-entry directory
pub struct PackedFile {
    pub root: Cid,
    pub file: Cid,
    /// directory node, file node, then the leaves in file order
    pub blocks: Vec<RawBlock>,
}

impl PackedFile {
    pub fn leaves(&self) -> &[RawBlock] {
        &self.blocks[2..]
    }

    pub fn encoded_size(&self) -> u64 {
        self.blocks.iter().map(|(_, data)| data.len() as u64).sum()
    }
}

pub fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub fn pack_file(content: &[u8], chunk_size: usize) -> PackedFile {
    let leaves: Vec<RawBlock> = content.chunks(chunk_size).map(raw_block).collect();

    let file_links: Vec<PbLink> = leaves
        .iter()
        .map(|(cid, data)| PbLink {
            cid: *cid,
            name: None,
            size: Some(data.len() as u64),
        })
        .collect();
    // unixfs Data { Type: File }
    let (file, file_bytes) = pb_block(&file_links, &[0x08, 0x02]);
    let file_total =
        file_bytes.len() as u64 + leaves.iter().map(|(_, d)| d.len() as u64).sum::<u64>();

    // unixfs Data { Type: Directory }
    let (root, root_bytes) = pb_block(
        &[PbLink {
            cid: file,
            name: Some("file.bin".to_string()),
            size: Some(file_total),
        }],
        &[0x08, 0x01],
    );

    let mut blocks = vec![(root, root_bytes), (file, file_bytes)];
    blocks.extend(leaves);
    PackedFile { root, file, blocks }
}
