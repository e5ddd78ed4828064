//! Block decoding for the codecs we can walk
//!
//! The set of codecs is closed: raw leaves, dag-pb nodes and dag-cbor values.
//! Anything else is an [`DecodeError::UnsupportedCodec`] and callers are
//! expected to surface it rather than guess.

use ipld_core::cid::Cid;
use ipld_core::ipld::Ipld;
use quick_protobuf::sizeofs::{sizeof_len, sizeof_varint};
use quick_protobuf::{BytesReader, MessageRead, MessageWrite, Writer, WriterBackend};
use std::convert::Infallible;

/// multicodec: raw bytes
pub const RAW: u64 = 0x55;
/// multicodec: dag-pb
pub const DAG_PB: u64 = 0x70;
/// multicodec: dag-cbor
pub const DAG_CBOR: u64 = 0x71;

/// Errors that can happen while decoding a single block
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Block {0} uses a codec that cannot be decoded")]
    UnsupportedCodec(Cid),
    #[error("Failed to decode dag-pb block {cid}: {source}")]
    DagPb {
        cid: Cid,
        source: quick_protobuf::Error,
    },
    #[error("Failed to decode dag-cbor block {cid}: {source}")]
    DagCbor {
        cid: Cid,
        source: serde_ipld_dagcbor::DecodeError<Infallible>,
    },
    #[error("dag-pb block {cid} has a bad link: {reason}")]
    BadLink { cid: Cid, reason: String },
}

/// A dag-pb link
#[derive(Debug, Clone, PartialEq)]
pub struct PbLink {
    pub cid: Cid,
    pub name: Option<String>,
    /// declared cumulative size of the subtree under `cid`
    pub size: Option<u64>,
}

/// A decoded dag-pb node
#[derive(Debug, Clone, PartialEq)]
pub struct PbNode {
    /// links, in the order they were serialized
    pub links: Vec<PbLink>,
    pub data: Option<Vec<u8>>,
    /// byte length of the node's own serialized form
    pub encoded_len: usize,
}

/// The typed interpretation of a block under its codec
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedNode {
    /// A leaf. Never has links.
    Raw,
    DagPb(PbNode),
    /// Every link found anywhere inside the value, depth-first. Lists keep
    /// their order; map values come in key-sorted order, not wire order.
    DagCbor(Vec<Cid>),
}

impl DecodedNode {
    /// Outbound links, in walking order
    pub fn links(&self) -> Vec<Cid> {
        match self {
            DecodedNode::Raw => vec![],
            DecodedNode::DagPb(node) => node.links.iter().map(|l| l.cid).collect(),
            DecodedNode::DagCbor(links) => links.clone(),
        }
    }
}

/// Decode a block according to the codec in its CID
pub fn decode(cid: &Cid, data: &[u8]) -> Result<DecodedNode, DecodeError> {
    match cid.codec() {
        RAW => Ok(DecodedNode::Raw),
        DAG_PB => decode_dag_pb(cid, data).map(DecodedNode::DagPb),
        DAG_CBOR => {
            let value: Ipld = serde_ipld_dagcbor::from_slice(data).map_err(|source| {
                DecodeError::DagCbor { cid: *cid, source }
            })?;
            Ok(DecodedNode::DagCbor(cbor_links(value)))
        }
        _ => Err(DecodeError::UnsupportedCodec(*cid)),
    }
}

/// Decode dag-pb bytes into a [`PbNode`]
pub fn decode_dag_pb(cid: &Cid, data: &[u8]) -> Result<PbNode, DecodeError> {
    let mut reader = BytesReader::from_bytes(data);
    let raw = WireNode::from_reader(&mut reader, data)
        .map_err(|source| DecodeError::DagPb { cid: *cid, source })?;

    let mut links = Vec::with_capacity(raw.links.len());
    for link in raw.links {
        let hash = link.hash.ok_or_else(|| DecodeError::BadLink {
            cid: *cid,
            reason: "link has no hash".to_string(),
        })?;
        let target = Cid::try_from(hash).map_err(|e| DecodeError::BadLink {
            cid: *cid,
            reason: e.to_string(),
        })?;
        links.push(PbLink {
            cid: target,
            name: link.name.map(str::to_string),
            size: link.tsize,
        });
    }

    Ok(PbNode {
        links,
        data: raw.data.map(<[u8]>::to_vec),
        encoded_len: data.len(),
    })
}

/// Serialize links and data as a dag-pb node (links first, like every
/// conforming encoder)
pub fn encode_dag_pb(links: &[PbLink], data: Option<&[u8]>) -> Result<Vec<u8>, quick_protobuf::Error> {
    let hashes: Vec<Vec<u8>> = links.iter().map(|l| l.cid.to_bytes()).collect();
    let node = WireNode {
        links: links
            .iter()
            .zip(&hashes)
            .map(|(link, hash)| WireLink {
                hash: Some(hash.as_slice()),
                name: link.name.as_deref(),
                tsize: link.size,
            })
            .collect(),
        data,
    };
    let mut out = Vec::with_capacity(node.get_size());
    {
        let mut writer = Writer::new(&mut out);
        node.write_message(&mut writer)?;
    }
    Ok(out)
}

// dag-cbor values can nest arbitrarily deep, so no recursion here either
fn cbor_links(value: Ipld) -> Vec<Cid> {
    let mut links = vec![];
    let mut stack = vec![value];
    while let Some(value) = stack.pop() {
        match value {
            Ipld::Link(cid) => links.push(cid),
            Ipld::List(items) => stack.extend(items.into_iter().rev()),
            Ipld::Map(entries) => stack.extend(entries.into_values().rev()),
            _ => {}
        }
    }
    links
}

/// PBLink on the wire
#[derive(Debug, Default)]
struct WireLink<'a> {
    hash: Option<&'a [u8]>,
    name: Option<&'a str>,
    tsize: Option<u64>,
}

impl<'a> MessageRead<'a> for WireLink<'a> {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> quick_protobuf::Result<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(10) => msg.hash = Some(r.read_bytes(bytes)?),
                Ok(18) => msg.name = Some(r.read_string(bytes)?),
                Ok(24) => msg.tsize = Some(r.read_uint64(bytes)?),
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}

impl MessageWrite for WireLink<'_> {
    fn get_size(&self) -> usize {
        self.hash.map_or(0, |h| 1 + sizeof_len(h.len()))
            + self.name.map_or(0, |n| 1 + sizeof_len(n.len()))
            + self.tsize.map_or(0, |s| 1 + sizeof_varint(s))
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> quick_protobuf::Result<()> {
        if let Some(hash) = self.hash {
            w.write_with_tag(10, |w| w.write_bytes(hash))?;
        }
        if let Some(name) = self.name {
            w.write_with_tag(18, |w| w.write_string(name))?;
        }
        if let Some(tsize) = self.tsize {
            w.write_with_tag(24, |w| w.write_uint64(tsize))?;
        }
        Ok(())
    }
}

/// PBNode on the wire
#[derive(Debug, Default)]
struct WireNode<'a> {
    links: Vec<WireLink<'a>>,
    data: Option<&'a [u8]>,
}

impl<'a> MessageRead<'a> for WireNode<'a> {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> quick_protobuf::Result<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(10) => msg.data = Some(r.read_bytes(bytes)?),
                Ok(18) => msg.links.push(r.read_message::<WireLink>(bytes)?),
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}

impl MessageWrite for WireNode<'_> {
    fn get_size(&self) -> usize {
        self.links
            .iter()
            .map(|l| 1 + sizeof_len(l.get_size()))
            .sum::<usize>()
            + self.data.map_or(0, |d| 1 + sizeof_len(d.len()))
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> quick_protobuf::Result<()> {
        for link in &self.links {
            w.write_with_tag(18, |w| w.write_message(link))?;
        }
        if let Some(data) = self.data {
            w.write_with_tag(10, |w| w.write_bytes(data))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::BTreeMap;

    fn cid1() -> Cid {
        Cid::new_v1(RAW, *cid3().hash())
    }
    fn cid2() -> Cid {
        "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi"
            .parse()
            .unwrap()
    }
    fn cid3() -> Cid {
        "bafyreihixenvk3ahqbytas4hk4a26w43bh6eo3w6usjqtxkpzsvi655a3m"
            .parse()
            .unwrap()
    }

    #[test]
    fn test_raw_has_no_links() {
        let node = decode(&cid1(), b"hello").unwrap();
        assert_eq!(node, DecodedNode::Raw);
        assert!(node.links().is_empty());
    }

    #[test]
    fn test_dag_pb_links_keep_order_and_sizes() {
        let links = vec![
            PbLink {
                cid: cid1(),
                name: Some("a".to_string()),
                size: Some(10),
            },
            PbLink {
                cid: cid3(),
                name: None,
                size: None,
            },
        ];
        let bytes = encode_dag_pb(&links, Some(&[0x08, 0x01])).unwrap();

        let DecodedNode::DagPb(node) = decode(&cid2(), &bytes).unwrap() else {
            panic!("expected a dag-pb node");
        };
        assert_eq!(node.links, links);
        assert_eq!(node.data.as_deref(), Some(&[0x08, 0x01][..]));
        assert_eq!(node.encoded_len, bytes.len());
    }

    #[test]
    fn test_dag_pb_garbage_fails() {
        let err = decode(&cid2(), &[0xff, 0xff, 0xff]).unwrap_err();
        assert!(matches!(err, DecodeError::DagPb { .. }));
    }

    #[test]
    fn test_dag_cbor_links_depth_first_by_key() {
        let mut inner = BTreeMap::new();
        inner.insert("x".to_string(), Ipld::Link(cid2()));
        let mut outer = BTreeMap::new();
        outer.insert("a".to_string(), Ipld::Link(cid1()));
        outer.insert("b".to_string(), Ipld::List(vec![Ipld::Map(inner), Ipld::Integer(3)]));
        outer.insert("c".to_string(), Ipld::Link(cid1()));
        let bytes = serde_ipld_dagcbor::to_vec(&Ipld::Map(outer)).unwrap();

        let node = decode(&cid3(), &bytes).unwrap();
        assert_eq!(node.links(), vec![cid1(), cid2(), cid1()]);
    }

    #[test]
    fn test_unknown_codec_is_unsupported() {
        let json = Cid::new_v1(0x0129, *cid1().hash());
        let err = decode(&json, b"{}").unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedCodec(c) if c == json));
    }
}
