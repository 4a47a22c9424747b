//! Binary packing of node trees into fixed-size cells.
//!
//! A record is one array of 4-byte little-endian cells shared by two
//! streams:
//!
//! ```text
//! cell 0                                                   last byte
//! | key | value | key | time | key | ...   ...  | txt | S | txt | S |
//! forward stream grows up  -->        <--  backward stream grows down
//! ```
//!
//! Per node, in order:
//!
//! - forward: the key cell
//! - forward: one value cell if the key is numeric (Int, Float, Date)
//! - backward: one structural byte (`DOWN`, `RIGHT`, `TIME` bits)
//! - backward: the text, NUL-terminated, if the key is Text
//! - forward: a timestamp cell if `TIME` is set
//!
//! then the node's right column, then its down sibling. A node only carries
//! a timestamp cell when its stamp differs from the baseline it inherits;
//! right children inherit their parent's stamp, down siblings share the
//! parent column's baseline. [`size_tree`] walks the tree once with the same
//! rule so [`encode`] can allocate the exact record up front.

use crate::error::{CodecError, Result, StoreError};
use crate::key::{Key, KeyKind};
use crate::tree::{NodeId, NodePool, Tree, Value};

/// Size of one cell in bytes.
pub const CELL_SIZE: usize = 4;

const DOWN: u8 = 1;
const RIGHT: u8 = 2;
const TIME: u8 = 4;
const KNOWN_BITS: u8 = DOWN | RIGHT | TIME;

/// Default deepest right-nesting accepted.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Output of the sizing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackSize {
    /// Forward cells (keys, values, timestamps)
    pub cells: usize,
    /// Backward bytes (structural bytes and text)
    pub bytes: usize,
}

impl PackSize {
    /// Cells needed to hold both streams.
    pub fn total_cells(&self) -> usize {
        self.cells + self.bytes.div_ceil(CELL_SIZE)
    }

    /// Record length in bytes.
    pub fn record_len(&self) -> usize {
        self.total_cells() * CELL_SIZE
    }
}

/// Bounds applied while packing and unpacking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecLimits {
    /// Deepest right-nesting accepted
    pub max_depth: usize,
    /// Node limit of the decoded tree's pool
    pub max_nodes: Option<usize>,
}

impl Default for CodecLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_nodes: None,
        }
    }
}

/// Predict the forward cells and backward bytes needed to encode `tree`.
///
/// # Errors
///
/// Returns [`CodecError::TooDeep`] past the default nesting limit.
pub fn size_tree(tree: &Tree, baseline: u32) -> Result<PackSize> {
    size_tree_with(tree, baseline, &CodecLimits::default())
}

/// [`size_tree`] with explicit limits.
pub fn size_tree_with(tree: &Tree, baseline: u32, limits: &CodecLimits) -> Result<PackSize> {
    let mut size = PackSize::default();
    size_column(tree, tree.root(), baseline, 0, limits.max_depth, &mut size)?;
    Ok(size)
}

fn size_column(
    tree: &Tree,
    first: NodeId,
    baseline: u32,
    depth: usize,
    max_depth: usize,
    size: &mut PackSize,
) -> Result<()> {
    if depth > max_depth {
        return Err(CodecError::TooDeep { limit: max_depth }.into());
    }
    for id in tree.column(Some(first)) {
        let node = tree.node(id);
        size.cells += 1;
        size.bytes += 1;
        match node.key().kind() {
            KeyKind::Int | KeyKind::Float | KeyKind::Date => size.cells += 1,
            KeyKind::Text => size.bytes += node.value().text_len() + 1,
            KeyKind::KeyRef | KeyKind::Tag => {}
        }
        if node.stamp() != baseline {
            size.cells += 1;
        }
        if let Some(right) = node.right() {
            size_column(tree, right, node.stamp(), depth + 1, max_depth, size)?;
        }
    }
    Ok(())
}

/// Encode `tree` against `baseline`.
///
/// # Errors
///
/// Returns [`CodecError::NulInText`] for text holding a NUL byte,
/// [`CodecError::TooDeep`] past the nesting limit, and
/// [`StoreError::StorageCorruption`] if the sizing pass and the encoder
/// disagree.
pub fn encode(tree: &Tree, baseline: u32) -> Result<Vec<u8>> {
    encode_with_stats(tree, baseline).map(|(record, _)| record)
}

/// Encode and report the forward cells and backward bytes consumed.
pub fn encode_with_stats(tree: &Tree, baseline: u32) -> Result<(Vec<u8>, PackSize)> {
    encode_with(tree, baseline, &CodecLimits::default())
}

/// Encode with explicit limits.
pub fn encode_with(
    tree: &Tree,
    baseline: u32,
    limits: &CodecLimits,
) -> Result<(Vec<u8>, PackSize)> {
    let predicted = size_tree_with(tree, baseline, limits)?;
    let mut packer = Packer {
        buf: vec![0; predicted.record_len()],
        used: PackSize::default(),
        root_key: tree.root_key(),
    };
    packer.column(tree, tree.root(), baseline)?;
    if packer.used != predicted {
        return Err(StoreError::corruption(
            tree.root_key(),
            format!(
                "sizing predicted {predicted:?} but encoding consumed {:?}",
                packer.used
            ),
        ));
    }
    Ok((packer.buf, packer.used))
}

struct Packer {
    buf: Vec<u8>,
    used: PackSize,
    root_key: Key,
}

impl Packer {
    fn overflow(&self) -> StoreError {
        StoreError::corruption(self.root_key, "encoding overran the sized record")
    }

    fn cell(&mut self, raw: u32) -> Result<()> {
        let start = self.used.cells * CELL_SIZE;
        if start + CELL_SIZE > self.buf.len() - self.used.bytes {
            return Err(self.overflow());
        }
        self.buf[start..start + CELL_SIZE].copy_from_slice(&raw.to_le_bytes());
        self.used.cells += 1;
        Ok(())
    }

    fn byte(&mut self, byte: u8) -> Result<()> {
        let floor = self.used.cells * CELL_SIZE;
        if self.buf.len() - self.used.bytes <= floor {
            return Err(self.overflow());
        }
        let pos = self.buf.len() - 1 - self.used.bytes;
        self.buf[pos] = byte;
        self.used.bytes += 1;
        Ok(())
    }

    fn column(&mut self, tree: &Tree, first: NodeId, baseline: u32) -> Result<()> {
        for id in tree.column(Some(first)) {
            let node = tree.node(id);
            let key = node.key();
            self.cell(key.raw())?;

            match (key.kind(), node.value()) {
                (KeyKind::Int, Value::Int(v)) => self.cell(u32::from_le_bytes(v.to_le_bytes()))?,
                (KeyKind::Float, Value::Float(v)) => self.cell(v.to_bits())?,
                (KeyKind::Date, Value::Date(v)) => self.cell(*v)?,
                (KeyKind::Int | KeyKind::Float | KeyKind::Date, _) => {
                    return Err(StoreError::corruption(
                        self.root_key,
                        format!("node {key} carries a value of the wrong shape"),
                    ));
                }
                _ => {}
            }

            let mut structure = 0;
            if node.down().is_some() {
                structure |= DOWN;
            }
            if node.right().is_some() {
                structure |= RIGHT;
            }
            if node.stamp() != baseline {
                structure |= TIME;
            }
            self.byte(structure)?;

            if key.kind() == KeyKind::Text {
                let text = node.value().as_text().unwrap_or("");
                if text.as_bytes().contains(&0) {
                    return Err(CodecError::NulInText.into());
                }
                for &b in text.as_bytes() {
                    self.byte(b)?;
                }
                self.byte(0)?;
            }

            if structure & TIME != 0 {
                self.cell(node.stamp())?;
            }
            if let Some(right) = node.right() {
                self.column(tree, right, node.stamp())?;
            }
        }
        Ok(())
    }
}

/// Decode a record into a tree rooted at `root_key`.
///
/// An empty record yields a root-only tree stamped with `baseline`.
///
/// # Errors
///
/// Returns a [`CodecError`] for malformed input; nothing from the record is
/// trusted without a bounds check.
pub fn decode(bytes: &[u8], root_key: Key, baseline: u32) -> Result<Tree> {
    decode_with(bytes, root_key, baseline, &CodecLimits::default())
}

/// [`decode`] with explicit limits.
pub fn decode_with(
    bytes: &[u8],
    root_key: Key,
    baseline: u32,
    limits: &CodecLimits,
) -> Result<Tree> {
    if bytes.is_empty() {
        return Tree::new(root_key, baseline, limits.max_nodes);
    }
    if bytes.len() % CELL_SIZE != 0 {
        return Err(CodecError::Misaligned { len: bytes.len() }.into());
    }

    let mut unpacker = Unpacker {
        data: bytes,
        used: PackSize::default(),
        pool: NodePool::new(limits.max_nodes),
        max_depth: limits.max_depth,
    };
    let (root, structure) = unpacker.node(baseline)?;
    let found = unpacker.pool[root].key();
    if found != root_key {
        return Err(CodecError::RootMismatch {
            expected: root_key,
            found,
        }
        .into());
    }
    if structure & DOWN != 0 {
        return Err(CodecError::BadStructure(structure).into());
    }
    unpacker.descend(root, structure, 0)?;
    Ok(Tree::from_parts(unpacker.pool, root))
}

struct Unpacker<'a> {
    data: &'a [u8],
    used: PackSize,
    pool: NodePool,
    max_depth: usize,
}

impl Unpacker<'_> {
    fn cell(&mut self) -> Result<u32> {
        let start = self.used.cells * CELL_SIZE;
        if start + CELL_SIZE > self.data.len() - self.used.bytes {
            return Err(CodecError::Truncated {
                cell: self.used.cells,
            }
            .into());
        }
        let mut raw = [0u8; CELL_SIZE];
        raw.copy_from_slice(&self.data[start..start + CELL_SIZE]);
        self.used.cells += 1;
        Ok(u32::from_le_bytes(raw))
    }

    fn byte(&mut self) -> Result<u8> {
        let floor = self.used.cells * CELL_SIZE;
        if self.data.len() - self.used.bytes <= floor {
            return Err(CodecError::Overlap {
                byte: self.data.len() - self.used.bytes,
            }
            .into());
        }
        let pos = self.data.len() - 1 - self.used.bytes;
        self.used.bytes += 1;
        Ok(self.data[pos])
    }

    fn text(&mut self) -> Result<Value> {
        let mut bytes = Vec::new();
        loop {
            match self.byte()? {
                0 => break,
                b => bytes.push(b),
            }
        }
        if bytes.is_empty() {
            return Ok(Value::None);
        }
        String::from_utf8(bytes)
            .map(Value::Text)
            .map_err(|_| CodecError::InvalidText.into())
    }

    /// Read one node (not its links) and return it with its structural byte.
    fn node(&mut self, baseline: u32) -> Result<(NodeId, u8)> {
        let key = Key::from_raw(self.cell()?);
        let mut value = match key.kind() {
            KeyKind::Int => Value::Int(i32::from_le_bytes(self.cell()?.to_le_bytes())),
            KeyKind::Float => Value::Float(f32::from_bits(self.cell()?)),
            KeyKind::Date => Value::Date(self.cell()?),
            KeyKind::Text | KeyKind::KeyRef | KeyKind::Tag => Value::None,
        };
        let structure = self.byte()?;
        if structure & !KNOWN_BITS != 0 {
            return Err(CodecError::BadStructure(structure).into());
        }
        if key.kind() == KeyKind::Text {
            value = self.text()?;
        }
        let stamp = if structure & TIME != 0 {
            self.cell()?
        } else {
            baseline
        };
        let id = self.pool.alloc(key, value, stamp)?;
        Ok((id, structure))
    }

    /// Decode a column; down links iteratively, right links recursively.
    fn column(&mut self, baseline: u32, depth: usize) -> Result<NodeId> {
        if depth > self.max_depth {
            return Err(CodecError::TooDeep {
                limit: self.max_depth,
            }
            .into());
        }
        let (first, mut structure) = self.node(baseline)?;
        self.descend(first, structure, depth)?;
        let mut prev = first;
        while structure & DOWN != 0 {
            let (id, next) = self.node(baseline)?;
            self.pool[prev].down = Some(id);
            self.pool[id].up = Some(prev);
            self.descend(id, next, depth)?;
            prev = id;
            structure = next;
        }
        Ok(first)
    }

    fn descend(&mut self, id: NodeId, structure: u8, depth: usize) -> Result<()> {
        if structure & RIGHT != 0 {
            let stamp = self.pool[id].stamp();
            let child = self.column(stamp, depth + 1)?;
            self.pool[id].right = Some(child);
            self.pool[child].up = Some(id);
        }
        Ok(())
    }
}
