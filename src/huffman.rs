//! Huffman coding of the string table's byte alphabet.
//!
//! The tree is built the same way as the reference implementation: start
//! from 256 singleton candidates linked in a list, repeatedly merge the two
//! smallest-frequency survivors into a parent, until one root remains. Nodes
//! live in an arena (`Vec<Node>`) and are addressed by index rather than by
//! pointer; the doubly-linked candidate list is threaded through `prev`/
//! `next` indices into that same arena.
//!
//! Each letter's code is assigned by walking the tree with a sentinel-seeded
//! [`Bitmap`] path exactly as the reference implementation does: start at
//! `0b1`, and at each edge left-shift the whole bitmap and set or clear bit
//! zero for the branch taken. The sentinel bit ends up one position past the
//! code's significant bits, which is what lets a serialized dictionary entry
//! recover a code's length from its bit pattern alone.

use crate::bitmap::Bitmap;
use crate::error::{Error, Result};
use crate::format;
use crate::mem::MemFile;

const ALPHABET: usize = 256;

/// Upper bound on a single code's depth: with at most 256 leaves a Huffman
/// tree is never deeper than 255 edges, so a 256-bit path (255 edges plus
/// the sentinel) always has room.
const MAX_PATH_BITS: usize = 256;

#[derive(Debug, Clone)]
struct Node {
    freq: u64,
    letter: Option<u8>,
    left: Option<usize>,
    right: Option<usize>,
    prev: Option<usize>,
    next: Option<usize>,
}

impl Node {
    fn leaf(letter: u8, freq: u64) -> Self {
        Node { freq, letter: Some(letter), left: None, right: None, prev: None, next: None }
    }

    fn internal(freq: u64, left: usize, right: usize) -> Self {
        Node { freq, letter: None, left: Some(left), right: Some(right), prev: None, next: None }
    }
}

/// One letter's entry in a built table: the byte it represents and its
/// prefix-free code, written most-significant (root edge) bit first.
#[derive(Debug, Clone)]
pub struct Entry {
    pub letter: u8,
    pub code: Vec<bool>,
}

/// Walk a path of `depth` root-to-leaf edges into a sentinel-seeded
/// [`Bitmap`]: start at `0b1`, then for each edge left-shift and set bit
/// zero to the edge taken (`true` for right, `false` for left).
fn path_bitmap(code: &[bool]) -> Bitmap {
    let mut bm = Bitmap::new(MAX_PATH_BITS);
    bm.set(0, true);
    for &bit in code {
        bm.lshift();
        bm.set(0, bit);
    }
    bm
}

/// Recover the root-first edge sequence from a [`path_bitmap`]-style bitmap
/// whose highest set bit is the sentinel at position `depth`.
fn bitmap_path(bm: &Bitmap, depth: usize) -> Vec<bool> {
    (0..depth).rev().map(|i| bm.get(i)).collect()
}

/// Serialize one dictionary entry: marker, letter, then the code's path
/// bitmap written as the smallest run of big-endian bytes that still
/// contains every significant bit (the code itself plus its sentinel).
pub fn write_entry(dst: &mut MemFile, entry: &Entry) -> Result<()> {
    let depth = entry.code.len();
    let bm = path_bitmap(&entry.code);
    let total_bits = depth + 1;
    let nbytes_prefix = total_bits.div_ceil(8);
    let be_bytes = blocks_to_be_bytes(&bm.blocks_reversed());
    let prefix = &be_bytes[be_bytes.len() - nbytes_prefix..];
    dst.write(&[format::MARKER_HUFFMAN_DICT_ENTRY, entry.letter, nbytes_prefix as u8])?;
    dst.write(prefix)?;
    Ok(())
}

/// Deserialize one dictionary entry written by [`write_entry`].
pub fn read_entry(src: &mut MemFile) -> Result<Entry> {
    let marker = src.read(1)?[0];
    if marker != format::MARKER_HUFFMAN_DICT_ENTRY {
        return Err(Error::Corrupted { expected: format::MARKER_HUFFMAN_DICT_ENTRY, found: marker });
    }
    let letter = src.read(1)?[0];
    let nbytes_prefix = src.read(1)?[0] as usize;
    let prefix = src.read(nbytes_prefix)?;
    let mut bits = Vec::with_capacity(nbytes_prefix * 8);
    for &byte in prefix {
        for i in (0..8).rev() {
            bits.push((byte >> i) & 1 != 0);
        }
    }
    let sentinel_pos = bits.iter().position(|&b| b).ok_or(Error::DecompressFailed)?;
    let code = bits[sentinel_pos + 1..].to_vec();
    Ok(Entry { letter, code })
}

fn blocks_to_be_bytes(blocks: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(blocks.len() * 4);
    for b in blocks {
        out.extend_from_slice(&b.to_be_bytes());
    }
    out
}

/// A decode trie node, also arena-indexed.
#[derive(Debug, Clone, Copy, Default)]
struct DecodeNode {
    left: Option<usize>,
    right: Option<usize>,
    letter: Option<u8>,
}

/// A built Huffman code table plus the decode trie derived from it.
#[derive(Debug, Clone)]
pub struct HuffmanTable {
    entries: Vec<Entry>,
    decode_trie: Vec<DecodeNode>,
}

impl HuffmanTable {
    /// Build a table from the byte frequencies observed across `corpus`
    /// (typically the concatenation of every string destined for the
    /// string table).
    pub fn build(corpus: &[&str]) -> Result<Self> {
        let mut freq = [0u64; ALPHABET];
        for s in corpus {
            for &b in s.as_bytes() {
                freq[b as usize] += 1;
            }
        }
        Self::from_frequencies(&freq)
    }

    fn from_frequencies(freq: &[u64; ALPHABET]) -> Result<Self> {
        let mut arena: Vec<Node> = (0..ALPHABET).map(|i| Node::leaf(i as u8, freq[i])).collect();
        for i in 0..ALPHABET {
            arena[i].prev = if i > 0 { Some(i - 1) } else { None };
            arena[i].next = if i + 1 < ALPHABET { Some(i + 1) } else { None };
        }

        let Some(mut handle) = trim_zero_freq(&mut arena) else {
            return Err(Error::IllegalState("huffman corpus is empty"));
        };

        let root = loop {
            if next_of(&arena, handle).is_none() {
                break handle;
            }
            let smallest = find_smallest(&arena, handle, 0, None)
                .ok_or(Error::IllegalState("huffman: no smallest candidate"))?;
            let small = find_smallest(&arena, handle, arena[smallest].freq, Some(smallest))
                .ok_or(Error::IllegalState("huffman: no second candidate"))?;

            let new_freq = arena[small].freq + arena[smallest].freq;
            let new_idx = arena.len();
            arena.push(Node::internal(new_freq, small, smallest));

            let small_isolated_pair = prev_of(&arena, small).is_none()
                && next_of(&arena, smallest).is_none()
                && next_of(&arena, small) == Some(smallest);
            let smallest_isolated_pair = prev_of(&arena, smallest).is_none()
                && next_of(&arena, small).is_none()
                && next_of(&arena, smallest) == Some(small);
            if small_isolated_pair || smallest_isolated_pair {
                break new_idx;
            }

            unlink(&mut arena, smallest);
            unlink(&mut arena, small);

            let new_handle = if let Some(p) = prev_of(&arena, small) {
                seek_to_begin(&arena, p)
            } else if let Some(p) = prev_of(&arena, smallest) {
                seek_to_begin(&arena, p)
            } else if let Some(n) = next_of(&arena, small) {
                seek_to_begin(&arena, n)
            } else if let Some(n) = next_of(&arena, smallest) {
                seek_to_begin(&arena, n)
            } else {
                new_idx
            };

            let end = seek_to_end(&arena, new_handle);
            arena[end].next = Some(new_idx);
            arena[new_idx].prev = Some(end);
            arena[new_idx].next = None;
            handle = new_handle;
        };

        let mut entries = Vec::new();
        let root_path = if arena[root].left.is_none() && arena[root].right.is_none() {
            // Corpus used exactly one distinct byte: no merges ever ran, so the
            // "tree" is a single leaf. Give it a 1-bit code rather than none.
            vec![false]
        } else {
            Vec::new()
        };
        assign_codes(&arena, root, root_path, &mut entries);
        entries.sort_by_key(|e| e.letter);

        let decode_trie = build_decode_trie(&entries);
        Ok(HuffmanTable { entries, decode_trie })
    }

    /// Reconstruct a table (and its decode trie) from an already-decoded
    /// list of entries, as read back from a serialized dictionary.
    pub fn from_entries(entries: Vec<Entry>) -> Result<Self> {
        let decode_trie = build_decode_trie(&entries);
        Ok(HuffmanTable { entries, decode_trie })
    }

    /// Look up the code for one byte.
    pub fn code_for(&self, byte: u8) -> Result<&[bool]> {
        self.entries
            .iter()
            .find(|e| e.letter == byte)
            .map(|e| e.code.as_slice())
            .ok_or(Error::HuffmanNoEntry(byte))
    }

    /// Encode `s` as a sequence of bits into `file`, which must already be
    /// in bit mode. Returns the number of bits written.
    pub fn encode_str(&self, file: &mut MemFile, s: &str) -> Result<usize> {
        let mut nbits = 0;
        for &b in s.as_bytes() {
            for &bit in self.code_for(b)? {
                file.write_bit(bit)?;
                nbits += 1;
            }
        }
        Ok(nbits)
    }

    /// Decode from `file` (already in bit mode) until exactly `num_bytes`
    /// decoded bytes have been produced. There's no stored bit count: the
    /// decoded length is what bounds the read, since each full codeword
    /// walk down the trie always lands on exactly one letter.
    pub fn decode_str(&self, file: &mut MemFile, num_bytes: usize) -> Result<String> {
        let mut out = Vec::with_capacity(num_bytes);
        let mut cur = 0usize;
        while out.len() < num_bytes {
            let bit = file.read_bit()?;
            cur = if bit {
                self.decode_trie[cur].right
            } else {
                self.decode_trie[cur].left
            }
            .ok_or(Error::DecompressFailed)?;
            if let Some(letter) = self.decode_trie[cur].letter {
                out.push(letter);
                cur = 0;
            }
        }
        String::from_utf8(out).map_err(|_| Error::DecompressFailed)
    }

    /// All entries, sorted by letter value.
    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }
}

fn build_decode_trie(entries: &[Entry]) -> Vec<DecodeNode> {
    let mut trie = vec![DecodeNode::default()];
    for entry in entries {
        let mut cur = 0usize;
        for &bit in &entry.code {
            let next = if bit { trie[cur].right } else { trie[cur].left };
            let next = next.unwrap_or_else(|| {
                trie.push(DecodeNode::default());
                let idx = trie.len() - 1;
                if bit {
                    trie[cur].right = Some(idx);
                } else {
                    trie[cur].left = Some(idx);
                }
                idx
            });
            cur = next;
        }
        trie[cur].letter = Some(entry.letter);
    }
    trie
}

fn next_of(arena: &[Node], i: usize) -> Option<usize> {
    arena[i].next
}
fn prev_of(arena: &[Node], i: usize) -> Option<usize> {
    arena[i].prev
}

fn unlink(arena: &mut [Node], i: usize) {
    let prev = arena[i].prev;
    let next = arena[i].next;
    if let Some(p) = prev {
        arena[p].next = next;
    }
    if let Some(n) = next {
        arena[n].prev = prev;
    }
}

fn seek_to_begin(arena: &[Node], mut i: usize) -> usize {
    while let Some(p) = arena[i].prev {
        i = p;
    }
    i
}

fn seek_to_end(arena: &[Node], mut i: usize) -> usize {
    while let Some(n) = arena[i].next {
        i = n;
    }
    i
}

/// Drop every zero-frequency candidate from the initial list and return the
/// index of the first survivor, or `None` if the corpus was empty.
fn trim_zero_freq(arena: &mut [Node]) -> Option<usize> {
    let mut begin = None;
    let mut i = 0usize;
    loop {
        if arena[i].freq == 0 {
            unlink(arena, i);
        } else if begin.is_none() {
            begin = Some(i);
        }
        match arena[i].next {
            Some(n) => i = n,
            None => break,
        }
    }
    begin
}

/// Smallest-frequency node reachable from `begin` with `freq >= lower_bound`,
/// excluding `skip`.
fn find_smallest(arena: &[Node], begin: usize, lower_bound: u64, skip: Option<usize>) -> Option<usize> {
    let mut smallest = u64::MAX;
    let mut result = None;
    let mut it = Some(begin);
    while let Some(i) = it {
        if Some(i) != skip && arena[i].freq >= lower_bound && arena[i].freq <= smallest {
            smallest = arena[i].freq;
            result = Some(i);
        }
        it = arena[i].next;
    }
    result
}

fn assign_codes(arena: &[Node], node: usize, path: Vec<bool>, out: &mut Vec<Entry>) {
    match (arena[node].left, arena[node].right) {
        (None, None) => {
            if let Some(letter) = arena[node].letter {
                // Re-derive the code through a sentinel-seeded bitmap walk
                // rather than trusting `path` directly, so the bit order a
                // serialized dictionary entry expects is exercised here too.
                let bm = path_bitmap(&path);
                let code = bitmap_path(&bm, path.len());
                out.push(Entry { letter, code });
            }
        }
        (left, right) => {
            if let Some(l) = left {
                let mut p = path.clone();
                p.push(false);
                assign_codes(arena, l, p, out);
            }
            if let Some(r) = right {
                let mut p = path;
                p.push(true);
                assign_codes(arena, r, p, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::{MemBlock, file::Mode};

    #[test]
    fn builds_prefix_free_codes() {
        let table = HuffmanTable::build(&["aaaabbbccd"]).unwrap();
        let mut codes: Vec<_> = table.entries().iter().map(|e| e.code.clone()).collect();
        codes.sort();
        for i in 0..codes.len() {
            for j in 0..codes.len() {
                if i != j {
                    assert!(!codes[j].starts_with(&codes[i][..]));
                }
            }
        }
    }

    #[test]
    fn encode_decode_round_trip() {
        let corpus = ["hello", "world", "hello"];
        let table = HuffmanTable::build(&corpus).unwrap();
        let mut file = MemFile::open(MemBlock::new(0), Mode::ReadWrite);
        file.begin_bit_mode();
        table.encode_str(&mut file, "hello").unwrap();
        file.end_bit_mode().unwrap();

        file.rewind().unwrap();
        file.begin_bit_mode();
        let decoded = table.decode_str(&mut file, "hello".len()).unwrap();
        assert_eq!(decoded, "hello");
    }

    #[test]
    fn single_distinct_letter_gets_a_code() {
        let table = HuffmanTable::build(&["aaaa"]).unwrap();
        assert_eq!(table.entries().len(), 1);
        assert!(!table.code_for(b'a').unwrap().is_empty());
    }
}
