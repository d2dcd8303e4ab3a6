//! Test helpers: hand-laid index images and sample record types.
//!
//! `IndexImage` writes node pages directly in the on-disk layout so tests can
//! build well-formed and deliberately broken indexes alike.

#![allow(clippy::cast_possible_truncation)]

use std::path::Path;

use crate::btree::{EMPTY_CHAIN, NodeType};
use crate::page::{
    COUNT_OFFSET, DATA_OFFSET, NEXT_PAGE_OFFSET, PAGE_SIZE, Page, PageId, ROOT_POINTER_SIZE,
};

/// Lay out a head+tail leaf page.
pub fn leaf_page<K: AsRef<[u8]>>(entries: &[(K, PageId, PageId)]) -> Page {
    let mut page = node_page(NodeType::Leaf, entries.len());
    let mut offset = DATA_OFFSET;
    for (key, head, tail) in entries {
        offset = write_key(&mut page, offset, key.as_ref());
        page.write_u64(offset, *head);
        page.write_u64(offset + 8, *tail);
        offset += 16;
    }
    page
}

/// Lay out a legacy head-only leaf page.
pub fn leaf_page_head_only<K: AsRef<[u8]>>(entries: &[(K, PageId)]) -> Page {
    let mut page = node_page(NodeType::Leaf, entries.len());
    let mut offset = DATA_OFFSET;
    for (key, head) in entries {
        offset = write_key(&mut page, offset, key.as_ref());
        page.write_u64(offset, *head);
        offset += 8;
    }
    page
}

/// Lay out an internal page.
pub fn internal_page<K: AsRef<[u8]>>(leftmost: PageId, entries: &[(K, PageId)]) -> Page {
    let mut page = node_page(NodeType::Internal, entries.len());
    page.write_u64(DATA_OFFSET, leftmost);
    let mut offset = DATA_OFFSET + 8;
    for (key, right) in entries {
        offset = write_key(&mut page, offset, key.as_ref());
        page.write_u64(offset, *right);
        offset += 8;
    }
    page
}

/// Lay out an overflow page with a raw continuation value.
pub fn overflow_page<V: AsRef<[u8]>>(values: &[V], next: i64) -> Page {
    let mut page = node_page(NodeType::Overflow, values.len());
    let mut offset = DATA_OFFSET;
    for value in values {
        offset = write_key(&mut page, offset, value.as_ref());
    }
    assert!(
        offset <= NEXT_PAGE_OFFSET,
        "overflow values overlap trailer"
    );
    page.write_i64(NEXT_PAGE_OFFSET, next);
    page
}

fn node_page(node_type: NodeType, count: usize) -> Page {
    let mut page = Page::new();
    page.write_u8(0, node_type as u8);
    page.write_u32(COUNT_OFFSET, count as u32);
    page
}

/// Write a length-prefixed byte string, returning the offset after it.
fn write_key(page: &mut Page, offset: usize, bytes: &[u8]) -> usize {
    page.write_u32(offset, bytes.len() as u32);
    page.write_bytes(offset + 4, bytes);
    offset + 4 + bytes.len()
}

/// An index object under construction, one page at a time.
///
/// Page 0 is reserved: its first bytes hold the root pointer.
#[derive(Debug)]
pub struct IndexImage {
    pages: Vec<Page>,
}

impl IndexImage {
    pub fn new() -> Self {
        Self {
            pages: vec![Page::new()],
        }
    }

    /// The page ID the next pushed page will get.
    pub fn next_page_id(&self) -> PageId {
        self.pages.len() as PageId
    }

    pub fn push_page(&mut self, page: Page) -> PageId {
        let id = self.next_page_id();
        self.pages.push(page);
        id
    }

    pub fn push_leaf<K: AsRef<[u8]>>(&mut self, entries: &[(K, PageId, PageId)]) -> PageId {
        self.push_page(leaf_page(entries))
    }

    pub fn push_leaf_head_only<K: AsRef<[u8]>>(&mut self, entries: &[(K, PageId)]) -> PageId {
        self.push_page(leaf_page_head_only(entries))
    }

    pub fn push_internal<K: AsRef<[u8]>>(
        &mut self,
        leftmost: PageId,
        entries: &[(K, PageId)],
    ) -> PageId {
        self.push_page(internal_page(leftmost, entries))
    }

    pub fn push_overflow<V: AsRef<[u8]>>(&mut self, values: &[V], next: i64) -> PageId {
        self.push_page(overflow_page(values, next))
    }

    /// Pack `values` into consecutive overflow pages. Returns (head, tail).
    pub fn push_chain<V: AsRef<[u8]>>(&mut self, values: &[V]) -> (PageId, PageId) {
        if values.is_empty() {
            return (EMPTY_CHAIN, EMPTY_CHAIN);
        }

        let mut groups: Vec<Vec<&[u8]>> = vec![Vec::new()];
        let mut used = DATA_OFFSET;
        for value in values {
            let value = value.as_ref();
            let needed = 4 + value.len();
            let current = groups.last_mut().expect("at least one group");
            if used + needed > NEXT_PAGE_OFFSET && !current.is_empty() {
                groups.push(Vec::new());
                used = DATA_OFFSET;
            }
            groups.last_mut().expect("at least one group").push(value);
            used += needed;
        }

        let head = self.next_page_id();
        let last = groups.len() - 1;
        for (i, group) in groups.iter().enumerate() {
            let next = if i == last {
                crate::page::END_OF_CHAIN
            } else {
                (head + i as u64 + 1) as i64
            };
            self.push_overflow(group, next);
        }
        (head, head + last as u64)
    }

    /// Serialize with `root` in the root pointer slot.
    pub fn to_bytes(&self, root: PageId) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pages.len() * PAGE_SIZE);
        for page in &self.pages {
            bytes.extend_from_slice(page.as_bytes());
        }
        bytes[..ROOT_POINTER_SIZE].copy_from_slice(&root.to_be_bytes());
        bytes
    }

    pub fn write_to(&self, path: &Path, root: PageId) -> std::io::Result<()> {
        std::fs::write(path, self.to_bytes(root))
    }
}

/// Build a complete tree over sorted, unique keys with at most `fanout`
/// entries per node. Returns the image and its root page.
pub fn build_tree(entries: &[(Vec<u8>, Vec<Vec<u8>>)], fanout: usize) -> (IndexImage, PageId) {
    assert!(fanout >= 2, "fanout must allow a separator");
    let mut image = IndexImage::new();

    let chains: Vec<(PageId, PageId)> = entries
        .iter()
        .map(|(_, values)| image.push_chain(values))
        .collect();

    // (first key under the node, node page)
    let mut level: Vec<(Vec<u8>, PageId)> = entries
        .chunks(fanout)
        .zip(chains.chunks(fanout))
        .map(|(keys, chains)| {
            let leaf: Vec<(&[u8], PageId, PageId)> = keys
                .iter()
                .zip(chains)
                .map(|((key, _), (head, tail))| (key.as_slice(), *head, *tail))
                .collect();
            let first = keys.first().map(|(k, _)| k.clone()).unwrap_or_default();
            (first, image.push_leaf(&leaf))
        })
        .collect();

    if level.is_empty() {
        let root = image.push_leaf::<&[u8]>(&[]);
        return (image, root);
    }

    while level.len() > 1 {
        level = level
            .chunks(fanout)
            .map(|group| {
                if group.len() == 1 {
                    return group[0].clone();
                }
                let separators: Vec<(&[u8], PageId)> = group[1..]
                    .iter()
                    .map(|(key, page)| (key.as_slice(), *page))
                    .collect();
                (group[0].0.clone(), image.push_internal(group[0].1, &separators))
            })
            .collect();
    }

    let root = level[0].1;
    (image, root)
}

/// Sample stream header record.
#[derive(Clone, PartialEq, prost::Message)]
pub struct StreamHeader {
    #[prost(string, tag = "1")]
    pub source: String,
    #[prost(int64, tag = "2")]
    pub created_at_ms: i64,
}

/// Sample payload record: one instrument's prices.
#[derive(Clone, PartialEq, prost::Message)]
pub struct PriceEntity {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(double, repeated, tag = "2")]
    pub prices: Vec<f64>,
    #[prost(string, tag = "3")]
    pub currency: String,
}

impl PriceEntity {
    pub fn new(name: &str, prices: &[f64]) -> Self {
        Self {
            name: name.to_string(),
            prices: prices.to_vec(),
            currency: "USD".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::{LeafLayout, LeafNode, OverflowPage};

    #[test]
    fn test_push_chain_links_pages() {
        let values: Vec<Vec<u8>> = (0..1000u64).map(|i| i.to_be_bytes().to_vec()).collect();
        let mut image = IndexImage::new();
        let (head, tail) = image.push_chain(&values);
        assert_eq!(head, 1);
        assert!(tail > head);

        let mut collected = Vec::new();
        let mut next = Some(head);
        while let Some(id) = next {
            let page = &image.pages[id as usize];
            let overflow = OverflowPage::from_page(page).expect("overflow");
            collected.extend(overflow.values);
            next = overflow.next;
            if next.is_none() {
                assert_eq!(id, tail);
            }
        }
        assert_eq!(collected, values);
    }

    #[test]
    fn test_to_bytes_writes_root_slot() {
        let mut image = IndexImage::new();
        let leaf = image.push_leaf(&[("k", 1, 1)]);
        let bytes = image.to_bytes(leaf);
        assert_eq!(bytes.len(), 2 * PAGE_SIZE);
        assert_eq!(&bytes[..8], &1u64.to_be_bytes());

        let page = Page::from_prefix(&bytes[PAGE_SIZE..]);
        let node = LeafNode::from_page(&page, LeafLayout::HeadAndTail).expect("leaf");
        assert_eq!(node.entries.len(), 1);
    }
}
