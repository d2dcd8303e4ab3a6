//! Resolve keys to records through a local index file and stream file.

use std::fs;
use std::path::Path;

use tempfile::tempdir;

use crate::btree::{BTreeReader, decode_offset};
use crate::e2e_tests::helpers::{Dataset, build_dataset, header, resolve};
use crate::source::FilePageSource;
use crate::stream::StreamReader;
use crate::testing::{PriceEntity, StreamHeader};

fn write_files(
    dataset: &Dataset,
    dir: &Path,
) -> (BTreeReader<FilePageSource>, StreamReader<StreamHeader, PriceEntity>) {
    let index_path = dir.join("prices.index");
    let stream_path = dir.join("prices.binpb");
    fs::write(&index_path, &dataset.index).expect("write index");
    fs::write(&stream_path, &dataset.stream).expect("write stream");

    let source = FilePageSource::open(&index_path).expect("open index");
    let tree = BTreeReader::open(source).expect("open tree");
    let stream = StreamReader::open(&stream_path).expect("open stream");
    (tree, stream)
}

#[test]
fn test_every_key_resolves_to_its_records() {
    let dataset = build_dataset(40, 600, 8);
    let dir = tempdir().expect("create temp dir");
    let (mut tree, stream) = write_files(&dataset, dir.path());
    assert_eq!(stream.header(), &header());
    let read = |offset| stream.read_at(offset);

    for (name, records) in &dataset.expected {
        let resolved = resolve(&mut tree, name.as_bytes(), &read).expect("resolve");
        assert_eq!(&resolved, records, "records under {name}");
    }

    let missing = resolve(&mut tree, b"SYM999", &read).expect("resolve");
    assert!(missing.is_empty());
}

#[test]
fn test_indexed_offsets_match_sequential_scan() {
    let dataset = build_dataset(5, 50, 4);
    let dir = tempdir().expect("create temp dir");
    let (mut tree, mut stream) = write_files(&dataset, dir.path());

    let mut scanned = Vec::new();
    while let Some((offset, entity)) = stream.next_frame_with_offset().expect("frame") {
        scanned.push((entity.name, offset));
    }
    assert!(stream.is_sealed());
    assert_eq!(scanned.len(), 50);

    for (name, offset) in scanned {
        let indexed: Vec<u64> = tree
            .search(name.as_bytes())
            .expect("search")
            .map(|value| decode_offset(&value.expect("value")).expect("offset"))
            .collect();
        assert!(indexed.contains(&offset), "{name} missing offset {offset}");
    }
}

#[test]
fn test_long_chain_spans_overflow_pages() {
    let dataset = build_dataset(1, 2000, 4);
    let dir = tempdir().expect("create temp dir");
    let (mut tree, stream) = write_files(&dataset, dir.path());

    let read = |offset| stream.read_at(offset);
    let resolved = resolve(&mut tree, b"SYM000", &read).expect("resolve");
    assert_eq!(resolved.len(), 2000);
    assert_eq!(Some(&resolved), dataset.expected.get("SYM000"));

    let chain = tree.lookup(b"SYM000").expect("lookup").expect("present");
    assert!(chain.tail > chain.head);
}
