//! Common helpers for end-to-end tests.

use std::collections::BTreeMap;
use std::error::Error;

use crate::btree::{BTreeReader, decode_offset};
use crate::source::PageSource;
use crate::stream::{StreamError, StreamWriter};
use crate::testing::{PriceEntity, StreamHeader, build_tree};

/// A record stream and an index over it, both as object bytes.
pub struct Dataset {
    pub stream: Vec<u8>,
    pub index: Vec<u8>,
    /// Records written under each symbol, in write order.
    pub expected: BTreeMap<String, Vec<PriceEntity>>,
}

pub fn header() -> StreamHeader {
    StreamHeader {
        source: "e2e".to_string(),
        created_at_ms: 1_700_000_000_000,
    }
}

/// Write `ticks` price records spread round-robin over `symbols` symbols,
/// then index each symbol's frame offsets with at most `fanout` entries per
/// node.
pub fn build_dataset(symbols: u32, ticks: u32, fanout: usize) -> Dataset {
    let mut writer = StreamWriter::new(Vec::new(), &header()).expect("writer");
    let mut offsets: BTreeMap<String, Vec<Vec<u8>>> = BTreeMap::new();
    let mut expected: BTreeMap<String, Vec<PriceEntity>> = BTreeMap::new();

    for tick in 0..ticks {
        let name = format!("SYM{:03}", tick % symbols);
        let price = f64::from(tick);
        let entity = PriceEntity::new(&name, &[price, price + 0.5]);

        let offset = writer.position();
        offsets
            .entry(name.clone())
            .or_default()
            .push(offset.to_be_bytes().to_vec());
        writer.write_frame(&entity).expect("frame");
        expected.entry(name).or_default().push(entity);
    }
    let stream = writer.finish().expect("finish");

    let entries: Vec<(Vec<u8>, Vec<Vec<u8>>)> = offsets
        .into_iter()
        .map(|(name, values)| (name.into_bytes(), values))
        .collect();
    let (image, root) = build_tree(&entries, fanout);

    Dataset {
        stream,
        index: image.to_bytes(root),
        expected,
    }
}

/// Look up `key` and read the record at every offset stored under it.
pub fn resolve<S: PageSource>(
    tree: &mut BTreeReader<S>,
    key: &[u8],
    read_at: &dyn Fn(u64) -> Result<PriceEntity, StreamError>,
) -> Result<Vec<PriceEntity>, Box<dyn Error>> {
    let mut records = Vec::new();
    for value in tree.search(key)? {
        let offset = decode_offset(&value?)?;
        records.push(read_at(offset)?);
    }
    Ok(records)
}
