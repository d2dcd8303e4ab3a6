//! Resolve keys to records through an object store.

use crate::btree::BTreeReader;
use crate::e2e_tests::helpers::{build_dataset, header, resolve};
use crate::object_store::RemoteObject;
use crate::simulation::{FaultConfig, SimulatedObjectStore};
use crate::source::{CachedPageSource, RemotePageSource};
use crate::stream::RemoteStreamReader;
use crate::testing::{PriceEntity, StreamHeader};

#[test]
fn test_remote_resolution_matches_written_records() {
    let dataset = build_dataset(25, 400, 6);
    let store = SimulatedObjectStore::new(7);
    store.put("market", "prices.index", dataset.index);
    store.put("market", "prices.binpb", dataset.stream);

    let index = RemoteObject::new(&store, "market", "prices.index");
    let source = RemotePageSource::open(index).expect("open index");
    let mut tree = BTreeReader::open(CachedPageSource::new(source, 16)).expect("open tree");
    let object = RemoteObject::new(&store, "market", "prices.binpb");
    let stream: RemoteStreamReader<_, StreamHeader, PriceEntity> =
        RemoteStreamReader::open(object).expect("open stream");
    assert_eq!(stream.header(), &header());
    let read = |offset| stream.read_at(offset);

    for (name, records) in &dataset.expected {
        let resolved = resolve(&mut tree, name.as_bytes(), &read).expect("resolve");
        assert_eq!(&resolved, records, "records under {name}");
    }

    // Descents share the upper levels of the tree
    assert!(tree.source().stats().hits > 0);
}

#[test]
fn test_faults_never_resolve_wrong_records() {
    let dataset = build_dataset(10, 20, 4);
    let mut resolved_keys = 0;

    for seed in 0..20 {
        let store = SimulatedObjectStore::with_config(seed, FaultConfig::high_faults());
        store.put("market", "prices.index", dataset.index.clone());
        store.put("market", "prices.binpb", dataset.stream.clone());

        let index = RemoteObject::new(&store, "market", "prices.index");
        let Ok(source) = RemotePageSource::open(index) else {
            continue;
        };
        let Ok(mut tree) = BTreeReader::open(source) else {
            continue;
        };
        let object = RemoteObject::new(&store, "market", "prices.binpb");
        let Ok(stream) = RemoteStreamReader::<_, StreamHeader, PriceEntity>::open(object) else {
            continue;
        };

        let read = |offset| stream.read_at(offset);
        for (name, records) in &dataset.expected {
            if let Ok(resolved) = resolve(&mut tree, name.as_bytes(), &read) {
                assert_eq!(&resolved, records, "seed {seed}, records under {name}");
                resolved_keys += 1;
            }
        }
    }
    assert!(resolved_keys > 0);
}
