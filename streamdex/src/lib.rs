// Life of a lookup:
// 1. Open the index through a page source (local file or object store)
// 2. Descend the B+tree from the root pointer to the leaf holding the key
// 3. Walk the key's overflow chain, one page at a time
// 4. Decode each value as a record-stream offset
// 5. Read the frame at that offset from the record stream
//
// System components:
//  - Page sources (file, remote, cache)
//  - B+tree index reader
//  - Record stream codec (reader, writer, remote adapter)

pub mod btree;
pub mod config;
pub mod io;
pub mod object_store;
pub mod page;
pub mod simulation;
pub mod source;
pub mod stream;

mod e2e_tests;
#[cfg(test)]
mod testing;
