//! End-to-end tests: index values resolved to records in a stream.
//!
//! Each test writes a record stream with `StreamWriter`, indexes every
//! record's offset under its symbol, then resolves keys through
//! `BTreeReader::search`, `decode_offset` and a stream reader's `read_at`.

#![cfg(test)]

mod helpers;

mod test_local;
mod test_remote;
