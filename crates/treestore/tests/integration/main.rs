//! Integration tests across store, cache, codec and backends.

mod xref_test;
