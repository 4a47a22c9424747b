//! Unit tests for the public handle, schema and export APIs.

mod export_test;
mod handle_test;
mod schema_test;
