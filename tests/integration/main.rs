//! Integration test entry point

mod common;
mod crawl_tests;
mod search_tests;
