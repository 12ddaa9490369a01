pub mod candidates;
pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod ledger;
pub mod locator;
pub mod output;
pub mod pipeline;
pub mod remote;
pub mod resolver;
pub mod scrape;
pub mod store;
