pub mod artifact;
pub mod backtest;
pub mod calibration;
pub mod classifier;
pub mod config;
pub mod decision;
pub mod domain;
pub mod encoder;
pub mod features;
pub mod http_client;
pub mod ingest;
pub mod notifier;
pub mod paper_trade;
pub mod persist;
pub mod policy;
pub mod settlement;
pub mod store;
pub mod value_filter;
