pub mod aggregator;
pub mod classifier;
pub mod exporter;
pub mod normalizer;
pub mod session;
pub mod sniffer;
