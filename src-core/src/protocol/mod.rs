pub mod parser;
pub mod photon;
pub mod types;
