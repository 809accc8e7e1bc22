//! Albion Online mail extractor core.
//!
//! Classifies captured UDP traffic as Photon game traffic, decodes mail item
//! listings out of it, normalizes mail records and renders CSV/JSON exports.

pub mod config;
pub mod error;
pub mod protocol;
pub mod services;


pub use config::{load_config, save_config, AppConfig};
pub use error::{CaptureError, ConfigError};
pub use protocol::parser::{decode_from_raw_buffer, DecodeStrategy, ProtocolDecoder};
pub use protocol::photon::{MailPredicate, NeverMail, PhotonDecoder};
pub use protocol::types::{DecodedResult, Mail, MailData, MailItem, MailNotice, RawDatagram, SessionSummary, Value};
pub use services::classifier::{ClassifierConfig, FrameClassifier};
pub use services::session::CaptureSession;
pub use services::sniffer::{extract_datagram, LinkType};
