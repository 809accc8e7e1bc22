use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::protocol::photon::FRAME_HEADER_LEN;
use crate::protocol::types::RawDatagram;

pub const GAME_PORTS: [u16; 3] = [5055, 5056, 5057];
pub const SERVER_PREFIXES: [&str; 4] = ["5.45.187", "5.188.125", "162.252.172", "54.93.199"];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ClassifierConfig {
    pub ports: Vec<u16>,
    pub server_prefixes: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            ports: GAME_PORTS.to_vec(),
            server_prefixes: SERVER_PREFIXES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Decides whether a UDP datagram belongs to the game's Photon traffic.
///
/// A game port alone is enough. A known server address is weak evidence and
/// needs the Photon header signature to back it up.
#[derive(Debug, Clone, Default)]
pub struct FrameClassifier {
    config: ClassifierConfig,
}

impl FrameClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn classify(&self, source_ip: Ipv4Addr, dest_ip: Ipv4Addr, source_port: u16, dest_port: u16, payload: &[u8]) -> bool {
        let port_match = self.is_game_port(source_port) || self.is_game_port(dest_port);
        if port_match {
            return true;
        }

        let ip_match = self.is_server_address(source_ip) || self.is_server_address(dest_ip);
        ip_match && looks_like_photon(payload)
    }

    pub fn classify_datagram(&self, datagram: &RawDatagram) -> bool {
        self.classify(
            datagram.source_ip,
            datagram.dest_ip,
            datagram.source_port,
            datagram.dest_port,
            &datagram.payload,
        )
    }

    fn is_game_port(&self, port: u16) -> bool {
        self.config.ports.contains(&port)
    }

    // Textual prefix match, not CIDR.
    fn is_server_address(&self, ip: Ipv4Addr) -> bool {
        let text = ip.to_string();
        self.config.server_prefixes.iter().any(|prefix| text.starts_with(prefix.as_str()))
    }
}

/// Photon header signature: CRC flag is 0/1 and the command count is in 1..=19.
pub fn looks_like_photon(payload: &[u8]) -> bool {
    if payload.len() < FRAME_HEADER_LEN {
        return false;
    }
    let crc_flag = payload[2];
    let command_count = payload[3];
    (crc_flag == 0 || crc_flag == 1) && command_count > 0 && command_count < 20
}
