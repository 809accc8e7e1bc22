use lazy_static::lazy_static;
use regex::Regex;

use crate::protocol::photon::{MailPredicate, PhotonDecoder};
use crate::protocol::types::{DecodedResult, MailItem};

lazy_static! {
    // amount|ITEM_TOKEN[@quality]|price|single[|location]
    // ASCII digits only: `\d` is Unicode-aware and would swallow non-ASCII digits from binary noise.
    static ref MAIL_PATTERN: Regex =
        Regex::new(r"([0-9]+)\|([A-Z0-9_]+(?:@[0-9]+)?)\|([0-9]+)\|([0-9]+)(?:\|([0-9]+))?").unwrap();
}

/// One stage of the decode pipeline. Stages are tried in order; the first hit wins.
pub trait DecodeStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn decode(&self, payload: &[u8]) -> Option<DecodedResult>;
}

// --- STAGE 1: RAW PATTERN ---
// Mail listings are usually embedded as plain text, so scan the whole payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawPatternStage;

impl DecodeStrategy for RawPatternStage {
    fn name(&self) -> &'static str {
        "raw-pattern"
    }

    fn decode(&self, payload: &[u8]) -> Option<DecodedResult> {
        decode_from_raw_buffer(payload)
    }
}

// --- STAGE 2: STRUCTURED FRAME ---
pub struct PhotonFrameStage {
    decoder: PhotonDecoder,
}

impl PhotonFrameStage {
    pub fn new(decoder: PhotonDecoder) -> Self {
        Self { decoder }
    }
}

impl DecodeStrategy for PhotonFrameStage {
    fn name(&self) -> &'static str {
        "photon-frame"
    }

    fn decode(&self, payload: &[u8]) -> Option<DecodedResult> {
        self.decoder.decode_frame(payload)
    }
}

pub fn decode_from_raw_buffer(payload: &[u8]) -> Option<DecodedResult> {
    let text = String::from_utf8_lossy(payload);

    let mut items = Vec::new();
    let mut raw_matches = Vec::new();

    for caps in MAIL_PATTERN.captures_iter(&text) {
        match item_from_captures(&caps) {
            Some(item) => {
                items.push(item);
                raw_matches.push(caps[0].to_string());
            }
            None => log::trace!("[Decoder] Skipping out-of-range listing {:?}", &caps[0]),
        }
    }

    if items.is_empty() {
        return None;
    }

    let item_count = items.len();
    Some(DecodedResult::Mail { items, raw_matches, item_count })
}

fn item_from_captures(caps: &regex::Captures<'_>) -> Option<MailItem> {
    let location = match caps.get(5) {
        Some(m) => Some(m.as_str().parse::<u64>().ok()?),
        None => None,
    };

    Some(MailItem {
        amount: caps[1].parse().ok()?,
        item: caps[2].to_string(),
        price: caps[3].parse().ok()?,
        single: caps[4].parse().ok()?,
        black_market: location.is_none(),
        location,
    })
}

/// Ordered decode pipeline: raw-pattern pass, then the structured Photon frame walk.
pub struct ProtocolDecoder {
    stages: Vec<Box<dyn DecodeStrategy>>,
}

impl Default for ProtocolDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolDecoder {
    pub fn new() -> Self {
        Self::with_stages(vec![
            Box::new(RawPatternStage),
            Box::new(PhotonFrameStage::new(PhotonDecoder::new())),
        ])
    }

    /// Default pipeline with a custom mail predicate on the structured stage.
    pub fn with_mail_predicate(predicate: impl MailPredicate + 'static) -> Self {
        Self::with_stages(vec![
            Box::new(RawPatternStage),
            Box::new(PhotonFrameStage::new(PhotonDecoder::with_predicate(predicate))),
        ])
    }

    pub fn with_stages(stages: Vec<Box<dyn DecodeStrategy>>) -> Self {
        Self { stages }
    }

    pub fn decode(&self, payload: &[u8]) -> Option<DecodedResult> {
        for stage in &self.stages {
            if let Some(result) = stage.decode(payload) {
                log::trace!("[Decoder] {} matched {} bytes", stage.name(), payload.len());
                return Some(result);
            }
        }
        None
    }
}
