use std::fmt;
use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// One admitted UDP datagram. Never mutated after capture.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDatagram {
    pub source_ip: Ipv4Addr,
    pub dest_ip: Ipv4Addr,
    pub source_port: u16,
    pub dest_port: u16,
    pub payload: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

impl RawDatagram {
    pub fn new(source_ip: Ipv4Addr, dest_ip: Ipv4Addr, source_port: u16, dest_port: u16, payload: &[u8]) -> Self {
        Self {
            source_ip,
            dest_ip,
            source_port,
            dest_port,
            payload: payload.to_vec(),
            captured_at: Utc::now(),
        }
    }
}

/// Loosely typed value carried by Photon parameter dictionaries and mail field bags.
///
/// The typed reader only ever yields `Int`, `Long`, `Bool`, `Str` and `Null`.
/// `List` and `Record` exist for normalizer input and mail attachments.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    /// Signed 64-bit integer kept as decimal text so no consumer loses precision.
    Long(String),
    Str(String),
    List(Vec<Value>),
    Record(IndexMap<String, Value>),
}

impl Value {
    /// A value counts as present when it carries something other than an empty/zero marker.
    pub fn is_present(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Long(s) | Value::Str(s) => !s.is_empty(),
            Value::List(_) | Value::Record(_) => true,
        }
    }

    /// Text rendering for scalar values; containers have none.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Null | Value::List(_) | Value::Record(_) => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(n) => Some(n.to_string()),
            Value::Long(s) | Value::Str(s) => Some(s.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Long(s) | Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
            Value::Record(map) => write!(f, "{{{} fields}}", map.len()),
        }
    }
}

/// Decoded Photon parameter dictionary, in wire order.
pub type Parameters = IndexMap<String, Value>;

/// Field bag handed to the mail normalizer.
pub type MailData = IndexMap<String, Value>;

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MailItem {
    pub amount: u64,
    pub item: String,        // e.g. "T4_BAG" or "T4_BAG@2"
    pub price: u64,
    pub single: u64,
    pub black_market: bool,  // true when the trailing location field is missing
    #[serde(default)]
    pub location: Option<u64>,
}

impl MailItem {
    pub fn to_value(&self) -> Value {
        let mut record = IndexMap::new();
        record.insert("amount".to_string(), Value::Int(self.amount as i64));
        record.insert("item".to_string(), Value::Str(self.item.clone()));
        record.insert("price".to_string(), Value::Int(self.price as i64));
        record.insert("single".to_string(), Value::Int(self.single as i64));
        record.insert("blackMarket".to_string(), Value::Bool(self.black_market));
        if let Some(location) = self.location {
            record.insert("location".to_string(), Value::Int(location as i64));
        }
        Value::Record(record)
    }

    /// One-line description used by live progress reporting.
    pub fn describe(&self, index: usize) -> String {
        let market = if self.black_market { "BM" } else { "RM" };
        format!("[{}] {}x {} @ {} - {}", index + 1, self.amount, self.item, market, self.price)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodedResult {
    /// Item listings found by the raw-pattern pass.
    Mail {
        items: Vec<MailItem>,
        raw_matches: Vec<String>,
        item_count: usize,
    },
    /// Structured message accepted by an injected mail predicate.
    StructuredMail {
        message_type: u8,
        code: u8,
        parameters: Parameters,
    },
    Generic {
        message_type: u8,
        code: u8,
        parameters: Parameters,
    },
}

impl DecodedResult {
    pub fn is_mail(&self) -> bool {
        !matches!(self, DecodedResult::Generic { .. })
    }

    /// Item listings carried by this result, empty for structured messages.
    pub fn items(&self) -> &[MailItem] {
        match self {
            DecodedResult::Mail { items, .. } => items,
            _ => &[],
        }
    }

    /// Field bag for the normalizer; `None` for generic messages.
    pub fn to_mail_data(&self) -> Option<MailData> {
        match self {
            DecodedResult::Mail { items, raw_matches, item_count } => {
                let mut data = MailData::new();
                data.insert("items".to_string(), Value::List(items.iter().map(MailItem::to_value).collect()));
                data.insert("message".to_string(), Value::Str(raw_matches.join("\n")));
                data.insert("itemCount".to_string(), Value::Int(*item_count as i64));
                Some(data)
            }
            DecodedResult::StructuredMail { parameters, .. } => Some(parameters.clone()),
            DecodedResult::Generic { .. } => None,
        }
    }
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Mail {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub sender: String,
    pub subject: String,
    pub content: String,
    #[serde(default)]
    pub attachments: Option<Vec<Value>>,
}

/// Live notification sent when an admitted datagram decodes to mail.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MailNotice {
    pub item_count: usize,
    pub lines: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub total_packets: u64,
    pub game_packets: u64,
    pub retained_datagrams: usize,
    pub dropped_datagrams: u64,
    pub mails: usize,
    pub dropped_mails: u64,
    pub mail_items: usize,
    pub black_market_items: usize,
}
