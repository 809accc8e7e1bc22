// Photon reliable-UDP framing: frame header -> command headers -> message -> parameter dictionary.
// Every reader here is bounds checked and returns None instead of panicking.

use byteorder::{BigEndian, ByteOrder};

use crate::protocol::types::{DecodedResult, Parameters, Value};

pub const FRAME_HEADER_LEN: usize = 12;
pub const COMMAND_HEADER_LEN: usize = 12;

const CMD_SEND_RELIABLE: u8 = 6;
const CMD_SEND_UNRELIABLE: u8 = 7;

const MSG_OPERATION_REQUEST: u8 = 2;
const MSG_OPERATION_RESPONSE: u8 = 3;
const MSG_EVENT: u8 = 4;

const TYPE_DICTIONARY: u8 = 68;

const TYPE_BYTE: u8 = 3;
const TYPE_INTEGER: u8 = 8;
const TYPE_SHORT: u8 = 9;
const TYPE_LONG: u8 = 10;
const TYPE_BOOLEAN: u8 = 12;
const TYPE_STRING: u8 = 18;

/// Decides whether a structured message's parameters describe a mail.
pub trait MailPredicate: Send + Sync {
    fn looks_like_mail(&self, parameters: &Parameters) -> bool;
}

impl<F> MailPredicate for F
where
    F: Fn(&Parameters) -> bool + Send + Sync,
{
    fn looks_like_mail(&self, parameters: &Parameters) -> bool {
        self(parameters)
    }
}

/// Default predicate. Disabled: mail is detected by the raw-pattern pass, so the
/// structured path only ever yields `Generic` results unless a real predicate is injected.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverMail;

impl MailPredicate for NeverMail {
    fn looks_like_mail(&self, _parameters: &Parameters) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub peer_id: u16,
    pub crc_enabled: u8,
    pub command_count: u8,
    pub timestamp: u32,
    pub challenge: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandHeader {
    pub command_type: u8,
    pub channel_id: u8,
    pub flags: u8,
    pub reserved: u8,
    pub command_length: u32,
    pub reliable_sequence_number: u32,
}

pub struct PhotonDecoder {
    predicate: Box<dyn MailPredicate>,
}

impl Default for PhotonDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl PhotonDecoder {
    pub fn new() -> Self {
        Self { predicate: Box::new(NeverMail) }
    }

    pub fn with_predicate(predicate: impl MailPredicate + 'static) -> Self {
        Self { predicate: Box::new(predicate) }
    }

    /// Walks the command list of one UDP payload and returns the first decodable message.
    pub fn decode_frame(&self, data: &[u8]) -> Option<DecodedResult> {
        let header = parse_frame_header(data)?;
        let mut offset = FRAME_HEADER_LEN;

        for _ in 0..header.command_count {
            if offset >= data.len() {
                break;
            }
            let command = match parse_command_header(data, offset) {
                Some(c) => c,
                None => break,
            };

            let length = command.command_length as usize;
            // Zero never advances; every remaining iteration would re-read this command.
            if length == 0 {
                log::trace!("[Photon] Zero-length command at offset {}, stopping walk", offset);
                break;
            }

            // A payload command shorter than its header carries no message; skip it.
            let is_payload = command.command_type == CMD_SEND_RELIABLE || command.command_type == CMD_SEND_UNRELIABLE;
            if is_payload && length >= COMMAND_HEADER_LEN {
                let start = offset + COMMAND_HEADER_LEN;
                let end = offset.checked_add(length)?;
                if let Some(payload) = data.get(start..end) {
                    if let Some(result) = self.decode_message(payload) {
                        return Some(result);
                    }
                }
            }

            offset = offset.checked_add(length)?;
        }

        None
    }

    /// Decodes one Photon message (request, response or event).
    pub fn decode_message(&self, data: &[u8]) -> Option<DecodedResult> {
        if data.len() < 3 {
            return None;
        }

        let message_type = data[0];
        if !matches!(message_type, MSG_OPERATION_REQUEST | MSG_OPERATION_RESPONSE | MSG_EVENT) {
            return None;
        }
        let code = data[1];
        let parameters = parse_parameters(data, 2);

        log::trace!(
            "[Photon] {} code={} params={}",
            message_type_name(message_type),
            code,
            parameters.len()
        );

        if self.predicate.looks_like_mail(&parameters) {
            return Some(DecodedResult::StructuredMail { message_type, code, parameters });
        }

        Some(DecodedResult::Generic { message_type, code, parameters })
    }
}

pub fn parse_frame_header(data: &[u8]) -> Option<FrameHeader> {
    let bytes = data.get(..FRAME_HEADER_LEN)?;
    Some(FrameHeader {
        peer_id: BigEndian::read_u16(&bytes[0..2]),
        crc_enabled: bytes[2],
        command_count: bytes[3],
        timestamp: BigEndian::read_u32(&bytes[4..8]),
        challenge: BigEndian::read_u32(&bytes[8..12]),
    })
}

pub fn parse_command_header(data: &[u8], offset: usize) -> Option<CommandHeader> {
    let end = offset.checked_add(COMMAND_HEADER_LEN)?;
    let bytes = data.get(offset..end)?;
    Some(CommandHeader {
        command_type: bytes[0],
        channel_id: bytes[1],
        flags: bytes[2],
        reserved: bytes[3],
        command_length: BigEndian::read_u32(&bytes[4..8]),
        reliable_sequence_number: BigEndian::read_u32(&bytes[8..12]),
    })
}

/// Reads the parameter set at `offset`. Only dictionaries (type 68) are understood;
/// anything else, or a truncated dictionary header, yields an empty map.
pub fn parse_parameters(data: &[u8], offset: usize) -> Parameters {
    let mut params = Parameters::new();

    let type_code = match data.get(offset) {
        Some(&t) => t,
        None => return params,
    };
    if type_code != TYPE_DICTIONARY {
        return params;
    }

    let mut offset = offset + 1;
    let header = match data.get(offset..offset + 4) {
        Some(h) => h,
        None => return params,
    };
    let key_type = header[0];
    let value_type = header[1];
    let size = BigEndian::read_u16(&header[2..4]);
    offset += 4;

    for _ in 0..size {
        if offset >= data.len() {
            break;
        }
        let Some((key, next)) = read_value(data, key_type, offset) else { break };
        offset = next;
        let Some((value, next)) = read_value(data, value_type, offset) else { break };
        offset = next;

        params.insert(key.to_string(), value);
    }

    params
}

/// Typed value reader. Returns the value and the offset just past it.
pub fn read_value(data: &[u8], type_code: u8, offset: usize) -> Option<(Value, usize)> {
    let slice = |len: usize| data.get(offset..offset.checked_add(len)?);

    match type_code {
        TYPE_BYTE => slice(1).map(|b| (Value::Int(b[0] as i64), offset + 1)),
        TYPE_INTEGER => slice(4).map(|b| (Value::Int(BigEndian::read_i32(b) as i64), offset + 4)),
        TYPE_SHORT => slice(2).map(|b| (Value::Int(BigEndian::read_i16(b) as i64), offset + 2)),
        TYPE_LONG => slice(8).map(|b| (Value::Long(BigEndian::read_i64(b).to_string()), offset + 8)),
        TYPE_BOOLEAN => slice(1).map(|b| (Value::Bool(b[0] != 0), offset + 1)),
        TYPE_STRING => {
            let len = BigEndian::read_u16(slice(2)?) as usize;
            let start = offset + 2;
            // Short strings are clamped to what the datagram actually holds.
            let end = (start + len).min(data.len());
            let text = String::from_utf8_lossy(data.get(start..end).unwrap_or_default()).into_owned();
            Some((Value::Str(text), start + len))
        }
        // Unknown codes: skip one byte so the dictionary walk stays aligned as best it can.
        _ => Some((Value::Null, offset + 1)),
    }
}

pub fn message_type_name(message_type: u8) -> &'static str {
    match message_type {
        2 => "OperationRequest",
        3 => "OperationResponse",
        4 => "Event",
        7 => "InternalOperationRequest",
        8 => "InternalOperationResponse",
        _ => "Unknown",
    }
}
