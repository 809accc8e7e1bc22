use crate::protocol::parser::ProtocolDecoder;
use crate::protocol::types::{Mail, MailItem, RawDatagram};
use crate::services::exporter;

/// Session-lifetime store of admitted datagrams and normalized mails.
///
/// Datagrams are append-only. Item lists are re-derived from them on every call,
/// so exports always reflect the raw capture rather than any cached decode.
#[derive(Debug, Default)]
pub struct CaptureAggregator {
    datagrams: Vec<RawDatagram>,
    mails: Vec<Mail>,
    max_datagrams: Option<usize>,
    dropped_datagrams: u64,
}

impl CaptureAggregator {
    pub fn new(max_datagrams: Option<usize>) -> Self {
        Self { max_datagrams, ..Default::default() }
    }

    /// Retains a datagram. Returns false once the capacity limit is reached.
    pub fn retain(&mut self, datagram: RawDatagram) -> bool {
        if let Some(max) = self.max_datagrams {
            if self.datagrams.len() >= max {
                if self.dropped_datagrams == 0 {
                    log::warn!("[Aggregator] Capacity of {} datagrams reached, new traffic is not retained", max);
                }
                self.dropped_datagrams += 1;
                return false;
            }
        }
        self.datagrams.push(datagram);
        true
    }

    pub fn push_mail(&mut self, mail: Mail) {
        self.mails.push(mail);
    }

    pub fn datagrams(&self) -> &[RawDatagram] {
        &self.datagrams
    }

    pub fn mails(&self) -> &[Mail] {
        &self.mails
    }

    pub fn dropped_datagrams(&self) -> u64 {
        self.dropped_datagrams
    }

    /// Decodes every retained datagram and flattens the mail items, in capture order.
    pub fn mail_items(&self, decoder: &ProtocolDecoder) -> Vec<MailItem> {
        self.datagrams
            .iter()
            .filter_map(|d| decoder.decode(&d.payload))
            .flat_map(|result| result.items().to_vec())
            .collect()
    }

    pub fn black_market_items(&self, decoder: &ProtocolDecoder) -> Vec<MailItem> {
        self.mail_items(decoder).into_iter().filter(|item| item.black_market).collect()
    }

    /// The exporter keeps only black-market rows.
    pub fn render_csv(&self, decoder: &ProtocolDecoder) -> String {
        exporter::render_csv(&self.mail_items(decoder))
    }

    pub fn render_json(&self) -> String {
        exporter::render_json(&self.mails)
    }
}
