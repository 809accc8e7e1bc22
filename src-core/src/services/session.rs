use crate::config::AppConfig;
use crate::protocol::parser::ProtocolDecoder;
use crate::protocol::types::{Mail, MailItem, MailNotice, RawDatagram, SessionSummary};
use crate::services::aggregator::CaptureAggregator;
use crate::services::classifier::{ClassifierConfig, FrameClassifier};
use crate::services::normalizer;
use crate::services::sniffer::{extract_datagram, LinkType};

type MailListener = Box<dyn FnMut(&MailNotice) + Send>;

/// One capture session. The caller owns it and drives its lifecycle.
///
/// Ingestion is synchronous: each frame is classified, decoded and normalized
/// before the call returns. Nothing is accepted before `start` or after `stop`.
pub struct CaptureSession {
    classifier: FrameClassifier,
    decoder: ProtocolDecoder,
    aggregator: CaptureAggregator,
    listeners: Vec<MailListener>,
    running: bool,
    total_packets: u64,
    game_packets: u64,
    dropped_mails: u64,
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new(ClassifierConfig::default(), None)
    }
}

impl CaptureSession {
    pub fn new(classifier: ClassifierConfig, max_datagrams: Option<usize>) -> Self {
        Self {
            classifier: FrameClassifier::new(classifier),
            decoder: ProtocolDecoder::new(),
            aggregator: CaptureAggregator::new(max_datagrams),
            listeners: Vec::new(),
            running: false,
            total_packets: 0,
            game_packets: 0,
            dropped_mails: 0,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.classifier.clone(), config.max_datagrams)
    }

    pub fn with_decoder(mut self, decoder: ProtocolDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// Registers a live progress listener, called once per mail-bearing datagram.
    pub fn on_classified_mail_detected(&mut self, listener: impl FnMut(&MailNotice) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn start(&mut self) {
        if self.running {
            log::warn!("[Session] Start ignored: already active.");
            return;
        }
        self.running = true;
        log::info!("[Session] Listening for game packets...");
    }

    /// Stops accepting traffic and computes the session summary. Accumulated data is kept.
    pub fn stop(&mut self) -> SessionSummary {
        self.running = false;
        let summary = self.summary();
        log::info!(
            "[Session] Stopped. Total packets: {}, game packets: {}, mail items: {} ({} black market)",
            summary.total_packets,
            summary.game_packets,
            summary.mail_items,
            summary.black_market_items
        );
        if summary.mail_items == 0 {
            log::warn!("[Session] No mail items captured");
        }
        summary
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Feeds one captured link-layer frame. Returns true when it was admitted as game traffic.
    pub fn ingest_frame(&mut self, frame: &[u8], len: usize, link_type: LinkType) -> bool {
        if !self.running {
            return false;
        }
        self.total_packets += 1;

        let frame = &frame[..len.min(frame.len())];
        match extract_datagram(frame, link_type) {
            Some(datagram) => self.admit(datagram),
            None => false,
        }
    }

    /// Feeds an already extracted UDP datagram.
    pub fn ingest_datagram(&mut self, datagram: RawDatagram) -> bool {
        if !self.running {
            return false;
        }
        self.total_packets += 1;
        self.admit(datagram)
    }

    fn admit(&mut self, datagram: RawDatagram) -> bool {
        if !self.classifier.classify_datagram(&datagram) {
            return false;
        }
        self.game_packets += 1;

        if let Some(result) = self.decoder.decode(&datagram.payload) {
            if result.is_mail() {
                let items = result.items();
                self.notify(items);

                if let Some(data) = result.to_mail_data() {
                    match normalizer::normalize(&data) {
                        Some(mail) => self.aggregator.push_mail(mail),
                        None => self.dropped_mails += 1,
                    }
                }
            }
        } else {
            log::trace!(
                "[Session] Undecoded {}:{} -> {}:{} {}",
                datagram.source_ip,
                datagram.source_port,
                datagram.dest_ip,
                datagram.dest_port,
                hex::encode(&datagram.payload[..datagram.payload.len().min(48)])
            );
        }

        self.aggregator.retain(datagram);
        true
    }

    fn notify(&mut self, items: &[MailItem]) {
        let notice = MailNotice {
            item_count: items.len(),
            lines: items.iter().enumerate().map(|(i, item)| item.describe(i)).collect(),
        };

        log::info!("[Session] MAIL DETECTED! Items: {}", notice.item_count);
        for line in &notice.lines {
            log::info!("[Session]    {}", line);
        }

        for listener in self.listeners.iter_mut() {
            listener(&notice);
        }
    }

    pub fn summary(&self) -> SessionSummary {
        let items = self.mail_items();
        SessionSummary {
            total_packets: self.total_packets,
            game_packets: self.game_packets,
            retained_datagrams: self.aggregator.datagrams().len(),
            dropped_datagrams: self.aggregator.dropped_datagrams(),
            mails: self.aggregator.mails().len(),
            dropped_mails: self.dropped_mails,
            mail_items: items.len(),
            black_market_items: items.iter().filter(|i| i.black_market).count(),
        }
    }

    pub fn mail_items(&self) -> Vec<MailItem> {
        self.aggregator.mail_items(&self.decoder)
    }

    pub fn mails(&self) -> &[Mail] {
        self.aggregator.mails()
    }

    pub fn render_csv(&self) -> String {
        self.aggregator.render_csv(&self.decoder)
    }

    pub fn render_json(&self) -> String {
        self.aggregator.render_json()
    }
}
