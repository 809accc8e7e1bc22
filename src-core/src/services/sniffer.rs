use std::net::Ipv4Addr;

use byteorder::{BigEndian, ByteOrder};
use etherparse::{NetHeaders, PacketHeaders, TransportHeader};

use crate::protocol::types::RawDatagram;

// Linux cooked capture (SLL): 16-byte header, protocol type at offset 14.
const SLL_HEADER_LEN: usize = 16;
const SLL_PROTOCOL_OFFSET: usize = 14;
const ETHERTYPE_IPV4: u16 = 0x0800;

const DLT_EN10MB: i32 = 1;
const DLT_LINUX_SLL: i32 = 113;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    Ethernet,
    LinuxSll,
    Other(i32),
}

impl LinkType {
    pub fn from_dlt(dlt: i32) -> Self {
        match dlt {
            DLT_EN10MB => LinkType::Ethernet,
            DLT_LINUX_SLL => LinkType::LinuxSll,
            other => LinkType::Other(other),
        }
    }
}

/// Pulls the IPv4/UDP datagram out of a captured frame. Anything else is ignored.
pub fn extract_datagram(frame: &[u8], link_type: LinkType) -> Option<RawDatagram> {
    // 1. Let etherparse handle all the dangerous network parsing!
    let headers = match link_type {
        LinkType::Ethernet => PacketHeaders::from_ethernet_slice(frame).ok()?,
        LinkType::LinuxSll => {
            if frame.len() < SLL_HEADER_LEN {
                return None;
            }
            let protocol = BigEndian::read_u16(&frame[SLL_PROTOCOL_OFFSET..SLL_HEADER_LEN]);
            if protocol != ETHERTYPE_IPV4 {
                return None;
            }
            PacketHeaders::from_ip_slice(&frame[SLL_HEADER_LEN..]).ok()?
        }
        LinkType::Other(_) => return None,
    };

    // 2. Validate IPv4 + UDP and get ports
    let (ipv4, udp) = match (&headers.net, &headers.transport) {
        (Some(NetHeaders::Ipv4(ipv4, _extensions)), Some(TransportHeader::Udp(udp))) => (ipv4, udp),
        _ => return None,
    };

    let payload = headers.payload.slice();
    if payload.is_empty() {
        return None;
    }

    Some(RawDatagram::new(
        Ipv4Addr::from(ipv4.source),
        Ipv4Addr::from(ipv4.destination),
        udp.source_port,
        udp.destination_port,
        payload,
    ))
}

#[cfg(feature = "capture")]
pub use live::{list_devices, run_capture, CaptureOptions, CaptureSource};

#[cfg(feature = "capture")]
mod live {
    use crossbeam_channel::Receiver;
    use pcap::{Activated, Capture, Device};

    use super::LinkType;
    use crate::error::CaptureError;
    use crate::services::session::CaptureSession;

    const SNAPLEN: i32 = 65535;
    const BUFFER_SIZE: i32 = 10 * 1024 * 1024;
    const FILTER: &str = "udp";

    #[derive(Debug, Clone)]
    pub enum CaptureSource {
        /// Live interface; `None` picks the first device pcap reports.
        Device(Option<String>),
        /// Offline replay of a `.pcap` file.
        File(std::path::PathBuf),
    }

    #[derive(Debug, Clone)]
    pub struct CaptureOptions {
        pub source: CaptureSource,
        pub read_timeout_ms: i32,
        pub max_packets: Option<u64>,
    }

    pub fn list_devices() -> Result<Vec<(String, Option<String>)>, CaptureError> {
        let devices = Device::list().map_err(|e| CaptureError::Read(e.to_string()))?;
        Ok(devices.into_iter().map(|d| (d.name, d.desc)).collect())
    }

    /// Drives `session` from a pcap source until it runs dry, the packet budget is
    /// spent, or a stop signal arrives on `stop_rx`.
    pub fn run_capture(session: &mut CaptureSession, options: &CaptureOptions, stop_rx: &Receiver<()>) -> Result<(), CaptureError> {
        match &options.source {
            CaptureSource::Device(name) => {
                let device = select_device(name.as_deref())?;
                let device_name = device.name.clone();
                log::info!("[Sniffer] Using device: {} ({})", device_name, device.desc.as_deref().unwrap_or("No description"));

                let mut cap = Capture::from_device(device)
                    .and_then(|c| c.promisc(true).snaplen(SNAPLEN).buffer_size(BUFFER_SIZE).timeout(options.read_timeout_ms).open())
                    .map_err(|e| CaptureError::open_failed(&device_name, e))?;
                cap.filter(FILTER, true).map_err(|e| CaptureError::Filter(e.to_string()))?;

                pump(&mut cap, session, options.max_packets, stop_rx)
            }
            CaptureSource::File(path) => {
                let display = path.display().to_string();
                let mut cap = Capture::from_file(path).map_err(|e| CaptureError::open_failed(&display, e))?;
                log::info!("[Sniffer] Replaying {}", display);
                pump(&mut cap, session, options.max_packets, stop_rx)
            }
        }
    }

    fn select_device(name: Option<&str>) -> Result<Device, CaptureError> {
        let devices = Device::list().map_err(|e| CaptureError::Read(e.to_string()))?;
        if devices.is_empty() {
            return Err(CaptureError::NoDevice);
        }

        for device in &devices {
            let addresses: Vec<String> = device.addresses.iter().map(|a| a.addr.to_string()).collect();
            log::debug!("[Sniffer] Found: {} | {:?}", device.name, addresses);
        }

        match name {
            Some(wanted) => devices
                .into_iter()
                .find(|d| d.name == wanted)
                .ok_or_else(|| CaptureError::open_failed(wanted, "no such device")),
            None => devices.into_iter().next().ok_or(CaptureError::NoDevice),
        }
    }

    fn pump<T: Activated + ?Sized>(
        cap: &mut Capture<T>,
        session: &mut CaptureSession,
        max_packets: Option<u64>,
        stop_rx: &Receiver<()>,
    ) -> Result<(), CaptureError> {
        let link_type = LinkType::from_dlt(cap.get_datalink().0);
        log::info!("[Sniffer] Capture opened. Link type: {:?}", link_type);
        if let LinkType::Other(dlt) = link_type {
            log::warn!("[Sniffer] Unsupported link type {}; no frames will be decoded", dlt);
        }

        let mut seen: u64 = 0;
        loop {
            // COOPERATIVE SHUTDOWN
            if stop_rx.try_recv().is_ok() {
                log::info!("[Sniffer] Stop requested.");
                break;
            }
            if max_packets.is_some_and(|max| seen >= max) {
                log::info!("[Sniffer] Packet budget of {} reached.", seen);
                break;
            }

            match cap.next_packet() {
                Ok(packet) => {
                    seen += 1;
                    session.ingest_frame(packet.data, packet.header.caplen as usize, link_type);
                }
                Err(pcap::Error::TimeoutExpired) => continue,
                Err(pcap::Error::NoMorePackets) => break,
                Err(e) => return Err(CaptureError::Read(e.to_string())),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etherparse::PacketBuilder;

    fn udp_ethernet_frame(src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [6, 5, 4, 3, 2, 1])
            .ipv4([5, 188, 125, 10], [192, 168, 1, 2], 64)
            .udp(src_port, dst_port);
        let mut bytes = Vec::<u8>::new();
        builder.write(&mut bytes, payload).unwrap();
        bytes
    }

    fn udp_ip_packet(payload: &[u8]) -> Vec<u8> {
        let builder = PacketBuilder::ipv4([192, 168, 1, 2], [54, 93, 199, 1], 64).udp(61000, 5056);
        let mut bytes = Vec::<u8>::new();
        builder.write(&mut bytes, payload).unwrap();
        bytes
    }

    fn sll_frame(protocol: u16, ip_packet: &[u8]) -> Vec<u8> {
        let mut frame = vec![0u8; SLL_HEADER_LEN];
        frame[SLL_PROTOCOL_OFFSET..SLL_HEADER_LEN].copy_from_slice(&protocol.to_be_bytes());
        frame.extend_from_slice(ip_packet);
        frame
    }

    #[test]
    fn test_extract_ethernet_udp() {
        let frame = udp_ethernet_frame(5055, 61000, b"1|T4_BAG|10|10");
        let datagram = extract_datagram(&frame, LinkType::Ethernet).unwrap();

        assert_eq!(datagram.source_ip, Ipv4Addr::new(5, 188, 125, 10));
        assert_eq!(datagram.dest_ip, Ipv4Addr::new(192, 168, 1, 2));
        assert_eq!(datagram.source_port, 5055);
        assert_eq!(datagram.dest_port, 61000);
        assert_eq!(datagram.payload, b"1|T4_BAG|10|10");
    }

    #[test]
    fn test_extract_linux_cooked_capture() {
        let frame = sll_frame(ETHERTYPE_IPV4, &udp_ip_packet(b"hello"));
        let datagram = extract_datagram(&frame, LinkType::LinuxSll).unwrap();
        assert_eq!(datagram.dest_port, 5056);
        assert_eq!(datagram.dest_ip, Ipv4Addr::new(54, 93, 199, 1));
        assert_eq!(datagram.payload, b"hello");

        // IPv6 protocol type and short headers are ignored.
        assert!(extract_datagram(&sll_frame(0x86DD, &udp_ip_packet(b"hello")), LinkType::LinuxSll).is_none());
        assert!(extract_datagram(&frame[..15], LinkType::LinuxSll).is_none());
    }

    #[test]
    fn test_non_udp_and_empty_payloads_are_ignored() {
        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [6, 5, 4, 3, 2, 1])
            .ipv4([192, 168, 1, 1], [192, 168, 1, 2], 64)
            .tcp(5055, 12345, 1, 0);
        let mut tcp_frame = Vec::<u8>::new();
        builder.write(&mut tcp_frame, b"1|T4_BAG|1|1").unwrap();
        assert!(extract_datagram(&tcp_frame, LinkType::Ethernet).is_none());

        let empty = udp_ethernet_frame(5055, 5055, &[]);
        assert!(extract_datagram(&empty, LinkType::Ethernet).is_none());

        assert!(extract_datagram(&[0xDE, 0xAD], LinkType::Ethernet).is_none());
        assert!(extract_datagram(&udp_ethernet_frame(1, 2, b"x"), LinkType::Other(101)).is_none());
    }

    #[test]
    fn test_link_type_from_dlt() {
        assert_eq!(LinkType::from_dlt(1), LinkType::Ethernet);
        assert_eq!(LinkType::from_dlt(113), LinkType::LinuxSll);
        assert_eq!(LinkType::from_dlt(228), LinkType::Other(228));
    }
}
