use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::codec::{Decoder, Encoder};
use tokio_util::udp::UdpFramed;
use tracing::{debug, trace, warn};

use crate::core::{Error, HardwareAddress, Result, ADDRESS_LEN, DEFAULT_PORT, MAX_PAYLOAD_SIZE};

use super::{Datagram, SendReport, Transport, TransportEvents, EVENT_QUEUE_DEPTH};

/// Destination and source addresses preceding every payload
pub const LINK_HEADER_LEN: usize = 2 * ADDRESS_LEN;

/// One link-layer frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFrame {
    pub destination: HardwareAddress,
    pub source: HardwareAddress,
    pub payload: Bytes,
}

/// Codec for `dst | src | payload` link frames carried in UDP datagrams
///
/// Each datagram is exactly one frame. Malformed datagrams are consumed
/// and skipped rather than reported, so one bad frame never stalls the
/// receive stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkCodec;

impl Decoder for LinkCodec {
    type Item = LinkFrame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.is_empty() {
            return Ok(None);
        }

        let payload_len = src.len().saturating_sub(LINK_HEADER_LEN);
        if src.len() < LINK_HEADER_LEN || payload_len > MAX_PAYLOAD_SIZE {
            trace!("Skipping malformed link frame of {} bytes", src.len());
            src.clear();
            return Ok(None);
        }

        let mut destination = [0u8; ADDRESS_LEN];
        let mut source = [0u8; ADDRESS_LEN];
        src.copy_to_slice(&mut destination);
        src.copy_to_slice(&mut source);
        let payload = src.split().freeze();

        Ok(Some(LinkFrame {
            destination: destination.into(),
            source: source.into(),
            payload,
        }))
    }
}

impl Encoder<LinkFrame> for LinkCodec {
    type Error = Error;

    fn encode(&mut self, item: LinkFrame, dst: &mut BytesMut) -> Result<()> {
        if item.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                size: item.payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        dst.reserve(LINK_HEADER_LEN + item.payload.len());
        dst.put_slice(&item.destination.octets());
        dst.put_slice(&item.source.octets());
        dst.put_slice(&item.payload);
        Ok(())
    }
}

/// Socket settings for the UDP link emulation
#[derive(Debug, Clone)]
pub struct UdpConfig {
    /// This node's hardware address
    pub address: HardwareAddress,
    /// Local socket address, shared by every node on the segment
    pub bind_addr: SocketAddr,
    /// Where frames are sent, normally the segment broadcast address
    pub broadcast_addr: SocketAddr,
}

impl UdpConfig {
    /// Config for a node on the default port of the local segment
    pub fn new(address: HardwareAddress) -> Self {
        UdpConfig {
            address,
            bind_addr: SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_PORT).into(),
            broadcast_addr: SocketAddrV4::new(Ipv4Addr::BROADCAST, DEFAULT_PORT).into(),
        }
    }
}

/// Link emulation over UDP broadcast
///
/// Every frame goes to the broadcast address; receivers keep frames
/// addressed to them or to [`HardwareAddress::BROADCAST`] and drop their
/// own echoes.
pub struct UdpTransport {
    address: HardwareAddress,
    outbound: mpsc::Sender<LinkFrame>,
}

impl UdpTransport {
    /// Binds the socket and spawns the link task
    pub async fn bind(config: UdpConfig) -> Result<(Self, TransportEvents)> {
        let socket = Self::open_socket(config.bind_addr)?;
        let (outbound, outbound_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let (datagram_tx, report_tx, events) = TransportEvents::channel();

        let framed = UdpFramed::new(socket, LinkCodec);
        tokio::spawn(run_link(
            config.address,
            config.broadcast_addr,
            framed,
            outbound_rx,
            datagram_tx,
            report_tx,
        ));

        debug!("UDP link for {} bound on {}", config.address, config.bind_addr);
        Ok((
            UdpTransport {
                address: config.address,
                outbound,
            },
            events,
        ))
    }

    fn open_socket(bind_addr: SocketAddr) -> Result<UdpSocket> {
        let socket = Socket::new(Domain::for_address(bind_addr), Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_broadcast(true)?;
        socket.set_nonblocking(true)?;
        socket
            .bind(&bind_addr.into())
            .map_err(|e| Error::transport(format!("Failed to bind {}: {}", bind_addr, e)))?;
        Ok(UdpSocket::from_std(socket.into())?)
    }
}

impl Transport for UdpTransport {
    fn local_address(&self) -> HardwareAddress {
        self.address
    }

    fn send(&self, destination: HardwareAddress, payload: &[u8]) -> Result<()> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        let frame = LinkFrame {
            destination,
            source: self.address,
            payload: Bytes::copy_from_slice(payload),
        };
        self.outbound
            .try_send(frame)
            .map_err(|e| Error::transport(format!("Send queue unavailable: {}", e)))
    }
}

async fn run_link(
    local: HardwareAddress,
    broadcast_addr: SocketAddr,
    framed: UdpFramed<LinkCodec>,
    mut outbound: mpsc::Receiver<LinkFrame>,
    datagrams: mpsc::Sender<Datagram>,
    reports: mpsc::Sender<SendReport>,
) {
    let (mut sink, mut stream) = framed.split();

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                // Transport handle dropped
                let Some(frame) = frame else { break };
                let destination = frame.destination;
                let success = match sink.send((frame, broadcast_addr)).await {
                    Ok(()) => true,
                    Err(e) => {
                        debug!("UDP send to {} failed: {}", destination, e);
                        false
                    }
                };
                if reports.try_send(SendReport { destination, success }).is_err() {
                    trace!("Dropping send report for {}", destination);
                }
            }

            received = stream.next() => {
                match received {
                    Some(Ok((frame, from))) => {
                        if frame.source == local {
                            continue;
                        }
                        if frame.destination != local && !frame.destination.is_broadcast() {
                            trace!("Frame from {} ({}) not for us", frame.source, from);
                            continue;
                        }
                        let datagram = Datagram { source: frame.source, payload: frame.payload };
                        if datagrams.try_send(datagram).is_err() {
                            warn!("Receive queue full, dropping frame from {}", frame.source);
                        }
                    }
                    Some(Err(e)) => warn!("UDP receive error: {}", e),
                    None => break,
                }
            }
        }
    }

    debug!("UDP link for {} stopped", local);
}
