//! Transport framing.
//!
//! The display accepts the packed bitstream as a sequence of fixed-size
//! output reports with three header roles. The head packet carries the
//! command/addressing preamble and the first payload slice; continuation
//! packets stream the middle; the single trailer packet carries whatever
//! remains, zero-padded to the full transfer unit. Every packet is exactly
//! 64 bytes so the transport treats them uniformly.
//!
//! The protocol geometry lives in a [`FrameProtocol`] value whose
//! `Default` is the device's constants; tests shrink it to keep fixtures
//! readable. The framing itself is infallible: payload bytes are consumed
//! strictly in order and the trailer is always emitted exactly once.

/// Head-packet preamble: command and addressing bytes ahead of the first
/// payload slice.
pub const HEAD_HEADER: [u8; 17] = [
    0x01, 0x3e, 0x8d, 0x25, 0x08, 0x07, 0x2a, 0x88, 0x25, 0x08, 0x0b, 0x10, 0x80, 0x25, 0x1a,
    0x80, 0x25,
];

/// Continuation-packet header.
pub const BODY_HEADER: [u8; 2] = [0x01, 0x3e];

/// Trailer-packet header; distinct preamble marks the end of the frame.
pub const TAIL_HEADER: [u8; 2] = [0x01, 0x28];

/// Physical transfer unit: every packet is exactly this long.
pub const PACKET_LEN: usize = 64;

/// Which role a packet's header carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketRole {
    Head,
    Continuation,
    Trailer,
}

/// One fixed-length transport packet: role header followed by payload,
/// zero-padded to the transfer unit.
#[derive(Clone, Debug)]
pub struct Packet {
    role: PacketRole,
    bytes: Vec<u8>,
}

impl Packet {
    pub fn role(&self) -> PacketRole {
        self.role
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Packet geometry: transfer unit plus the three role headers.
#[derive(Clone, Debug)]
pub struct FrameProtocol {
    pub packet_len: usize,
    pub head_header: Vec<u8>,
    pub body_header: Vec<u8>,
    pub tail_header: Vec<u8>,
}

impl Default for FrameProtocol {
    fn default() -> Self {
        FrameProtocol {
            packet_len: PACKET_LEN,
            head_header: HEAD_HEADER.to_vec(),
            body_header: BODY_HEADER.to_vec(),
            tail_header: TAIL_HEADER.to_vec(),
        }
    }
}

impl FrameProtocol {
    /// Payload bytes the head packet carries (47 for the device).
    pub fn head_capacity(&self) -> usize {
        self.packet_len - self.head_header.len()
    }

    /// Payload bytes each continuation packet carries (62 for the device).
    pub fn body_capacity(&self) -> usize {
        self.packet_len - self.body_header.len()
    }

    /// Payload bytes the trailer packet carries before padding.
    pub fn tail_capacity(&self) -> usize {
        self.packet_len - self.tail_header.len()
    }

    /// Total packets a payload of `len` bytes frames into:
    /// head + ⌊(len − head)/body⌋ continuations + one trailer.
    pub fn packet_count(&self, len: usize) -> usize {
        1 + len.saturating_sub(self.head_capacity()) / self.body_capacity() + 1
    }
}

/// One complete display update: the ordered packet list. Built once per
/// render cycle, consumed by the device channel, never retained.
#[derive(Clone, Debug)]
pub struct Frame {
    packets: Vec<Packet>,
}

impl Frame {
    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Total bytes on the wire.
    pub fn wire_len(&self) -> usize {
        self.packets.iter().map(Packet::len).sum()
    }
}

fn build_packet(role: PacketRole, header: &[u8], chunk: &[u8], packet_len: usize) -> Packet {
    let mut bytes = Vec::with_capacity(packet_len);
    bytes.extend_from_slice(header);
    bytes.extend_from_slice(chunk);
    bytes.resize(packet_len, 0); // zero-pad short payloads
    Packet { role, bytes }
}

/// Frame the payload into head → continuations → trailer packets.
pub fn packetize(payload: &[u8], proto: &FrameProtocol) -> Frame {
    let mut packets = Vec::with_capacity(proto.packet_count(payload.len()));

    let mut cursor = proto.head_capacity().min(payload.len());
    packets.push(build_packet(
        PacketRole::Head,
        &proto.head_header,
        &payload[..cursor],
        proto.packet_len,
    ));

    let continuations = payload.len().saturating_sub(proto.head_capacity()) / proto.body_capacity();
    for _ in 0..continuations {
        let end = (cursor + proto.body_capacity()).min(payload.len());
        packets.push(build_packet(
            PacketRole::Continuation,
            &proto.body_header,
            &payload[cursor..end],
            proto.packet_len,
        ));
        cursor = end;
    }

    // The trailer is always emitted exactly once, padded with zeros when
    // fewer payload bytes remain than it can carry.
    let end = (cursor + proto.tail_capacity()).min(payload.len());
    packets.push(build_packet(
        PacketRole::Trailer,
        &proto.tail_header,
        &payload[cursor..end],
        proto.packet_len,
    ));

    Frame { packets }
}
