use serde::{Deserialize, Serialize};

use crate::{Error, Frame};

/// Wire-level packet type tag, the `type` byte of the header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketKind {
    Inputs = 1,
    SpectatorInputs = 2,
    InputAck = 3,
    SyncRequest = 4,
    SyncResponse = 5,
    SessionHealth = 6,
    NetworkHealth = 7,
}

impl TryFrom<u8> for PacketKind {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => PacketKind::Inputs,
            2 => PacketKind::SpectatorInputs,
            3 => PacketKind::InputAck,
            4 => PacketKind::SyncRequest,
            5 => PacketKind::SyncResponse,
            6 => PacketKind::SessionHealth,
            7 => PacketKind::NetworkHealth,
            other => {
                return Err(Error::InvalidRequest {
                    info: format!("unknown packet type tag {other}"),
                })
            }
        })
    }
}

/// The 8-byte-nominal header shared by every packet: a type tag and the
/// recipient's session magic (0 for a `SyncRequest` to an unknown peer).
/// Serialized as a compact 3-byte prefix (`u8` + `u16`, little-endian) —
/// this serializer has no struct-alignment padding to replicate.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub kind: PacketKind,
    pub magic: u16,
}

pub const HEADER_LEN: usize = 3;

impl Header {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.kind as u8);
        out.extend_from_slice(&self.magic.to_le_bytes());
    }

    fn decode(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::InvalidRequest {
                info: "packet shorter than header".to_string(),
            });
        }
        let kind = PacketKind::try_from(bytes[0])?;
        let magic = u16::from_le_bytes([bytes[1], bytes[2]]);
        Ok(Self { kind, magic })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputsBody {
    pub start_frame: Frame,
    pub input_count: u16,
    pub total_size: u16,
    pub inputs: Vec<u8>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputAckBody {
    pub ack_frame: Frame,
    pub frame_advantage: i8,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SyncBody {
    pub rng_data: u16,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHealthBody {
    pub frame: Frame,
    pub checksum: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkHealthBody {
    pub send_time: u64,
    pub received: bool,
}

/// A fully-typed packet body, tagged by the discriminant carried in the
/// header rather than a redundant serde-internal enum tag.
#[derive(Clone, Debug, PartialEq)]
pub enum Packet {
    Inputs(InputsBody),
    SpectatorInputs(InputsBody),
    InputAck(InputAckBody),
    SyncRequest(SyncBody),
    SyncResponse(SyncBody),
    SessionHealth(SessionHealthBody),
    NetworkHealth(NetworkHealthBody),
}

impl Packet {
    fn kind(&self) -> PacketKind {
        match self {
            Packet::Inputs(_) => PacketKind::Inputs,
            Packet::SpectatorInputs(_) => PacketKind::SpectatorInputs,
            Packet::InputAck(_) => PacketKind::InputAck,
            Packet::SyncRequest(_) => PacketKind::SyncRequest,
            Packet::SyncResponse(_) => PacketKind::SyncResponse,
            Packet::SessionHealth(_) => PacketKind::SessionHealth,
            Packet::NetworkHealth(_) => PacketKind::NetworkHealth,
        }
    }

    pub fn encode(&self, magic: u16) -> Vec<u8> {
        let header = Header { kind: self.kind(), magic };
        let mut buf = Vec::new();
        header.encode(&mut buf);
        let body = match self {
            Packet::Inputs(b) | Packet::SpectatorInputs(b) => {
                bincode::serialize(b).expect("input body serialization cannot fail")
            }
            Packet::InputAck(b) => bincode::serialize(b).expect("ack body serialization cannot fail"),
            Packet::SyncRequest(b) | Packet::SyncResponse(b) => {
                bincode::serialize(b).expect("sync body serialization cannot fail")
            }
            Packet::SessionHealth(b) => {
                bincode::serialize(b).expect("health body serialization cannot fail")
            }
            Packet::NetworkHealth(b) => {
                bincode::serialize(b).expect("network health body serialization cannot fail")
            }
        };
        buf.extend_from_slice(&body);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<(Header, Packet), Error> {
        let header = Header::decode(bytes)?;
        let body_bytes = &bytes[HEADER_LEN..];
        let malformed = |e: bincode::Error| Error::InvalidRequest {
            info: format!("malformed packet body: {e}"),
        };
        let packet = match header.kind {
            PacketKind::Inputs => {
                Packet::Inputs(bincode::deserialize(body_bytes).map_err(malformed)?)
            }
            PacketKind::SpectatorInputs => {
                Packet::SpectatorInputs(bincode::deserialize(body_bytes).map_err(malformed)?)
            }
            PacketKind::InputAck => {
                Packet::InputAck(bincode::deserialize(body_bytes).map_err(malformed)?)
            }
            PacketKind::SyncRequest => {
                Packet::SyncRequest(bincode::deserialize(body_bytes).map_err(malformed)?)
            }
            PacketKind::SyncResponse => {
                Packet::SyncResponse(bincode::deserialize(body_bytes).map_err(malformed)?)
            }
            PacketKind::SessionHealth => {
                Packet::SessionHealth(bincode::deserialize(body_bytes).map_err(malformed)?)
            }
            PacketKind::NetworkHealth => {
                Packet::NetworkHealth(bincode::deserialize(body_bytes).map_err(malformed)?)
            }
        };
        Ok((header, packet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inputs_packet_round_trips() {
        let packet = Packet::Inputs(InputsBody {
            start_frame: 7,
            input_count: 2,
            total_size: 4,
            inputs: vec![1, 2, 3, 4],
        });
        let bytes = packet.encode(0xBEEF);
        let (header, decoded) = Packet::decode(&bytes).unwrap();
        assert_eq!(header.magic, 0xBEEF);
        assert_eq!(header.kind, PacketKind::Inputs);
        assert_eq!(decoded, packet);
    }

    #[test]
    fn unknown_type_tag_is_rejected() {
        let bytes = vec![99, 0, 0];
        assert!(Packet::decode(&bytes).is_err());
    }
}
