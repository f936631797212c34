//! CPU-port encapsulation.
//!
//! Frames redirected to the control plane arrive on the CPU port wrapped in
//! a fixed header naming the redirect reason and the ingress port.

use super::frame::{DecodeError, DecodeResult};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use sai_api::{CpuReason, ObjectId};

//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |             Magic             |          Reason Code          |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                                                               |
// +                      Ingress Port Handle                      +
// |                                                               |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |        Original Length        |        Original Frame ...     |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuPacket {
    pub reason: CpuReason,
    pub ingress_port: ObjectId,
    /// The frame as it was received.
    pub frame: Bytes,
}

impl CpuPacket {
    pub const MAGIC: u16 = 0x5ac1;
    pub const HEADER_LEN: usize = 14;

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::HEADER_LEN + self.frame.len());
        buf.put_u16(Self::MAGIC);
        buf.put_u16(self.reason.code());
        buf.put_u64(self.ingress_port.as_raw());
        buf.put_u16(self.frame.len() as u16);
        buf.put_slice(&self.frame);
        buf.freeze()
    }

    pub fn decode(data: &[u8]) -> DecodeResult<Self> {
        if data.len() < Self::HEADER_LEN {
            return Err(DecodeError::InsufficientData {
                need: Self::HEADER_LEN,
                have: data.len(),
            });
        }
        let mut buf = Bytes::copy_from_slice(data);
        let magic = buf.get_u16();
        if magic != Self::MAGIC {
            return Err(DecodeError::InvalidMagic(magic));
        }
        let code = buf.get_u16();
        let reason = CpuReason::from_code(code).ok_or(DecodeError::UnknownReason(code))?;
        let ingress_port = ObjectId::from_raw(buf.get_u64());
        let len = usize::from(buf.get_u16());
        if buf.remaining() < len {
            return Err(DecodeError::InsufficientData {
                need: len,
                have: buf.remaining(),
            });
        }
        Ok(CpuPacket {
            reason,
            ingress_port,
            frame: buf.split_to(len),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::tcp_packet;
    use pretty_assertions::assert_eq;
    use sai_api::ObjectKind;

    #[test]
    fn test_encapsulation() {
        let inner = tcp_packet().build().unwrap().encode();
        let port = ObjectId::compose(ObjectKind::Port, 4);
        let pkt = CpuPacket {
            reason: CpuReason::Glean,
            ingress_port: port,
            frame: inner.clone(),
        };
        let bytes = pkt.encode();
        assert_eq!(bytes.len(), CpuPacket::HEADER_LEN + inner.len());
        assert_eq!(&bytes[2..4], &CpuReason::Glean.code().to_be_bytes());
        assert_eq!(CpuPacket::decode(&bytes).unwrap(), pkt);
    }

    #[test]
    fn test_rejects_data_frame() {
        let data = tcp_packet().build().unwrap().encode();
        assert!(matches!(
            CpuPacket::decode(&data),
            Err(DecodeError::InvalidMagic(_))
        ));
    }
}
