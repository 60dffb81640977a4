// packet.rs - Fixed-size datagram format used by pushers and receivers
use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use std::fmt;
use std::io::{Cursor, Read};

/// Encoded size of every packet on the wire.
pub const PACKET_SIZE: usize = 1024;
/// Four big-endian u32 fields: id, sequence, total, command.
pub const HEADER_SIZE: usize = 16;
/// Width of the data block that follows the header.
pub const DATA_SIZE: usize = PACKET_SIZE - HEADER_SIZE;
/// Payload carried by every data packet of a test run.
pub const PAYLOAD_SIZE: usize = 1000;

/// Errors raised while decoding a datagram into a [`Packet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    InvalidLength { expected: usize, actual: usize },
    UnknownCommand(u32),
    Truncated,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::InvalidLength { expected, actual } => {
                write!(
                    f,
                    "Invalid datagram length: expected {} bytes, got {}",
                    expected, actual
                )
            }
            FormatError::UnknownCommand(c) => write!(f, "Unknown command: {}", c),
            FormatError::Truncated => write!(f, "Datagram truncated"),
        }
    }
}

impl std::error::Error for FormatError {}

impl From<std::io::Error> for FormatError {
    fn from(_: std::io::Error) -> Self {
        FormatError::Truncated
    }
}

/// Packet command codes.
///
/// Plain data packets go out with code 0 (`Syn`); no handshake is ever run on
/// it. `Ack` is reserved and never produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Command {
    Syn = 0,
    Ack = 1,
    Start = 2,
    End = 3,
}

impl Command {
    /// START and END demarcate a run instead of carrying payload.
    pub fn is_control(self) -> bool {
        matches!(self, Command::Start | Command::End)
    }
}

impl From<Command> for u32 {
    fn from(command: Command) -> u32 {
        command as u32
    }
}

impl TryFrom<u32> for Command {
    type Error = FormatError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Command::Syn),
            1 => Ok(Command::Ack),
            2 => Ok(Command::Start),
            3 => Ok(Command::End),
            other => Err(FormatError::UnknownCommand(other)),
        }
    }
}

/// One wire-level unit of work.
///
/// Layout: `[id:u32][sequence:u32][total:u32][command:u32][data:1008]`, all
/// integers in network byte order. `data` is always exactly [`DATA_SIZE`]
/// bytes: shorter input is zero-padded and longer input is truncated when the
/// packet is built, so `decode(encode(p)) == p` for every constructed packet.
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: u32,
    pub sequence: u32,
    pub total: u32,
    pub command: Command,
    pub data: [u8; DATA_SIZE],
}

impl Packet {
    pub fn new(sequence: u32, total: u32, command: Command, data: &[u8]) -> Self {
        let mut block = [0u8; DATA_SIZE];
        let len = data.len().min(DATA_SIZE);
        block[..len].copy_from_slice(&data[..len]);
        Self {
            id: sequence,
            sequence,
            total,
            command,
            data: block,
        }
    }

    /// A START or END packet with an empty data block.
    pub fn control(command: Command, sequence: u32, total: u32) -> Self {
        Self::new(sequence, total, command, &[])
    }

    /// A payload-carrying packet. Data packets use the reserved `Syn` code,
    /// which is what the receiver sees as "not a session boundary".
    pub fn data(sequence: u32, total: u32, payload: &[u8]) -> Self {
        Self::new(sequence, total, Command::Syn, payload)
    }

    pub fn is_control(&self) -> bool {
        self.command.is_control()
    }

    /// Writes the packet into a caller-provided buffer.
    pub fn encode_into(&self, buf: &mut [u8; PACKET_SIZE]) {
        BigEndian::write_u32(&mut buf[0..4], self.id);
        BigEndian::write_u32(&mut buf[4..8], self.sequence);
        BigEndian::write_u32(&mut buf[8..12], self.total);
        BigEndian::write_u32(&mut buf[12..16], self.command.into());
        buf[HEADER_SIZE..].copy_from_slice(&self.data);
    }

    pub fn encode(&self) -> [u8; PACKET_SIZE] {
        let mut buf = [0u8; PACKET_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Parses a received datagram. Anything other than exactly
    /// [`PACKET_SIZE`] bytes is rejected.
    pub fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() != PACKET_SIZE {
            return Err(FormatError::InvalidLength {
                expected: PACKET_SIZE,
                actual: bytes.len(),
            });
        }

        let mut reader = Cursor::new(bytes);
        let id = reader.read_u32::<BigEndian>()?;
        let sequence = reader.read_u32::<BigEndian>()?;
        let total = reader.read_u32::<BigEndian>()?;
        let command = Command::try_from(reader.read_u32::<BigEndian>()?)?;
        let mut data = [0u8; DATA_SIZE];
        reader.read_exact(&mut data)?;

        Ok(Self {
            id,
            sequence,
            total,
            command,
            data,
        })
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("id", &self.id)
            .field("sequence", &self.sequence)
            .field("total", &self.total)
            .field("command", &self.command)
            .field("data", &&self.data[..3])
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout_is_big_endian() {
        let packet = Packet::new(0x01020304, 0x0A0B0C0D, Command::End, b"abc");
        let bytes = packet.encode();
        assert_eq!(&bytes[0..4], &[1, 2, 3, 4]);
        assert_eq!(&bytes[4..8], &[1, 2, 3, 4]);
        assert_eq!(&bytes[8..12], &[0x0A, 0x0B, 0x0C, 0x0D]);
        assert_eq!(&bytes[12..16], &[0, 0, 0, 3]);
        assert_eq!(&bytes[16..19], b"abc");
        assert!(bytes[19..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_id_mirrors_sequence() {
        let packet = Packet::data(42, 100, &[b'x'; PAYLOAD_SIZE]);
        assert_eq!(packet.id, 42);
    }

    #[test]
    fn test_short_data_is_zero_padded() {
        let packet = Packet::data(1, 1, &[7u8; 10]);
        let decoded = Packet::decode(&packet.encode()).unwrap();
        assert_eq!(&decoded.data[..10], &[7u8; 10]);
        assert!(decoded.data[10..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_long_data_is_truncated() {
        let long = vec![9u8; DATA_SIZE + 100];
        let packet = Packet::data(1, 1, &long);
        assert_eq!(packet.data, [9u8; DATA_SIZE]);
        assert_eq!(packet.encode().len(), PACKET_SIZE);
    }

    #[test]
    fn test_decode_rejects_wrong_lengths() {
        for len in [0usize, 1, HEADER_SIZE, PACKET_SIZE - 1, PACKET_SIZE + 1, 2048] {
            let bytes = vec![0u8; len];
            assert_eq!(
                Packet::decode(&bytes),
                Err(FormatError::InvalidLength {
                    expected: PACKET_SIZE,
                    actual: len
                })
            );
        }
    }

    #[test]
    fn test_decode_rejects_unknown_command() {
        let mut bytes = Packet::control(Command::Start, 0, 0).encode();
        bytes[12..16].copy_from_slice(&7u32.to_be_bytes());
        assert_eq!(Packet::decode(&bytes), Err(FormatError::UnknownCommand(7)));
    }

    #[test]
    fn test_control_commands() {
        assert!(Command::Start.is_control());
        assert!(Command::End.is_control());
        assert!(!Command::Syn.is_control());
        assert!(!Command::Ack.is_control());
    }
}
