//! ARQ tags: alternating-bit sequence numbers and DATA/ACK kinds.

/// One-bit sequence number of the stop-and-wait protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Seq {
    Zero,
    One,
}

impl Seq {
    /// The other sequence number.
    pub const fn flip(self) -> Self {
        match self {
            Seq::Zero => Seq::One,
            Seq::One => Seq::Zero,
        }
    }

    pub const fn as_u8(self) -> u8 {
        match self {
            Seq::Zero => 0,
            Seq::One => 1,
        }
    }
}

impl std::fmt::Display for Seq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// ARQ meaning of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArqMessage {
    /// Sequenced frame that must be acknowledged.
    Data(Seq),
    /// Acknowledgment of the data frame with the same sequence.
    Ack(Seq),
}

impl ArqMessage {
    /// Wire code (two bits): DATA0=0, ACK0=1, DATA1=2, ACK1=3.
    pub const fn code(self) -> u8 {
        match self {
            ArqMessage::Data(Seq::Zero) => 0,
            ArqMessage::Ack(Seq::Zero) => 1,
            ArqMessage::Data(Seq::One) => 2,
            ArqMessage::Ack(Seq::One) => 3,
        }
    }

    /// Parse a two-bit wire code.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ArqMessage::Data(Seq::Zero)),
            1 => Some(ArqMessage::Ack(Seq::Zero)),
            2 => Some(ArqMessage::Data(Seq::One)),
            3 => Some(ArqMessage::Ack(Seq::One)),
            _ => None,
        }
    }

    pub const fn seq(self) -> Seq {
        match self {
            ArqMessage::Data(seq) | ArqMessage::Ack(seq) => seq,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_alternates() {
        assert_eq!(Seq::Zero.flip(), Seq::One);
        assert_eq!(Seq::One.flip().flip(), Seq::One);
    }

    #[test]
    fn wire_codes_match_protocol_table() {
        assert_eq!(ArqMessage::Data(Seq::Zero).code(), 0);
        assert_eq!(ArqMessage::Ack(Seq::Zero).code(), 1);
        assert_eq!(ArqMessage::Data(Seq::One).code(), 2);
        assert_eq!(ArqMessage::Ack(Seq::One).code(), 3);
        assert_eq!(ArqMessage::from_code(2), Some(ArqMessage::Data(Seq::One)));
        assert_eq!(ArqMessage::from_code(7), None);
    }
}
