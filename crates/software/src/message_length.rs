//! Classification of MIDI status bytes by the total length of the message they introduce.

/// Status byte opening a System Exclusive message.
pub const SYSEX_START: u8 = 0xF0;

/// Status byte terminating a System Exclusive message.
pub const SYSEX_END: u8 = 0xF7;

/// System Reset. The one message this device refuses to forward under any circumstances.
pub const SYSTEM_RESET: u8 = 0xFF;

/// Whether `byte` is a System Real-Time status byte (`0xF8..=0xFF`).
///
/// Real-time bytes are single-byte messages allowed to interleave anywhere in the stream,
/// including in the middle of another message, without disturbing its assembly.
pub fn is_realtime(byte: u8) -> bool {
    byte >= 0xF8
}

/// The total length, status byte included, of the MIDI message a status byte introduces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageLength {
    /// A fixed-length message totalling the given number of bytes.
    Fixed(u8),
    /// A System Exclusive message, which runs until an End of SysEx terminator arrives.
    Variable,
    /// Not a status byte this device recognizes; whatever it introduces is discarded.
    Unknown,
}

impl MessageLength {
    /// Classify a candidate status byte.
    ///
    /// Bytes below `0x80` are data bytes and introduce nothing; they classify as
    /// [`Unknown`][Self::Unknown].
    pub fn of(status: u8) -> Self {
        match status {
            SYSEX_START => Self::Variable,
            // Time Code Quarter Frame, Song Select
            0xF1 | 0xF3 => Self::Fixed(2),
            // Song Position Pointer
            0xF2 => Self::Fixed(3),
            // Tune Request, End of SysEx
            0xF6 | SYSEX_END => Self::Fixed(1),
            // the defined System Real-Time messages, System Reset included
            0xF8 | 0xFA..=0xFC | 0xFE | SYSTEM_RESET => Self::Fixed(1),
            // undefined System bytes: 0xF4, 0xF5, 0xF9, 0xFD
            0xF0.. => Self::Unknown,
            // Note Off, Note On, Poly Key Pressure, Control Change, Pitch Bend
            0x80..=0xBF | 0xE0..=0xEF => Self::Fixed(3),
            // Program Change, Channel Pressure
            0xC0..=0xDF => Self::Fixed(2),
            // data byte
            _ => Self::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_voice_lengths_hold_for_every_channel() {
        for channel in 0x0..=0xF {
            for nibble in [0x80, 0x90, 0xA0, 0xB0, 0xE0] {
                assert_eq!(
                    MessageLength::Fixed(3),
                    MessageLength::of(nibble | channel),
                    "Expected left but got right"
                );
            }
            for nibble in [0xC0, 0xD0] {
                assert_eq!(
                    MessageLength::Fixed(2),
                    MessageLength::of(nibble | channel),
                    "Expected left but got right"
                );
            }
        }
    }

    #[test]
    fn system_common_lengths() {
        assert_eq!(MessageLength::Variable, MessageLength::of(SYSEX_START));
        assert_eq!(MessageLength::Fixed(2), MessageLength::of(0xF1));
        assert_eq!(MessageLength::Fixed(3), MessageLength::of(0xF2));
        assert_eq!(MessageLength::Fixed(2), MessageLength::of(0xF3));
        assert_eq!(MessageLength::Fixed(1), MessageLength::of(0xF6));
        assert_eq!(MessageLength::Fixed(1), MessageLength::of(SYSEX_END));
    }

    #[test]
    fn real_time_lengths() {
        for status in [0xF8, 0xFA, 0xFB, 0xFC, 0xFE, SYSTEM_RESET] {
            assert_eq!(
                MessageLength::Fixed(1),
                MessageLength::of(status),
                "Expected left but got right"
            );
        }
    }

    #[test]
    fn undefined_system_bytes_are_unknown() {
        for status in [0xF4, 0xF5, 0xF9, 0xFD] {
            assert_eq!(
                MessageLength::Unknown,
                MessageLength::of(status),
                "Expected left but got right"
            );
        }
    }

    #[test]
    fn data_bytes_are_unknown() {
        for byte in [0x00, 0x40, 0x7F] {
            assert_eq!(
                MessageLength::Unknown,
                MessageLength::of(byte),
                "Expected left but got right"
            );
        }
    }

    #[test]
    fn real_time_range() {
        assert!(!is_realtime(0xF7));
        assert!(is_realtime(0xF8));
        assert!(is_realtime(SYSTEM_RESET));
        assert!(!is_realtime(0x00));
    }
}
