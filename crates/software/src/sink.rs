//! Destinations for bytes the framer has accepted for forwarding.

use tinyvec::{Array, ArrayVec};

/// A destination for fragments of a MIDI byte stream.
///
/// The framer writes every accepted byte sequence to two sinks at once: the hardware channel
/// (the authoritative path to the synthesizer) and a loopback to the host. In firmware these are
/// staging buffers drained into the UART and USB writers; in tests they are in-memory buffers the
/// assertions read back, so no channel I/O is ever required to exercise the framing logic.
pub trait MidiSink {
    /// Append `bytes` to whatever the sink has already received.
    fn accept(&mut self, bytes: &[u8]);
}

/// [`ArrayVec`]s of bytes are sinks. Accepting more bytes than the backing array holds panics,
/// so size the array for the traffic it will see.
impl<A: Array<Item = u8>> MidiSink for ArrayVec<A> {
    fn accept(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_vec_accumulates_across_accepts() {
        let mut sink: ArrayVec<[u8; 8]> = ArrayVec::new();
        sink.accept(&[0x90, 0x40]);
        sink.accept(&[0x7F]);
        assert_eq!(
            &[0x90, 0x40, 0x7F],
            sink.as_slice(),
            "Expected left but got right"
        );
    }
}
