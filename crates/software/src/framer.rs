//! The message framer applied to the untrusted host byte stream.
//!
//! The framer is a strict one-pass state machine: it consumes one byte at a time, in arrival
//! order, with no look-ahead and no backtracking. Every recognized, complete, policy-permitted
//! message is emitted exactly once to both output sinks; everything else is dropped silently and
//! deterministically, and never corrupts recognition beyond the message it belonged to.

use crate::{MessageLength, MidiSink, SYSEX_END, SYSEX_START, SYSTEM_RESET, is_realtime};
use tinyvec::ArrayVec;

/// The longest fixed-length MIDI message: a status byte plus two data bytes.
const MAX_FIXED_LEN: usize = 3;

/// Framing progress for the host byte stream.
///
/// `Accumulating` and `InSysEx` being distinct variants makes the illegal combination — a
/// fixed-length message open inside a System Exclusive session — unrepresentable.
#[derive(Clone, Debug, PartialEq, Eq)]
enum State {
    /// No message in progress.
    Idle,
    /// A fixed-length message is being assembled.
    Accumulating {
        /// Total length, status byte included, the open message will reach.
        expected: u8,
        /// The status byte plus the data bytes collected so far.
        buffer: ArrayVec<[u8; MAX_FIXED_LEN]>,
    },
    /// A System Exclusive message has been opened and not yet terminated.
    InSysEx,
}

impl Default for State {
    fn default() -> Self {
        Self::Idle
    }
}

/// Counts of host bytes dropped, by reason.
///
/// Dropping is the framer's whole error model: nothing is raised and nothing is retried, so
/// these counters are the only record that unwanted input ever existed. They never influence
/// what is emitted. Counters saturate rather than wrap; a stream hostile enough to exhaust
/// them must not take the filter down with it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FramerStats {
    /// Status bytes no message length is defined for.
    pub unknown_status: u32,
    /// Data bytes received with no message open to put them in.
    pub orphaned_data: u32,
    /// Status bytes received inside an open System Exclusive message.
    pub sysex_interior_status: u32,
    /// System Reset bytes, which this device never forwards.
    pub system_reset: u32,
    /// End of SysEx terminators with no matching start marker.
    pub stray_terminator: u32,
}

/// Reassembles MIDI messages from an untrusted byte stream.
///
/// One instance frames one stream. Instances are independent, so a fresh framer per host
/// session (and per unit test) needs no shared setup or teardown.
#[derive(Clone, Debug, Default)]
pub struct Framer {
    state: State,
    stats: FramerStats,
}

impl Framer {
    /// Construct a framer with no message in progress.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts of bytes dropped so far, by reason.
    pub fn stats(&self) -> FramerStats {
        self.stats
    }

    /// Consume the next byte from the host stream.
    ///
    /// Output is produced incrementally as framing allows: a fixed-length message is emitted as
    /// one unit on its final byte, while System Exclusive content streams through byte-by-byte
    /// as it arrives. Dropped input produces no output at all.
    pub fn push(&mut self, byte: u8, hardware: &mut impl MidiSink, loopback: &mut impl MidiSink) {
        // System Real-Time bytes interleave with anything and leave framing state alone.
        if is_realtime(byte) {
            if byte == SYSTEM_RESET {
                // the host does not get to reset the synthesizer
                self.stats.system_reset = self.stats.system_reset.saturating_add(1);
            } else {
                emit(&[byte], hardware, loopback);
            }
            return;
        }

        if byte == SYSEX_END {
            match self.state {
                State::InSysEx => emit(&[byte], hardware, loopback),
                // a terminator with nothing to terminate; any half-assembled message dies with it
                _ => self.stats.stray_terminator = self.stats.stray_terminator.saturating_add(1),
            }
            self.state = State::Idle;
            return;
        }

        if byte == SYSEX_START {
            // the start marker is forwarded eagerly, before any content has arrived
            self.state = State::InSysEx;
            emit(&[byte], hardware, loopback);
            return;
        }

        if self.state == State::InSysEx {
            if byte < 0x80 {
                emit(&[byte], hardware, loopback);
            } else {
                // the protocol forbids interior status bytes; the session stays open
                self.stats.sysex_interior_status =
                    self.stats.sysex_interior_status.saturating_add(1);
            }
            return;
        }

        if byte >= 0x80 {
            // a new status byte supersedes whatever was being assembled
            match MessageLength::of(byte) {
                MessageLength::Fixed(1) => {
                    // Tune Request is the only single-byte message that arrives through the
                    // normal path; real-time bytes never reach this far
                    emit(&[byte], hardware, loopback);
                    self.state = State::Idle;
                }
                MessageLength::Fixed(expected) => {
                    let mut buffer = ArrayVec::new();
                    buffer.push(byte);
                    self.state = State::Accumulating { expected, buffer };
                }
                // SysEx start was handled above, so Variable cannot occur here
                MessageLength::Variable | MessageLength::Unknown => {
                    self.stats.unknown_status = self.stats.unknown_status.saturating_add(1);
                    self.state = State::Idle;
                }
            }
            return;
        }

        match &mut self.state {
            State::Accumulating { expected, buffer } => {
                buffer.push(byte);
                if buffer.len() == usize::from(*expected) {
                    emit(buffer.as_slice(), hardware, loopback);
                    self.state = State::Idle;
                }
            }
            // a data byte with no governing status
            _ => self.stats.orphaned_data = self.stats.orphaned_data.saturating_add(1),
        }
    }
}

/// Write an accepted byte sequence to both destinations: the hardware channel forwards it to
/// the synthesizer, the loopback confirms to the host what was actually sent.
fn emit(bytes: &[u8], hardware: &mut impl MidiSink, loopback: &mut impl MidiSink) {
    hardware.accept(bytes);
    loopback.accept(bytes);
}
