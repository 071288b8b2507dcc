//! This crate contains architecture-agnostic logic for Cynthia, a device which places a filtering
//! proxy between a host computer and a [VS1053B](https://www.vlsi.fi/en/products/vs1053.html)
//! synthesizer chip speaking the [MIDI](https://midi.org/midi-1-0) wire protocol.
//!
//! The host side of the proxy is untrusted: anything at all may arrive on a serial port. The
//! [`Framer`] reassembles that byte stream into MIDI messages, silently dropping whatever is
//! malformed or unwanted, and hands every accepted message to a pair of [`MidiSink`]s — the
//! synthesizer itself and a loopback to the host, so the sender can observe exactly what made it
//! through.

#![deny(missing_docs)]
#![no_std]

#[cfg(test)]
extern crate std;

mod framer;
pub use framer::*;

mod message_length;
pub use message_length::*;

mod sink;
pub use sink::*;
