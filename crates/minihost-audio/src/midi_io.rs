//! MIDI port bridge (midir).
//!
//! Input ports push into the loop's MIDI queue through the shared producer,
//! always at sample offset 0 of the next buffer. Output ports become the
//! loop's [`MidiOutputSink`], so generated MIDI is written straight from the
//! audio thread.

#![cfg_attr(not(feature = "device"), allow(dead_code))]

use crate::sink::{MidiOutputSink, SharedMidiProducer};
use crate::{Error, Result};
use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use minihost_midi::MidiEvent;

const CLIENT_NAME: &str = "minihost";

/// Which port an endpoint is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PortState {
    /// `None` for a virtual port.
    pub index: Option<usize>,
    pub is_virtual: bool,
}

impl PortState {
    fn hardware(index: usize) -> Self {
        Self {
            index: Some(index),
            is_virtual: false,
        }
    }

    fn virtual_port() -> Self {
        Self {
            index: None,
            is_virtual: true,
        }
    }
}

/// Live MIDI input connection. Dropping it closes the port.
pub(crate) struct InputPort {
    _connection: MidiInputConnection<()>,
    pub state: PortState,
}

/// Writes generated events to a midir output connection.
pub struct MidirOutputSink {
    connection: MidiOutputConnection,
}

impl MidiOutputSink for MidirOutputSink {
    #[inline]
    fn send(&mut self, event: &MidiEvent) -> bool {
        let bytes = event.to_bytes();
        self.connection.send(&bytes[..event.wire_len()]).is_ok()
    }
}

fn forward_to(producer: SharedMidiProducer) -> impl FnMut(u64, &[u8], &mut ()) + Send + 'static {
    move |_timestamp, message, _| {
        // Short messages only; SysEx does not fit a MidiEvent.
        if message.len() > 3 {
            return;
        }
        if let Some(event) = MidiEvent::from_bytes(0, message) {
            // Full queue: the event is lost, same as a dropped packet.
            let _ = producer.lock().push(event);
        }
    }
}

pub(crate) fn open_input(index: usize, producer: SharedMidiProducer) -> Result<InputPort> {
    let midi_input = MidiInput::new(CLIENT_NAME)?;
    let ports = midi_input.ports();
    let port = ports.get(index).ok_or(Error::MidiPortNotFound(index))?;
    let name = midi_input
        .port_name(port)
        .unwrap_or_else(|_| format!("Device {}", index));

    let connection = midi_input
        .connect(port, "minihost-input", forward_to(producer), ())
        .map_err(|e| Error::MidiConnect(e.to_string()))?;

    tracing::info!("Connected MIDI input {}: {}", index, name);
    Ok(InputPort {
        _connection: connection,
        state: PortState::hardware(index),
    })
}

pub(crate) fn open_output(index: usize) -> Result<(MidirOutputSink, PortState)> {
    let midi_output = MidiOutput::new(CLIENT_NAME)?;
    let ports = midi_output.ports();
    let port = ports.get(index).ok_or(Error::MidiPortNotFound(index))?;
    let name = midi_output
        .port_name(port)
        .unwrap_or_else(|_| format!("Device {}", index));

    let connection = midi_output
        .connect(port, "minihost-output")
        .map_err(|e| Error::MidiConnect(e.to_string()))?;

    tracing::info!("Connected MIDI output {}: {}", index, name);
    Ok((MidirOutputSink { connection }, PortState::hardware(index)))
}

#[cfg(unix)]
pub(crate) fn open_virtual_input(name: &str, producer: SharedMidiProducer) -> Result<InputPort> {
    use midir::os::unix::VirtualInput;

    let connection = MidiInput::new(CLIENT_NAME)?
        .create_virtual(name, forward_to(producer), ())
        .map_err(|e| Error::MidiConnect(e.to_string()))?;

    tracing::info!("Created virtual MIDI input: {}", name);
    Ok(InputPort {
        _connection: connection,
        state: PortState::virtual_port(),
    })
}

#[cfg(not(unix))]
pub(crate) fn open_virtual_input(_name: &str, _producer: SharedMidiProducer) -> Result<InputPort> {
    Err(Error::Unsupported("virtual MIDI ports"))
}

#[cfg(unix)]
pub(crate) fn open_virtual_output(name: &str) -> Result<(MidirOutputSink, PortState)> {
    use midir::os::unix::VirtualOutput;

    let connection = MidiOutput::new(CLIENT_NAME)?
        .create_virtual(name)
        .map_err(|e| Error::MidiConnect(e.to_string()))?;

    tracing::info!("Created virtual MIDI output: {}", name);
    Ok((MidirOutputSink { connection }, PortState::virtual_port()))
}

#[cfg(not(unix))]
pub(crate) fn open_virtual_output(_name: &str) -> Result<(MidirOutputSink, PortState)> {
    Err(Error::Unsupported("virtual MIDI ports"))
}
