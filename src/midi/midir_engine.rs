use crate::midi::{MidiEngine, MidiError, MidiMessage, Result};
use crossbeam::channel::{unbounded, Receiver, TryRecvError};
use log::{debug, info, warn};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};

const CLIENT_NAME: &str = "pllsyncrs";

pub struct MidirEngine {
    #[allow(dead_code)]
    input: Option<MidiInputConnection<()>>,
    output: Option<MidiOutputConnection>,
    rx: Option<Receiver<Vec<u8>>>,
}

impl MidirEngine {
    /// Connects to the first input and output ports whose names contain the
    /// given substrings. Either side may be left unconnected.
    pub fn new(input_device: Option<&str>, output_device: Option<&str>) -> Result<Self> {
        let (input, rx) = match input_device {
            Some(name) => {
                let (conn, rx) = Self::connect_input(name)?;
                (Some(conn), Some(rx))
            }
            None => (None, None),
        };

        let output = match output_device {
            Some(name) => Some(Self::connect_output(name)?),
            None => None,
        };

        Ok(MidirEngine { input, output, rx })
    }

    fn connect_input(name: &str) -> Result<(MidiInputConnection<()>, Receiver<Vec<u8>>)> {
        let mut midi_in = MidiInput::new(&format!("{}-in", CLIENT_NAME))?;
        // clock and sysex must come through
        midi_in.ignore(Ignore::None);

        let in_ports = midi_in.ports();
        let in_port = in_ports
            .iter()
            .find(|p| midi_in.port_name(p).unwrap_or_default().contains(name))
            .ok_or_else(|| {
                MidiError::ConnectionError(format!("input device '{}' not found", name))
            })?;
        info!("Connecting MIDI input: {}", midi_in.port_name(in_port)?);

        let (tx, rx) = unbounded();
        let conn = midi_in.connect(
            in_port,
            &format!("{}-input", CLIENT_NAME),
            move |_stamp, message, _| {
                let _ = tx.send(message.to_vec());
            },
            (),
        )?;
        Ok((conn, rx))
    }

    fn connect_output(name: &str) -> Result<MidiOutputConnection> {
        let midi_out = MidiOutput::new(&format!("{}-out", CLIENT_NAME))?;

        let out_ports = midi_out.ports();
        let out_port = out_ports
            .iter()
            .find(|p| midi_out.port_name(p).unwrap_or_default().contains(name))
            .ok_or_else(|| {
                MidiError::ConnectionError(format!("output device '{}' not found", name))
            })?;
        info!("Connecting MIDI output: {}", midi_out.port_name(out_port)?);

        Ok(midi_out.connect(out_port, &format!("{}-output", CLIENT_NAME))?)
    }

    /// Names of every input and output port visible to the system.
    pub fn available_ports() -> Vec<String> {
        let mut devices = Vec::new();

        if let Ok(midi_in) = MidiInput::new(&format!("{}-list-in", CLIENT_NAME)) {
            for port in midi_in.ports() {
                if let Ok(name) = midi_in.port_name(&port) {
                    devices.push(format!("{} [Input]", name));
                }
            }
        }
        if let Ok(midi_out) = MidiOutput::new(&format!("{}-list-out", CLIENT_NAME)) {
            for port in midi_out.ports() {
                if let Ok(name) = midi_out.port_name(&port) {
                    devices.push(format!("{} [Output]", name));
                }
            }
        }

        devices
    }
}

impl MidiEngine for MidirEngine {
    fn send(&mut self, msg: MidiMessage) -> Result<()> {
        if let Some(output) = &mut self.output {
            output.send(&msg.to_bytes())?;
        }
        Ok(())
    }

    fn try_recv(&mut self) -> Result<Option<MidiMessage>> {
        let rx = match &self.rx {
            Some(rx) => rx,
            None => return Ok(None),
        };
        loop {
            match rx.try_recv() {
                Ok(data) => match MidiMessage::from_bytes(&data) {
                    Some(msg) => return Ok(Some(msg)),
                    None => {
                        debug!("Dropping unsupported MIDI message: {:02X?}", data);
                        continue;
                    }
                },
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Disconnected) => {
                    warn!("MIDI input callback disconnected");
                    return Err(MidiError::RecvError("input disconnected".to_string()));
                }
            }
        }
    }

    fn list_devices(&self) -> Vec<String> {
        Self::available_ports()
    }
}
