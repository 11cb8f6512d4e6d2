use std::fs;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use spa::prelude::*;
use spa::{Operation, TicketBook, TicketStatus};

const CONTROL_RING: usize = 4096;

/// What `save` writes and `load` reads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainState {
    pub gain: f32,
}

pub struct GainPlugin {
    input: StereoIn,
    output: StereoOut,
    buffer_size: BufferSize,
    sample_count: SampleCount,
    osc: OscIn,
    gain: f32,
    left: Vec<f32>,
    right: Vec<f32>,
    rejected: u64,
    last_rejection: Option<Error>,
    tickets: Option<TicketBook>,
    // Last saved or loaded gain, reapplied by `restore`.
    restore_point: f32,
    loaded: Arc<Mutex<Option<f32>>>,
}

impl GainPlugin {
    pub fn new() -> Self {
        Self {
            input: StereoIn::new().mark_compulsory(),
            output: StereoOut::new().mark_compulsory(),
            buffer_size: BufferSize::new(),
            sample_count: SampleCount::new(),
            osc: OscIn::new(CONTROL_RING),
            gain: 0.0,
            left: Vec::new(),
            right: Vec::new(),
            rejected: 0,
            last_rejection: None,
            tickets: None,
            restore_point: 0.0,
            loaded: Arc::new(Mutex::new(None)),
        }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Control messages discarded since the last deactivation.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    fn apply_message(&mut self) -> Result<()> {
        let msg = self.osc.message()?;
        match msg.path() {
            "/gain" => {
                assert_types_are("/gain", "f", msg.types())?;
                if let Some(gain) = msg.arg(0)?.as_f32() {
                    self.gain = gain;
                }
                Ok(())
            }
            _ => Err(Error::Malformed("unknown path")),
        }
    }

    fn settled(&self, operation: Operation, ticket: Ticket, outcome: TicketStatus) -> bool {
        self.tickets
            .as_ref()
            .is_some_and(|tickets| tickets.settle(operation, ticket, outcome))
    }

    fn reject(&mut self, err: Error) {
        self.rejected += 1;
        self.last_rejection = Some(err);
    }

    fn drain_control(&mut self) -> Result<()> {
        loop {
            match self.osc.read_msg() {
                Ok(true) => {
                    if let Err(err) = self.apply_message() {
                        self.reject(err);
                    }
                }
                Ok(false) => return Ok(()),
                Err(err @ Error::OutOfRange { .. }) => {
                    self.osc.discard_pending();
                    self.reject(err);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for GainPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for GainPlugin {
    fn port(&mut self, name: &str) -> Result<&mut dyn Port> {
        match name {
            "in" => Ok(&mut self.input),
            "out" => Ok(&mut self.output),
            "buffersize" => Ok(&mut self.buffer_size),
            "samplecount" => Ok(&mut self.sample_count),
            "osc" => Ok(&mut self.osc),
            _ => Err(Error::PortNotFound { name: name.into() }),
        }
    }

    fn init(&mut self) -> Result<()> {
        let frames = self.buffer_size.get().ok_or(Error::Unbound {
            name: "buffersize".into(),
        })? as usize;
        self.left.resize(frames, 0.0);
        self.right.resize(frames, 0.0);
        if self.tickets.is_none() {
            self.tickets = Some(TicketBook::new()?);
        }
        log::debug!("gain initialised for blocks of {frames} frames");
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        self.drain_control()?;

        let frames = self
            .sample_count
            .get()
            .map_or(self.left.len(), |count| count as usize)
            .min(self.left.len())
            .min(self.input.frames())
            .min(self.output.frames());
        let gain = self.gain;
        for (dst, src) in self.left[..frames].iter_mut().zip(self.input.left()) {
            *dst = gain * src;
        }
        for (dst, src) in self.right[..frames].iter_mut().zip(self.input.right()) {
            *dst = gain * src;
        }
        let (left, right) = self.output.channels_mut();
        left[..frames].copy_from_slice(&self.left[..frames]);
        right[..frames].copy_from_slice(&self.right[..frames]);
        Ok(())
    }

    fn deactivate(&mut self) {
        if let Some(err) = self.last_rejection.take() {
            log::warn!("discarded {} control messages, last: {err}", self.rejected);
        }
        self.rejected = 0;
    }

    fn save(&mut self, path: &str, ticket: Ticket) -> bool {
        let Some(tickets) = &self.tickets else {
            return false;
        };
        let state = GainState { gain: self.gain };
        self.restore_point = state.gain;
        let path = path.to_owned();
        tickets.submit(Operation::Save, ticket, move || {
            let json = serde_json::to_vec_pretty(&state).map_err(io::Error::other)?;
            fs::write(path, json)
        })
    }

    fn load(&mut self, path: &str, ticket: Ticket) -> bool {
        let Some(tickets) = &self.tickets else {
            return false;
        };
        let slot = Arc::clone(&self.loaded);
        let path = path.to_owned();
        tickets.submit(Operation::Load, ticket, move || {
            let bytes = fs::read(path)?;
            let state: GainState = serde_json::from_slice(&bytes).map_err(io::Error::other)?;
            *slot.lock() = Some(state.gain);
            Ok(())
        })
    }

    fn restore(&mut self, ticket: Ticket) -> bool {
        let Some(tickets) = &self.tickets else {
            return false;
        };
        self.gain = self.restore_point;
        tickets.complete(Operation::Restore, ticket, true);
        true
    }

    fn save_check(&mut self, _path: &str, ticket: Ticket) -> bool {
        self.settled(Operation::Save, ticket, TicketStatus::Done)
    }

    fn load_check(&mut self, _path: &str, ticket: Ticket) -> bool {
        let done = self.settled(Operation::Load, ticket, TicketStatus::Done);
        if done {
            if let Some(gain) = self.loaded.lock().take() {
                self.gain = gain;
                self.restore_point = gain;
            }
        }
        done
    }

    fn restore_check(&mut self, ticket: Ticket) -> bool {
        self.settled(Operation::Restore, ticket, TicketStatus::Done)
    }

    fn request_failed(&mut self, operation: Operation, ticket: Ticket) -> bool {
        self.settled(operation, ticket, TicketStatus::Failed)
    }
}
