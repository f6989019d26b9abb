use std::sync::atomic::{AtomicI32, Ordering};

/// States of a task [`Control`] flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ControlState {
    Run = 0,
    /// Reserved, tasks keep running.
    Special = 1,
    Stop = -1,
}

impl ControlState {
    fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Run,
            1 => Self::Special,
            _ => Self::Stop,
        }
    }
}

/// Run/stop flag of one task, checked once per loop iteration.
#[derive(Debug)]
pub struct Control(AtomicI32);

impl Default for Control {
    fn default() -> Self {
        Self(AtomicI32::new(ControlState::Run as i32))
    }
}

impl Control {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ControlState {
        ControlState::from_raw(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: ControlState) {
        self.0.store(state as i32, Ordering::Release);
    }

    pub fn stop(&self) {
        self.set(ControlState::Stop);
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == ControlState::Stop
    }
}
