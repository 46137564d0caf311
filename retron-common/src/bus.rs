// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use crate::lines::Lines;

/// Transfer direction of the 8-bit data bus, from the CPU's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusDirection {
    Read,
    Write,
}

impl BusDirection {
    /// Value for a direction call covering the data bus
    pub fn outputs(&self) -> u16 {
        match self {
            BusDirection::Read => 0,
            BusDirection::Write => Lines::DATA.bits(),
        }
    }
}

/// Remembers the last direction programmed onto the data bus so redundant
/// direction changes can be skipped.
///
/// Starts out unknown, so the first request always programs the bus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionCache {
    current: Option<BusDirection>,
}

impl DirectionCache {
    pub fn current(&self) -> Option<BusDirection> {
        self.current
    }

    /// Returns the direction to program if `wanted` differs from the cached
    /// direction, recording it as current.  Returns `None` when the bus is
    /// already set up.
    pub fn transition(&mut self, wanted: BusDirection) -> Option<BusDirection> {
        if self.current == Some(wanted) {
            None
        } else {
            self.current = Some(wanted);
            Some(wanted)
        }
    }
}
