//! Fixed-slice system clock

use og_cpu::state::spr;
use og_cpu::{CoreTiming, Exceptions, PowerPcState};

/// CPU cycles per time base tick
pub const TIMER_RATIO: u64 = 12;

/// Hands out equal cycle budgets and advances the time base and decrementer
/// by the cycles actually consumed
#[derive(Debug, Clone)]
pub struct FixedTiming {
    slice: i32,
    /// Budget granted by the last advance
    granted: i32,
    /// Cycles not yet turned into a time base tick
    remainder: u64,
    /// Total cycles executed
    cycles: u64,
}

impl FixedTiming {
    pub fn new(slice: i32) -> Self {
        Self {
            slice: slice.max(1),
            granted: 0,
            remainder: 0,
            cycles: 0,
        }
    }

    pub fn slice(&self) -> i32 {
        self.slice
    }

    /// Total cycles accounted so far
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    fn tick(&mut self, state: &mut PowerPcState, cycles: u64) {
        self.cycles += cycles;
        let total = self.remainder + cycles;
        let ticks = total / TIMER_RATIO;
        self.remainder = total % TIMER_RATIO;
        if ticks == 0 {
            return;
        }

        let tb = state.time_base().wrapping_add(ticks);
        state.set_time_base(tb);

        let old = state.spr[spr::DEC];
        let new = old.wrapping_sub(ticks as u32);
        state.spr[spr::DEC] = new;
        // Fires when bit 0 goes from clear to set
        if (old as i32) >= 0 && (new as i32) < 0 {
            og_core::exception_debug!("Decrementer underflow, time base {}", tb);
            state.raise(Exceptions::DECREMENTER);
        }
    }
}

impl Default for FixedTiming {
    fn default() -> Self {
        Self::new(og_core::config::CpuConfig::default().cycles_per_slice)
    }
}

impl CoreTiming for FixedTiming {
    fn advance(&mut self, state: &mut PowerPcState) {
        let executed = (self.granted - state.downcount).max(0) as u64;
        self.tick(state, executed);

        state.downcount += self.slice;
        self.granted = state.downcount;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_advance_grants_budget() {
        let mut timing = FixedTiming::new(1200);
        let mut state = PowerPcState::new();

        timing.advance(&mut state);
        assert_eq!(state.downcount, 1200);
        assert_eq!(state.time_base(), 0);
    }

    #[test]
    fn test_time_base_follows_cycles() {
        let mut timing = FixedTiming::new(1200);
        let mut state = PowerPcState::new();
        timing.advance(&mut state);

        // Overshoot of three cycles is charged to this slice
        state.downcount = -3;
        timing.advance(&mut state);
        assert_eq!(timing.cycles(), 1203);
        assert_eq!(state.time_base(), 100);
        assert_eq!(state.downcount, 1197);

        // The three leftover cycles carry into the next tick
        state.downcount = -6;
        timing.advance(&mut state);
        assert_eq!(timing.cycles(), 1203 + 1203);
        assert_eq!(state.time_base(), 200);
    }

    #[test]
    fn test_decrementer_underflow() {
        let mut timing = FixedTiming::new(120);
        let mut state = PowerPcState::new();
        state.spr[spr::DEC] = 5;
        timing.advance(&mut state);

        state.downcount = 0;
        timing.advance(&mut state);
        assert_eq!(state.spr[spr::DEC], 5u32.wrapping_sub(10));
        assert!(state.pending().contains(Exceptions::DECREMENTER));
    }

    #[test]
    fn test_decrementer_no_refire_while_negative() {
        let mut timing = FixedTiming::new(120);
        let mut state = PowerPcState::new();
        state.spr[spr::DEC] = 0xFFFF_0000;
        timing.advance(&mut state);

        state.downcount = 0;
        timing.advance(&mut state);
        assert!(!state.pending().contains(Exceptions::DECREMENTER));
    }
}
