//! Discrete simulation clock.

const SECONDS_PER_HOUR: i64 = 3_600;

/// Advances simulated time by a fixed number of hours per tick.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    current_time: i64,
    tick_hours: u32,
}

impl Clock {
    pub fn new(start_time: i64, tick_hours: u32) -> Self {
        Self {
            current_time: start_time,
            tick_hours,
        }
    }

    pub fn current_time(&self) -> i64 {
        self.current_time
    }

    pub fn tick_hours(&self) -> u32 {
        self.tick_hours
    }

    /// Step the clock forward one tick.
    pub fn advance(&mut self) {
        self.current_time += i64::from(self.tick_hours) * SECONDS_PER_HOUR;
    }
}
