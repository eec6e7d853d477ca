const TIMER_HZ: f64 = 60.0;
// Absorbs float error so that 1/60 s worth of input always yields a tick.
const TICK_EPSILON: f64 = 1e-9;

/// Delay and sound timers, counting down at 60Hz of elapsed time.
#[derive(Debug, Clone, Default)]
pub struct Timers {
    pub delay: u8,
    pub sound: u8,
    dt_accumulator: f64,
}

impl Timers {
    /// Adds `dt` seconds and decrements both timers once per whole 1/60 s.
    pub fn advance(&mut self, dt: f32) {
        self.dt_accumulator += f64::from(dt.max(0.0));

        let ticks = (self.dt_accumulator * TIMER_HZ + TICK_EPSILON).floor();
        if ticks < 1.0 {
            return;
        }
        self.dt_accumulator = (self.dt_accumulator - ticks / TIMER_HZ).max(0.0);

        let ticks = ticks.min(f64::from(u8::MAX)) as u8;
        self.delay = self.delay.saturating_sub(ticks);
        self.sound = self.sound.saturating_sub(ticks);
    }
}
