use std::time::Instant;

/// Monotonic session time, used to timestamp transitions and frames
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    started: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Seconds since the clock was created
    pub fn elapsed(&self) -> f32 {
        self.started.elapsed().as_secs_f32()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn elapsed_is_monotonic() {
        let clock = Clock::new();
        let before = clock.elapsed();
        thread::sleep(Duration::from_millis(5));
        assert!(clock.elapsed() > before);
        assert!(clock.elapsed() >= 0.004);
    }
}
