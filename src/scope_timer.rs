use std::time::{Duration, Instant};

/// Logs how long the enclosing scope took, at `trace` level, when dropped.
pub struct ScopeTimer<'a> {
    name: &'a str,
    start_time: Instant,
}

impl<'a> ScopeTimer<'a> {
    pub fn new(name: &'a str) -> Self {
        Self {
            name,
            start_time: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Drop for ScopeTimer<'_> {
    fn drop(&mut self) {
        let elapsed = self.start_time.elapsed();
        log::trace!("{} took {:.2?}", self.name, elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_is_monotonic() {
        let timer = ScopeTimer::new("test");
        let first = timer.elapsed();
        std::thread::sleep(Duration::from_millis(1));
        assert!(timer.elapsed() > first);
    }
}
