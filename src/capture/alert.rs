use std::sync::Arc;
use std::time::Duration;

use super::AlertSink;
use crate::clock::Clock;

/// Alert that logs a warning and counts as playing for a fixed window.
pub struct LogAlert {
    clock: Arc<dyn Clock>,
    duration: Duration,
    playing_until: Option<f64>,
    plays: u64,
}

impl LogAlert {
    pub fn new(clock: Arc<dyn Clock>, duration: Duration) -> Self {
        Self {
            clock,
            duration,
            playing_until: None,
            plays: 0,
        }
    }

    pub fn plays(&self) -> u64 {
        self.plays
    }
}

impl AlertSink for LogAlert {
    fn play_alert(&mut self) {
        let now = self.clock.now();
        self.plays += 1;
        self.playing_until = Some(now + self.duration.as_secs_f64());
        log::warn!("motion alert #{} at t={:.2}s", self.plays, now);
    }

    fn is_playing(&self) -> bool {
        self.playing_until
            .is_some_and(|until| self.clock.now() < until)
    }
}
