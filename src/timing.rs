use std::{fmt, time::Duration};
use tokio::time::Instant;

/// A labelled stopwatch for the read phase of a strategy.
///
/// Reads the tokio clock, so it follows a paused test clock too.
#[derive(Debug)]
pub struct Stopwatch {
    label: &'static str,
    start: Instant,
}

impl Stopwatch {
    pub fn start(label: &'static str) -> Self {
        Stopwatch {
            label,
            start: Instant::now(),
        }
    }

    pub fn stop(self) -> Lap {
        Lap {
            label: self.label,
            elapsed: self.start.elapsed(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lap {
    pub label: &'static str,
    pub elapsed: Duration,
}

// concurrent: 1000.412ms
impl fmt::Display for Lap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:.3}ms",
            self.label,
            self.elapsed.as_secs_f64() * 1000.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lap_prints_millis_with_three_decimals() {
        let lap = Lap {
            label: "sequential",
            elapsed: Duration::from_micros(1_500),
        };
        assert_eq!(lap.to_string(), "sequential: 1.500ms");
    }

    #[tokio::test(start_paused = true)]
    async fn stopwatch_measures_paused_clock() {
        let watch = Stopwatch::start("concurrent");
        tokio::time::sleep(Duration::from_millis(250)).await;
        let lap = watch.stop();
        assert_eq!(lap.elapsed, Duration::from_millis(250));
        assert_eq!(lap.to_string(), "concurrent: 250.000ms");
    }
}
