/// Live WPM observed at one tick of the countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WpmSample {
    pub elapsed_secs: u32,
    pub wpm: u32,
}

impl WpmSample {
    pub fn new(elapsed_secs: u32, wpm: u32) -> Self {
        Self { elapsed_secs, wpm }
    }
}

impl From<WpmSample> for (f64, f64) {
    fn from(s: WpmSample) -> Self {
        (s.elapsed_secs as f64, s.wpm as f64)
    }
}

/// Chart-ready points for a series of samples
pub fn to_points(samples: &[WpmSample]) -> Vec<(f64, f64)> {
    samples.iter().copied().map(Into::into).collect()
}
