//! Location filter (C12): exponential-average smoothing over NAV-PVT
//! fixes so a single noisy sample doesn't blow through to `LOCATION`
//! subscribers or the location hint. The raw fix is still published
//! alongside the filtered one — this module never the only consumer of
//! NAV-PVT, it just adds a smoothed reading.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilteredFix {
    pub latitude_1e7: i32,
    pub longitude_1e7: i32,
    pub altitude_mm: i32,
}

#[derive(Debug)]
pub struct LocationFilter {
    alpha: f64,
    state: Option<(f64, f64, f64)>,
}

impl Default for LocationFilter {
    fn default() -> Self {
        Self::new(0.2)
    }
}

impl LocationFilter {
    /// `alpha` is the weight given to each new sample; 1.0 disables
    /// smoothing entirely, lower values smooth more aggressively.
    pub fn new(alpha: f64) -> Self {
        assert!(alpha > 0.0 && alpha <= 1.0, "alpha must be in (0, 1]");
        LocationFilter { alpha, state: None }
    }

    /// No output until the first fix has been fed.
    pub fn current(&self) -> Option<FilteredFix> {
        self.state.map(|(lat, lon, alt)| FilteredFix {
            latitude_1e7: lat.round() as i32,
            longitude_1e7: lon.round() as i32,
            altitude_mm: alt.round() as i32,
        })
    }

    pub fn feed(&mut self, latitude_1e7: i32, longitude_1e7: i32, altitude_mm: i32) -> FilteredFix {
        let sample = (latitude_1e7 as f64, longitude_1e7 as f64, altitude_mm as f64);
        self.state = Some(match self.state {
            None => sample,
            Some((lat, lon, alt)) => (
                lat + self.alpha * (sample.0 - lat),
                lon + self.alpha * (sample.1 - lon),
                alt + self.alpha * (sample.2 - alt),
            ),
        });
        self.current().unwrap()
    }

    pub fn reset(&mut self) {
        self.state = None;
    }
}
