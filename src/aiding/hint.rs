//! Location hint degrade model: the last known fix, aged forward so a
//! long-parked receiver doesn't seed AID-INI with a fix that's actually
//! gone stale.
//!
//! Constants come straight from `ubgps_internal.h`:
//! `HINT_LOCATION_ACCURACY_DEGRADE_SPEED_KPH` (50 km/h, converted here to
//! m/s), `HINT_LOCATION_MAX_ACCURACY` (100 km, beyond which the hint is
//! withheld rather than handed to AID-INI), and
//! `HINT_LOCATION_MINIMUM_NEW_ACCURACY` (`INT_MAX` in the original —
//! "always accept a new fix", preserved here as `u32::MAX`, see
//! SPEC_FULL.md §9).

use std::time::Instant;

pub const DEGRADE_SPEED_KPH: f64 = 50.0;
pub const DEGRADE_SPEED_MPS: f64 = DEGRADE_SPEED_KPH * 1000.0 / 3600.0;
pub const MAX_ACCURACY_MM: u32 = 100_000 * 1000; // 100 km

#[derive(Debug, Clone, Copy)]
pub struct HintSnapshot {
    pub latitude_1e7: i32,
    pub longitude_1e7: i32,
    pub altitude_mm: i32,
    pub effective_accuracy_mm: u32,
}

#[derive(Debug, Default)]
pub struct LocationHint {
    fix: Option<StoredFix>,
}

#[derive(Debug, Clone, Copy)]
struct StoredFix {
    latitude_1e7: i32,
    longitude_1e7: i32,
    altitude_mm: i32,
    accuracy_mm: u32,
    recorded_at: Instant,
}

impl LocationHint {
    pub fn new() -> Self {
        LocationHint { fix: None }
    }

    fn degraded_accuracy(fix: &StoredFix, now: Instant) -> u32 {
        let elapsed_s = now.saturating_duration_since(fix.recorded_at).as_secs_f64();
        let degrade_mm = DEGRADE_SPEED_MPS * elapsed_s * 1000.0;
        let total = fix.accuracy_mm as f64 + degrade_mm;
        if total >= u32::MAX as f64 {
            u32::MAX
        } else {
            total as u32
        }
    }

    /// Offer a new fix. Refreshes the hint if there was none yet, if
    /// `minimum_new_accuracy_mm` is `u32::MAX` ("always refresh", the
    /// original's default), or if `accuracy_mm` improves on the current
    /// effective accuracy by at least `minimum_new_accuracy_mm`.
    pub fn update(
        &mut self,
        latitude_1e7: i32,
        longitude_1e7: i32,
        altitude_mm: i32,
        accuracy_mm: u32,
        now: Instant,
        minimum_new_accuracy_mm: u32,
    ) {
        let should_refresh = match &self.fix {
            None => true,
            Some(_) if minimum_new_accuracy_mm == u32::MAX => true,
            Some(existing) => {
                let current = Self::degraded_accuracy(existing, now);
                accuracy_mm.saturating_add(minimum_new_accuracy_mm) <= current
            }
        };
        if should_refresh {
            self.fix = Some(StoredFix {
                latitude_1e7,
                longitude_1e7,
                altitude_mm,
                accuracy_mm,
                recorded_at: now,
            });
        }
    }

    pub fn clear(&mut self) {
        self.fix = None;
    }

    /// The current hint, degraded to `now`, or `None` if there is no fix
    /// or its degraded accuracy has passed the 100 km threshold.
    pub fn get(&self, now: Instant) -> Option<HintSnapshot> {
        let fix = self.fix.as_ref()?;
        let effective = Self::degraded_accuracy(fix, now);
        if effective > MAX_ACCURACY_MM {
            return None;
        }
        Some(HintSnapshot {
            latitude_1e7: fix.latitude_1e7,
            longitude_1e7: fix.longitude_1e7,
            altitude_mm: fix.altitude_mm,
            effective_accuracy_mm: effective,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn first_fix_is_always_accepted() {
        let mut hint = LocationHint::new();
        let now = Instant::now();
        hint.update(1, 2, 3, 1000, now, u32::MAX);
        assert!(hint.get(now).is_some());
    }

    #[test]
    fn default_threshold_always_refreshes() {
        let mut hint = LocationHint::new();
        let now = Instant::now();
        hint.update(1, 1, 1, 1000, now, u32::MAX);
        hint.update(2, 2, 2, 50_000, now, u32::MAX); // worse accuracy, still refreshes
        let snap = hint.get(now).unwrap();
        assert_eq!(snap.latitude_1e7, 2);
    }

    #[test]
    fn strict_threshold_rejects_insufficient_improvement() {
        let mut hint = LocationHint::new();
        let now = Instant::now();
        hint.update(1, 1, 1, 1000, now, 500);
        hint.update(2, 2, 2, 900, now, 500); // only 100mm better, needs 500
        let snap = hint.get(now).unwrap();
        assert_eq!(snap.latitude_1e7, 1); // unchanged
    }

    #[test]
    fn accuracy_degrades_over_time() {
        let mut hint = LocationHint::new();
        let now = Instant::now();
        hint.update(1, 1, 1, 1000, now, u32::MAX);
        let later = now + Duration::from_secs(100);
        let snap = hint.get(later).unwrap();
        assert!(snap.effective_accuracy_mm > 1000);
    }

    #[test]
    fn hint_withheld_past_max_accuracy() {
        let mut hint = LocationHint::new();
        let now = Instant::now();
        hint.update(1, 1, 1, 1000, now, u32::MAX);
        // Degrade for long enough to exceed 100km.
        let seconds_needed = (MAX_ACCURACY_MM as f64 / (DEGRADE_SPEED_MPS * 1000.0)) + 10.0;
        let later = now + Duration::from_secs_f64(seconds_needed);
        assert!(hint.get(later).is_none());
    }

    #[test]
    fn cleared_hint_yields_none() {
        let mut hint = LocationHint::new();
        let now = Instant::now();
        hint.update(1, 1, 1, 1000, now, u32::MAX);
        hint.clear();
        assert!(hint.get(now).is_none());
    }
}
