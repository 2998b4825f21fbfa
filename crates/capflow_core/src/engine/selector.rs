//! Duration-based engine selector.

use serde::Serialize;

use crate::config::EngineSettings;
use crate::models::{Engine, TimeBudget};

/// Result of engine selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineSelection {
    /// Engine to dispatch to.
    pub engine: Engine,
    /// Engine the thresholds asked for.
    pub preferred: Engine,
    /// The preferred engine was unavailable and the fast engine was chosen.
    pub degraded: bool,
}

impl EngineSelection {
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}

/// Chooses between the fast and accurate engines.
///
/// Selection is side-effect free and the same inputs always give the same
/// result. Callers log degradation.
#[derive(Debug, Clone)]
pub struct EngineSelector {
    settings: EngineSettings,
}

impl EngineSelector {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Engine the thresholds prefer, ignoring availability.
    ///
    /// - `duration < short_threshold` → fast
    /// - `duration >= long_threshold` → accurate
    /// - in between → accurate only with a spare time budget
    pub fn preferred_engine(&self, duration_secs: f64, budget: TimeBudget) -> Engine {
        if duration_secs < self.settings.short_threshold_secs {
            Engine::Fast
        } else if duration_secs >= self.settings.long_threshold_secs {
            Engine::Accurate
        } else {
            match budget {
                TimeBudget::Spare => Engine::Accurate,
                TimeBudget::Tight => Engine::Fast,
            }
        }
    }

    /// Select the engine to dispatch to.
    ///
    /// When the accurate engine is preferred but unavailable, the fast engine
    /// is returned with `degraded` set. This never fails.
    pub fn select(
        &self,
        duration_secs: f64,
        budget: TimeBudget,
        accurate_available: bool,
    ) -> EngineSelection {
        let preferred = self.preferred_engine(duration_secs, budget);

        if preferred == Engine::Accurate && !accurate_available {
            return EngineSelection {
                engine: Engine::Fast,
                preferred,
                degraded: true,
            };
        }

        tracing::debug!(
            "[EngineSelector] {:.0}s media ({:?} budget) -> {}",
            duration_secs,
            budget,
            preferred
        );

        EngineSelection {
            engine: preferred,
            preferred,
            degraded: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector(short: f64, long: f64) -> EngineSelector {
        EngineSelector::new(EngineSettings {
            short_threshold_secs: short,
            long_threshold_secs: long,
        })
    }

    #[test]
    fn short_media_always_fast() {
        let sel = selector(600.0, 1800.0);
        for d in [0.0, 1.0, 300.0, 599.9] {
            for budget in [TimeBudget::Tight, TimeBudget::Spare] {
                for available in [true, false] {
                    let s = sel.select(d, budget, available);
                    assert_eq!(s.engine, Engine::Fast, "duration {}", d);
                    assert!(!s.degraded);
                }
            }
        }
    }

    #[test]
    fn long_media_accurate_when_available() {
        let sel = selector(600.0, 1800.0);
        for d in [1800.0, 1800.1, 7200.0] {
            for budget in [TimeBudget::Tight, TimeBudget::Spare] {
                let s = sel.select(d, budget, true);
                assert_eq!(s.engine, Engine::Accurate);
                assert!(!s.degraded);
            }
        }
    }

    #[test]
    fn long_media_degrades_to_fast_when_unavailable() {
        let sel = selector(600.0, 1800.0);
        let s = sel.select(5400.0, TimeBudget::Spare, false);
        assert_eq!(s.engine, Engine::Fast);
        assert_eq!(s.preferred, Engine::Accurate);
        assert!(s.is_degraded());
    }

    #[test]
    fn middle_band_follows_time_budget() {
        let sel = selector(600.0, 1800.0);
        assert_eq!(sel.select(900.0, TimeBudget::Tight, true).engine, Engine::Fast);
        assert_eq!(sel.select(900.0, TimeBudget::Spare, true).engine, Engine::Accurate);
        assert_eq!(sel.select(600.0, TimeBudget::Spare, true).engine, Engine::Accurate);

        let degraded = sel.select(900.0, TimeBudget::Spare, false);
        assert_eq!(degraded.engine, Engine::Fast);
        assert!(degraded.degraded);
    }

    #[test]
    fn equal_thresholds_leave_no_middle_band() {
        let sel = selector(1200.0, 1200.0);
        assert_eq!(sel.preferred_engine(1199.9, TimeBudget::Spare), Engine::Fast);
        assert_eq!(sel.preferred_engine(1200.0, TimeBudget::Tight), Engine::Accurate);
    }

    #[test]
    fn selection_is_reproducible() {
        let sel = selector(600.0, 1800.0);
        let first = sel.select(1000.0, TimeBudget::Spare, true);
        for _ in 0..10 {
            assert_eq!(sel.select(1000.0, TimeBudget::Spare, true), first);
        }
    }
}
