//! Opponent: hp pool plus a wind-up → strike cycle, gated by stun.

use tracing::debug;

/// Explicit attack-cycle phase. `Stunned` exactly while `stun > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Winding,
    Stunned,
}

/// Fixed opponent parameters (from CLI config); restored on every reset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpponentStats {
    pub max_hp: i32,
    /// Seconds of wind-up before each strike.
    pub windup: f64,
    /// Base damage of a strike (absorbable by block).
    pub strike: i32,
}

impl Default for OpponentStats {
    fn default() -> Self {
        Self {
            max_hp: 40,
            windup: 3.0,
            strike: 6,
        }
    }
}

/// An attack that completed this tick. The encounter resolves it against the player:
/// `damage` through block, then block stripped, then `poison` as true damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strike {
    pub damage: i32,
    pub poison: i32,
}

#[derive(Debug, Clone)]
pub struct Opponent {
    stats: OpponentStats,
    hp: i32,
    windup_elapsed: f64,
    poison: i32,
    stun: f64,
    phase: Phase,
}

impl Opponent {
    pub fn new(stats: OpponentStats) -> Self {
        Self {
            stats,
            hp: stats.max_hp,
            windup_elapsed: 0.0,
            poison: 0,
            stun: 0.0,
            phase: Phase::Winding,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.stats);
    }

    /// Advance the cycle. Returns the strike if the wind-up completed this tick.
    pub fn update(&mut self, dt: f64) -> Option<Strike> {
        match self.phase {
            Phase::Stunned => {
                self.stun = (self.stun - dt).max(0.0);
                if self.stun == 0.0 {
                    self.phase = Phase::Winding;
                }
                None
            }
            Phase::Winding => {
                self.windup_elapsed += dt;
                if self.windup_elapsed < self.stats.windup {
                    return None;
                }
                self.windup_elapsed = 0.0;
                let strike = Strike {
                    damage: self.stats.strike,
                    poison: self.poison,
                };
                debug!(?strike, "opponent strikes");
                Some(strike)
            }
        }
    }

    /// Subtract `n` hp. Returns true if that defeated the opponent (it has reset).
    pub fn damage(&mut self, n: i32) -> bool {
        self.hp -= n;
        if self.hp <= 0 {
            self.reset();
            return true;
        }
        false
    }

    pub fn add_poison(&mut self, n: i32) {
        self.poison += n;
    }

    /// Freeze the wind-up for `seconds`. Stacks with any remaining stun.
    /// No fusion channel stuns, so only tests drive the stunned phase.
    #[cfg(test)]
    pub(crate) fn apply_stun(&mut self, seconds: f64) {
        if seconds.is_nan() || seconds <= 0.0 {
            return;
        }
        self.stun += seconds;
        self.phase = Phase::Stunned;
    }

    /// Wind-up progress in `[0, 1)`, for the intent bar.
    pub fn windup_ratio(&self) -> f64 {
        self.windup_elapsed / self.stats.windup
    }

    pub fn hp(&self) -> i32 {
        self.hp
    }

    pub fn max_hp(&self) -> i32 {
        self.stats.max_hp
    }

    pub fn poison(&self) -> i32 {
        self.poison
    }

    pub fn stun(&self) -> f64 {
        self.stun
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn windup_elapsed(&self) -> f64 {
        self.windup_elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opponent() -> Opponent {
        Opponent::new(OpponentStats::default())
    }

    #[test]
    fn test_strikes_when_windup_completes() {
        let mut o = opponent();
        assert_eq!(o.update(1.5), None);
        assert!((o.windup_ratio() - 0.5).abs() < 1e-9);
        assert_eq!(o.update(1.0), None);
        let strike = o.update(0.5).unwrap();
        assert_eq!(
            strike,
            Strike {
                damage: 6,
                poison: 0
            }
        );
        assert_eq!(o.windup_elapsed(), 0.0);
    }

    #[test]
    fn test_strike_carries_poison_stack() {
        let mut o = opponent();
        o.add_poison(2);
        o.add_poison(4);
        let strike = o.update(3.0).unwrap();
        assert_eq!(strike.poison, 6);
        // Poison is not consumed by striking.
        assert_eq!(o.poison(), 6);
    }

    #[test]
    fn test_stun_freezes_windup() {
        let mut o = opponent();
        o.update(1.0);
        o.apply_stun(1.0);
        assert_eq!(o.phase(), Phase::Stunned);
        assert_eq!(o.update(0.6), None);
        assert_eq!(o.windup_elapsed(), 1.0);
        assert_eq!(o.update(0.6), None);
        assert_eq!(o.windup_elapsed(), 1.0);
        assert_eq!(o.stun(), 0.0);
        assert_eq!(o.phase(), Phase::Winding);
        o.update(0.5);
        assert!((o.windup_elapsed() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_non_positive_stun_ignored() {
        let mut o = opponent();
        o.apply_stun(0.0);
        o.apply_stun(-2.0);
        o.apply_stun(f64::NAN);
        assert_eq!(o.phase(), Phase::Winding);
        assert_eq!(o.stun(), 0.0);
    }

    #[test]
    fn test_defeat_resets_wholesale() {
        let mut o = opponent();
        o.add_poison(4);
        o.update(2.0);
        assert!(!o.damage(10));
        assert_eq!(o.hp(), 30);
        assert!(o.damage(30));
        assert_eq!(o.hp(), o.max_hp());
        assert_eq!(o.poison(), 0);
        assert_eq!(o.windup_elapsed(), 0.0);
        assert_eq!(o.phase(), Phase::Winding);
    }
}
