//! Encounter: player pool, per-tick composition of grid + opponent, and run reset.

use crate::GameConfig;
use crate::fusion::FusionResult;
use crate::grid::{CellPos, Grid};
use crate::opponent::{Opponent, Strike};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::VecDeque;
use tracing::{debug, info};

/// Undrained events beyond this are dropped oldest-first.
const MAX_EVENTS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Player {
    pub hp: i32,
    pub max_hp: i32,
    pub block: i32,
}

impl Player {
    fn new(hp: i32) -> Self {
        Self {
            hp,
            max_hp: hp,
            block: 0,
        }
    }
}

/// Observable transitions, drained by the front end once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncounterEvent {
    Fused(FusionResult),
    Overflow,
    /// An opponent strike resolved: block absorbed, hp lost through block, true poison damage.
    PlayerStruck {
        absorbed: i32,
        hp_loss: i32,
        poison: i32,
    },
    OpponentDefeated,
    RunReset,
}

#[derive(Debug)]
pub struct Encounter {
    grid: Grid,
    opponent: Opponent,
    player: Player,
    start_hp: i32,
    events: VecDeque<EncounterEvent>,
    /// Completed runs (player deaths) since start.
    deaths: u32,
}

impl Encounter {
    pub fn new(config: &GameConfig) -> Self {
        let rng = config
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self {
            grid: Grid::new(config.cols, config.rows, config.fall_speed, rng),
            opponent: Opponent::new(config.opponent),
            player: Player::new(config.player_hp),
            start_hp: config.player_hp,
            events: VecDeque::new(),
            deaths: 0,
        }
    }

    /// One simulation step: grid physics, fusion drain, opponent cycle.
    /// `dt` is expected to be clamped by the caller; negative or non-finite values are treated as 0.
    pub fn update(&mut self, dt: f64) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

        self.grid.update(dt);
        if self.grid.take_overflow() {
            self.push_event(EncounterEvent::Overflow);
        }
        if let Some(fx) = self.grid.take_pending() {
            self.apply_fusion(fx);
        }
        if let Some(strike) = self.opponent.update(dt) {
            self.resolve_strike(strike);
        }
    }

    fn apply_fusion(&mut self, fx: FusionResult) {
        debug!(?fx, "applying fusion");
        self.push_event(EncounterEvent::Fused(fx));
        if fx.dmg != 0 && self.opponent.damage(fx.dmg) {
            info!("opponent defeated");
            self.push_event(EncounterEvent::OpponentDefeated);
        }
        self.player.block += fx.block;
        self.player.hp = (self.player.hp + fx.heal).min(self.player.max_hp);
        self.opponent.add_poison(fx.poison);
    }

    /// Base damage through block, then block stripped, then poison as true damage.
    /// If the base damage ends the run, nothing further lands on the fresh player.
    fn resolve_strike(&mut self, strike: Strike) {
        let (absorbed, hp_loss) = self.subtract(strike.damage, false);
        if self.player.hp <= 0 {
            self.push_event(EncounterEvent::PlayerStruck {
                absorbed,
                hp_loss,
                poison: 0,
            });
            self.reset_run();
            return;
        }
        self.player.block = 0;
        let poison = if strike.poison > 0 {
            self.subtract(strike.poison, true).1
        } else {
            0
        };
        self.push_event(EncounterEvent::PlayerStruck {
            absorbed,
            hp_loss,
            poison,
        });
        self.check_death();
    }

    /// Damage the player; block absorbs first unless `true_damage`. Resets the run on hp ≤ 0.
    pub fn damage_player(&mut self, amount: i32, true_damage: bool) {
        self.subtract(amount, true_damage);
        self.check_death();
    }

    /// Returns (absorbed by block, subtracted from hp).
    fn subtract(&mut self, amount: i32, true_damage: bool) -> (i32, i32) {
        let mut amount = amount;
        let mut absorbed = 0;
        if !true_damage {
            absorbed = self.player.block.min(amount).max(0);
            self.player.block -= absorbed;
            amount -= absorbed;
        }
        self.player.hp -= amount;
        (absorbed, amount)
    }

    fn check_death(&mut self) {
        if self.player.hp <= 0 {
            self.reset_run();
        }
    }

    fn reset_run(&mut self) {
        self.deaths += 1;
        info!(deaths = self.deaths, "player defeated, resetting run");
        self.player = Player::new(self.start_hp);
        self.grid.reset();
        self.opponent.reset();
        self.push_event(EncounterEvent::RunReset);
    }

    fn push_event(&mut self, event: EncounterEvent) {
        if self.events.len() == MAX_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Take all events recorded since the last call, oldest first.
    pub fn drain_events(&mut self) -> Vec<EncounterEvent> {
        self.events.drain(..).collect()
    }

    pub fn begin_selection(&mut self, pos: CellPos) {
        self.grid.begin_selection(pos);
    }

    pub fn extend_selection(&mut self, pos: CellPos) {
        self.grid.extend_selection(pos);
    }

    pub fn end_selection(&mut self) {
        self.grid.end_selection();
    }

    pub fn cancel_selection(&mut self) {
        self.grid.cancel_selection();
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn opponent(&self) -> &Opponent {
        &self.opponent
    }

    pub fn player(&self) -> Player {
        self.player
    }

    pub fn deaths(&self) -> u32 {
        self.deaths
    }

    #[cfg(test)]
    pub(crate) fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opponent::Phase;
    use crate::token::{Lifecycle, TokenColor, TokenSize};

    fn encounter() -> Encounter {
        Encounter::new(&GameConfig {
            seed: Some(11),
            ..GameConfig::default()
        })
    }

    fn falling_tokens(e: &Encounter) -> usize {
        let g = e.grid();
        let board = (0..g.rows)
            .flat_map(|r| (0..g.cols).map(move |c| (r, c)))
            .filter(|&(r, c)| g.get(r, c).is_some_and(|t| t.lifecycle == Lifecycle::Falling))
            .count();
        board + usize::from(g.falling().is_some())
    }

    #[test]
    fn test_block_absorbs_before_hp() {
        let mut e = encounter();
        e.player.block = 6;
        e.damage_player(10, false);
        assert_eq!(e.player().block, 0);
        assert_eq!(e.player().hp, 26);
    }

    #[test]
    fn test_true_damage_ignores_block() {
        let mut e = encounter();
        e.player.block = 6;
        e.damage_player(10, true);
        assert_eq!(e.player().block, 6);
        assert_eq!(e.player().hp, 20);
    }

    #[test]
    fn test_partial_absorb_keeps_remaining_block() {
        let mut e = encounter();
        e.player.block = 8;
        e.damage_player(5, false);
        assert_eq!(e.player().block, 3);
        assert_eq!(e.player().hp, 30);
    }

    #[test]
    fn test_fuse_and_drain_end_to_end() {
        let mut e = encounter();
        e.damage_player(5, true);
        e.grid.put(5, 2, TokenColor::R, TokenSize::Small);
        e.grid.put(5, 3, TokenColor::Y, TokenSize::Small);
        e.grid.force_compact();
        // Compaction moved the pair to the floor row.
        let (a, b) = (CellPos::new(9, 2), CellPos::new(9, 3));

        e.begin_selection(a);
        e.extend_selection(b);
        e.end_selection();
        assert_eq!(
            e.grid().pending(),
            Some(FusionResult {
                heal: 2,
                block: 0,
                poison: 0,
                dmg: 2
            })
        );
        // Not applied until the next tick.
        assert_eq!(e.player().hp, 25);

        e.update(0.01);
        assert_eq!(e.player().hp, 27);
        assert_eq!(e.opponent().hp(), 38);
        assert!(e.grid().pending().is_none());
        assert!(e.grid().get(9, 2).is_none());
        assert!(e.grid().get(9, 3).is_none());
        assert_eq!(e.grid().settled_count(), 0);

        // Drained exactly once.
        e.update(0.01);
        assert_eq!(e.player().hp, 27);
        assert_eq!(e.opponent().hp(), 38);
        let fused = e
            .drain_events()
            .into_iter()
            .filter(|ev| matches!(ev, EncounterEvent::Fused(_)))
            .count();
        assert_eq!(fused, 1);
    }

    #[test]
    fn test_adjacent_pair_fuses_in_place() {
        let mut e = encounter();
        // Column 2 and 3 stacked up to row 5 so the pair sits at (5,2)/(5,3) after compaction.
        for r in 5..10 {
            e.grid.put(r, 2, TokenColor::B, TokenSize::Small);
            e.grid.put(r, 3, TokenColor::B, TokenSize::Small);
        }
        e.grid.put(5, 2, TokenColor::R, TokenSize::Small);
        e.grid.put(5, 3, TokenColor::Y, TokenSize::Small);
        e.grid.put(4, 2, TokenColor::G, TokenSize::Small);

        e.begin_selection(CellPos::new(5, 2));
        e.extend_selection(CellPos::new(5, 3));
        e.end_selection();
        e.update(0.0);

        assert_eq!(e.player().hp, 30);
        assert_eq!(e.opponent().hp(), 38);
        // G dropped into the hole left at (5,2); column 3 top is now row 6.
        assert_eq!(e.grid().get(5, 2).map(|t| t.color), Some(TokenColor::G));
        assert!(e.grid().get(4, 2).is_none());
        assert!(e.grid().get(5, 3).is_none());
        assert_eq!(e.grid().get(6, 3).map(|t| t.color), Some(TokenColor::B));
    }

    #[test]
    fn test_fusion_channels_apply() {
        let mut e = encounter();
        e.grid.put(9, 0, TokenColor::B, TokenSize::Big);
        e.grid.put(9, 1, TokenColor::G, TokenSize::Medium);
        e.begin_selection(CellPos::new(9, 0));
        e.extend_selection(CellPos::new(9, 1));
        e.end_selection();
        e.update(0.0);
        assert_eq!(e.player().block, 6);
        assert_eq!(e.opponent().poison(), 4);
        assert_eq!(e.opponent().hp(), 40);
    }

    #[test]
    fn test_strike_strips_block_even_when_fully_absorbed() {
        let mut e = encounter();
        e.player.block = 20;
        e.update(3.0);
        assert_eq!(e.player().hp, 30);
        assert_eq!(e.player().block, 0);
        assert!(e.drain_events().contains(&EncounterEvent::PlayerStruck {
            absorbed: 6,
            hp_loss: 0,
            poison: 0
        }));
    }

    #[test]
    fn test_poison_is_true_damage_after_strike() {
        let mut e = encounter();
        e.player.block = 10;
        e.opponent.add_poison(4);
        e.update(3.0);
        // 6 absorbed, block stripped, 4 poison straight to hp.
        assert_eq!(e.player().block, 0);
        assert_eq!(e.player().hp, 26);
    }

    #[test]
    fn test_death_resets_everything_atomically() {
        let mut e = encounter();
        e.grid.put(9, 0, TokenColor::R, TokenSize::Small);
        e.grid.put(9, 1, TokenColor::R, TokenSize::Small);
        e.begin_selection(CellPos::new(9, 0));
        e.opponent.add_poison(6);
        e.opponent.damage(5);
        e.player.block = 3;

        e.damage_player(40, true);

        let p = e.player();
        assert_eq!(p.hp, p.max_hp);
        assert_eq!(p.block, 0);
        assert_eq!(e.grid().settled_count(), 0);
        assert!(!e.grid().is_selecting());
        assert_eq!(e.grid().falling().unwrap().row, -1.0);
        assert_eq!(falling_tokens(&e), 1);
        assert_eq!(e.opponent().hp(), e.opponent().max_hp());
        assert_eq!(e.opponent().poison(), 0);
        assert_eq!(e.opponent().stun(), 0.0);
        assert_eq!(e.opponent().windup_elapsed(), 0.0);
        assert_eq!(e.opponent().phase(), Phase::Winding);
        assert_eq!(e.deaths(), 1);
        assert_eq!(e.drain_events(), vec![EncounterEvent::RunReset]);
    }

    #[test]
    fn test_lethal_strike_skips_poison_on_fresh_run() {
        let mut e = encounter();
        e.player.hp = 4;
        e.opponent.add_poison(2);
        e.update(3.0);
        assert_eq!(e.player().hp, 30);
        assert_eq!(e.opponent().poison(), 0);
        let events = e.drain_events();
        assert_eq!(
            events,
            vec![
                EncounterEvent::PlayerStruck {
                    absorbed: 0,
                    hp_loss: 6,
                    poison: 0
                },
                EncounterEvent::RunReset
            ]
        );
    }

    #[test]
    fn test_poison_can_finish_the_player() {
        let mut e = encounter();
        e.player.hp = 8;
        e.opponent.add_poison(3);
        e.update(3.0);
        assert_eq!(e.player().hp, 30);
        assert_eq!(e.deaths(), 1);
    }

    #[test]
    fn test_opponent_defeat_is_distinct_from_run_reset() {
        let mut e = encounter();
        e.opponent.damage(38);
        e.player.hp = 12;
        e.grid.put(9, 0, TokenColor::Y, TokenSize::Small);
        e.grid.put(9, 1, TokenColor::G, TokenSize::Small);
        e.begin_selection(CellPos::new(9, 0));
        e.extend_selection(CellPos::new(9, 1));
        e.end_selection();
        e.update(0.0);

        assert_eq!(e.opponent().hp(), 40);
        // Poison from the same fusion lands on the fresh opponent.
        assert_eq!(e.opponent().poison(), 2);
        assert_eq!(e.player().hp, 12);
        assert_eq!(e.deaths(), 0);
        let events = e.drain_events();
        assert!(events.contains(&EncounterEvent::OpponentDefeated));
        assert!(!events.contains(&EncounterEvent::RunReset));
    }

    #[test]
    fn test_overflow_reported_as_event() {
        let mut e = encounter();
        for r in 0..e.grid.rows {
            e.grid.put(r, 3, TokenColor::B, TokenSize::Small);
        }
        for _ in 0..10 {
            e.update(0.02);
        }
        assert!(e.drain_events().contains(&EncounterEvent::Overflow));
        assert!(e.grid().get(0, 3).is_none());
        assert_eq!(falling_tokens(&e), 1);
    }

    #[test]
    fn test_single_falling_token_every_tick() {
        let mut e = encounter();
        for _ in 0..2000 {
            e.update(0.03);
            assert_eq!(falling_tokens(&e), 1);
        }
        // Spawning without fusing eventually overflows; the run keeps going.
        assert!(e.grid().settled_count() <= e.grid().cols * e.grid().rows);
    }

    #[test]
    fn test_bad_dt_is_ignored() {
        let mut e = encounter();
        e.update(-1.0);
        e.update(f64::NAN);
        e.update(f64::INFINITY);
        assert_eq!(e.opponent().windup_elapsed(), 0.0);
        assert_eq!(e.grid().falling().unwrap().row, -1.0);
    }

    #[test]
    fn test_event_log_is_bounded() {
        let mut e = encounter();
        for _ in 0..(MAX_EVENTS + 10) {
            e.push_event(EncounterEvent::Overflow);
        }
        assert_eq!(e.drain_events().len(), MAX_EVENTS);
        assert!(e.drain_events().is_empty());
    }
}
