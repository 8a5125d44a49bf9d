//! Fusion table: two tokens in, one combat delta out.

use crate::token::{Token, TokenColor};

/// Combat effect produced by fusing two tokens. All channels default to 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FusionResult {
    pub heal: i32,
    pub block: i32,
    pub poison: i32,
    pub dmg: i32,
}

impl FusionResult {
    fn add(&mut self, token: &Token) {
        let power = token.size.power();
        match token.color {
            TokenColor::R => self.heal += power,
            TokenColor::B => self.block += power,
            TokenColor::G => self.poison += power,
            TokenColor::Y => self.dmg += power,
        }
    }
}

/// Sum each token's contribution into its colour's channel. Pure and commutative.
pub fn fuse(a: &Token, b: &Token) -> FusionResult {
    let mut result = FusionResult::default();
    result.add(a);
    result.add(b);
    result
}
