//! Tokens: the single-cell pieces that fall into the grid and get fused.

/// Token colour. Each colour feeds exactly one fusion channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenColor {
    /// Red: heal.
    R,
    /// Blue: block.
    B,
    /// Green: poison.
    G,
    /// Yellow: damage.
    Y,
}

impl TokenColor {
    pub const ALL: [Self; 4] = [Self::R, Self::B, Self::G, Self::Y];

    /// Index into `Theme::token` (0..4).
    pub fn index(self) -> usize {
        match self {
            Self::R => 0,
            Self::B => 1,
            Self::G => 2,
            Self::Y => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenSize {
    Small,
    Medium,
    Big,
}

impl TokenSize {
    /// Fusion magnitude contributed by one token of this size.
    pub fn power(self) -> i32 {
        match self {
            Self::Small => 2,
            Self::Medium => 4,
            Self::Big => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Falling,
    Settled,
    /// Settled and part of the in-progress selection path.
    Selected,
}

/// A single game piece. `row` is fractional while falling and integral once settled;
/// row -1 is the spawn slot above the visible grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub color: TokenColor,
    pub size: TokenSize,
    pub row: f64,
    pub col: usize,
    pub lifecycle: Lifecycle,
}

impl Token {
    pub fn falling(color: TokenColor, col: usize) -> Self {
        Self {
            color,
            size: TokenSize::Small,
            row: -1.0,
            col,
            lifecycle: Lifecycle::Falling,
        }
    }

    pub fn settled(color: TokenColor, size: TokenSize, row: usize, col: usize) -> Self {
        Self {
            color,
            size,
            row: row as f64,
            col,
            lifecycle: Lifecycle::Settled,
        }
    }

    /// Integer row the token is drawn at (floor of `row`).
    #[inline]
    pub fn cell_row(&self) -> i32 {
        self.row.floor() as i32
    }
}
