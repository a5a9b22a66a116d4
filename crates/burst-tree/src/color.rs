//! The circle palette.

use rand::Rng;

/// A circle color, drawn from the fixed five-entry palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Red,
    Green,
    Blue,
    Orange,
    Purple,
}

impl Color {
    /// Every palette entry, in discriminant order.
    pub const ALL: [Color; 5] = [
        Color::Red,
        Color::Green,
        Color::Blue,
        Color::Orange,
        Color::Purple,
    ];

    /// Uniformly sample a palette entry. Cosmetic only; colors never
    /// affect tree semantics.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }

    /// CSS-style name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Green => "green",
            Color::Blue => "blue",
            Color::Orange => "orange",
            Color::Purple => "purple",
        }
    }

    pub(crate) fn to_u64(self) -> u64 {
        self as u64
    }

    pub(crate) fn from_u64(n: u64) -> Option<Self> {
        usize::try_from(n).ok().and_then(|i| Self::ALL.get(i)).copied()
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
