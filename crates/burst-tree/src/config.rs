//! Session configuration.

/// Maximum circle depth for one session.
///
/// Supplied once at session creation (typically through a query
/// parameter) and read-only afterwards. Values clamp to [0, 7]; a
/// missing or unparsable parameter falls back to 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaxLevel(u32);

impl MaxLevel {
    /// Deepest level any session may configure.
    pub const BOUND: u32 = 7;
    /// Used when no usable value was supplied.
    pub const DEFAULT: MaxLevel = MaxLevel(4);

    /// Clamp an integer into the valid range.
    pub fn new(level: u32) -> Self {
        Self(level.min(Self::BOUND))
    }

    /// Interpret an externally supplied parameter value.
    pub fn from_param(param: Option<&str>) -> Self {
        match param.and_then(|p| p.trim().parse::<i64>().ok()) {
            Some(n) => Self(n.clamp(0, Self::BOUND as i64) as u32),
            None => Self::DEFAULT,
        }
    }

    /// The configured bound.
    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for MaxLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for MaxLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_range_values_pass_through() {
        assert_eq!(MaxLevel::new(0).get(), 0);
        assert_eq!(MaxLevel::new(7).get(), 7);
        assert_eq!(MaxLevel::from_param(Some("2")).get(), 2);
    }

    #[test]
    fn out_of_range_values_clamp() {
        assert_eq!(MaxLevel::new(12).get(), 7);
        assert_eq!(MaxLevel::from_param(Some("9")).get(), 7);
        assert_eq!(MaxLevel::from_param(Some("-3")).get(), 0);
    }

    #[test]
    fn unusable_values_fall_back_to_default() {
        assert_eq!(MaxLevel::from_param(None).get(), 4);
        assert_eq!(MaxLevel::from_param(Some("")).get(), 4);
        assert_eq!(MaxLevel::from_param(Some("deep")).get(), 4);
    }

    #[test]
    fn whitespace_is_tolerated() {
        assert_eq!(MaxLevel::from_param(Some(" 5 ")).get(), 5);
    }
}
