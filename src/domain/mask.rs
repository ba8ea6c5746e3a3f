//! Field-presence bitmask for partial banner updates.

use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UpdateMask(u8);

impl UpdateMask {
    pub const FEATURE: Self = Self(1);
    pub const TAG: Self = Self(1 << 1);
    pub const ACTIVE: Self = Self(1 << 2);
    pub const CONTENT: Self = Self(1 << 3);

    const ROW_FIELDS: u8 = Self::FEATURE.0 | Self::TAG.0 | Self::CONTENT.0;

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// True when a column of the banner row itself changes.
    pub const fn touches_row(self) -> bool {
        self.0 & Self::ROW_FIELDS != 0
    }
}

impl std::ops::BitOr for UpdateMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for UpdateMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        for (flag, name) in [
            (Self::FEATURE, "FEATURE"),
            (Self::TAG, "TAG"),
            (Self::ACTIVE, "ACTIVE"),
            (Self::CONTENT, "CONTENT"),
        ] {
            if self.contains(flag) {
                names.push(name);
            }
        }
        write!(f, "UpdateMask({})", names.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_mask_contains_nothing() {
        let mask = UpdateMask::empty();
        assert!(mask.is_empty());
        assert!(!mask.contains(UpdateMask::FEATURE));
        assert!(!mask.touches_row());
    }

    #[test]
    fn active_only_mask_does_not_touch_row() {
        let mask = UpdateMask::ACTIVE;
        assert!(!mask.is_empty());
        assert!(!mask.touches_row());
        assert!((mask | UpdateMask::CONTENT).touches_row());
    }

    #[test]
    fn debug_lists_flag_names() {
        let mask = UpdateMask::TAG | UpdateMask::CONTENT;
        assert_eq!(format!("{mask:?}"), "UpdateMask(TAG | CONTENT)");
    }
}
