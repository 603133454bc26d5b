//! Position arithmetic for paid bumps.
//!
//! Positions are unique but not dense, so a bump lands on the requested
//! slot only when nobody else holds it.

/// Front of the line.
pub const FRONT: i64 = 1;

/// Requested landing position: `current - delta`, never ahead of [`FRONT`].
pub fn target_position(current: i64, delta: i64) -> i64 {
    current.saturating_sub(delta).max(FRONT)
}

/// Free slots around a bump's target, as found by the storage layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FreeSlots {
    /// Lowest free position in `target..current`.
    pub behind: Option<i64>,
    /// Highest free position in `FRONT..target`.
    pub ahead: Option<i64>,
}

/// Where an entry at `current` lands after a bump toward `target`.
///
/// The entry takes the target if it is free, else the nearest free slot
/// behind the target (still ahead of `current`), else the nearest free slot
/// ahead of the target. With no free slot at all it stays where it is.
pub fn resolve_position(current: i64, target: i64, free: FreeSlots) -> i64 {
    if target >= current {
        return current;
    }
    free.behind
        .filter(|p| (target..current).contains(p))
        .or_else(|| free.ahead.filter(|p| (FRONT..target).contains(p)))
        .unwrap_or(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    const fn slots(behind: Option<i64>, ahead: Option<i64>) -> FreeSlots {
        FreeSlots { behind, ahead }
    }

    #[test]
    fn smaller_delta_subtracts() {
        assert_eq!(target_position(1345, 50), 1295);
        assert_eq!(resolve_position(1345, 1295, slots(Some(1295), Some(1294))), 1295);
    }

    #[test]
    fn larger_delta_caps_at_front() {
        assert_eq!(target_position(30, 50), 1);
        assert_eq!(target_position(30, 30), 1);
        assert_eq!(resolve_position(30, 1, slots(Some(1), None)), 1);
    }

    #[test]
    fn huge_delta_does_not_overflow() {
        assert_eq!(target_position(5, i64::MAX), 1);
    }

    #[test]
    fn entry_at_front_stays() {
        let target = target_position(1, 10);
        assert_eq!(resolve_position(1, target, FreeSlots::default()), 1);
    }

    #[test]
    fn behind_slot_wins_over_ahead_slot() {
        assert_eq!(resolve_position(100, 95, slots(Some(97), Some(93))), 97);
    }

    #[test]
    fn full_window_falls_back_ahead() {
        assert_eq!(resolve_position(100, 95, slots(None, Some(93))), 93);
    }

    #[test]
    fn no_free_slot_keeps_position() {
        assert_eq!(resolve_position(4, 1, FreeSlots::default()), 4);
    }

    #[test]
    fn slots_outside_their_window_are_ignored() {
        assert_eq!(resolve_position(100, 95, slots(Some(100), Some(95))), 100);
    }
}
