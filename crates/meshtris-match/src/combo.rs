//! Attack size from line clears and combo streaks.
//!
//! Values follow the Jstris tables.

/// Base attack by lines cleared in one lock. Index 4 is a Tetris.
pub const BASE_ATTACK: [u32; 5] = [0, 0, 1, 2, 4];

/// Bonus by combo streak. Streaks past the end get the last entry.
pub const COMBO_BONUS: [u32; 13] = [0, 0, 1, 1, 1, 2, 2, 3, 3, 4, 4, 4, 5];

/// Garbage lines sent for clearing `lines` with `streak` previous
/// consecutive clears.
///
/// Zero lines never attack. More than four lines count as four.
pub fn attack(lines: u32, streak: u32) -> u32 {
    if lines == 0 {
        return 0;
    }
    let base = BASE_ATTACK[(lines as usize).min(BASE_ATTACK.len() - 1)];
    let bonus = COMBO_BONUS[(streak as usize).min(COMBO_BONUS.len() - 1)];
    base + bonus
}

/// Tracks the combo streak across locks.
///
/// The streak used for a clear is the value before that clear. The first
/// clear of a chain uses 0 and starts the streak at 0; every further
/// consecutive clear adds one. A lock that clears nothing ends the chain.
#[derive(Debug, Clone, Default)]
pub struct ComboTracker {
    streak: Option<u32>,
}

impl ComboTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current streak, or `None` if the last lock cleared nothing.
    pub fn streak(&self) -> Option<u32> {
        self.streak
    }

    /// Records one lock and returns the attack it earns.
    pub fn on_lock(&mut self, lines: u32) -> u32 {
        if lines == 0 {
            self.streak = None;
            return 0;
        }
        let streak = self.streak.unwrap_or(0);
        self.streak = Some(self.streak.map_or(0, |s| s.saturating_add(1)));
        attack(lines, streak)
    }
}
