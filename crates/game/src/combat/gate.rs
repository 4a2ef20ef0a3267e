use rkyv::{Archive, Deserialize, Serialize};

use super::slot::Slot;

/// One category of gated player action. The gate holds at most one lock at
/// a time, which is what makes the actions mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
#[repr(u8)]
pub enum LockKind {
    SwingPickaxe = 0,
    FireRifle = 1,
    FireShotgun = 2,
    ReloadRifle = 3,
    ReloadShotgun = 4,
    Heal = 5,
}

impl LockKind {
    pub fn fire_for(slot: Slot) -> Self {
        match slot {
            Slot::Pickaxe => LockKind::SwingPickaxe,
            Slot::Rifle => LockKind::FireRifle,
            Slot::Shotgun => LockKind::FireShotgun,
        }
    }

    pub fn reload_for(slot: Slot) -> Option<Self> {
        match slot {
            Slot::Rifle => Some(LockKind::ReloadRifle),
            Slot::Shotgun => Some(LockKind::ReloadShotgun),
            Slot::Pickaxe => None,
        }
    }

    pub fn is_reload(self) -> bool {
        matches!(self, LockKind::ReloadRifle | LockKind::ReloadShotgun)
    }

    /// Build-mode entry is blocked mid-heal and mid-reload but not by the
    /// short fire/swing locks.
    pub fn blocks_build_entry(self) -> bool {
        matches!(
            self,
            LockKind::Heal | LockKind::ReloadRifle | LockKind::ReloadShotgun
        )
    }
}

/// Generation counter handed out per acquisition. A scheduled release only
/// frees the gate if the token still matches, so a release that arrives after
/// the lock has already turned over is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockToken(u32);

#[derive(Debug, Default)]
pub struct ActionGate {
    held: Option<(LockKind, LockToken)>,
    next_token: u32,
}

impl ActionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_free(&self) -> bool {
        self.held.is_none()
    }

    pub fn held(&self) -> Option<LockKind> {
        self.held.map(|(kind, _)| kind)
    }

    pub fn acquire(&mut self, kind: LockKind) -> Option<LockToken> {
        if self.held.is_some() {
            return None;
        }

        let token = LockToken(self.next_token);
        self.next_token = self.next_token.wrapping_add(1);
        self.held = Some((kind, token));
        Some(token)
    }

    /// Releases the lock if `token` matches the current acquisition.
    /// Returns the kind that was released, or None for a stale token.
    pub fn release(&mut self, token: LockToken) -> Option<LockKind> {
        match self.held {
            Some((kind, held_token)) if held_token == token => {
                self.held = None;
                Some(kind)
            }
            _ => None,
        }
    }
}
