// Sessiongate: Trust signals

/// An instantaneous event saying the device can no longer be trusted to
/// hold a readable live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustSignal {
    DeviceLocked,
}

impl TrustSignal {
    /// Map a screen-off event. The screen can go dark without the keyguard
    /// engaging (timeout grace period, smart lock); only a locked keyguard
    /// counts as losing trust.
    pub fn from_screen_off(keyguard_locked: bool) -> Option<Self> {
        keyguard_locked.then_some(TrustSignal::DeviceLocked)
    }
}
