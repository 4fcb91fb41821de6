//! Process-wide stable pointer mode.
//!
//! Runtime object constants print their address. Golden output must not
//! depend on where the allocator put an object, so test drivers switch this
//! mode on once, before any HIR is printed. The setting is write-once.

use std::sync::OnceLock;

/// Address printed for every runtime pointer while stable mode is on.
pub const STABLE_ADDRESS: u64 = 0xdead_beef;

static STABLE_POINTERS: OnceLock<bool> = OnceLock::new();

/// The mode was already fixed to a different value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("stable pointer mode is already set to {current}")]
pub struct StablePointersAlreadySet {
    pub current: bool,
}

/// Fix the stable pointer mode for the rest of the process.
///
/// Setting the same value again is accepted; changing it is not.
pub fn set_use_stable_pointers(enabled: bool) -> Result<(), StablePointersAlreadySet> {
    let current = *STABLE_POINTERS.get_or_init(|| enabled);
    if current == enabled {
        Ok(())
    } else {
        Err(StablePointersAlreadySet { current })
    }
}

/// Whether stable pointer mode is on. Off until someone turns it on.
pub fn use_stable_pointers() -> bool {
    STABLE_POINTERS.get().copied().unwrap_or(false)
}

/// The address to print for a runtime pointer.
pub fn display_address(addr: u64) -> u64 {
    if use_stable_pointers() {
        STABLE_ADDRESS
    } else {
        addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_once() {
        assert_eq!(set_use_stable_pointers(true), Ok(()));
        assert_eq!(set_use_stable_pointers(true), Ok(()));
        assert_eq!(
            set_use_stable_pointers(false),
            Err(StablePointersAlreadySet { current: true })
        );
        assert!(use_stable_pointers());
        assert_eq!(display_address(0x1234), STABLE_ADDRESS);
    }
}
