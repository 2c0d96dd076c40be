use synapse_core::Nonce;

use super::NonceManager;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Disposition {
    /// Not yet handed to the network; reclaimed on drop
    Armed,
    /// The network accepted the transaction; kept pending on drop
    Sent,
    /// Already confirmed or deliberately abandoned
    Released,
}

/// Scoped ownership of one allocated nonce.
///
/// Dropping an armed guard returns the nonce to the reclaim pool. Call
/// [`NonceGuard::mark_sent`] as soon as the send call succeeds; from then on
/// the nonce stays pending until [`NonceGuard::confirm`] or a reset.
#[must_use = "dropping the guard immediately reclaims the nonce"]
pub struct NonceGuard<'a> {
    manager: &'a NonceManager,
    nonce: Nonce,
    disposition: Disposition,
}

impl<'a> NonceGuard<'a> {
    pub(super) fn new(manager: &'a NonceManager, nonce: Nonce) -> Self {
        Self {
            manager,
            nonce,
            disposition: Disposition::Armed,
        }
    }

    pub fn nonce(&self) -> Nonce {
        self.nonce
    }

    pub fn is_sent(&self) -> bool {
        self.disposition == Disposition::Sent
    }

    pub fn mark_sent(&mut self) {
        self.disposition = Disposition::Sent;
    }

    /// The transaction was included; retire the nonce.
    pub fn confirm(mut self) {
        self.manager.mark_confirmed(self.nonce);
        self.disposition = Disposition::Released;
    }

    /// Give up ownership without touching the manager.
    pub fn disarm(mut self) {
        self.disposition = Disposition::Released;
    }
}

impl Drop for NonceGuard<'_> {
    fn drop(&mut self) {
        if self.disposition == Disposition::Armed {
            self.manager.mark_failed(self.nonce);
        }
    }
}

impl std::fmt::Debug for NonceGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceGuard")
            .field("nonce", &self.nonce)
            .field("disposition", &self.disposition)
            .finish()
    }
}
