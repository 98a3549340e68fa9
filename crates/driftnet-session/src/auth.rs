//! Authentication hook for validating peer identity.
//!
//! Driftnet doesn't implement ticket validation itself — that belongs to
//! the platform's identity service. The [`Authenticator`] trait is the
//! boundary: the client side asks it for a fresh ticket to present during
//! the handshake, and the server side hands it the received ticket plus
//! the identity the client claims, then acts on the verdict.

use driftnet_wire::PeerId;

use crate::SessionError;

/// Result of a server-side ticket check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthVerdict {
    /// Ticket is valid for this application.
    Accepted,
    /// Ticket is valid but was issued for a related application.
    ///
    /// Treated as acceptance: development builds authenticate against a
    /// placeholder app id, and rejecting them would lock every dev client
    /// out.
    AcceptedAlternateApp,
    /// Ticket is invalid, expired, or doesn't match the claimed identity.
    Rejected,
}

impl AuthVerdict {
    /// Returns `true` for both accepting verdicts.
    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted | Self::AcceptedAlternateApp)
    }
}

/// The identity/ticket service boundary.
///
/// Methods take `&mut self` because real implementations track issued
/// tickets and open auth sessions. Both calls are expected to return
/// promptly; verdicts that depend on a backend round-trip should be
/// resolved by the implementation before `begin_authentication` returns
/// (the channel state machines never wait).
pub trait Authenticator {
    /// Produces a fresh ticket proving the local identity.
    ///
    /// # Errors
    /// Returns [`SessionError::TicketUnavailable`] when the service cannot
    /// issue one (not signed in, backend unreachable). The caller abandons
    /// the handshake.
    fn issue_ticket(&mut self) -> Result<Vec<u8>, SessionError>;

    /// Validates `ticket` against the identity the remote peer claims.
    fn begin_authentication(&mut self, ticket: &[u8], claimed: PeerId) -> AuthVerdict;
}

/// An [`Authenticator`] that accepts any non-empty ticket.
///
/// For development and tests only — it proves nothing about the peer.
/// Issued tickets are random so traffic still looks realistic in logs.
#[derive(Debug, Default)]
pub struct InsecureAuthenticator {
    reject_all: bool,
}

impl InsecureAuthenticator {
    /// Accepts every non-empty ticket.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every ticket. Useful for exercising rejection paths.
    pub fn rejecting() -> Self {
        Self { reject_all: true }
    }
}

impl Authenticator for InsecureAuthenticator {
    fn issue_ticket(&mut self) -> Result<Vec<u8>, SessionError> {
        let mut rng = rand::rng();
        let ticket: [u8; 32] = rand::Rng::random(&mut rng);
        Ok(ticket.to_vec())
    }

    fn begin_authentication(&mut self, ticket: &[u8], claimed: PeerId) -> AuthVerdict {
        if self.reject_all || ticket.is_empty() || claimed.is_nil() {
            AuthVerdict::Rejected
        } else {
            AuthVerdict::Accepted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_both_accept_variants_are_accepted() {
        assert!(AuthVerdict::Accepted.is_accepted());
        assert!(AuthVerdict::AcceptedAlternateApp.is_accepted());
        assert!(!AuthVerdict::Rejected.is_accepted());
    }

    #[test]
    fn test_insecure_authenticator_issues_distinct_tickets() {
        let mut auth = InsecureAuthenticator::new();
        let a = auth.issue_ticket().unwrap();
        let b = auth.issue_ticket().unwrap();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_insecure_authenticator_accepts_issued_ticket() {
        let mut auth = InsecureAuthenticator::new();
        let ticket = auth.issue_ticket().unwrap();
        assert!(auth.begin_authentication(&ticket, PeerId(1)).is_accepted());
    }

    #[test]
    fn test_insecure_authenticator_rejects_empty_ticket_and_nil_peer() {
        let mut auth = InsecureAuthenticator::new();
        assert_eq!(
            auth.begin_authentication(&[], PeerId(1)),
            AuthVerdict::Rejected
        );
        assert_eq!(
            auth.begin_authentication(&[1, 2, 3], PeerId::NIL),
            AuthVerdict::Rejected
        );
    }

    #[test]
    fn test_rejecting_authenticator_rejects_everything() {
        let mut auth = InsecureAuthenticator::rejecting();
        let ticket = auth.issue_ticket().unwrap();
        assert_eq!(
            auth.begin_authentication(&ticket, PeerId(1)),
            AuthVerdict::Rejected
        );
    }
}
