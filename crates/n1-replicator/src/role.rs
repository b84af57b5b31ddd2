//! Session roles and sync mode.

/// Which side of the connection a session is on. Either can initiate a push
/// or a pull logically; the role only determines who speaks first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Accepted the connection
    Server,
    /// Dialed out
    Client,
}

/// What a client-driven session is trying to accomplish. Only meaningful
/// from the dialing side — an accepting [`Role::Server`] reacts to whatever
/// the client chooses to do (see §4.5.1's three-way `await`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Pull objects the local vault lacks from the peer
    Pull,
    /// Push objects the peer lacks from the local vault
    Push,
}
