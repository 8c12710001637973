//! The global session table.
//!
//! Sessions are owned by exactly one table; the only way a session leaves
//! it is `remove`, so a registered session can never be dropped out from
//! under the protocol layer. (The original expressed this as a destructor
//! assertion on global-list membership; ownership makes it structural.)

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use thiserror::Error;
use tracing::warn;

use crate::core::{ClientId, Limits};

use super::session::Session;
use super::state::SessionState;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{client} is already registered")]
    Duplicate { client: ClientId },

    #[error("session table full ({max} sessions)")]
    Full { max: usize },
}

/// Owning registry of every live session, keyed by client id.
#[derive(Debug)]
pub struct SessionTable<W> {
    sessions: BTreeMap<ClientId, Session<W>>,
    limits: Limits,
}

impl<W> SessionTable<W> {
    pub fn new(limits: Limits) -> Self {
        Self {
            sessions: BTreeMap::new(),
            limits,
        }
    }

    /// Register a session. Refuses duplicates and table overflow.
    pub fn insert(&mut self, session: Session<W>) -> Result<(), RegistryError> {
        let client = session.client();
        if self.sessions.contains_key(&client) {
            return Err(RegistryError::Duplicate { client });
        }
        if self.sessions.len() >= self.limits.max_sessions {
            return Err(RegistryError::Full {
                max: self.limits.max_sessions,
            });
        }
        self.sessions.insert(client, session);
        Ok(())
    }

    /// Look up the session for `client`, creating a fresh `Closed` one on
    /// first contact.
    pub fn get_or_create(&mut self, client: ClientId) -> Result<&mut Session<W>, RegistryError> {
        let len = self.sessions.len();
        match self.sessions.entry(client) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                if len >= self.limits.max_sessions {
                    return Err(RegistryError::Full {
                        max: self.limits.max_sessions,
                    });
                }
                Ok(entry.insert(Session::new(client, self.limits.clone())))
            }
        }
    }

    pub fn get(&self, client: ClientId) -> Option<&Session<W>> {
        self.sessions.get(&client)
    }

    pub fn get_mut(&mut self, client: ClientId) -> Option<&mut Session<W>> {
        self.sessions.get_mut(&client)
    }

    pub fn contains(&self, client: ClientId) -> bool {
        self.sessions.contains_key(&client)
    }

    /// Unregister and return the session; the caller now owns its
    /// destruction. Removing a session that has not finished its terminal
    /// handling is tolerated but logged: the caller is tearing down out of
    /// protocol order.
    pub fn remove(&mut self, client: ClientId) -> Option<Session<W>> {
        let session = self.sessions.remove(&client)?;
        if !session.is_closed() && !session.is_killing() {
            warn!(
                %client,
                state = session.state_name(),
                "removing session before terminal handling completed"
            );
        }
        Some(session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ClientId, &Session<W>)> {
        self.sessions.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&ClientId, &mut Session<W>)> {
        self.sessions.iter_mut()
    }

    pub fn clients(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.sessions.keys().copied()
    }

    /// Sessions currently in `state`, for failover bookkeeping.
    pub fn count_in_state(&self, state: SessionState) -> usize {
        self.sessions
            .values()
            .filter(|session| session.state() == state)
            .count()
    }

    /// Whether any session participates in an in-progress subtree import.
    pub fn any_importing(&self) -> bool {
        self.sessions.values().any(Session::is_importing)
    }
}
