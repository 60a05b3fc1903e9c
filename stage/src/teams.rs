//! Team affiliation, supplied by the RTC layer.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Answers whether a remote user is on the local user's team.
///
/// Teammates are received before anyone else and are heard beyond the
/// receive range.
#[cfg_attr(test, mockall::automock)]
pub trait TeamDirectory: Send + Sync {
    fn is_teammate(&self, uid: u32) -> bool;
}

/// Directory for sessions without teams.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTeams;

impl TeamDirectory for NoTeams {
    fn is_teammate(&self, _uid: u32) -> bool {
        false
    }
}

#[derive(Debug, Default)]
struct Roster {
    local_team: Option<u32>,
    members: HashMap<u32, u32>,
}

/// Mutable team table shared between the RTC event path and the engine
#[derive(Debug, Default)]
pub struct TeamRoster {
    inner: RwLock<Roster>,
}

impl TeamRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the local user's team.
    pub fn set_local_team(&self, team: Option<u32>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .local_team = team;
    }

    /// Assign (or clear) a remote user's team.
    pub fn assign(&self, uid: u32, team: Option<u32>) {
        let mut roster = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match team {
            Some(team) => {
                roster.members.insert(uid, team);
            }
            None => {
                roster.members.remove(&uid);
            }
        }
    }

    pub fn team_of(&self, uid: u32) -> Option<u32> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .members
            .get(&uid)
            .copied()
    }
}

impl TeamDirectory for TeamRoster {
    fn is_teammate(&self, uid: u32) -> bool {
        let roster = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        match roster.local_team {
            Some(local) => roster.members.get(&uid) == Some(&local),
            None => false,
        }
    }
}
