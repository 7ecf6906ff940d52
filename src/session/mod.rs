//! Per voice channel memory of the last team assignment and team move.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;
use tracing::debug;

use crate::error::TeamError;
use crate::teams::{Side, Teams};

/// The teams most recently drawn from a voice channel.
#[derive(Debug, Clone)]
pub struct TeamAssignment {
    pub channel: serenity::ChannelId,
    pub teams: Teams,
    pub created_at: DateTime<Utc>,
    /// Set by [`SessionStore::put_assignment`]; bumps on every redraw.
    pub generation: u64,
}

impl TeamAssignment {
    pub fn new(channel: serenity::ChannelId, teams: Teams) -> Self {
        Self {
            channel,
            teams,
            created_at: Utc::now(),
            generation: 0,
        }
    }
}

/// Where the teams of an assignment were sent, and who actually got there.
#[derive(Debug, Clone)]
pub struct MoveRecord {
    pub channel: serenity::ChannelId,
    /// Generation of the assignment the teams were taken from.
    pub generation: u64,
    pub red_destination: serenity::ChannelId,
    pub blue_destination: serenity::ChannelId,
    pub red_moved: Vec<serenity::UserId>,
    pub blue_moved: Vec<serenity::UserId>,
    pub created_at: DateTime<Utc>,
}

impl MoveRecord {
    pub fn new(
        assignment: &TeamAssignment,
        red_destination: serenity::ChannelId,
        blue_destination: serenity::ChannelId,
    ) -> Self {
        Self {
            channel: assignment.channel,
            generation: assignment.generation,
            red_destination,
            blue_destination,
            red_moved: Vec::new(),
            blue_moved: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn destination(&self, side: Side) -> serenity::ChannelId {
        match side {
            Side::Red => self.red_destination,
            Side::Blue => self.blue_destination,
        }
    }

    pub fn record_moved(&mut self, side: Side, member: serenity::UserId) {
        match side {
            Side::Red => self.red_moved.push(member),
            Side::Blue => self.blue_moved.push(member),
        }
    }

    pub fn moved_members(&self) -> impl Iterator<Item = serenity::UserId> + '_ {
        self.red_moved.iter().chain(self.blue_moved.iter()).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.red_moved.is_empty() && self.blue_moved.is_empty()
    }
}

#[derive(Debug, Default)]
struct Session {
    generation: u64,
    assignment: Option<TeamAssignment>,
    last_move: Option<MoveRecord>,
}

/// Sessions keyed by source voice channel.
///
/// Each method takes the lock once and never awaits while holding it, so two
/// commands racing on the same channel can only observe whole assignments.
/// Entries live until the process exits.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<serenity::ChannelId, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<serenity::ChannelId, Session>> {
        // A panic in another command cannot leave a session half written.
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a fresh assignment and forgets the previous move for the channel.
    ///
    /// Returns the assignment as stored, stamped with its generation.
    pub fn put_assignment(
        &self,
        channel: serenity::ChannelId,
        mut assignment: TeamAssignment,
    ) -> TeamAssignment {
        let mut sessions = self.lock();
        let session = sessions.entry(channel).or_default();
        session.generation += 1;
        assignment.generation = session.generation;
        session.assignment = Some(assignment.clone());
        if session.last_move.take().is_some() {
            debug!("cleared previous team move for channel {}", channel);
        }
        assignment
    }

    pub fn get_assignment(&self, channel: serenity::ChannelId) -> Result<TeamAssignment, TeamError> {
        self.lock()
            .get(&channel)
            .and_then(|s| s.assignment.clone())
            .ok_or(TeamError::NoAssignment)
    }

    /// Stores a move record after checking it against the current assignment.
    ///
    /// A record taken from an older draw than the current one is refused with
    /// [`TeamError::StaleAssignment`].
    pub fn put_move(&self, channel: serenity::ChannelId, record: MoveRecord) -> Result<(), TeamError> {
        let mut sessions = self.lock();
        let session = sessions
            .get_mut(&channel)
            .filter(|s| s.assignment.is_some())
            .ok_or(TeamError::NoAssignment)?;

        if let Some(assignment) = &session.assignment {
            if assignment.generation != record.generation {
                return Err(TeamError::StaleAssignment);
            }
            if let Some(stray) = record
                .moved_members()
                .find(|id| !assignment.teams.contains(*id))
            {
                return Err(TeamError::InvalidMember(stray));
            }
        }

        session.last_move = Some(record);
        Ok(())
    }

    pub fn get_move(&self, channel: serenity::ChannelId) -> Result<MoveRecord, TeamError> {
        self.lock()
            .get(&channel)
            .and_then(|s| s.last_move.clone())
            .ok_or(TeamError::NoMove)
    }

    /// Number of channels with an assignment on record.
    pub fn len(&self) -> usize {
        self.lock().values().filter(|s| s.assignment.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
