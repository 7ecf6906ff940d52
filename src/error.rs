//! Errors raised by team selection, the session store and the command flows.

use poise::serenity_prelude as serenity;

use crate::voice::GatewayError;

/// A failed precondition of one of the team commands.
///
/// Every variant is recovered at the command boundary and shown to the
/// invoking user as an ephemeral message, so the display strings are written
/// for Discord users rather than for logs.
#[derive(thiserror::Error, Debug)]
pub enum TeamError {
    #[error("No eligible members found in that voice channel.")]
    EmptyPool,

    #[error("Need at least two eligible members in the voice channel to form teams.")]
    TooFewMembers,

    #[error("{0}")]
    InvalidCaptain(CaptainProblem),

    #[error("No team assignments found for this voice channel. Run /random_teams first.")]
    NoAssignment,

    #[error("No recent team moves found for this voice channel. Run /move_teams first.")]
    NoMove,

    #[error("<@{0}> is not part of the current team assignment.")]
    InvalidMember(serenity::UserId),

    #[error("The teams for this voice channel were redrawn during the move. Run /move_teams again.")]
    StaleAssignment,

    #[error("The {0} team channel could not be found. Run /move_teams again.")]
    MissingDestination(crate::teams::Side),

    #[error("You must be in a voice channel to use this command.")]
    NotInVoice,

    #[error("Both destination channels must be voice channels in this server.")]
    ForeignChannel,

    #[error("Could not reach Discord: {0}")]
    Gateway(#[from] GatewayError),
}

/// Why a requested captain was rejected.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptainProblem {
    #[error("Red and blue captains must be different members.")]
    SameMember,

    #[error("The {0} team captain must be in your voice channel.")]
    NotInChannel(crate::teams::Side),

    #[error("Bots cannot be captains.")]
    Bot,
}

impl TeamError {
    pub fn captain(problem: CaptainProblem) -> Self {
        TeamError::InvalidCaptain(problem)
    }
}
