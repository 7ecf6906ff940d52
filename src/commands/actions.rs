use std::collections::BTreeSet;
use std::time::Duration;

use poise::serenity_prelude as serenity;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::error::TeamError;
use crate::session::{MoveRecord, SessionStore, TeamAssignment};
use crate::teams::{self, MemberRef, Side};
use crate::voice::{MoveFailure, VoiceGateway};

/// One member that stayed behind, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub member: serenity::UserId,
    pub reason: MoveFailure,
}

impl Skipped {
    pub fn describe(&self) -> String {
        format!("<@{}> ({})", self.member, self.reason)
    }
}

/// Outcome of moving one team.
#[derive(Debug, Clone)]
pub struct TeamMove {
    pub side: Side,
    pub destination: serenity::ChannelId,
    pub moved: Vec<serenity::UserId>,
    pub skipped: Vec<Skipped>,
}

#[derive(Debug, Clone)]
pub struct MoveReport {
    pub red: TeamMove,
    pub blue: TeamMove,
}

impl MoveReport {
    pub fn moved_count(&self) -> usize {
        self.red.moved.len() + self.blue.moved.len()
    }
}

#[derive(Debug, Clone)]
pub struct ReconveneReport {
    pub destination: serenity::ChannelId,
    pub moved: Vec<serenity::UserId>,
    pub skipped: Vec<Skipped>,
}

/// Sends `member` to `destination` unless they already are there.
async fn bring(
    gateway: &dyn VoiceGateway,
    member: serenity::UserId,
    destination: serenity::ChannelId,
    delay: Duration,
) -> Result<(), MoveFailure> {
    let current = gateway
        .voice_channel_of(member)
        .await
        .map_err(|e| MoveFailure::Other(e.to_string()))?;

    match current {
        None => Err(MoveFailure::MemberLeft),
        Some(channel) if channel == destination => Ok(()),
        Some(_) => {
            gateway.move_member(member, destination).await?;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(())
        }
    }
}

/// Picks a random member of `channel`.
pub async fn random_winner<R: Rng + Send>(
    gateway: &dyn VoiceGateway,
    channel: serenity::ChannelId,
    include_bots: bool,
    rng: &mut R,
) -> Result<MemberRef, TeamError> {
    let members = gateway.list_voice_members(channel, include_bots).await?;
    let winner = teams::pick_winner(&members, include_bots, rng)?;
    info!(
        "picked {} ({}) out of {} member(s) in {}",
        winner.name,
        winner.id,
        members.len(),
        channel
    );
    Ok(winner)
}

/// Draws fresh teams for `channel` and remembers them.
pub async fn random_teams<R: Rng + Send>(
    store: &SessionStore,
    gateway: &dyn VoiceGateway,
    channel: serenity::ChannelId,
    red_captain: Option<&MemberRef>,
    blue_captain: Option<&MemberRef>,
    rng: &mut R,
) -> Result<TeamAssignment, TeamError> {
    // Bots are listed too so a bot captain is reported as such.
    let members = gateway.list_voice_members(channel, true).await?;
    let teams = teams::make_teams(&members, red_captain, blue_captain, rng)?;

    let assignment = store.put_assignment(channel, TeamAssignment::new(channel, teams));
    info!(
        "stored teams for {}: {} red, {} blue",
        channel,
        assignment.teams.red.len(),
        assignment.teams.blue.len()
    );
    Ok(assignment)
}

async fn move_side(
    gateway: &dyn VoiceGateway,
    assignment: &TeamAssignment,
    record: &mut MoveRecord,
    side: Side,
    delay: Duration,
) -> TeamMove {
    let destination = record.destination(side);
    let mut outcome = TeamMove {
        side,
        destination,
        moved: Vec::new(),
        skipped: Vec::new(),
    };

    for member in assignment.teams.side(side) {
        match bring(gateway, member.id, destination, delay).await {
            Ok(()) => {
                outcome.moved.push(member.id);
                record.record_moved(side, member.id);
            }
            Err(reason) => {
                debug!("skipping {} for the {} team: {}", member.id, side, reason);
                outcome.skipped.push(Skipped {
                    member: member.id,
                    reason,
                });
            }
        }
    }
    outcome
}

/// Moves the last teams drawn in `channel` to their destination channels.
///
/// Members are moved one at a time with `delay` in between. A member that
/// cannot be moved is reported and the rest carry on; members already moved
/// stay where they are. If the teams are redrawn while the batch runs, the
/// report is still returned but the move is not remembered.
pub async fn move_teams(
    store: &SessionStore,
    gateway: &dyn VoiceGateway,
    channel: serenity::ChannelId,
    red_destination: serenity::ChannelId,
    blue_destination: serenity::ChannelId,
    delay: Duration,
) -> Result<MoveReport, TeamError> {
    let assignment = store.get_assignment(channel)?;
    debug!(
        "moving teams drawn in {} at {}",
        channel, assignment.created_at
    );
    let mut record = MoveRecord::new(&assignment, red_destination, blue_destination);

    let red = move_side(gateway, &assignment, &mut record, Side::Red, delay).await;
    let blue = move_side(gateway, &assignment, &mut record, Side::Blue, delay).await;

    if record.is_empty() {
        info!("nobody from {} could be moved; keeping the previous move", channel);
    } else if let Err(e) = store.put_move(channel, record) {
        warn!("not recording the team move out of {}: {}", channel, e);
    }

    let report = MoveReport { red, blue };
    info!(
        "moved {} member(s) out of {} ({} skipped)",
        report.moved_count(),
        channel,
        report.red.skipped.len() + report.blue.skipped.len()
    );
    Ok(report)
}

/// Brings everyone from the last team move back into `channel`.
///
/// That is both current teams, everyone the move recorded, and whoever is
/// still sitting in either destination channel, bots aside.
pub async fn reconvene(
    store: &SessionStore,
    gateway: &dyn VoiceGateway,
    channel: serenity::ChannelId,
    delay: Duration,
) -> Result<ReconveneReport, TeamError> {
    let record = store.get_move(channel)?;
    for side in [Side::Red, Side::Blue] {
        if !gateway.voice_channel_exists(record.destination(side)).await? {
            return Err(TeamError::MissingDestination(side));
        }
    }

    let mut members: BTreeSet<serenity::UserId> = record.moved_members().collect();
    if let Ok(assignment) = store.get_assignment(channel) {
        members.extend(assignment.teams.red.iter().chain(&assignment.teams.blue).map(|m| m.id));
    }
    for side in [Side::Red, Side::Blue] {
        let occupants = gateway
            .list_voice_members(record.destination(side), false)
            .await?;
        members.extend(occupants.into_iter().map(|m| m.id));
    }

    let mut report = ReconveneReport {
        destination: channel,
        moved: Vec::new(),
        skipped: Vec::new(),
    };
    for member in members {
        match bring(gateway, member, channel, delay).await {
            Ok(()) => report.moved.push(member),
            Err(reason) => report.skipped.push(Skipped { member, reason }),
        }
    }

    info!(
        "reconvened {} member(s) into {} ({} skipped)",
        report.moved.len(),
        channel,
        report.skipped.len()
    );
    Ok(report)
}
