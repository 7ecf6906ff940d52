//! Access to guild voice channels: who is where, and moving people around.

use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use tracing::{debug, warn};

use crate::teams::MemberRef;

/// Discord rejects a move with this code when the member is not in voice.
const TARGET_NOT_IN_VOICE: isize = 40032;

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("guild {0} is not in the cache")]
    GuildUnavailable(serenity::GuildId),
}

/// Why a single member could not be moved.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoveFailure {
    #[error("missing permission to move members")]
    PermissionDenied,

    #[error("not in a voice channel")]
    MemberLeft,

    #[error("destination channel is full")]
    ChannelFull,

    #[error("failed to move: {0}")]
    Other(String),
}

/// The slice of the Discord API the team commands rely on.
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    /// Members currently connected to `channel`.
    async fn list_voice_members(
        &self,
        channel: serenity::ChannelId,
        include_bots: bool,
    ) -> Result<Vec<MemberRef>, GatewayError>;

    /// The voice channel `member` is connected to, if any.
    async fn voice_channel_of(
        &self,
        member: serenity::UserId,
    ) -> Result<Option<serenity::ChannelId>, GatewayError>;

    /// Whether `channel` still exists as a voice channel of the guild.
    async fn voice_channel_exists(&self, channel: serenity::ChannelId) -> Result<bool, GatewayError>;

    async fn move_member(
        &self,
        member: serenity::UserId,
        destination: serenity::ChannelId,
    ) -> Result<(), MoveFailure>;
}

/// [`VoiceGateway`] for one guild, backed by the serenity cache and HTTP client.
pub struct GuildVoice {
    ctx: serenity::Context,
    guild_id: serenity::GuildId,
}

impl GuildVoice {
    pub fn new(ctx: &serenity::Context, guild_id: serenity::GuildId) -> Self {
        Self {
            ctx: ctx.clone(),
            guild_id,
        }
    }

    /// Whether `channel` is a voice channel of this guild.
    pub fn is_voice_channel(&self, channel: &serenity::GuildChannel) -> bool {
        channel.guild_id == self.guild_id && is_voice_kind(channel.kind)
    }

    /// Whether `destination` has reached its user limit, as far as the cache knows.
    fn at_user_limit(&self, destination: serenity::ChannelId) -> bool {
        let Some(guild) = self.guild_id.to_guild_cached(&self.ctx.cache) else {
            return false;
        };
        let limit = match guild.channels.get(&destination).and_then(|c| c.user_limit) {
            Some(limit) if limit > 0 => limit as usize,
            _ => return false,
        };
        let occupants = guild
            .voice_states
            .values()
            .filter(|vs| vs.channel_id == Some(destination))
            .count();
        occupants >= limit
    }
}

fn is_voice_kind(kind: serenity::ChannelType) -> bool {
    matches!(
        kind,
        serenity::ChannelType::Voice | serenity::ChannelType::Stage
    )
}

/// Maps a rejected move to a [`MoveFailure`].
///
/// Discord has no dedicated code for a full channel, so a rejection that is
/// neither a permission nor a presence problem counts as `ChannelFull` when
/// the destination sits at its user limit.
fn classify_move_error(error: &::serenity::Error, at_user_limit: bool) -> MoveFailure {
    if let ::serenity::Error::Http(::serenity::http::HttpError::UnsuccessfulRequest(response)) = error
    {
        if response.status_code.as_u16() == 403 {
            return MoveFailure::PermissionDenied;
        }
        if response.error.code == TARGET_NOT_IN_VOICE {
            return MoveFailure::MemberLeft;
        }
        if at_user_limit {
            return MoveFailure::ChannelFull;
        }
        return MoveFailure::Other(response.error.message.clone());
    }
    MoveFailure::Other(error.to_string())
}

#[async_trait]
impl VoiceGateway for GuildVoice {
    async fn list_voice_members(
        &self,
        channel: serenity::ChannelId,
        include_bots: bool,
    ) -> Result<Vec<MemberRef>, GatewayError> {
        let guild = self
            .guild_id
            .to_guild_cached(&self.ctx.cache)
            .ok_or(GatewayError::GuildUnavailable(self.guild_id))?;

        let members: Vec<MemberRef> = guild
            .voice_states
            .values()
            .filter(|vs| vs.channel_id == Some(channel))
            .filter_map(|vs| {
                vs.member
                    .as_ref()
                    .or_else(|| guild.members.get(&vs.user_id))
                    .map(MemberRef::from)
            })
            .filter(|m| include_bots || !m.bot)
            .collect();

        debug!(
            "found {} member(s) in voice channel {} of guild {}",
            members.len(),
            channel,
            self.guild_id
        );
        Ok(members)
    }

    async fn voice_channel_of(
        &self,
        member: serenity::UserId,
    ) -> Result<Option<serenity::ChannelId>, GatewayError> {
        let guild = self
            .guild_id
            .to_guild_cached(&self.ctx.cache)
            .ok_or(GatewayError::GuildUnavailable(self.guild_id))?;
        Ok(guild.voice_states.get(&member).and_then(|vs| vs.channel_id))
    }

    async fn voice_channel_exists(&self, channel: serenity::ChannelId) -> Result<bool, GatewayError> {
        let guild = self
            .guild_id
            .to_guild_cached(&self.ctx.cache)
            .ok_or(GatewayError::GuildUnavailable(self.guild_id))?;
        Ok(guild
            .channels
            .get(&channel)
            .is_some_and(|c| is_voice_kind(c.kind)))
    }

    async fn move_member(
        &self,
        member: serenity::UserId,
        destination: serenity::ChannelId,
    ) -> Result<(), MoveFailure> {
        match self.guild_id.move_member(&self.ctx, member, destination).await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!("failed to move {} to {}: {}", member, destination, e);
                Err(classify_move_error(&e, self.at_user_limit(destination)))
            }
        }
    }
}
