use crate::error::TeamError;
use crate::teams::MemberRef;
use crate::voice::{GuildVoice, VoiceGateway};
use crate::{Context, Error};
use poise::serenity_prelude as serenity;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

pub mod actions;
pub mod embed;

/// Finds the voice channel the invoking user is sitting in.
async fn invoker_voice(ctx: Context<'_>) -> Result<(GuildVoice, serenity::ChannelId), TeamError> {
    let guild_id = ctx.guild_id().ok_or(TeamError::NotInVoice)?;
    let voice = GuildVoice::new(ctx.serenity_context(), guild_id);
    let channel = voice
        .voice_channel_of(ctx.author().id)
        .await?
        .ok_or(TeamError::NotInVoice)?;
    Ok((voice, channel))
}

/// Pick a random member from your current voice channel
#[poise::command(slash_command, guild_only)]
pub async fn random_winner(
    ctx: Context<'_>,
    #[description = "Let bots win too"] include_bots: Option<bool>,
) -> Result<(), Error> {
    let (voice, channel) = invoker_voice(ctx).await?;
    let include_bots = include_bots.unwrap_or(ctx.data().config.include_bots_by_default);

    let mut rng = StdRng::from_entropy();
    let winner = actions::random_winner(&voice, channel, include_bots, &mut rng).await?;

    ctx.say(format!("🎲 Selected {} from <#{}>!", winner.mention(), channel))
        .await?;
    Ok(())
}

/// Shuffle members in your voice channel into red and blue teams
#[poise::command(slash_command, guild_only)]
pub async fn random_teams(
    ctx: Context<'_>,
    #[description = "Optional member to designate as the red team captain."]
    red_captain: Option<serenity::Member>,
    #[description = "Optional member to designate as the blue team captain."]
    blue_captain: Option<serenity::Member>,
) -> Result<(), Error> {
    let (voice, channel) = invoker_voice(ctx).await?;
    let red_captain = red_captain.as_ref().map(MemberRef::from);
    let blue_captain = blue_captain.as_ref().map(MemberRef::from);

    let mut rng = StdRng::from_entropy();
    let assignment = actions::random_teams(
        &ctx.data().sessions,
        &voice,
        channel,
        red_captain.as_ref(),
        blue_captain.as_ref(),
        &mut rng,
    )
    .await?;

    let channel_name = match channel.name(ctx.serenity_context()).await {
        Ok(name) => name,
        Err(e) => {
            warn!("could not look up the name of channel {}: {}", channel, e);
            "your channel".to_string()
        }
    };
    let colour = rng.gen_range(0..=0xFF_FF_FF);

    ctx.send(poise::CreateReply::default().embed(embed::teams_embed(
        &channel_name,
        &assignment.teams,
        colour,
    )))
    .await?;
    Ok(())
}

/// Move the last randomized teams into the specified voice channels.
#[poise::command(slash_command, guild_only)]
pub async fn move_teams(
    ctx: Context<'_>,
    #[description = "Voice channel to move the red team into."]
    #[channel_types("Voice")]
    red_voice: serenity::GuildChannel,
    #[description = "Voice channel to move the blue team into."]
    #[channel_types("Voice")]
    blue_voice: serenity::GuildChannel,
) -> Result<(), Error> {
    let (voice, channel) = invoker_voice(ctx).await?;
    if !voice.is_voice_channel(&red_voice) || !voice.is_voice_channel(&blue_voice) {
        return Err(TeamError::ForeignChannel.into());
    }

    // Fail fast before deferring so the error reply is immediate.
    ctx.data().sessions.get_assignment(channel)?;
    ctx.defer_ephemeral().await?;

    let report = actions::move_teams(
        &ctx.data().sessions,
        &voice,
        channel,
        red_voice.id,
        blue_voice.id,
        ctx.data().config.move_delay(),
    )
    .await?;

    ctx.send(
        poise::CreateReply::default()
            .content(embed::move_summary(&report))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Return the most recent teams from their channels back to your current channel.
#[poise::command(slash_command, guild_only)]
pub async fn reconvene(ctx: Context<'_>) -> Result<(), Error> {
    let (voice, channel) = invoker_voice(ctx).await?;

    ctx.data().sessions.get_move(channel)?;
    ctx.defer_ephemeral().await?;

    let report = actions::reconvene(
        &ctx.data().sessions,
        &voice,
        channel,
        ctx.data().config.move_delay(),
    )
    .await?;

    ctx.send(
        poise::CreateReply::default()
            .content(embed::reconvene_summary(&report))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Every command the bot registers.
pub fn all() -> Vec<poise::Command<crate::Data, Error>> {
    vec![random_winner(), random_teams(), move_teams(), reconvene()]
}
