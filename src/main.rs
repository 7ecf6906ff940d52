mod commands;
mod config;
mod error;
mod session;
mod teams;
mod voice;

use poise::serenity_prelude as serenity;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::BotConfig;
use crate::error::TeamError;
use crate::session::SessionStore;

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

// User data, which is stored and accessible in all command invocations
pub struct Data {
    config: BotConfig,
    sessions: SessionStore,
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            error!("Failed to start bot: {:?}", error);
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            // Failed preconditions go back to the invoker only.
            let content = match error.downcast_ref::<TeamError>() {
                Some(team_error) => {
                    debug!("`{}` refused: {}", ctx.command().name, team_error);
                    team_error.to_string()
                }
                None => {
                    error!("Error in command `{}`: {:?}", ctx.command().name, error);
                    "Something went wrong while running that command.".to_string()
                }
            };
            let reply = poise::CreateReply::default().content(content).ephemeral(true);
            if let Err(e) = ctx.send(reply).await {
                warn!("Could not report error to user: {}", e);
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {}", e)
            }
        }
    }
}

async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    framework: poise::FrameworkContext<'_, Data, Error>,
    _data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Ready { data_about_bot, .. } => {
            info!("Logged in as {}", data_about_bot.user.name);
        }
        serenity::FullEvent::GuildCreate {
            guild,
            is_new: Some(true),
        } => {
            // Make the commands usable right after joining a new guild.
            poise::builtins::register_in_guild(ctx, &framework.options().commands, guild.id)
                .await?;
            info!(
                "Synced application commands for newly joined guild: {} ({})",
                guild.name, guild.id
            );
        }
        _ => {}
    }
    Ok(())
}

async fn register_commands(
    ctx: &serenity::Context,
    ready: &serenity::Ready,
    commands: &[poise::Command<Data, Error>],
) -> Result<(), Error> {
    if ready.guilds.is_empty() {
        poise::builtins::register_globally(ctx, commands).await?;
        info!("Synced global application commands (no guilds available yet).");
        return Ok(());
    }

    for guild in &ready.guilds {
        match poise::builtins::register_in_guild(ctx, commands, guild.id).await {
            Ok(()) => info!("Synced application commands for guild {}", guild.id),
            Err(e) => warn!(
                "Failed to sync application commands for guild {}: {}",
                guild.id, e
            ),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voice_teams_bot=info,serenity=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // A .env file is optional; real environment variables take precedence.
    if dotenv::dotenv().is_err() {
        debug!("No .env file found");
    }
    let token = config::token()?;
    let bot_config = BotConfig::from_env()?;
    info!("Loaded configuration: {:?}", bot_config);

    let options = poise::FrameworkOptions {
        commands: commands::all(),
        // The global error handler for all error cases that may occur
        on_error: |error| Box::pin(on_error(error)),
        // This code is run before every command
        pre_command: |ctx| {
            Box::pin(async move {
                debug!("Executing command {}...", ctx.command().qualified_name);
            })
        },
        // This code is run after a command if it was successful (returned Ok)
        post_command: |ctx| {
            Box::pin(async move {
                debug!(
                    "Executed command {}! ({} channel(s) with teams on record)",
                    ctx.command().qualified_name,
                    ctx.data().sessions.len()
                );
            })
        },
        event_handler: |ctx, event, framework, data| {
            Box::pin(event_handler(ctx, event, framework, data))
        },
        ..Default::default()
    };

    let framework = poise::Framework::builder()
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                register_commands(ctx, ready, &framework.options().commands).await?;

                Ok(Data {
                    config: bot_config,
                    sessions: SessionStore::new(),
                })
            })
        })
        .options(options)
        .build();

    // Member and voice state caches back every command.
    let intents = serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::GUILD_MEMBERS;

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;

    client.start().await?;
    Ok(())
}
