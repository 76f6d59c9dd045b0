//! # Bot Module
//!
//! Discord front end for the per-guild playback sessions.
//!
//! [`MusicBot`] implements Serenity's [`EventHandler`] and stays thin:
//!
//! - `ready` registers the slash commands (globally, or in the dev guild)
//! - `interaction_create` routes slash commands and control buttons to [`handlers`]
//! - `voice_state_update` feeds member joins/leaves into the session, and tears
//!   the session down when the bot itself is pulled out of the voice channel
//!
//! Sessions live in the [`SessionRegistry`], stored in the client's `TypeMap`
//! by `main`.

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod gateway;
pub mod handlers;

use crate::{
    audio::{outcome::Outcome, registry::SessionRegistry},
    bot::gateway::VoiceMember,
    config::Config,
    sources::TrackResolver,
};

pub struct MusicBot {
    pub config: Arc<Config>,
    pub resolver: Arc<dyn TrackResolver>,
}

impl MusicBot {
    pub fn new(config: Arc<Config>, resolver: Arc<dyn TrackResolver>) -> Self {
        Self { config, resolver }
    }

    /// Registro de sesiones guardado en `ctx.data`
    pub async fn registry(&self, ctx: &Context) -> Result<Arc<SessionRegistry>> {
        ctx.data
            .read()
            .await
            .get::<SessionRegistry>()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Registro de sesiones no inicializado"))
    }

    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);
                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command_interaction) => {
                if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                    error!("Error manejando comando: {:?}", e);
                }
            }
            Interaction::Component(component_interaction) => {
                if let Err(e) = handlers::handle_component(&ctx, component_interaction, self).await
                {
                    error!("Error manejando componente: {:?}", e);
                }
            }
            _ => {}
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };
        let registry = match self.registry(&ctx).await {
            Ok(registry) => registry,
            Err(e) => {
                warn!("{:?}", e);
                return;
            }
        };
        let Some(session) = registry.get(guild_id) else {
            return;
        };
        let Some(session_channel) = session.voice_channel() else {
            return;
        };

        // Detectar si el bot fue desconectado
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id == current_user_id {
            if new.channel_id.is_none() {
                info!("🔌 Bot desconectado en guild {}", guild_id);
                session.on_node_disconnect().await;
            }
            return;
        }

        let was_here = old.and_then(|o| o.channel_id) == Some(session_channel);
        let is_here = new.channel_id == Some(session_channel);

        let outcome = match (was_here, is_here) {
            (true, false) => session.on_member_left(new.user_id).await,
            (false, true) => {
                let is_bot = new.member.as_ref().is_some_and(|m| m.user.bot);
                session
                    .on_member_joined(VoiceMember {
                        id: new.user_id,
                        is_bot,
                    })
                    .await
            }
            _ => None,
        };

        match outcome {
            Some(Outcome::DjChanged { dj }) => info!("🎧 Nuevo DJ en guild {}: {}", guild_id, dj),
            Some(Outcome::DjCleared) => info!("🎧 Canal vacío en guild {}, sesión cerrada", guild_id),
            Some(other) => debug!("Cambio de voz en guild {}: {:?}", guild_id, other),
            None => {}
        }
    }
}
