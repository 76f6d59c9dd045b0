use async_trait::async_trait;
use serenity::{
    all::{Cache, CreateMessage, EditMessage, GetMessages, Http},
    model::id::{ChannelId, GuildId, MessageId, UserId},
};
use std::sync::Arc;
use thiserror::Error;

use crate::{
    audio::session::ControlPanel,
    ui::{buttons::MusicControls, embeds},
};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("error de Discord: {0}")]
    Http(#[from] serenity::Error),
    #[error("el guild {0} no está en caché")]
    GuildNotCached(GuildId),
}

/// Miembro presente en un canal de voz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceMember {
    pub id: UserId,
    pub is_bot: bool,
}

/// Lo que la sesión necesita del cliente de chat.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn send_control(&self, channel_id: ChannelId, panel: &ControlPanel) -> Result<MessageId, GatewayError>;
    async fn edit_control(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        panel: &ControlPanel,
    ) -> Result<(), GatewayError>;
    async fn delete_message(&self, channel_id: ChannelId, message_id: MessageId) -> Result<(), GatewayError>;
    async fn voice_members(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<Vec<VoiceMember>, GatewayError>;
    /// Ids de los últimos `limit` mensajes, el más reciente primero
    async fn recent_messages(&self, channel_id: ChannelId, limit: u8) -> Result<Vec<MessageId>, GatewayError>;
}

/// `ChatGateway` sobre el HTTP y la caché de serenity.
pub struct SerenityGateway {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl SerenityGateway {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        Self { http, cache }
    }
}

#[async_trait]
impl ChatGateway for SerenityGateway {
    async fn send_control(&self, channel_id: ChannelId, panel: &ControlPanel) -> Result<MessageId, GatewayError> {
        let message = CreateMessage::new()
            .embed(embeds::control_panel(panel))
            .components(MusicControls::for_panel(panel).rows());

        let sent = channel_id.send_message(&self.http, message).await?;
        Ok(sent.id)
    }

    async fn edit_control(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        panel: &ControlPanel,
    ) -> Result<(), GatewayError> {
        let edit = EditMessage::new()
            .embed(embeds::control_panel(panel))
            .components(MusicControls::for_panel(panel).rows());

        channel_id.edit_message(&self.http, message_id, edit).await?;
        Ok(())
    }

    async fn delete_message(&self, channel_id: ChannelId, message_id: MessageId) -> Result<(), GatewayError> {
        channel_id.delete_message(&self.http, message_id).await?;
        Ok(())
    }

    async fn voice_members(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<Vec<VoiceMember>, GatewayError> {
        let guild = self
            .cache
            .guild(guild_id)
            .ok_or(GatewayError::GuildNotCached(guild_id))?;

        let members = guild
            .voice_states
            .values()
            .filter(|state| state.channel_id == Some(channel_id))
            .map(|state| {
                let is_bot = state
                    .member
                    .as_ref()
                    .map(|m| m.user.bot)
                    .or_else(|| guild.members.get(&state.user_id).map(|m| m.user.bot))
                    .unwrap_or(false);
                VoiceMember {
                    id: state.user_id,
                    is_bot,
                }
            })
            .collect();

        Ok(members)
    }

    async fn recent_messages(&self, channel_id: ChannelId, limit: u8) -> Result<Vec<MessageId>, GatewayError> {
        let messages = channel_id
            .messages(&self.http, GetMessages::new().limit(limit))
            .await?;
        Ok(messages.into_iter().map(|m| m.id).collect())
    }
}
