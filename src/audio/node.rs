use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::time::Duration;
use thiserror::Error;

use crate::audio::{filters::FilterSpec, track::Track};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum NodeError {
    #[error("no hay sesión de voz para el guild {0}")]
    NoSession(GuildId),
    #[error("el nodo rechazó el comando: {0}")]
    Rejected(String),
    #[error("el nodo no soporta {0}")]
    Unsupported(&'static str),
    #[error("no se pudo unir al canal de voz: {0}")]
    Join(String),
}

/// Servicio externo que transmite el audio al canal de voz.
///
/// La sesión sólo conoce estas operaciones; transporte, decodificación y
/// reconexión quedan del lado del nodo.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioNode: Send + Sync {
    async fn connect_session(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), NodeError>;
    async fn play(&self, guild_id: GuildId, track: &Track) -> Result<(), NodeError>;
    async fn pause(&self, guild_id: GuildId) -> Result<(), NodeError>;
    async fn resume(&self, guild_id: GuildId) -> Result<(), NodeError>;
    /// Detiene el track actual; el nodo reporta luego `TrackEnd`
    async fn stop(&self, guild_id: GuildId) -> Result<(), NodeError>;
    async fn seek(&self, guild_id: GuildId, position: Duration) -> Result<(), NodeError>;
    async fn set_volume(&self, guild_id: GuildId, percent: u8) -> Result<(), NodeError>;
    async fn set_filter(&self, guild_id: GuildId, filter: &FilterSpec) -> Result<(), NodeError>;
    async fn destroy_session(&self, guild_id: GuildId) -> Result<(), NodeError>;
}

/// Eventos que el nodo entrega de forma asíncrona.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEventKind {
    TrackEnd,
    TrackStuck,
    TrackException(String),
    /// El bot salió del canal de voz sin pasar por la sesión
    Disconnected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeEvent {
    pub guild_id: GuildId,
    pub kind: NodeEventKind,
}

impl NodeEvent {
    pub fn new(guild_id: GuildId, kind: NodeEventKind) -> Self {
        Self { guild_id, kind }
    }
}
