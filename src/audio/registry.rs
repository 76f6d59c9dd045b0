use dashmap::DashMap;
use futures::future::join_all;
use serenity::{model::id::GuildId, prelude::TypeMapKey};
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info};

use crate::{
    audio::{
        node::{AudioNode, NodeEvent, NodeEventKind},
        session::SessionPlayer,
    },
    bot::gateway::ChatGateway,
    config::SessionSettings,
};

/// Una sesión viva por guild.
pub struct SessionRegistry {
    sessions: DashMap<GuildId, Arc<SessionPlayer>>,
    node: Arc<dyn AudioNode>,
    gateway: Arc<dyn ChatGateway>,
    settings: SessionSettings,
}

impl TypeMapKey for SessionRegistry {
    type Value = Arc<SessionRegistry>;
}

impl SessionRegistry {
    pub fn new(node: Arc<dyn AudioNode>, gateway: Arc<dyn ChatGateway>, settings: SessionSettings) -> Self {
        Self {
            sessions: DashMap::new(),
            node,
            gateway,
            settings,
        }
    }

    /// Devuelve la sesión del guild; una sesión cerrada se reemplaza por una nueva
    pub fn get_or_create_session(&self, guild_id: GuildId) -> Arc<SessionPlayer> {
        let mut entry = self
            .sessions
            .entry(guild_id)
            .or_insert_with(|| self.create(guild_id));

        if entry.is_torn_down() {
            debug!("Reemplazando sesión cerrada en guild {}", guild_id);
            *entry = self.create(guild_id);
        }

        entry.clone()
    }

    /// Sesión viva del guild, si existe
    pub fn get(&self, guild_id: GuildId) -> Option<Arc<SessionPlayer>> {
        self.sessions
            .get(&guild_id)
            .map(|s| s.clone())
            .filter(|s| !s.is_torn_down())
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.iter().filter(|s| !s.is_torn_down()).count()
    }

    fn create(&self, guild_id: GuildId) -> Arc<SessionPlayer> {
        info!("🆕 Nueva sesión para guild {}", guild_id);
        Arc::new(SessionPlayer::new(
            guild_id,
            self.node.clone(),
            self.gateway.clone(),
            self.settings.clone(),
        ))
    }

    /// Entrega un evento del nodo a la sesión de su guild
    pub async fn dispatch(&self, event: NodeEvent) {
        let Some(session) = self.get(event.guild_id) else {
            debug!("Evento {:?} sin sesión activa en guild {}", event.kind, event.guild_id);
            return;
        };

        match &event.kind {
            NodeEventKind::TrackEnd => session.on_track_end().await,
            NodeEventKind::TrackStuck => session.on_track_stuck().await,
            NodeEventKind::TrackException(error) => session.on_track_exception(error).await,
            NodeEventKind::Disconnected => session.on_node_disconnect().await,
        }

        if session.is_torn_down() {
            self.sessions
                .remove_if(&event.guild_id, |_, current| Arc::ptr_eq(current, &session));
        }
    }

    /// Procesa los eventos del nodo; cada uno en su propia tarea para que una
    /// sesión esperando la cola no frene a las demás
    pub fn spawn_event_loop(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<NodeEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let registry = self.clone();
                tokio::spawn(async move { registry.dispatch(event).await });
            }
            debug!("Canal de eventos del nodo cerrado");
        })
    }

    /// Cierra todas las sesiones a la vez
    pub async fn shutdown_all(&self) {
        let sessions: Vec<Arc<SessionPlayer>> = self.sessions.iter().map(|s| s.value().clone()).collect();
        info!("🛑 Cerrando {} sesiones", sessions.len());

        join_all(sessions.iter().map(|s| s.teardown())).await;
        self.sessions.clear();
    }
}
