use async_trait::async_trait;
use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    events::CoreEvent,
    input::{Input, YoutubeDl},
    tracks::TrackHandle,
    Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::audio::{
    filters::FilterSpec,
    node::{AudioNode, NodeError, NodeEvent, NodeEventKind},
    track::Track,
};

/// Track vigente por guild, con una generación que distingue cada `play`.
struct ActiveTracks<H> {
    slots: DashMap<GuildId, (u64, H)>,
    generation: AtomicU64,
}

impl<H: Clone> ActiveTracks<H> {
    fn new() -> Self {
        Self {
            slots: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    /// Registra el track nuevo y devuelve su generación
    fn register(&self, guild_id: GuildId, handle: H) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        self.slots.insert(guild_id, (generation, handle));
        generation
    }

    fn current(&self, guild_id: GuildId) -> Option<H> {
        self.slots.get(&guild_id).map(|slot| slot.1.clone())
    }

    fn take(&self, guild_id: GuildId) -> Option<H> {
        self.slots.remove(&guild_id).map(|(_, (_, handle))| handle)
    }

    /// Quita el track sólo si sigue siendo el de `generation`
    fn claim(&self, guild_id: GuildId, generation: u64) -> bool {
        self.slots
            .remove_if(&guild_id, |_, slot| slot.0 == generation)
            .is_some()
    }
}

/// `AudioNode` sobre las llamadas de voz de songbird, con entradas de yt-dlp.
pub struct SongbirdNode {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    tracks: Arc<ActiveTracks<TrackHandle>>,
    volumes: DashMap<GuildId, f32>,
    events: mpsc::UnboundedSender<NodeEvent>,
}

impl SongbirdNode {
    pub fn new(manager: Arc<Songbird>, http: reqwest::Client, events: mpsc::UnboundedSender<NodeEvent>) -> Self {
        Self {
            manager,
            http,
            tracks: Arc::new(ActiveTracks::new()),
            volumes: DashMap::new(),
            events,
        }
    }

    fn handle(&self, guild_id: GuildId) -> Result<TrackHandle, NodeError> {
        self.tracks.current(guild_id).ok_or(NodeError::NoSession(guild_id))
    }
}

#[async_trait]
impl AudioNode for SongbirdNode {
    async fn connect_session(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), NodeError> {
        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| NodeError::Join(e.to_string()))?;

        let mut handler = call.lock().await;
        handler.remove_all_global_events();
        handler.add_global_event(
            Event::Core(CoreEvent::DriverDisconnect),
            DisconnectForwarder {
                guild_id,
                events: self.events.clone(),
            },
        );

        info!("🔊 Conectado al canal de voz en guild {}", guild_id);
        Ok(())
    }

    async fn play(&self, guild_id: GuildId, track: &Track) -> Result<(), NodeError> {
        let call = self.manager.get(guild_id).ok_or(NodeError::NoSession(guild_id))?;

        // Se quita del mapa antes de detenerlo para que su End no avance la sesión
        if let Some(previous) = self.tracks.take(guild_id) {
            let _ = previous.stop();
        }

        let input: Input = YoutubeDl::new(self.http.clone(), track.uri.clone()).into();
        let handle = call.lock().await.play_input(input);

        let volume = self.volumes.get(&guild_id).map(|v| *v).unwrap_or(1.0);
        let _ = handle.set_volume(volume);

        // Registrado antes de los eventos: un End inmediato ya encuentra su generación
        let generation = self.tracks.register(guild_id, handle.clone());
        for event in [TrackEvent::End, TrackEvent::Error] {
            let forwarder = TrackForwarder {
                guild_id,
                generation,
                tracks: self.tracks.clone(),
                events: self.events.clone(),
            };
            if let Err(e) = handle.add_event(Event::Track(event), forwarder) {
                self.tracks.claim(guild_id, generation);
                return Err(NodeError::Rejected(e.to_string()));
            }
        }
        debug!("▶️ Track {} en songbird (guild {})", track.id, guild_id);
        Ok(())
    }

    async fn pause(&self, guild_id: GuildId) -> Result<(), NodeError> {
        self.handle(guild_id)?
            .pause()
            .map_err(|e| NodeError::Rejected(e.to_string()))
    }

    async fn resume(&self, guild_id: GuildId) -> Result<(), NodeError> {
        self.handle(guild_id)?
            .play()
            .map_err(|e| NodeError::Rejected(e.to_string()))
    }

    async fn stop(&self, guild_id: GuildId) -> Result<(), NodeError> {
        self.handle(guild_id)?
            .stop()
            .map_err(|e| NodeError::Rejected(e.to_string()))
    }

    async fn seek(&self, guild_id: GuildId, position: Duration) -> Result<(), NodeError> {
        self.handle(guild_id)?
            .seek_async(position)
            .await
            .map(|_| ())
            .map_err(|e| NodeError::Rejected(e.to_string()))
    }

    async fn set_volume(&self, guild_id: GuildId, percent: u8) -> Result<(), NodeError> {
        let volume = f32::from(percent) / 100.0;
        self.volumes.insert(guild_id, volume);

        match self.tracks.current(guild_id) {
            Some(handle) => handle
                .set_volume(volume)
                .map_err(|e| NodeError::Rejected(e.to_string())),
            None => Ok(()),
        }
    }

    async fn set_filter(&self, _guild_id: GuildId, filter: &FilterSpec) -> Result<(), NodeError> {
        debug!("Filtro {} pedido, songbird no tiene cadena DSP", filter);
        Err(NodeError::Unsupported("filtros de audio"))
    }

    async fn destroy_session(&self, guild_id: GuildId) -> Result<(), NodeError> {
        if let Some(handle) = self.tracks.take(guild_id) {
            let _ = handle.stop();
        }
        self.volumes.remove(&guild_id);

        if self.manager.get(guild_id).is_none() {
            return Ok(());
        }

        self.manager
            .remove(guild_id)
            .await
            .map_err(|e| NodeError::Rejected(e.to_string()))?;

        info!("👋 Desconectado del canal de voz en guild {}", guild_id);
        Ok(())
    }
}

/// Reenvía el fin o error del track vigente como `NodeEvent`
struct TrackForwarder {
    guild_id: GuildId,
    generation: u64,
    tracks: Arc<ActiveTracks<TrackHandle>>,
    events: mpsc::UnboundedSender<NodeEvent>,
}

#[async_trait]
impl VoiceEventHandler for TrackForwarder {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        // Sólo el track vigente, y una sola vez aunque lleguen End y Error
        if !self.tracks.claim(self.guild_id, self.generation) {
            return None;
        }

        let kind = match ctx {
            EventContext::Track(states) => match states.first() {
                Some((state, _)) if matches!(state.playing, songbird::tracks::PlayMode::Errored(_)) => {
                    NodeEventKind::TrackException(format!("{:?}", state.playing))
                }
                _ => NodeEventKind::TrackEnd,
            },
            _ => NodeEventKind::TrackEnd,
        };

        if self.events.send(NodeEvent::new(self.guild_id, kind)).is_err() {
            error!("❌ Canal de eventos cerrado, se perdió un evento de guild {}", self.guild_id);
        }

        Some(Event::Cancel)
    }
}

/// Reporta desconexiones de voz que no pidió el bot
struct DisconnectForwarder {
    guild_id: GuildId,
    events: mpsc::UnboundedSender<NodeEvent>,
}

#[async_trait]
impl VoiceEventHandler for DisconnectForwarder {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::DriverDisconnect(data) = ctx {
            if data.reason.is_some() {
                warn!("🔌 Voz desconectada en guild {}: {:?}", self.guild_id, data.reason);
                let _ = self
                    .events
                    .send(NodeEvent::new(self.guild_id, NodeEventKind::Disconnected));
            }
        }

        None
    }
}
