//! # Session Player
//!
//! One playback session per guild: queue, current track, loop flag, DJ,
//! vote tallies and the "now playing" control message.
//!
//! Two guarded sections keep concurrent callers safe:
//! - `waiting` serializes [`SessionPlayer::advance`], so a manual skip racing
//!   the node's own track-end event issues a single `play`.
//! - `updating` serializes [`SessionPlayer::refresh_control_message`], so only
//!   one control card is ever sent.
//!
//! State lives behind a `parking_lot::Mutex` that is never held across an
//! `.await`.

use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        filters::FilterSpec,
        node::{AudioNode, NodeError},
        outcome::{Authority, Outcome, Refusal},
        queue::{PlaybackQueue, QueueError, QueuePage},
        track::{SearchResult, Track},
        votes::{required_votes, VoteAction, VoteBook},
    },
    bot::gateway::{ChatGateway, VoiceMember},
    config::SessionSettings,
};

/// Mínimo de canciones en cola para poder mezclar
pub const MIN_SHUFFLE_LEN: usize = 3;

/// Errores de control de flujo que la capa de comandos muestra una sola vez.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("los comandos de música van en <#{expected}>")]
    IncorrectChannel { expected: ChannelId },
    #[error("no estás en un canal de voz y no indicaste ninguno")]
    NoChannelProvided,
    #[error("tienes que estar en <#{channel}> para usar este comando")]
    NotInVoiceChannel { channel: ChannelId },
    #[error("la sesión ya fue cerrada")]
    TornDown,
}

/// Quien invoca un comando, ya resuelto por la capa de comandos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: UserId,
    /// Permiso de expulsar miembros en el guild
    pub is_admin: bool,
    pub voice_channel: Option<ChannelId>,
    pub text_channel: ChannelId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Idle,
    Playing,
    Paused,
}

/// Instantánea que se dibuja en el mensaje de control.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlPanel {
    pub track: Track,
    pub status: PlaybackStatus,
    pub loop_enabled: bool,
    pub volume: u8,
    pub filter: Option<String>,
    pub dj: Option<UserId>,
    pub queue_len: usize,
    pub up_next: Option<String>,
}

#[derive(Debug)]
struct SessionState {
    voice_channel: Option<ChannelId>,
    text_channel: Option<ChannelId>,
    dj: Option<UserId>,
    current: Option<Track>,
    status: PlaybackStatus,
    loop_enabled: bool,
    votes: VoteBook,
    control_message: Option<MessageId>,
    volume: u8,
    filter: Option<FilterSpec>,
}

/// Sección protegida por un `AtomicBool`; se libera al soltar el guard.
struct FlagGuard<'a>(&'a AtomicBool);

impl<'a> FlagGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlagGuard(flag))
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SessionPlayer {
    guild_id: GuildId,
    node: Arc<dyn AudioNode>,
    gateway: Arc<dyn ChatGateway>,
    settings: SessionSettings,
    queue: PlaybackQueue,
    state: Mutex<SessionState>,
    waiting: AtomicBool,
    updating: AtomicBool,
    torn_down: AtomicBool,
    cancel: CancellationToken,
}

impl SessionPlayer {
    pub fn new(
        guild_id: GuildId,
        node: Arc<dyn AudioNode>,
        gateway: Arc<dyn ChatGateway>,
        settings: SessionSettings,
    ) -> Self {
        let volume = settings.default_volume;
        Self {
            guild_id,
            node,
            gateway,
            settings,
            queue: PlaybackQueue::new(),
            state: Mutex::new(SessionState {
                voice_channel: None,
                text_channel: None,
                dj: None,
                current: None,
                status: PlaybackStatus::Idle,
                loop_enabled: false,
                votes: VoteBook::default(),
                control_message: None,
                volume,
                filter: None,
            }),
            waiting: AtomicBool::new(false),
            updating: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    // Accesores de sólo lectura

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    pub fn current_track(&self) -> Option<Track> {
        self.state.lock().current.clone()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.state.lock().status
    }

    pub fn loop_enabled(&self) -> bool {
        self.state.lock().loop_enabled
    }

    pub fn dj(&self) -> Option<UserId> {
        self.state.lock().dj
    }

    pub fn voice_channel(&self) -> Option<ChannelId> {
        self.state.lock().voice_channel
    }

    pub fn text_channel(&self) -> Option<ChannelId> {
        self.state.lock().text_channel
    }

    pub fn volume(&self) -> u8 {
        self.state.lock().volume
    }

    pub fn queue(&self) -> &PlaybackQueue {
        &self.queue
    }

    pub fn queue_page(&self, page: usize, per_page: usize) -> QueuePage {
        self.queue.page(page, per_page)
    }

    pub fn votes_for(&self, action: VoteAction) -> usize {
        self.state.lock().votes.tally(action).len()
    }

    /// El DJ o alguien con permiso de expulsar miembros
    pub fn is_privileged(&self, caller: &Caller) -> bool {
        caller.is_admin || self.state.lock().dj == Some(caller.id)
    }

    /// Verifica canal de texto y presencia en el canal de voz antes de un comando.
    pub fn check_invocation(&self, caller: &Caller, connecting: bool) -> Result<(), SessionError> {
        self.ensure_alive()?;

        let state = self.state.lock();
        if let Some(expected) = state.text_channel {
            if caller.text_channel != expected {
                return Err(SessionError::IncorrectChannel { expected });
            }
        }

        let privileged = caller.is_admin || state.dj == Some(caller.id);
        if connecting || privileged {
            return Ok(());
        }

        match state.voice_channel {
            Some(channel) if caller.voice_channel != Some(channel) => {
                Err(SessionError::NotInVoiceChannel { channel })
            }
            _ => Ok(()),
        }
    }

    /// Une la sesión a un canal de voz. El primero en conectar queda como DJ.
    pub async fn connect(&self, caller: &Caller, target: Option<ChannelId>) -> Result<Outcome, SessionError> {
        self.ensure_alive()?;

        if let Some(channel) = self.voice_channel() {
            return Ok(Outcome::AlreadyConnected { channel });
        }

        let channel = caller
            .voice_channel
            .or(target)
            .ok_or(SessionError::NoChannelProvided)?;

        if let Err(e) = self.node.connect_session(self.guild_id, channel).await {
            error!("❌ Error al conectar al canal de voz {}: {}", channel, e);
            return Ok(service_failure(e));
        }

        // El nodo arranca al 100%; se alinea con el volumen que muestra el panel
        let volume = self.volume();
        if let Err(e) = self.node.set_volume(self.guild_id, volume).await {
            warn!("⚠️ No se pudo aplicar el volumen inicial ({}%): {}", volume, e);
        }

        {
            let mut state = self.state.lock();
            state.voice_channel = Some(channel);
            state.text_channel.get_or_insert(caller.text_channel);
            if state.dj.is_none() {
                state.dj = Some(caller.id);
                info!("🎧 DJ inicial en guild {}: {}", self.guild_id, caller.id);
            }
        }

        info!("🔊 Conectado a canal de voz {} en guild {}", channel, self.guild_id);
        Ok(Outcome::Connected { channel })
    }

    /// Agrega un track y arranca la reproducción si no hay nada sonando.
    pub async fn enqueue(&self, track: Track) -> Result<Outcome, SessionError> {
        self.ensure_alive()?;

        self.queue.enqueue(track.clone());
        let position = self.queue.len();
        self.advance_if_idle().await;

        Ok(Outcome::Enqueued { track, position })
    }

    /// Encola un resultado de búsqueda; las playlists se recortan a `max_tracks`.
    pub async fn enqueue_result(&self, result: SearchResult, max_tracks: usize) -> Result<Outcome, SessionError> {
        match result {
            SearchResult::Single(track) => self.enqueue(track).await,
            SearchResult::Playlist { name, tracks } => {
                self.ensure_alive()?;

                let count = tracks.len().min(max_tracks);
                for track in tracks.into_iter().take(count) {
                    self.queue.enqueue(track);
                }
                info!("➕ Playlist '{}' agregada: {} canciones", name, count);
                self.advance_if_idle().await;

                Ok(Outcome::PlaylistEnqueued { name, count })
            }
        }
    }

    async fn advance_if_idle(&self) {
        if self.status() == PlaybackStatus::Idle {
            self.advance().await;
        }
    }

    /// Pasa al siguiente track.
    ///
    /// Sale sin efecto si otro `advance` está esperando o si algo está
    /// sonando. Con repetición activa vuelve a reproducir el track actual;
    /// si no, espera la cola hasta `queue_timeout` y cierra la sesión al
    /// vencer el plazo.
    pub async fn advance(&self) {
        let Some(waiting) = FlagGuard::acquire(&self.waiting) else {
            debug!("⏳ advance ya en curso en guild {}", self.guild_id);
            return;
        };

        if self.is_torn_down() {
            return;
        }

        let mut replay = {
            let mut state = self.state.lock();
            if state.status != PlaybackStatus::Idle {
                return;
            }
            state.votes.clear_all();
            match (&state.current, state.loop_enabled) {
                (Some(track), true) => Some(track.clone()),
                _ => {
                    state.current = None;
                    None
                }
            }
        };

        // Un track que el nodo rechaza se descarta y se sigue con la cola;
        // la espera con plazo sigue cerrando la sesión si no queda nada
        let track = loop {
            let track = match replay.take() {
                Some(track) => {
                    info!("🔂 Repitiendo track: {}", track.title);
                    track
                }
                None => match self.queue.dequeue(self.settings.queue_timeout, &self.cancel).await {
                    Ok(track) => track,
                    Err(QueueError::TimedOut(wait)) => {
                        info!("⏰ Sin música por {:?} en guild {}, desconectando", wait, self.guild_id);
                        drop(waiting);
                        self.teardown().await;
                        return;
                    }
                    Err(e) => {
                        debug!("Espera de cola terminada en guild {}: {}", self.guild_id, e);
                        return;
                    }
                },
            };

            match self.node.play(self.guild_id, &track).await {
                Ok(()) => break track,
                Err(e) => {
                    error!("❌ Error al reproducir '{}': {}", track.title, e);
                    if self.is_torn_down() {
                        return;
                    }
                    self.state.lock().current = None;
                }
            }
        };

        info!("🎵 Reproduciendo: {}", track.title);
        {
            let mut state = self.state.lock();
            if self.is_torn_down() {
                return;
            }
            state.current = Some(track);
            state.status = PlaybackStatus::Playing;
        }
        drop(waiting);

        self.refresh_control_message().await;
    }

    /// Redibuja el mensaje de control en el canal de la sesión.
    ///
    /// Si el mensaje quedó enterrado en el historial se borra y se manda
    /// uno nuevo; si no, se edita en el lugar.
    pub async fn refresh_control_message(&self) {
        let Some(_updating) = FlagGuard::acquire(&self.updating) else {
            debug!("Panel ya se está actualizando en guild {}", self.guild_id);
            return;
        };

        let Some((panel, channel, existing)) = self.panel_snapshot() else {
            return;
        };

        let Some(message) = existing else {
            self.send_control(channel, &panel).await;
            return;
        };

        let visible = match self
            .gateway
            .recent_messages(channel, self.settings.control_history_limit)
            .await
        {
            Ok(recent) => recent.contains(&message),
            Err(e) => {
                warn!("⚠️ No se pudo leer el historial de {}: {}", channel, e);
                true
            }
        };

        if !visible {
            debug!("Panel enterrado en el historial, reenviando");
            if let Err(e) = self.gateway.delete_message(channel, message).await {
                debug!("No se pudo borrar el panel anterior: {}", e);
            }
            self.send_control(channel, &panel).await;
            return;
        }

        if let Err(e) = self.gateway.edit_control(channel, message, &panel).await {
            warn!("⚠️ No se pudo editar el panel, enviando uno nuevo: {}", e);
            self.send_control(channel, &panel).await;
        }
    }

    async fn send_control(&self, channel: ChannelId, panel: &ControlPanel) {
        let message = match self.gateway.send_control(channel, panel).await {
            Ok(message) => message,
            Err(e) => {
                warn!("⚠️ No se pudo enviar el panel a {}: {}", channel, e);
                return;
            }
        };

        let orphaned = {
            let mut state = self.state.lock();
            if self.is_torn_down() {
                true
            } else {
                state.control_message = Some(message);
                false
            }
        };

        // La sesión se cerró mientras se enviaba
        if orphaned {
            let _ = self.gateway.delete_message(channel, message).await;
        }
    }

    fn panel_snapshot(&self) -> Option<(ControlPanel, ChannelId, Option<MessageId>)> {
        let state = self.state.lock();
        let track = state.current.clone()?;
        let channel = state.text_channel?;
        let up_next = self.queue.peek_all().first().map(|t| t.title.clone());

        let panel = ControlPanel {
            track,
            status: state.status,
            loop_enabled: state.loop_enabled,
            volume: state.volume,
            filter: state.filter.as_ref().map(|f| f.to_string()),
            dj: state.dj,
            queue_len: self.queue.len(),
            up_next,
        };
        Some((panel, channel, state.control_message))
    }

    pub async fn vote_pause(&self, caller: &Caller) -> Result<Outcome, SessionError> {
        self.vote(caller, VoteAction::Pause).await
    }

    pub async fn vote_resume(&self, caller: &Caller) -> Result<Outcome, SessionError> {
        self.vote(caller, VoteAction::Resume).await
    }

    pub async fn vote_skip(&self, caller: &Caller) -> Result<Outcome, SessionError> {
        self.vote(caller, VoteAction::Skip).await
    }

    pub async fn vote_stop(&self, caller: &Caller) -> Result<Outcome, SessionError> {
        self.vote(caller, VoteAction::Stop).await
    }

    pub async fn vote_shuffle(&self, caller: &Caller) -> Result<Outcome, SessionError> {
        self.vote(caller, VoteAction::Shuffle).await
    }

    pub async fn vote_clear(&self, caller: &Caller) -> Result<Outcome, SessionError> {
        self.vote(caller, VoteAction::Clear).await
    }

    /// Ejecuta `action` si quien llama tiene autoridad; si no, registra su voto
    /// y ejecuta sólo cuando este voto alcanza el umbral.
    pub async fn vote(&self, caller: &Caller, action: VoteAction) -> Result<Outcome, SessionError> {
        self.ensure_alive()?;

        if let Some(refusal) = self.precondition(action) {
            return Ok(refusal.into());
        }

        if let Some(authority) = self.authority(caller, action) {
            self.state.lock().votes.tally_mut(action).clear();
            info!("⚡ {} ejecutado por {} en guild {}", action, authority, self.guild_id);
            return Ok(self.execute(action, authority).await);
        }

        let Some(channel) = self.voice_channel() else {
            return Ok(Refusal::NotConnected.into());
        };

        let members = match self.gateway.voice_members(self.guild_id, channel).await {
            Ok(members) => humans(&members).len(),
            Err(e) => {
                warn!("⚠️ No se pudo contar miembros de {}: {}", channel, e);
                return Ok(Refusal::ServiceFailure(e.to_string()).into());
            }
        };
        let required = required_votes(action, members, self.settings.vote_divisor);

        let (passed, votes) = {
            let mut state = self.state.lock();
            let tally = state.votes.tally_mut(action);
            if tally.contains(caller.id) {
                return Ok(Refusal::AlreadyVoted(action).into());
            }
            let passed = tally.add_voter(caller.id, required);
            let votes = tally.len();
            if passed {
                tally.clear();
            }
            (passed, votes)
        };

        if passed {
            info!("🗳️ Votación para {} aprobada ({}/{})", action, votes, required);
            Ok(self.execute(action, Authority::Vote).await)
        } else {
            debug!("🗳️ Voto para {} de {}: {}/{}", action, caller.id, votes, required);
            Ok(Outcome::VoteRecorded { action, votes, required })
        }
    }

    fn precondition(&self, action: VoteAction) -> Option<Refusal> {
        let state = self.state.lock();
        if state.voice_channel.is_none() {
            return Some(Refusal::NotConnected);
        }

        match action {
            VoteAction::Pause => match state.status {
                PlaybackStatus::Idle => Some(Refusal::NothingPlaying),
                PlaybackStatus::Paused => Some(Refusal::AlreadyPaused),
                PlaybackStatus::Playing => None,
            },
            VoteAction::Resume => match state.status {
                PlaybackStatus::Idle => Some(Refusal::NothingPlaying),
                PlaybackStatus::Playing => Some(Refusal::NotPaused),
                PlaybackStatus::Paused => None,
            },
            VoteAction::Skip => state.current.is_none().then_some(Refusal::NothingPlaying),
            VoteAction::Stop => None,
            VoteAction::Shuffle => {
                let len = self.queue.len();
                (len < MIN_SHUFFLE_LEN).then_some(Refusal::QueueTooShort {
                    len,
                    min: MIN_SHUFFLE_LEN,
                })
            }
            VoteAction::Clear => self.queue.is_empty().then_some(Refusal::EmptyQueue),
        }
    }

    fn authority(&self, caller: &Caller, action: VoteAction) -> Option<Authority> {
        let state = self.state.lock();
        if state.dj == Some(caller.id) {
            Some(Authority::Dj)
        } else if caller.is_admin {
            Some(Authority::Admin)
        } else if action == VoteAction::Skip
            && state.current.as_ref().map(|t| t.requester) == Some(caller.id)
        {
            Some(Authority::Requester)
        } else {
            None
        }
    }

    async fn execute(&self, action: VoteAction, authority: Authority) -> Outcome {
        let result = match action {
            VoteAction::Pause => self.node.pause(self.guild_id).await.map(|_| {
                self.state.lock().status = PlaybackStatus::Paused;
                info!("⏸️ Reproducción pausada en guild {}", self.guild_id);
            }),
            VoteAction::Resume => self.node.resume(self.guild_id).await.map(|_| {
                self.state.lock().status = PlaybackStatus::Playing;
                info!("▶️ Reproducción reanudada en guild {}", self.guild_id);
            }),
            // El nodo reporta TrackEnd y eso dispara advance()
            VoteAction::Skip => self.node.stop(self.guild_id).await.map(|_| {
                info!("⏭️ Track saltado en guild {}", self.guild_id);
            }),
            VoteAction::Stop => {
                self.teardown().await;
                Ok(())
            }
            VoteAction::Shuffle => {
                let len = self.queue.len();
                if len < MIN_SHUFFLE_LEN {
                    return Refusal::QueueTooShort {
                        len,
                        min: MIN_SHUFFLE_LEN,
                    }
                    .into();
                }
                self.queue.shuffle();
                Ok(())
            }
            VoteAction::Clear => {
                self.queue.clear();
                Ok(())
            }
        };

        match result {
            Ok(()) => {
                if matches!(action, VoteAction::Pause | VoteAction::Resume | VoteAction::Shuffle) {
                    self.refresh_control_message().await;
                }
                Outcome::Executed { action, authority }
            }
            Err(e) => {
                error!("❌ Error al ejecutar {} en guild {}: {}", action, self.guild_id, e);
                service_failure(e)
            }
        }
    }

    /// `swap_dj`: sólo el DJ o un administrador puede pasar el rol.
    pub async fn swap_dj(&self, caller: &Caller, target: Option<UserId>) -> Result<Outcome, SessionError> {
        self.ensure_alive()?;
        if !self.is_privileged(caller) {
            return Ok(Refusal::NotPrivileged.into());
        }
        self.reassign_dj(target).await
    }

    /// Pasa el rol de DJ a `target`, o al primer miembro (no bot) del canal
    /// que no sea el DJ actual.
    pub async fn reassign_dj(&self, target: Option<UserId>) -> Result<Outcome, SessionError> {
        self.ensure_alive()?;

        let Some(channel) = self.voice_channel() else {
            return Ok(Refusal::NotConnected.into());
        };

        let members = match self.gateway.voice_members(self.guild_id, channel).await {
            Ok(members) => humans(&members),
            Err(e) => return Ok(Refusal::ServiceFailure(e.to_string()).into()),
        };

        let mut state = self.state.lock();
        let outgoing = state.dj;

        if let Some(member) = target {
            if !members.contains(&member) {
                return Ok(Refusal::SwapTargetNotInChannel(member).into());
            }
            if outgoing == Some(member) {
                return Ok(Refusal::SwapTargetAlreadyDj(member).into());
            }
        }

        if members.len() < 2 {
            return Ok(Refusal::NoOneToSwap.into());
        }

        let next = target.or_else(|| members.iter().copied().find(|m| Some(*m) != outgoing));
        match next {
            Some(dj) => {
                state.dj = Some(dj);
                info!("🎧 Nuevo DJ en guild {}: {}", self.guild_id, dj);
                Ok(Outcome::DjChanged { dj })
            }
            None => Ok(Refusal::NoOneToSwap.into()),
        }
    }

    /// Un miembro salió del canal de voz de la sesión.
    ///
    /// Si era el DJ, el rol pasa al primer miembro restante. Sin nadie en el
    /// canal la sesión se cierra.
    pub async fn on_member_left(&self, member: UserId) -> Option<Outcome> {
        if self.is_torn_down() || self.dj() != Some(member) {
            return None;
        }

        let channel = self.voice_channel()?;
        let remaining = match self.gateway.voice_members(self.guild_id, channel).await {
            Ok(members) => humans(&members),
            Err(e) => {
                warn!("⚠️ No se pudo leer el canal {} tras la salida del DJ: {}", channel, e);
                return None;
            }
        };

        let next = remaining.into_iter().find(|m| *m != member);
        self.state.lock().dj = next;

        match next {
            Some(dj) => {
                info!("🎧 El DJ salió; nuevo DJ en guild {}: {}", self.guild_id, dj);
                Some(Outcome::DjChanged { dj })
            }
            None => {
                info!("🎧 El DJ salió y el canal quedó vacío en guild {}", self.guild_id);
                self.teardown().await;
                Some(Outcome::DjCleared)
            }
        }
    }

    /// Un miembro entró al canal de voz; toma el DJ si no hay uno presente.
    pub async fn on_member_joined(&self, member: VoiceMember) -> Option<Outcome> {
        if self.is_torn_down() || member.is_bot {
            return None;
        }

        let channel = self.voice_channel()?;
        let current = self.dj();
        if current == Some(member.id) {
            return None;
        }

        let dj_present = match current {
            None => false,
            Some(dj) => match self.gateway.voice_members(self.guild_id, channel).await {
                Ok(members) => members.iter().any(|m| m.id == dj),
                Err(e) => {
                    warn!("⚠️ No se pudo verificar al DJ en {}: {}", channel, e);
                    return None;
                }
            },
        };

        if dj_present {
            return None;
        }

        self.state.lock().dj = Some(member.id);
        info!("🎧 {} entró y queda como DJ en guild {}", member.id, self.guild_id);
        Some(Outcome::DjChanged { dj: member.id })
    }

    /// Cierra la sesión. Idempotente: las llamadas siguientes no hacen nada.
    pub async fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel.cancel();

        let control = {
            let mut state = self.state.lock();
            state.votes.clear_all();
            state.current = None;
            state.status = PlaybackStatus::Idle;
            state.loop_enabled = false;
            state.control_message.take().zip(state.text_channel)
        };
        self.queue.clear();

        if let Some((message, channel)) = control {
            if let Err(e) = self.gateway.delete_message(channel, message).await {
                debug!("No se pudo borrar el panel al cerrar: {}", e);
            }
        }

        if let Err(e) = self.node.destroy_session(self.guild_id).await {
            warn!("⚠️ Error al destruir la sesión de voz en guild {}: {}", self.guild_id, e);
        }

        self.state.lock().voice_channel = None;
        info!("👋 Sesión cerrada en guild {}", self.guild_id);
    }

    /// Activa o desactiva la repetición del track actual
    pub async fn set_loop(&self, caller: &Caller, enabled: bool) -> Result<Outcome, SessionError> {
        self.ensure_alive()?;
        if !self.is_privileged(caller) {
            return Ok(Refusal::NotPrivileged.into());
        }

        {
            let mut state = self.state.lock();
            if state.current.is_none() {
                return Ok(Refusal::NothingPlaying.into());
            }
            if state.loop_enabled == enabled {
                return Ok(Outcome::LoopUnchanged(enabled));
            }
            state.loop_enabled = enabled;
        }

        info!("🔁 Repetición {} en guild {}", if enabled { "activada" } else { "desactivada" }, self.guild_id);
        self.refresh_control_message().await;
        Ok(Outcome::LoopSet(enabled))
    }

    pub async fn set_volume(&self, caller: &Caller, percent: i64) -> Result<Outcome, SessionError> {
        self.ensure_alive()?;
        if !self.is_privileged(caller) {
            return Ok(Refusal::NotPrivileged.into());
        }

        let volume = match u8::try_from(percent) {
            Ok(v) if (1..=100).contains(&v) => v,
            _ => return Ok(Refusal::InvalidVolume(percent).into()),
        };

        if let Err(e) = self.node.set_volume(self.guild_id, volume).await {
            error!("❌ Error al ajustar volumen: {}", e);
            return Ok(service_failure(e));
        }

        self.state.lock().volume = volume;
        info!("🔊 Volumen ajustado a {}% en guild {}", volume, self.guild_id);
        self.refresh_control_message().await;
        Ok(Outcome::VolumeSet(volume))
    }

    /// Salta a `position` del track actual (que debe estar sonando)
    pub async fn seek(&self, position: Duration) -> Result<Outcome, SessionError> {
        self.ensure_alive()?;

        let length = {
            let state = self.state.lock();
            match (&state.current, state.status) {
                (Some(track), PlaybackStatus::Playing) => track.duration,
                _ => return Ok(Refusal::NothingPlaying.into()),
            }
        };

        if !length.is_zero() && position >= length {
            return Ok(Refusal::SeekOutOfRange { position, length }.into());
        }

        if let Err(e) = self.node.seek(self.guild_id, position).await {
            error!("❌ Error al hacer seek: {}", e);
            return Ok(service_failure(e));
        }

        Ok(Outcome::Seeked(position))
    }

    pub async fn set_filter(&self, caller: &Caller, filter: FilterSpec) -> Result<Outcome, SessionError> {
        self.ensure_alive()?;
        if !self.is_privileged(caller) {
            return Ok(Refusal::NotPrivileged.into());
        }
        if self.current_track().is_none() {
            return Ok(Refusal::NothingPlaying.into());
        }

        if let Err(e) = self.node.set_filter(self.guild_id, &filter).await {
            warn!("⚠️ No se pudo aplicar el filtro {}: {}", filter, e);
            return Ok(service_failure(e));
        }

        let name = filter.to_string();
        self.state.lock().filter = Some(filter);
        info!("🎛️ Filtro aplicado en guild {}: {}", self.guild_id, name);
        self.refresh_control_message().await;
        Ok(Outcome::FilterApplied(name))
    }

    /// Elimina de la cola la posición `index` (base 0)
    pub async fn remove(&self, caller: &Caller, index: usize) -> Result<Outcome, SessionError> {
        self.ensure_alive()?;
        if !self.is_privileged(caller) {
            return Ok(Refusal::NotPrivileged.into());
        }

        match self.queue.remove_at(index) {
            Ok(track) => Ok(Outcome::Removed(track)),
            Err(QueueError::IndexOutOfRange { index, len }) => {
                Ok(Refusal::InvalidIndex { index, len }.into())
            }
            Err(e) => Ok(Refusal::ServiceFailure(e.to_string()).into()),
        }
    }

    pub async fn disconnect(&self, caller: &Caller) -> Result<Outcome, SessionError> {
        self.ensure_alive()?;
        if !self.is_privileged(caller) {
            return Ok(Refusal::NotPrivileged.into());
        }
        self.teardown().await;
        Ok(Outcome::Disconnected)
    }

    // Eventos del nodo

    pub async fn on_track_end(&self) {
        debug!("Track terminado en guild {}", self.guild_id);
        self.mark_idle();
        self.advance().await;
    }

    pub async fn on_track_stuck(&self) {
        warn!("⚠️ Track atascado en guild {}", self.guild_id);
        self.mark_idle();
        self.advance().await;
    }

    pub async fn on_track_exception(&self, error: &str) {
        error!("❌ Error de reproducción en guild {}: {}", self.guild_id, error);
        self.mark_idle();
        self.advance().await;
    }

    /// El nodo perdió la conexión de voz: cierre implícito
    pub async fn on_node_disconnect(&self) {
        info!("🔌 Desconectado del canal de voz en guild {}", self.guild_id);
        self.teardown().await;
    }

    fn mark_idle(&self) {
        self.state.lock().status = PlaybackStatus::Idle;
    }

    fn ensure_alive(&self) -> Result<(), SessionError> {
        if self.is_torn_down() {
            Err(SessionError::TornDown)
        } else {
            Ok(())
        }
    }
}

fn humans(members: &[VoiceMember]) -> Vec<UserId> {
    members.iter().filter(|m| !m.is_bot).map(|m| m.id).collect()
}

fn service_failure(error: NodeError) -> Outcome {
    Refusal::ServiceFailure(error.to_string()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::{
            node::MockAudioNode,
            testing::{
                admin, caller, connected, new_session, track, track_for, FakeGateway, FakeNode,
                GatewayCall, NodeCall, BOT, TEXT, VOICE,
            },
        },
        bot::gateway::MockChatGateway,
    };
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn first_connect_becomes_dj() {
        let (session, node, _) = connected(3).await;

        assert_eq!(session.dj(), Some(UserId::new(1)));
        assert_eq!(session.voice_channel(), Some(VOICE));
        assert_eq!(session.text_channel(), Some(TEXT));
        assert_eq!(node.calls(), vec![NodeCall::Connect(VOICE), NodeCall::Volume(100)]);

        let again = session.connect(&caller(2), None).await.unwrap();
        assert_eq!(again, Outcome::AlreadyConnected { channel: VOICE });
        assert_eq!(session.dj(), Some(UserId::new(1)));
    }

    #[tokio::test]
    async fn connect_without_any_channel_fails() {
        let session = new_session(Arc::new(FakeNode::default()), Arc::new(FakeGateway::default()));
        let lost = Caller {
            voice_channel: None,
            ..caller(1)
        };

        assert_eq!(session.connect(&lost, None).await, Err(SessionError::NoChannelProvided));

        let outcome = session.connect(&lost, Some(VOICE)).await.unwrap();
        assert_eq!(outcome, Outcome::Connected { channel: VOICE });
    }

    #[tokio::test]
    async fn enqueue_while_idle_starts_first_track_in_order() {
        let (session, node, gateway) = connected(3).await;

        for id in ["a", "b", "c"] {
            session.enqueue(track(id)).await.unwrap();
        }

        assert_eq!(node.plays(), vec!["a"]);
        let waiting: Vec<String> = session.queue().peek_all().into_iter().map(|t| t.id).collect();
        assert_eq!(waiting, vec!["b", "c"]);
        assert_eq!(gateway.sends(), 1);

        session.on_track_end().await;
        session.on_track_end().await;
        assert_eq!(node.plays(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn concurrent_advance_plays_once() {
        let (session, node, _) = connected(3).await;
        session.queue().enqueue(track("a"));
        session.queue().enqueue(track("b"));

        tokio::join!(session.advance(), session.advance());

        assert_eq!(node.plays(), vec!["a"]);
        assert_eq!(session.queue().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn advance_waiting_on_empty_queue_blocks_second_caller() {
        let (session, node, _) = connected(3).await;

        let first = {
            let session = session.clone();
            tokio::spawn(async move { session.advance().await })
        };
        tokio::task::yield_now().await;

        session.advance().await;
        session.queue().enqueue(track("late"));
        first.await.unwrap();

        assert_eq!(node.plays(), vec!["late"]);
        assert_eq!(session.status(), PlaybackStatus::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_queue_times_out_into_teardown() {
        let (session, node, _) = connected(3).await;

        session.advance().await;

        assert!(session.is_torn_down());
        assert_eq!(node.count(&NodeCall::Destroy), 1);
        assert_eq!(session.voice_channel(), None);
    }

    #[tokio::test]
    async fn advance_clears_stale_votes() {
        let (session, _, _) = connected(8).await;
        session.enqueue(track("a")).await.unwrap();
        session.enqueue(track("b")).await.unwrap();
        session.enqueue(track("c")).await.unwrap();

        session.vote_skip(&caller(2)).await.unwrap();
        session.vote_pause(&caller(3)).await.unwrap();
        session.vote_stop(&caller(4)).await.unwrap();
        assert_eq!(session.votes_for(VoteAction::Skip), 1);

        session.on_track_end().await;

        for action in VoteAction::ALL {
            assert_eq!(session.votes_for(action), 0, "{action}");
        }
    }

    #[tokio::test]
    async fn dj_bypasses_the_vote() {
        let (session, node, _) = connected(5).await;
        session.enqueue(track_for("a", 2)).await.unwrap();

        let outcome = session.vote_skip(&caller(1)).await.unwrap();

        assert_eq!(
            outcome,
            Outcome::Executed {
                action: VoteAction::Skip,
                authority: Authority::Dj
            }
        );
        assert_eq!(session.votes_for(VoteAction::Skip), 0);
        assert_eq!(node.count(&NodeCall::Stop), 1);
    }

    #[tokio::test]
    async fn admin_bypasses_the_vote() {
        let (session, node, _) = connected(5).await;
        session.enqueue(track("a")).await.unwrap();

        let outcome = session.vote_pause(&admin(4)).await.unwrap();

        assert_eq!(
            outcome,
            Outcome::Executed {
                action: VoteAction::Pause,
                authority: Authority::Admin
            }
        );
        assert_eq!(session.status(), PlaybackStatus::Paused);
        assert_eq!(node.count(&NodeCall::Pause), 1);
    }

    #[tokio::test]
    async fn requester_may_skip_own_track() {
        let (session, node, _) = connected(5).await;
        session.enqueue(track_for("a", 3)).await.unwrap();

        let outcome = session.vote_skip(&caller(3)).await.unwrap();

        assert_eq!(
            outcome,
            Outcome::Executed {
                action: VoteAction::Skip,
                authority: Authority::Requester
            }
        );
        assert_eq!(node.count(&NodeCall::Stop), 1);
    }

    #[tokio::test]
    async fn skip_passes_on_second_vote_with_five_members() {
        let (session, node, _) = connected(5).await;
        session.enqueue(track("a")).await.unwrap();

        let first = session.vote_skip(&caller(2)).await.unwrap();
        assert_eq!(
            first,
            Outcome::VoteRecorded {
                action: VoteAction::Skip,
                votes: 1,
                required: 2
            }
        );
        assert_eq!(node.count(&NodeCall::Stop), 0);

        let repeat = session.vote_skip(&caller(2)).await.unwrap();
        assert_eq!(repeat, Outcome::Refused(Refusal::AlreadyVoted(VoteAction::Skip)));

        let second = session.vote_skip(&caller(3)).await.unwrap();
        assert_eq!(
            second,
            Outcome::Executed {
                action: VoteAction::Skip,
                authority: Authority::Vote
            }
        );
        assert_eq!(node.count(&NodeCall::Stop), 1);
        assert_eq!(session.votes_for(VoteAction::Skip), 0);
    }

    #[tokio::test]
    async fn stop_with_three_members_needs_two_votes() {
        let (session, node, _) = connected(3).await;
        session.enqueue(track("a")).await.unwrap();

        let first = session.vote_stop(&caller(2)).await.unwrap();
        assert_eq!(
            first,
            Outcome::VoteRecorded {
                action: VoteAction::Stop,
                votes: 1,
                required: 2
            }
        );
        assert!(!session.is_torn_down());

        session.vote_stop(&caller(3)).await.unwrap();
        assert!(session.is_torn_down());
        assert_eq!(node.count(&NodeCall::Destroy), 1);
    }

    #[tokio::test]
    async fn shuffle_refused_below_three_tracks() {
        let (session, node, _) = connected(3).await;
        session.enqueue(track("now")).await.unwrap();
        session.enqueue(track("a")).await.unwrap();
        session.enqueue(track("b")).await.unwrap();
        let before = session.queue().peek_all();

        let voted = session.vote_shuffle(&caller(2)).await.unwrap();
        let forced = session.vote_shuffle(&caller(1)).await.unwrap();

        let refusal = Outcome::Refused(Refusal::QueueTooShort { len: 2, min: 3 });
        assert_eq!(voted, refusal);
        assert_eq!(forced, refusal);
        assert_eq!(session.queue().peek_all(), before);
        assert_eq!(session.votes_for(VoteAction::Shuffle), 0);
        assert_eq!(node.plays(), vec!["now"]);
    }

    #[tokio::test]
    async fn clear_by_dj_empties_queue() {
        let (session, _, _) = connected(3).await;
        for id in ["a", "b", "c"] {
            session.enqueue(track(id)).await.unwrap();
        }

        session.vote_clear(&caller(1)).await.unwrap();

        assert!(session.queue().is_empty());
        assert_eq!(session.current_track().map(|t| t.id), Some("a".to_string()));
    }

    #[tokio::test]
    async fn pause_and_resume_check_state() {
        let (session, _, _) = connected(2).await;
        assert_eq!(
            session.vote_pause(&caller(1)).await.unwrap(),
            Outcome::Refused(Refusal::NothingPlaying)
        );

        session.enqueue(track("a")).await.unwrap();
        assert_eq!(
            session.vote_resume(&caller(1)).await.unwrap(),
            Outcome::Refused(Refusal::NotPaused)
        );

        session.vote_pause(&caller(1)).await.unwrap();
        assert_eq!(
            session.vote_pause(&caller(1)).await.unwrap(),
            Outcome::Refused(Refusal::AlreadyPaused)
        );

        session.vote_resume(&caller(1)).await.unwrap();
        assert_eq!(session.status(), PlaybackStatus::Playing);
    }

    #[tokio::test]
    async fn node_failure_leaves_state_unchanged() {
        let (session, node, _) = connected(2).await;
        session.enqueue(track("a")).await.unwrap();
        node.fail_from_now();

        let outcome = session.vote_pause(&caller(1)).await.unwrap();

        assert!(matches!(outcome, Outcome::Refused(Refusal::ServiceFailure(_))));
        assert_eq!(session.status(), PlaybackStatus::Playing);
        assert!(!session.is_torn_down());
    }

    #[tokio::test]
    async fn loop_replays_current_track() {
        let (session, node, _) = connected(2).await;
        session.enqueue(track("a")).await.unwrap();
        session.enqueue(track("b")).await.unwrap();

        assert_eq!(session.set_loop(&caller(1), true).await.unwrap(), Outcome::LoopSet(true));
        assert_eq!(
            session.set_loop(&caller(1), true).await.unwrap(),
            Outcome::LoopUnchanged(true)
        );

        session.on_track_end().await;
        assert_eq!(node.plays(), vec!["a", "a"]);

        session.set_loop(&caller(1), false).await.unwrap();
        session.on_track_end().await;
        assert_eq!(node.plays(), vec!["a", "a", "b"]);
    }

    #[tokio::test]
    async fn loop_requires_a_current_track_and_privilege() {
        let (session, _, _) = connected(2).await;
        assert_eq!(
            session.set_loop(&caller(1), true).await.unwrap(),
            Outcome::Refused(Refusal::NothingPlaying)
        );
        assert_eq!(
            session.set_loop(&caller(2), true).await.unwrap(),
            Outcome::Refused(Refusal::NotPrivileged)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn track_exception_advances_like_track_end() {
        let (session, node, _) = connected(2).await;
        session.enqueue(track("a")).await.unwrap();
        session.enqueue(track("b")).await.unwrap();

        session.on_track_exception("decoder error").await;
        session.on_track_stuck().await;

        assert_eq!(node.plays(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn control_message_is_edited_while_visible() {
        let (session, _, gateway) = connected(2).await;
        session.enqueue(track("a")).await.unwrap();

        session.refresh_control_message().await;

        let calls = gateway.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[0], GatewayCall::Send(_)));
        assert!(matches!(calls[1], GatewayCall::Edit(_)));
    }

    #[tokio::test]
    async fn buried_control_message_is_replaced() {
        let (session, _, gateway) = connected(2).await;
        session.enqueue(track("a")).await.unwrap();
        let GatewayCall::Send(first) = gateway.calls()[0].clone() else {
            panic!("se esperaba un envío");
        };

        gateway.bury_history(15);
        session.refresh_control_message().await;

        let calls = gateway.calls();
        assert_eq!(calls[1], GatewayCall::Delete(first));
        assert!(matches!(calls[2], GatewayCall::Send(_)));
        assert_eq!(gateway.sends(), 2);
    }

    #[tokio::test]
    async fn teardown_twice_is_harmless() {
        let (session, node, gateway) = connected(2).await;
        session.enqueue(track("a")).await.unwrap();

        session.teardown().await;
        session.teardown().await;

        assert_eq!(node.count(&NodeCall::Destroy), 1);
        let deletes = gateway
            .calls()
            .into_iter()
            .filter(|c| matches!(c, GatewayCall::Delete(_)))
            .count();
        assert_eq!(deletes, 1);
        assert_eq!(session.vote_skip(&caller(1)).await, Err(SessionError::TornDown));
    }

    #[tokio::test]
    async fn teardown_deletes_and_destroys_exactly_once() {
        let mut node = MockAudioNode::new();
        node.expect_connect_session().times(1).returning(|_, _| Ok(()));
        node.expect_set_volume().times(1).returning(|_, _| Ok(()));
        node.expect_play().times(1).returning(|_, _| Ok(()));
        node.expect_destroy_session().times(1).returning(|_| Ok(()));

        let mut gateway = MockChatGateway::new();
        gateway
            .expect_send_control()
            .times(1)
            .returning(|_, _| Ok(MessageId::new(77)));
        gateway
            .expect_delete_message()
            .withf(|channel, message| *channel == TEXT && *message == MessageId::new(77))
            .times(1)
            .returning(|_, _| Ok(()));

        let session = SessionPlayer::new(
            crate::audio::testing::GUILD,
            Arc::new(node),
            Arc::new(gateway),
            SessionSettings::default(),
        );
        session.connect(&caller(1), None).await.unwrap();
        session.enqueue(track("a")).await.unwrap();

        session.teardown().await;
        session.teardown().await;
    }

    #[tokio::test]
    async fn connect_applies_the_configured_volume() {
        let node = Arc::new(FakeNode::default());
        let gateway = Arc::new(FakeGateway::with_humans(2));
        let settings = SessionSettings {
            default_volume: 50,
            ..SessionSettings::default()
        };
        let session = SessionPlayer::new(crate::audio::testing::GUILD, node.clone(), gateway, settings);

        session.connect(&caller(1), None).await.unwrap();

        assert_eq!(node.calls(), vec![NodeCall::Connect(VOICE), NodeCall::Volume(50)]);
        assert_eq!(session.volume(), 50);
    }

    #[tokio::test]
    async fn rejected_track_moves_on_to_the_next_one() {
        let played = Arc::new(Mutex::new(Vec::<String>::new()));
        let mut node = MockAudioNode::new();
        node.expect_connect_session().returning(|_, _| Ok(()));
        node.expect_set_volume().returning(|_, _| Ok(()));
        {
            let played = played.clone();
            node.expect_play().times(3).returning(move |_, track| {
                if track.id == "b" {
                    return Err(NodeError::Rejected("formato no soportado".into()));
                }
                played.lock().push(track.id.clone());
                Ok(())
            });
        }
        node.expect_destroy_session().returning(|_| Ok(()));

        let session = SessionPlayer::new(
            crate::audio::testing::GUILD,
            Arc::new(node),
            Arc::new(FakeGateway::with_humans(2)),
            SessionSettings::default(),
        );
        session.connect(&caller(1), None).await.unwrap();
        for id in ["a", "b", "c"] {
            session.enqueue(track(id)).await.unwrap();
        }

        session.on_track_end().await;

        assert_eq!(*played.lock(), vec!["a", "c"]);
        assert_eq!(session.current_track().map(|t| t.id), Some("c".to_string()));
        assert_eq!(session.status(), PlaybackStatus::Playing);
        assert!(session.queue().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_track_falls_through_to_idle_timeout() {
        let (session, node, _) = connected(2).await;
        session.enqueue(track("a")).await.unwrap();
        session.enqueue(track("b")).await.unwrap();
        node.fail_from_now();

        session.on_track_end().await;

        assert!(session.queue().is_empty());
        assert!(session.is_torn_down());
        assert_eq!(session.current_track(), None);
    }

    #[tokio::test]
    async fn invocation_checks_channels() {
        let (session, _, _) = connected(3).await;

        let elsewhere = Caller {
            text_channel: ChannelId::new(31),
            ..caller(2)
        };
        assert_eq!(
            session.check_invocation(&elsewhere, false),
            Err(SessionError::IncorrectChannel { expected: TEXT })
        );

        let outside = Caller {
            voice_channel: None,
            ..caller(2)
        };
        assert_eq!(
            session.check_invocation(&outside, false),
            Err(SessionError::NotInVoiceChannel { channel: VOICE })
        );
        assert_eq!(session.check_invocation(&outside, true), Ok(()));

        let dj_outside = Caller {
            voice_channel: None,
            ..caller(1)
        };
        assert_eq!(session.check_invocation(&dj_outside, false), Ok(()));
    }

    #[tokio::test]
    async fn dj_leaving_hands_role_to_remaining_member() {
        let (session, _, gateway) = connected(2).await;

        gateway.remove_member(UserId::new(1));
        let outcome = session.on_member_left(UserId::new(1)).await;

        assert_eq!(outcome, Some(Outcome::DjChanged { dj: UserId::new(2) }));
        assert_eq!(session.dj(), Some(UserId::new(2)));
        assert!(!session.is_torn_down());
    }

    #[tokio::test]
    async fn dj_leaving_empty_channel_tears_down() {
        let (session, node, gateway) = connected(1).await;

        gateway.remove_member(UserId::new(1));
        let outcome = session.on_member_left(UserId::new(1)).await;

        assert_eq!(outcome, Some(Outcome::DjCleared));
        assert_eq!(session.dj(), None);
        assert!(session.is_torn_down());
        assert_eq!(node.count(&NodeCall::Destroy), 1);
    }

    #[tokio::test]
    async fn non_dj_leaving_changes_nothing() {
        let (session, _, _) = connected(3).await;
        assert_eq!(session.on_member_left(UserId::new(2)).await, None);
        assert_eq!(session.dj(), Some(UserId::new(1)));
    }

    #[tokio::test]
    async fn joiner_takes_dj_when_dj_is_absent() {
        let (session, _, gateway) = connected(2).await;
        gateway.remove_member(UserId::new(1));

        let bot = VoiceMember { id: BOT, is_bot: true };
        assert_eq!(session.on_member_joined(bot).await, None);

        let joiner = VoiceMember {
            id: UserId::new(5),
            is_bot: false,
        };
        assert_eq!(
            session.on_member_joined(joiner).await,
            Some(Outcome::DjChanged { dj: UserId::new(5) })
        );
    }

    #[tokio::test]
    async fn joiner_does_not_replace_present_dj() {
        let (session, _, _) = connected(2).await;
        let joiner = VoiceMember {
            id: UserId::new(5),
            is_bot: false,
        };
        assert_eq!(session.on_member_joined(joiner).await, None);
        assert_eq!(session.dj(), Some(UserId::new(1)));
    }

    #[tokio::test]
    async fn swap_dj_rules() {
        let (session, _, gateway) = connected(2).await;

        assert_eq!(
            session.swap_dj(&caller(2), None).await.unwrap(),
            Outcome::Refused(Refusal::NotPrivileged)
        );
        assert_eq!(
            session.swap_dj(&caller(1), Some(UserId::new(9))).await.unwrap(),
            Outcome::Refused(Refusal::SwapTargetNotInChannel(UserId::new(9)))
        );
        assert_eq!(
            session.swap_dj(&caller(1), Some(UserId::new(1))).await.unwrap(),
            Outcome::Refused(Refusal::SwapTargetAlreadyDj(UserId::new(1)))
        );
        assert_eq!(
            session.swap_dj(&caller(1), None).await.unwrap(),
            Outcome::DjChanged { dj: UserId::new(2) }
        );

        gateway.set_humans(1);
        assert_eq!(
            session.reassign_dj(None).await.unwrap(),
            Outcome::Refused(Refusal::NoOneToSwap)
        );
    }

    #[tokio::test]
    async fn volume_is_privileged_and_bounded() {
        let (session, node, _) = connected(2).await;

        assert_eq!(
            session.set_volume(&caller(2), 50).await.unwrap(),
            Outcome::Refused(Refusal::NotPrivileged)
        );
        assert_eq!(
            session.set_volume(&caller(1), 0).await.unwrap(),
            Outcome::Refused(Refusal::InvalidVolume(0))
        );
        assert_eq!(
            session.set_volume(&caller(1), 101).await.unwrap(),
            Outcome::Refused(Refusal::InvalidVolume(101))
        );
        assert_eq!(session.set_volume(&caller(1), 40).await.unwrap(), Outcome::VolumeSet(40));
        assert_eq!(session.volume(), 40);
        assert_eq!(node.count(&NodeCall::Volume(40)), 1);
    }

    #[tokio::test]
    async fn seek_needs_a_playing_track_inside_its_length() {
        let (session, node, _) = connected(2).await;
        assert_eq!(
            session.seek(Duration::from_secs(10)).await.unwrap(),
            Outcome::Refused(Refusal::NothingPlaying)
        );

        session.enqueue(track("a")).await.unwrap();
        assert!(matches!(
            session.seek(Duration::from_secs(600)).await.unwrap(),
            Outcome::Refused(Refusal::SeekOutOfRange { .. })
        ));
        assert_eq!(
            session.seek(Duration::from_secs(90)).await.unwrap(),
            Outcome::Seeked(Duration::from_secs(90))
        );
        assert_eq!(node.count(&NodeCall::Seek(Duration::from_secs(90))), 1);

        session.vote_pause(&caller(1)).await.unwrap();
        assert_eq!(
            session.seek(Duration::from_secs(10)).await.unwrap(),
            Outcome::Refused(Refusal::NothingPlaying)
        );
    }

    #[tokio::test]
    async fn remove_reports_invalid_index() {
        let (session, _, _) = connected(2).await;
        session.enqueue(track("now")).await.unwrap();
        session.enqueue(track("a")).await.unwrap();

        assert_eq!(
            session.remove(&caller(1), 3).await.unwrap(),
            Outcome::Refused(Refusal::InvalidIndex { index: 3, len: 1 })
        );
        assert_eq!(
            session.remove(&caller(1), 0).await.unwrap(),
            Outcome::Removed(track("a"))
        );
    }

    #[tokio::test]
    async fn filter_is_forwarded_and_remembered() {
        let (session, node, _) = connected(2).await;
        session.enqueue(track("a")).await.unwrap();
        let karaoke = FilterSpec::karaoke();

        let outcome = session.set_filter(&caller(1), karaoke.clone()).await.unwrap();

        assert_eq!(outcome, Outcome::FilterApplied("Karaoke".into()));
        assert_eq!(node.count(&NodeCall::Filter(karaoke)), 1);
    }

    #[tokio::test]
    async fn playlist_is_capped_and_advances_once() {
        let (session, node, _) = connected(2).await;
        let tracks = (0..5).map(|i| track(&i.to_string())).collect();

        let outcome = session
            .enqueue_result(SearchResult::Playlist { name: "mix".into(), tracks }, 3)
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::PlaylistEnqueued { name: "mix".into(), count: 3 });
        assert_eq!(node.plays(), vec!["0"]);
        assert_eq!(session.queue().len(), 2);
    }

    #[tokio::test]
    async fn node_disconnect_tears_down() {
        let (session, node, _) = connected(2).await;
        session.on_node_disconnect().await;
        assert!(session.is_torn_down());
        assert_eq!(node.count(&NodeCall::Destroy), 1);
    }
}
