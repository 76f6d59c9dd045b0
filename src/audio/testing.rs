//! Nodo y gateway de prueba que registran cada llamada.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use crate::{
    audio::{
        filters::FilterSpec,
        node::{AudioNode, NodeError},
        session::{Caller, ControlPanel, SessionPlayer},
        track::Track,
    },
    bot::gateway::{ChatGateway, GatewayError, VoiceMember},
    config::SessionSettings,
};

pub const GUILD: GuildId = GuildId::new(10);
pub const VOICE: ChannelId = ChannelId::new(20);
pub const TEXT: ChannelId = ChannelId::new(30);
pub const BOT: UserId = UserId::new(999);

#[derive(Debug, Clone, PartialEq)]
pub enum NodeCall {
    Connect(ChannelId),
    Play(String),
    Pause,
    Resume,
    Stop,
    Seek(Duration),
    Volume(u8),
    Filter(FilterSpec),
    Destroy,
}

#[derive(Default)]
pub struct FakeNode {
    calls: Mutex<Vec<NodeCall>>,
    failing: AtomicBool,
}

impl FakeNode {
    pub fn calls(&self) -> Vec<NodeCall> {
        self.calls.lock().clone()
    }

    pub fn plays(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                NodeCall::Play(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &NodeCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    pub fn fail_from_now(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    async fn record(&self, call: NodeCall) -> Result<(), NodeError> {
        // Punto de suspensión, como una llamada de red real
        tokio::task::yield_now().await;
        if self.failing.load(Ordering::SeqCst) {
            return Err(NodeError::Rejected("nodo caído".into()));
        }
        self.calls.lock().push(call);
        Ok(())
    }
}

#[async_trait]
impl AudioNode for FakeNode {
    async fn connect_session(&self, _guild_id: GuildId, channel_id: ChannelId) -> Result<(), NodeError> {
        self.record(NodeCall::Connect(channel_id)).await
    }

    async fn play(&self, _guild_id: GuildId, track: &Track) -> Result<(), NodeError> {
        self.record(NodeCall::Play(track.id.clone())).await
    }

    async fn pause(&self, _guild_id: GuildId) -> Result<(), NodeError> {
        self.record(NodeCall::Pause).await
    }

    async fn resume(&self, _guild_id: GuildId) -> Result<(), NodeError> {
        self.record(NodeCall::Resume).await
    }

    async fn stop(&self, _guild_id: GuildId) -> Result<(), NodeError> {
        self.record(NodeCall::Stop).await
    }

    async fn seek(&self, _guild_id: GuildId, position: Duration) -> Result<(), NodeError> {
        self.record(NodeCall::Seek(position)).await
    }

    async fn set_volume(&self, _guild_id: GuildId, percent: u8) -> Result<(), NodeError> {
        self.record(NodeCall::Volume(percent)).await
    }

    async fn set_filter(&self, _guild_id: GuildId, filter: &FilterSpec) -> Result<(), NodeError> {
        self.record(NodeCall::Filter(filter.clone())).await
    }

    async fn destroy_session(&self, _guild_id: GuildId) -> Result<(), NodeError> {
        self.record(NodeCall::Destroy).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Send(MessageId),
    Edit(MessageId),
    Delete(MessageId),
}

pub struct FakeGateway {
    members: Mutex<Vec<VoiceMember>>,
    /// Historial del canal de texto, el más reciente primero
    history: Mutex<Vec<MessageId>>,
    calls: Mutex<Vec<GatewayCall>>,
    next_id: AtomicU64,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            members: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1000),
        }
    }
}

impl FakeGateway {
    /// Canal con los humanos `1..=humans` y el bot
    pub fn with_humans(humans: u64) -> Self {
        let gateway = Self::default();
        gateway.set_humans(humans);
        gateway
    }

    pub fn set_humans(&self, humans: u64) {
        let mut members: Vec<VoiceMember> = (1..=humans)
            .map(|id| VoiceMember {
                id: UserId::new(id),
                is_bot: false,
            })
            .collect();
        members.push(VoiceMember { id: BOT, is_bot: true });
        *self.members.lock() = members;
    }

    pub fn remove_member(&self, id: UserId) {
        self.members.lock().retain(|m| m.id != id);
    }

    /// Simula mensajes de otros usuarios que entierran el panel
    pub fn bury_history(&self, messages: u64) {
        let mut history = self.history.lock();
        for _ in 0..messages {
            let id = MessageId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
            history.insert(0, id);
        }
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().clone()
    }

    pub fn sends(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, GatewayCall::Send(_))).count()
    }
}

#[async_trait]
impl ChatGateway for FakeGateway {
    async fn send_control(&self, _channel_id: ChannelId, _panel: &ControlPanel) -> Result<MessageId, GatewayError> {
        tokio::task::yield_now().await;
        let id = MessageId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.history.lock().insert(0, id);
        self.calls.lock().push(GatewayCall::Send(id));
        Ok(id)
    }

    async fn edit_control(
        &self,
        _channel_id: ChannelId,
        message_id: MessageId,
        _panel: &ControlPanel,
    ) -> Result<(), GatewayError> {
        self.calls.lock().push(GatewayCall::Edit(message_id));
        Ok(())
    }

    async fn delete_message(&self, _channel_id: ChannelId, message_id: MessageId) -> Result<(), GatewayError> {
        self.history.lock().retain(|m| *m != message_id);
        self.calls.lock().push(GatewayCall::Delete(message_id));
        Ok(())
    }

    async fn voice_members(&self, _guild_id: GuildId, _channel_id: ChannelId) -> Result<Vec<VoiceMember>, GatewayError> {
        Ok(self.members.lock().clone())
    }

    async fn recent_messages(&self, _channel_id: ChannelId, limit: u8) -> Result<Vec<MessageId>, GatewayError> {
        Ok(self.history.lock().iter().take(limit as usize).copied().collect())
    }
}

pub fn caller(id: u64) -> Caller {
    Caller {
        id: UserId::new(id),
        is_admin: false,
        voice_channel: Some(VOICE),
        text_channel: TEXT,
    }
}

pub fn admin(id: u64) -> Caller {
    Caller {
        is_admin: true,
        ..caller(id)
    }
}

pub fn track(id: &str) -> Track {
    track_for(id, 1)
}

pub fn track_for(id: &str, requester: u64) -> Track {
    Track::new(id, format!("Canción {id}"), format!("https://youtu.be/{id}"), UserId::new(requester))
        .with_duration(Duration::from_secs(180))
}

pub fn new_session(node: Arc<FakeNode>, gateway: Arc<FakeGateway>) -> Arc<SessionPlayer> {
    Arc::new(SessionPlayer::new(GUILD, node, gateway, SessionSettings::default()))
}

/// Sesión conectada por el usuario 1 (DJ) con `humans` personas en el canal
pub async fn connected(humans: u64) -> (Arc<SessionPlayer>, Arc<FakeNode>, Arc<FakeGateway>) {
    let node = Arc::new(FakeNode::default());
    let gateway = Arc::new(FakeGateway::with_humans(humans));
    let session = new_session(node.clone(), gateway.clone());
    let _ = session.connect(&caller(1), None).await;
    (session, node, gateway)
}
