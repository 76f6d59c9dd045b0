//! Resultados estructurados de las operaciones de sesión.
//!
//! Las condiciones esperadas (sin permiso, nada sonando, índice inválido...)
//! se devuelven como `Outcome::Refused` en lugar de errores; la capa de
//! comandos sólo tiene que renderizarlas.

use serenity::model::id::{ChannelId, UserId};
use std::{fmt, time::Duration};

use crate::audio::{track::Track, votes::VoteAction};

/// Quién ejecutó una acción controlada por votos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    Dj,
    Admin,
    Requester,
    Vote,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Connected { channel: ChannelId },
    AlreadyConnected { channel: ChannelId },
    Enqueued { track: Track, position: usize },
    PlaylistEnqueued { name: String, count: usize },
    Executed { action: VoteAction, authority: Authority },
    VoteRecorded { action: VoteAction, votes: usize, required: usize },
    DjChanged { dj: UserId },
    DjCleared,
    LoopSet(bool),
    LoopUnchanged(bool),
    VolumeSet(u8),
    Seeked(Duration),
    FilterApplied(String),
    Removed(Track),
    ControlRefreshed,
    Disconnected,
    Refused(Refusal),
}

impl Outcome {
    pub fn is_refusal(&self) -> bool {
        matches!(self, Outcome::Refused(_))
    }
}

impl From<Refusal> for Outcome {
    fn from(refusal: Refusal) -> Self {
        Outcome::Refused(refusal)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Refusal {
    NotConnected,
    NothingPlaying,
    NotPrivileged,
    AlreadyPaused,
    NotPaused,
    AlreadyVoted(VoteAction),
    QueueTooShort { len: usize, min: usize },
    EmptyQueue,
    InvalidIndex { index: usize, len: usize },
    InvalidVolume(i64),
    SeekOutOfRange { position: Duration, length: Duration },
    SwapTargetNotInChannel(UserId),
    SwapTargetAlreadyDj(UserId),
    NoOneToSwap,
    /// Falla de un servicio externo; la sesión queda como estaba
    ServiceFailure(String),
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Authority::Dj => "el DJ",
            Authority::Admin => "un administrador",
            Authority::Requester => "quien pidió la canción",
            Authority::Vote => "votación",
        })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Connected { channel } => write!(f, "🔊 Conectado a <#{channel}>"),
            Outcome::AlreadyConnected { channel } => write!(f, "Ya estoy conectado en <#{channel}>"),
            Outcome::Enqueued { track, position } => {
                write!(f, "➕ **{}** agregada a la cola (posición {position})", track.title)
            }
            Outcome::PlaylistEnqueued { name, count } => {
                write!(f, "➕ Playlist **{name}** agregada con {count} canciones")
            }
            Outcome::Executed { action, authority } => match authority {
                Authority::Vote => write!(f, "✅ Votación para {action} aprobada"),
                other => write!(f, "✅ Acción {action} ejecutada por {other}"),
            },
            Outcome::VoteRecorded { action, votes, required } => write!(
                f,
                "🗳️ Voto para {action} registrado ({votes}/{required}, faltan {})",
                required.saturating_sub(*votes)
            ),
            Outcome::DjChanged { dj } => write!(f, "🎧 <@{dj}> es el nuevo DJ"),
            Outcome::DjCleared => f.write_str("🎧 No queda nadie para ser DJ"),
            Outcome::LoopSet(true) => f.write_str("🔂 Repetición activada"),
            Outcome::LoopSet(false) => f.write_str("➡️ Repetición desactivada"),
            Outcome::LoopUnchanged(true) => f.write_str("La repetición ya estaba activada"),
            Outcome::LoopUnchanged(false) => f.write_str("La repetición ya estaba desactivada"),
            Outcome::VolumeSet(v) => write!(f, "🔊 Volumen ajustado a {v}%"),
            Outcome::Seeked(pos) => write!(f, "⏩ Saltando a {}", crate::ui::embeds::format_duration(*pos)),
            Outcome::FilterApplied(name) => write!(f, "🎛️ Filtro aplicado: {name}"),
            Outcome::Removed(track) => write!(f, "❌ **{}** eliminada de la cola", track.title),
            Outcome::ControlRefreshed => f.write_str("🎵 Panel actualizado"),
            Outcome::Disconnected => f.write_str("👋 Desconectado"),
            Outcome::Refused(refusal) => refusal.fmt(f),
        }
    }
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Refusal::NotConnected => f.write_str("❌ No estoy conectado a un canal de voz"),
            Refusal::NothingPlaying => f.write_str("❌ No hay nada reproduciéndose"),
            Refusal::NotPrivileged => f.write_str("❌ Sólo el DJ o un administrador puede hacer eso"),
            Refusal::AlreadyPaused => f.write_str("⏸️ La reproducción ya está pausada"),
            Refusal::NotPaused => f.write_str("▶️ La reproducción no está pausada"),
            Refusal::AlreadyVoted(action) => write!(f, "Ya votaste para {action}"),
            Refusal::QueueTooShort { len, min } => write!(
                f,
                "❌ Se necesitan al menos {min} canciones en la cola para mezclar (hay {len})"
            ),
            Refusal::EmptyQueue => f.write_str("📭 La cola está vacía"),
            // El índice es base 0; al usuario se le muestra base 1
            Refusal::InvalidIndex { index, len } => write!(
                f,
                "❌ Posición {} inválida, la cola tiene {len} canciones",
                index + 1
            ),
            Refusal::InvalidVolume(v) => write!(f, "❌ El volumen debe estar entre 1 y 100 (recibido {v})"),
            Refusal::SeekOutOfRange { position, length } => write!(
                f,
                "❌ No se puede saltar a {}: la canción dura {}",
                crate::ui::embeds::format_duration(*position),
                crate::ui::embeds::format_duration(*length)
            ),
            Refusal::SwapTargetNotInChannel(user) => {
                write!(f, "❌ <@{user}> no está en el canal de voz")
            }
            Refusal::SwapTargetAlreadyDj(user) => write!(f, "❌ <@{user}> ya es el DJ"),
            Refusal::NoOneToSwap => f.write_str("❌ No hay nadie a quien pasarle el DJ"),
            Refusal::ServiceFailure(reason) => {
                write!(f, "⚠️ Algo salió mal, inténtalo de nuevo ({reason})")
            }
        }
    }
}
