use chrono::{DateTime, Utc};
use serenity::model::id::UserId;
use std::time::Duration;

/// Pista reproducible, resuelta desde una búsqueda o URL.
///
/// Inmutable una vez construida; la igualdad se define sólo por `id`.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub author: String,
    pub uri: String,
    pub duration: Duration,
    pub thumbnail: Option<String>,
    pub requester: UserId,
    pub queued_at: DateTime<Utc>,
}

impl Track {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        uri: impl Into<String>,
        requester: UserId,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            author: String::from("Desconocido"),
            uri: uri.into(),
            duration: Duration::ZERO,
            thumbnail: None,
            requester,
            queued_at: Utc::now(),
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: Option<String>) -> Self {
        self.thumbnail = thumbnail;
        self
    }

    /// Streams en vivo llegan sin duración
    pub fn is_stream(&self) -> bool {
        self.duration.is_zero()
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Track {}

/// Resultado de resolver una consulta: una pista o una playlist completa.
#[derive(Debug, Clone)]
pub enum SearchResult {
    Single(Track),
    Playlist { name: String, tracks: Vec<Track> },
}

impl SearchResult {
    pub fn len(&self) -> usize {
        match self {
            SearchResult::Single(_) => 1,
            SearchResult::Playlist { tracks, .. } => tracks.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
