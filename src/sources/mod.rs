pub mod youtube;

use anyhow::Result;
use async_trait::async_trait;
use serenity::model::id::UserId;

use crate::audio::track::SearchResult;

pub use youtube::YtDlpResolver;

/// Convierte lo que escribe el usuario (URL, playlist o texto) en tracks
#[async_trait]
pub trait TrackResolver: Send + Sync {
    async fn resolve(&self, query: &str, requester: UserId) -> Result<SearchResult>;
}
