use anyhow::{Context, Result};
use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use serenity::model::id::UserId;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info};
use url::Url;

use super::TrackResolver;
use crate::audio::track::{SearchResult, Track};

/// Información extraída de yt-dlp (`--dump-json`)
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: String,
    title: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    channel: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<Thumbnail>,
    webpage_url: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

/// Playlist completa (`--flat-playlist --dump-single-json`)
#[derive(Debug, Deserialize)]
struct YtDlpPlaylist {
    title: Option<String>,
    #[serde(default)]
    entries: Vec<YtDlpInfo>,
}

/// Resolución de consultas con yt-dlp.
pub struct YtDlpResolver {
    program: String,
    max_playlist: usize,
    // Limitar procesos concurrentes para evitar rate limiting
    rate_limiter: Semaphore,
}

impl YtDlpResolver {
    pub fn new(program: impl Into<String>, max_playlist: usize) -> Self {
        Self {
            program: program.into(),
            max_playlist,
            rate_limiter: Semaphore::new(3),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let _permit = self.rate_limiter.acquire().await?;

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .await
            .with_context(|| format!("Error al ejecutar {}", self.program))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp error: {}", error.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn single(&self, target: &str, requester: UserId) -> Result<SearchResult> {
        let stdout = self
            .run(&["--no-playlist", "--dump-json", "--skip-download", "--no-warnings", target])
            .await?;

        let track = stdout
            .lines()
            .find_map(|line| parse_entry(line, requester))
            .with_context(|| format!("Sin resultados para '{}'", target))?;

        Ok(SearchResult::Single(track))
    }

    async fn playlist(&self, url: &str, requester: UserId) -> Result<SearchResult> {
        info!("📋 Obteniendo playlist: {}", url);

        let limit = self.max_playlist.to_string();
        let stdout = self
            .run(&[
                "--flat-playlist",
                "--dump-single-json",
                "--playlist-end",
                &limit,
                "--no-warnings",
                url,
            ])
            .await?;

        parse_playlist(&stdout, requester)
    }

    /// Verifica si una URL es de YouTube
    pub fn is_youtube_url(query: &str) -> bool {
        Url::parse(query)
            .ok()
            .and_then(|url| url.host_str().map(str::to_owned))
            .is_some_and(|host| {
                host == "youtu.be" || host == "youtube.com" || host.ends_with(".youtube.com")
            })
    }

    /// URL de playlist (no un video dentro de una playlist)
    pub fn is_playlist_url(query: &str) -> bool {
        let Ok(url) = Url::parse(query) else {
            return false;
        };
        if !Self::is_youtube_url(query) {
            return false;
        }

        let has_list = url.query_pairs().any(|(k, _)| k == "list");
        let has_video = url.query_pairs().any(|(k, _)| k == "v");
        url.path() == "/playlist" || (has_list && !has_video)
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(&self, query: &str, requester: UserId) -> Result<SearchResult> {
        let query = query.trim();
        if query.is_empty() {
            anyhow::bail!("Consulta vacía");
        }

        if Self::is_playlist_url(query) {
            return self.playlist(query, requester).await;
        }

        if Url::parse(query).is_ok() {
            debug!("📊 Obteniendo info de: {}", query);
            return self.single(query, requester).await;
        }

        info!("🔍 Buscando en YouTube: {}", query);
        self.single(&format!("ytsearch1:{}", query), requester).await
    }
}

fn parse_entry(line: &str, requester: UserId) -> Option<Track> {
    serde_json::from_str::<YtDlpInfo>(line)
        .ok()
        .map(|info| info_to_track(info, requester))
}

fn parse_playlist(json: &str, requester: UserId) -> Result<SearchResult> {
    let playlist: YtDlpPlaylist = serde_json::from_str(json).context("Error al parsear playlist de yt-dlp")?;

    let tracks: Vec<Track> = playlist
        .entries
        .into_iter()
        .map(|info| info_to_track(info, requester))
        .collect();

    if tracks.is_empty() {
        anyhow::bail!("La playlist está vacía");
    }

    Ok(SearchResult::Playlist {
        name: playlist.title.unwrap_or_else(|| "Playlist".to_string()),
        tracks,
    })
}

fn info_to_track(info: YtDlpInfo, requester: UserId) -> Track {
    let uri = info
        .webpage_url
        .or(info.url)
        .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", info.id));
    let duration = info
        .duration
        .filter(|d| d.is_finite() && *d >= 0.0)
        .map(Duration::from_secs_f64)
        .unwrap_or_default();
    let thumbnail = info
        .thumbnail
        .or_else(|| info.thumbnails.into_iter().last().map(|t| t.url));
    let title = info.title.unwrap_or_else(|| "Sin título".to_string());

    let mut track = Track::new(info.id, title, uri, requester)
        .with_duration(duration)
        .with_thumbnail(thumbnail);
    if let Some(author) = info.uploader.or(info.channel) {
        track = track.with_author(author);
    }
    track
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_youtube_url_detection() {
        assert!(YtDlpResolver::is_youtube_url(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        ));
        assert!(YtDlpResolver::is_youtube_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(YtDlpResolver::is_youtube_url(
            "https://music.youtube.com/watch?v=test"
        ));
        assert!(!YtDlpResolver::is_youtube_url("https://example.com/video"));
        assert!(!YtDlpResolver::is_youtube_url("never gonna give you up"));
    }

    #[test]
    fn playlist_urls() {
        assert!(YtDlpResolver::is_playlist_url(
            "https://www.youtube.com/playlist?list=PL123"
        ));
        assert!(!YtDlpResolver::is_playlist_url(
            "https://www.youtube.com/watch?v=abc&list=PL123"
        ));
        assert!(!YtDlpResolver::is_playlist_url("https://youtu.be/abc"));
    }

    #[test]
    fn parses_single_entry() {
        let line = r#"{"id":"abc","title":"Canción","duration":212.5,"uploader":"Banda",
            "thumbnail":"https://i.ytimg.com/abc.jpg","webpage_url":"https://www.youtube.com/watch?v=abc"}"#
            .replace('\n', "");

        let track = parse_entry(&line, UserId::new(4)).unwrap();

        assert_eq!(track.id, "abc");
        assert_eq!(track.author, "Banda");
        assert_eq!(track.duration, Duration::from_secs_f64(212.5));
        assert_eq!(track.requester, UserId::new(4));
        assert_eq!(track.uri, "https://www.youtube.com/watch?v=abc");
    }

    #[test]
    fn parses_flat_playlist() {
        let json = r#"{"title":"Mix","entries":[
            {"id":"a","title":"Uno","url":"https://www.youtube.com/watch?v=a","duration":60,
             "channel":"Canal","thumbnails":[{"url":"small"},{"url":"big"}]},
            {"id":"b","title":null}
        ]}"#;

        let SearchResult::Playlist { name, tracks } = parse_playlist(json, UserId::new(1)).unwrap() else {
            panic!("se esperaba una playlist");
        };

        assert_eq!(name, "Mix");
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].author, "Canal");
        assert_eq!(tracks[0].thumbnail.as_deref(), Some("big"));
        assert_eq!(tracks[1].uri, "https://www.youtube.com/watch?v=b");
        assert!(tracks[1].is_stream());
    }

    #[test]
    fn empty_playlist_is_an_error() {
        assert!(parse_playlist(r#"{"title":"Nada","entries":[]}"#, UserId::new(1)).is_err());
    }
}
