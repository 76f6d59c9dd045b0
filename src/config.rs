use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Archivo de configuración opcional (se puede cambiar con `DJ_SESSION_CONFIG`)
const DEFAULT_CONFIG_FILE: &str = "dj-session.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: Option<u64>,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Sesión
    pub default_volume: u8,
    pub queue_timeout_secs: u64,
    pub vote_divisor: f64,
    pub control_history_limit: u8,

    // Fuentes
    pub max_playlist_size: usize,
    pub ytdlp_path: String,
}

impl Config {
    /// Defaults, luego `dj-session.toml` si existe, luego variables de entorno
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = std::env::var("DJ_SESSION_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let defaults = Config::default();

        let settings = config::Config::builder()
            .set_default("default_volume", i64::from(defaults.default_volume))?
            .set_default("queue_timeout_secs", defaults.queue_timeout_secs as i64)?
            .set_default("vote_divisor", defaults.vote_divisor)?
            .set_default("control_history_limit", i64::from(defaults.control_history_limit))?
            .set_default("max_playlist_size", defaults.max_playlist_size as i64)?
            .set_default("ytdlp_path", defaults.ytdlp_path)?
            .add_source(config::File::with_name(&path).required(false))
            .add_source(config::Environment::default().try_parsing(true))
            .build()
            .with_context(|| format!("No se pudo leer la configuración ({path})"))?;

        let config: Config = settings
            .try_deserialize()
            .context("Configuración inválida (¿falta DISCORD_TOKEN?)")?;

        config.validate()?;

        Ok(config)
    }

    /// Revisa los valores antes de arrancar.
    ///
    /// - El token es obligatorio
    /// - El volumen va de 1 a 100
    /// - Divisor de votos, plazos y límites deben ser positivos
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN es obligatorio");
        }

        if !(1..=100).contains(&self.default_volume) {
            anyhow::bail!("El volumen por defecto debe estar entre 1 y 100, recibido: {}", self.default_volume);
        }

        if self.queue_timeout_secs == 0 {
            anyhow::bail!("El plazo de espera de la cola debe ser mayor que 0");
        }

        if !(self.vote_divisor.is_finite() && self.vote_divisor > 0.0) {
            anyhow::bail!("El divisor de votos debe ser un número positivo, recibido: {}", self.vote_divisor);
        }

        if self.control_history_limit == 0 {
            anyhow::bail!("El historial del panel debe ser mayor que 0");
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("El tamaño máximo de playlist debe ser mayor que 0");
        }

        Ok(())
    }

    /// Ajustes que ve cada sesión; nunca el `Config` completo
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            queue_timeout: Duration::from_secs(self.queue_timeout_secs),
            vote_divisor: self.vote_divisor,
            control_history_limit: self.control_history_limit,
            default_volume: self.default_volume,
        }
    }

    /// Resumen para el log de arranque, sin el token
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Session: {}% vol, {}s queue timeout, divisor {}, history {}\n  \
            Sources: {} max playlist, yt-dlp at {}",
            self.application_id.map_or("auto".to_string(), |id| id.to_string()),
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            self.default_volume,
            self.queue_timeout_secs,
            self.vote_divisor,
            self.control_history_limit,
            self.max_playlist_size,
            self.ytdlp_path,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (sin defaults, debe venir del entorno)
            discord_token: String::new(),
            application_id: None,
            guild_id: None,

            default_volume: 100,
            queue_timeout_secs: 120,
            vote_divisor: 2.5,
            control_history_limit: 10,

            max_playlist_size: 100,
            ytdlp_path: "yt-dlp".to_string(),
        }
    }
}

/// Parámetros de la máquina de estados de cada sesión.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Espera máxima por un track antes de desconectarse
    pub queue_timeout: Duration,
    pub vote_divisor: f64,
    /// Mensajes recientes revisados al redibujar el panel
    pub control_history_limit: u8,
    pub default_volume: u8,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Config::default().session_settings()
    }
}
