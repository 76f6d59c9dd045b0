use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, model::id::ApplicationId, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

mod audio;
mod bot;
mod config;
mod sources;
mod ui;

use crate::audio::{registry::SessionRegistry, songbird_node::SongbirdNode};
use crate::bot::{gateway::SerenityGateway, MusicBot};
use crate::config::Config;
use crate::sources::YtDlpResolver;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dj_session=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando DJ Session v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("⚙️ {}", config.summary());

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&config).await;
    }

    let config = Arc::new(config);

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES;

    let resolver = Arc::new(YtDlpResolver::new(
        config.ytdlp_path.clone(),
        config.max_playlist_size,
    ));
    let handler = MusicBot::new(config.clone(), resolver);

    // Construir cliente
    let songbird = Songbird::serenity();
    let mut builder = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird.clone());
    if let Some(application_id) = config.application_id {
        builder = builder.application_id(ApplicationId::new(application_id));
    }
    let mut client = builder.await?;

    // Nodo de audio y registro de sesiones
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let node = Arc::new(SongbirdNode::new(songbird, reqwest::Client::new(), events_tx));
    let gateway = Arc::new(SerenityGateway::new(client.http.clone(), client.cache.clone()));
    let registry = Arc::new(SessionRegistry::new(node, gateway, config.session_settings()));

    {
        let mut data = client.data.write().await;
        data.insert::<SessionRegistry>(registry.clone());
    }
    registry.clone().spawn_event_loop(events_rx);

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        registry.shutdown_all().await;
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check(config: &Config) -> Result<()> {
    // Verificar dependencias críticas
    let yt_dlp = async_process::Command::new(&config.ytdlp_path)
        .arg("--version")
        .output()
        .await?;

    if yt_dlp.status.success() {
        println!("OK");
        Ok(())
    } else {
        warn!("yt-dlp respondió con {}", yt_dlp.status);
        anyhow::bail!("Dependencias faltantes");
    }
}
