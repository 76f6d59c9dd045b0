use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::audio::{
    outcome::{Outcome, Refusal},
    queue::QueuePage,
    session::{ControlPanel, PlaybackStatus, SessionError},
    track::Track,
};

/// Canciones por página en `/queue`
pub const QUEUE_PAGE_SIZE: usize = 8;

const STANDARD_FOOTER: &str = "🎵 DJ Session";

/// Colores estándar del bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Panel de control de la sesión (el mensaje que se edita en cada cambio)
pub fn control_panel(panel: &ControlPanel) -> CreateEmbed {
    let track = &panel.track;
    let (title, color) = match panel.status {
        PlaybackStatus::Playing => ("🎵 Reproduciendo ahora", colors::MUSIC_PURPLE),
        PlaybackStatus::Paused => ("⏸️ En pausa", colors::WARNING_ORANGE),
        PlaybackStatus::Idle => ("⏹️ Esperando", colors::NEUTRAL_GRAY),
    };

    let mut embed = CreateEmbed::default()
        .title(title)
        .description(format!("**[{}]({})**", track.title, track.uri))
        .color(color)
        .field("🎤 Artista", &track.author, true)
        .field("⏱️ Duración", duration_label(track), true)
        .field("👤 Solicitado por", format!("<@{}>", track.requester), true)
        .field(
            "🎧 DJ",
            panel
                .dj
                .map(|dj| format!("<@{}>", dj))
                .unwrap_or_else(|| "Nadie".to_string()),
            true,
        )
        .field("🔊 Volumen", format!("{}%", panel.volume), true)
        .field(
            "🔂 Repetir",
            if panel.loop_enabled { "Activado" } else { "Desactivado" },
            true,
        );

    if let Some(filter) = &panel.filter {
        embed = embed.field("🎛️ Filtro", filter, true);
    }

    let next = match &panel.up_next {
        Some(title) => format!("{} ({} en cola)", title, panel.queue_len),
        None => "Nada en cola".to_string(),
    };
    embed = embed.field("⏭️ Siguiente", next, false);

    if let Some(thumbnail) = &track.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Respuesta a un comando según su resultado
pub fn outcome_embed(outcome: &Outcome) -> CreateEmbed {
    let color = match outcome {
        Outcome::Refused(Refusal::ServiceFailure(_)) => colors::ERROR_RED,
        Outcome::Refused(Refusal::AlreadyVoted(_)) | Outcome::LoopUnchanged(_) => colors::INFO_BLUE,
        Outcome::Refused(_) => colors::WARNING_ORANGE,
        Outcome::VoteRecorded { .. } => colors::INFO_BLUE,
        Outcome::Enqueued { .. } | Outcome::PlaylistEnqueued { .. } => colors::MUSIC_PURPLE,
        Outcome::Disconnected | Outcome::DjCleared => colors::NEUTRAL_GRAY,
        _ => colors::SUCCESS_GREEN,
    };

    let mut embed = CreateEmbed::default()
        .description(outcome.to_string())
        .color(color);

    if let Outcome::Enqueued { track, .. } = outcome {
        embed = embed
            .field("⏱️ Duración", duration_label(track), true)
            .field("🎤 Artista", &track.author, true);
        if let Some(thumbnail) = &track.thumbnail {
            embed = embed.thumbnail(thumbnail);
        }
    }

    embed.timestamp(Timestamp::now())
}

/// Error de flujo de la sesión (canal equivocado, sin canal de voz...)
pub fn session_error_embed(error: &SessionError) -> CreateEmbed {
    create_error_embed("No se puede ejecutar", &capitalize(&error.to_string()))
}

/// Crea un embed de error
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Cola paginada, con la canción actual arriba
pub fn queue_embed(page: &QueuePage, current: Option<&Track>) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE);

    if let Some(current) = current {
        embed = embed.field(
            "▶️ Reproduciendo",
            format!("**{}** - {}", current.title, current.author),
            false,
        );
    }

    if page.total_items == 0 {
        return embed
            .description("😴 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    let mut description = String::new();
    for (i, item) in page.items.iter().enumerate() {
        description.push_str(&format!(
            "**{}**. {} - {} `[{}]`\n",
            page.offset + i + 1,
            item.title,
            item.author,
            duration_label(item)
        ));
    }
    embed = embed.field("Próximas canciones", description, false);

    let mut info = format!("**Total:** {} canciones", page.total_items);
    if page.total_duration > Duration::ZERO {
        info.push_str(&format!(
            " • **Duración:** {}",
            format_duration(page.total_duration)
        ));
    }
    embed = embed.field("Información", info, false);

    embed
        .footer(CreateEmbedFooter::new(format!(
            "Página {} de {} • DJ Session",
            page.current_page, page.total_pages
        )))
        .timestamp(Timestamp::now())
}

/// Formatea una duración en formato legible
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

fn duration_label(track: &Track) -> String {
    if track.is_stream() {
        "🔴 En vivo".to_string()
    } else {
        format_duration(track.duration)
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
