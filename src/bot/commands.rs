use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

use crate::audio::filters::EqPreset;

fn all_commands() -> Vec<CreateCommand> {
    vec![
        connect_command(),
        play_command(),
        pause_command(),
        resume_command(),
        skip_command(),
        stop_command(),
        disconnect_command(),
        queue_command(),
        nowplaying_command(),
        shuffle_command(),
        clear_command(),
        remove_command(),
        loop_command(),
        volume_command(),
        seek_command(),
        equalizer_command(),
        filter_command(),
        swap_dj_command(),
    ]
}

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

// Comandos de conexión

fn connect_command() -> CreateCommand {
    CreateCommand::new("connect")
        .description("Conecta el bot a tu canal de voz")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Channel,
                "channel",
                "Canal de voz (si no estás en uno)",
            )
            .channel_types(vec![serenity::all::ChannelType::Voice]),
        )
}

fn disconnect_command() -> CreateCommand {
    CreateCommand::new("disconnect").description("Desconecta el bot y cierra la sesión")
}

// Comandos de reproducción

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Reproduce una canción o playlist")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "query",
                "URL o término de búsqueda",
            )
            .required(true),
        )
}

// Comandos de control (por votación)

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pausa la reproducción actual")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Reanuda la reproducción pausada")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Salta a la siguiente canción")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Detiene la reproducción y cierra la sesión")
}

fn shuffle_command() -> CreateCommand {
    CreateCommand::new("shuffle").description("Mezcla la cola de reproducción")
}

fn clear_command() -> CreateCommand {
    CreateCommand::new("clear").description("Limpia la cola de reproducción")
}

// Comandos de cola

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue")
        .description("Muestra la cola de reproducción")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "page", "Número de página")
                .min_int_value(1),
        )
}

fn nowplaying_command() -> CreateCommand {
    CreateCommand::new("nowplaying").description("Vuelve a mostrar el panel de la canción actual")
}

fn remove_command() -> CreateCommand {
    CreateCommand::new("remove")
        .description("Elimina una canción de la cola")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "position", "Posición en la cola")
                .min_int_value(1)
                .required(true),
        )
}

// Comandos del DJ

fn loop_command() -> CreateCommand {
    CreateCommand::new("loop")
        .description("Activa o desactiva la repetición de la canción actual")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Boolean, "enabled", "Repetir la canción")
                .required(true),
        )
}

fn volume_command() -> CreateCommand {
    CreateCommand::new("volume")
        .description("Ajusta el volumen de reproducción")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "level", "Nivel de volumen (1-100)")
                .min_int_value(1)
                .max_int_value(100)
                .required(true),
        )
}

fn seek_command() -> CreateCommand {
    CreateCommand::new("seek")
        .description("Salta a una posición de la canción")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "position",
                "Posición (ej: 1:30, 1m30s o 90)",
            )
            .required(true),
        )
}

fn equalizer_command() -> CreateCommand {
    let mut preset = CreateCommandOption::new(CommandOptionType::String, "preset", "Preset de ecualizador")
        .required(true);
    for eq in EqPreset::ALL {
        preset = preset.add_string_choice(eq.name(), eq.name());
    }

    CreateCommand::new("equalizer")
        .description("Aplica un preset de ecualizador")
        .add_option(preset)
}

fn filter_command() -> CreateCommand {
    let number = |name: &str, description: &str| {
        CreateCommandOption::new(CommandOptionType::Number, name, description)
    };

    CreateCommand::new("filter")
        .description("Aplica un filtro de audio")
        .add_option(
            CreateCommandOption::new(CommandOptionType::SubCommand, "tremolo", "Oscilación de volumen")
                .add_sub_option(number("frequency", "Frecuencia (> 0)").required(true))
                .add_sub_option(number("depth", "Profundidad (0-1)").required(true)),
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::SubCommand, "vibrato", "Oscilación de tono")
                .add_sub_option(number("frequency", "Frecuencia (0-14)").required(true))
                .add_sub_option(number("depth", "Profundidad (0-1)").required(true)),
        )
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "karaoke",
            "Atenúa la voz principal",
        ))
        .add_option(
            CreateCommandOption::new(CommandOptionType::SubCommand, "timescale", "Velocidad y tono")
                .add_sub_option(number("speed", "Velocidad (> 0)").required(true))
                .add_sub_option(number("pitch", "Tono (> 0)").required(true))
                .add_sub_option(number("rate", "Tasa (> 0)").required(true)),
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::SubCommand, "8d", "Audio 8D")
                .add_sub_option(number("hertz", "Velocidad de rotación (> 0)").required(true)),
        )
}

fn swap_dj_command() -> CreateCommand {
    CreateCommand::new("swap_dj")
        .description("Pasa el rol de DJ a otro miembro")
        .add_option(CreateCommandOption::new(
            CommandOptionType::User,
            "member",
            "Nuevo DJ (si no se indica, el siguiente en el canal)",
        ))
}
