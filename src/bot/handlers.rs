use anyhow::{anyhow, Result};
use regex::Regex;
use serenity::{
    builder::{CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse},
    model::{
        application::{CommandDataOption, CommandDataOptionValue, CommandInteraction, ComponentInteraction},
        guild::Member,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::{
    audio::{
        filters::{EqPreset, FilterSpec},
        outcome::{Outcome, Refusal},
        session::{Caller, SessionError, SessionPlayer},
    },
    bot::MusicBot,
    ui::{
        buttons::ControlAction,
        embeds::{self, QUEUE_PAGE_SIZE},
    },
};

/// Maneja comandos slash
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &MusicBot) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    let registry = bot.registry(ctx).await?;
    let caller = build_caller(
        ctx,
        guild_id,
        command.user.id,
        command.member.as_deref(),
        command.channel_id,
    );

    let name = command.data.name.as_str();
    let session = if opens_session(name) {
        Some(registry.get_or_create_session(guild_id))
    } else {
        registry.get(guild_id)
    };

    let Some(session) = session else {
        let embed = embeds::outcome_embed(&Refusal::NotConnected.into());
        return reply_ephemeral(ctx, &command, embed).await;
    };

    if let Err(e) = session.check_invocation(&caller, skips_voice_check(name)) {
        return reply_ephemeral(ctx, &command, embeds::session_error_embed(&e)).await;
    }

    // Defer la respuesta: casi todo pasa por el nodo de audio o por yt-dlp
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let embed = match run_command(&command, &session, &caller, bot).await {
        Ok(embed) => embed,
        Err(e) => {
            warn!("⚠️ Error en /{}: {:?}", command.data.name, e);
            embeds::create_error_embed("Error", &e.to_string())
        }
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;

    Ok(())
}

async fn run_command(
    command: &CommandInteraction,
    session: &SessionPlayer,
    caller: &Caller,
    bot: &MusicBot,
) -> Result<CreateEmbed> {
    let options = command.data.options.as_slice();

    let result = match command.data.name.as_str() {
        "connect" => {
            let target = option(options, "channel").and_then(CommandDataOptionValue::as_channel_id);
            session.connect(caller, target).await
        }
        "play" => {
            let query = option(options, "query")
                .and_then(CommandDataOptionValue::as_str)
                .ok_or_else(|| anyhow!("Query no proporcionado"))?;
            return handle_play(session, caller, query, bot).await;
        }
        "pause" => session.vote_pause(caller).await,
        "resume" => session.vote_resume(caller).await,
        "skip" => session.vote_skip(caller).await,
        "stop" => session.vote_stop(caller).await,
        "shuffle" => session.vote_shuffle(caller).await,
        "clear" => session.vote_clear(caller).await,
        "disconnect" => session.disconnect(caller).await,
        "queue" => {
            let page = option(options, "page")
                .and_then(CommandDataOptionValue::as_i64)
                .and_then(|p| usize::try_from(p).ok())
                .unwrap_or(1);
            let view = session.queue_page(page, QUEUE_PAGE_SIZE);
            return Ok(embeds::queue_embed(&view, session.current_track().as_ref()));
        }
        "nowplaying" => {
            if session.current_track().is_none() {
                Ok(Refusal::NothingPlaying.into())
            } else {
                session.refresh_control_message().await;
                Ok(Outcome::ControlRefreshed)
            }
        }
        "remove" => {
            let position = option(options, "position")
                .and_then(CommandDataOptionValue::as_i64)
                .ok_or_else(|| anyhow!("Posición no proporcionada"))?;
            match to_index(position) {
                Some(index) => session.remove(caller, index).await,
                None => Ok(Refusal::InvalidIndex {
                    index: 0,
                    len: session.queue().len(),
                }
                .into()),
            }
        }
        "loop" => {
            let enabled = option(options, "enabled")
                .and_then(CommandDataOptionValue::as_bool)
                .unwrap_or(true);
            session.set_loop(caller, enabled).await
        }
        "volume" => {
            let level = option(options, "level")
                .and_then(CommandDataOptionValue::as_i64)
                .ok_or_else(|| anyhow!("Volumen no proporcionado"))?;
            session.set_volume(caller, level).await
        }
        "seek" => {
            let text = option(options, "position")
                .and_then(CommandDataOptionValue::as_str)
                .ok_or_else(|| anyhow!("Posición no proporcionada"))?;
            session.seek(parse_position(text)?).await
        }
        "equalizer" => {
            let preset: EqPreset = option(options, "preset")
                .and_then(CommandDataOptionValue::as_str)
                .ok_or_else(|| anyhow!("Preset no proporcionado"))?
                .parse()?;
            session.set_filter(caller, FilterSpec::Equalizer(preset)).await
        }
        "filter" => {
            let filter = filter_from_options(options)?;
            session.set_filter(caller, filter).await
        }
        "swap_dj" => {
            let target = option(options, "member").and_then(CommandDataOptionValue::as_user_id);
            session.swap_dj(caller, target).await
        }
        other => return Err(anyhow!("Comando desconocido: {}", other)),
    };

    Ok(render(result))
}

async fn handle_play(session: &SessionPlayer, caller: &Caller, query: &str, bot: &MusicBot) -> Result<CreateEmbed> {
    // Conectar al canal de voz si no está conectado
    if session.voice_channel().is_none() {
        match session.connect(caller, None).await {
            Ok(outcome) if outcome.is_refusal() => return Ok(embeds::outcome_embed(&outcome)),
            Ok(_) => {}
            Err(e) => return Ok(embeds::session_error_embed(&e)),
        }
    }

    let result = match bot.resolver.resolve(query, caller.id).await {
        Ok(result) => result,
        Err(e) => {
            warn!("🔍 Sin resultados para '{}': {:?}", query, e);
            return Ok(embeds::create_error_embed(
                "Sin resultados",
                &format!("No se encontró nada para `{}`", query),
            ));
        }
    };

    Ok(render(
        session
            .enqueue_result(result, bot.config.max_playlist_size)
            .await,
    ))
}

/// Maneja los botones del panel de control
pub async fn handle_component(ctx: &Context, component: ComponentInteraction, bot: &MusicBot) -> Result<()> {
    let guild_id = component
        .guild_id
        .ok_or_else(|| anyhow!("Componente usado fuera de un servidor"))?;

    info!(
        "🔘 Botón {} presionado por {} en guild {}",
        component.data.custom_id, component.user.name, guild_id
    );

    component
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new().ephemeral(true)),
        )
        .await?;

    let registry = bot.registry(ctx).await?;
    let caller = build_caller(
        ctx,
        guild_id,
        component.user.id,
        component.member.as_ref(),
        component.channel_id,
    );

    let embed = match (
        ControlAction::from_custom_id(&component.data.custom_id),
        registry.get(guild_id),
    ) {
        (None, _) => embeds::create_error_embed("Error", "Acción no reconocida"),
        (Some(_), None) => embeds::outcome_embed(&Refusal::NotConnected.into()),
        (Some(action), Some(session)) => match session.check_invocation(&caller, false) {
            Err(e) => embeds::session_error_embed(&e),
            Ok(()) => run_control(action, &session, &caller).await,
        },
    };

    component
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;

    Ok(())
}

async fn run_control(action: ControlAction, session: &SessionPlayer, caller: &Caller) -> CreateEmbed {
    let result = match action {
        ControlAction::Pause => session.vote_pause(caller).await,
        ControlAction::Resume => session.vote_resume(caller).await,
        ControlAction::Skip => session.vote_skip(caller).await,
        ControlAction::Stop => session.vote_stop(caller).await,
        ControlAction::Shuffle => session.vote_shuffle(caller).await,
        ControlAction::ToggleLoop => session.set_loop(caller, !session.loop_enabled()).await,
        ControlAction::ShowQueue => {
            let view = session.queue_page(1, QUEUE_PAGE_SIZE);
            return embeds::queue_embed(&view, session.current_track().as_ref());
        }
    };

    render(result)
}

fn render(result: Result<Outcome, SessionError>) -> CreateEmbed {
    match result {
        Ok(outcome) => embeds::outcome_embed(&outcome),
        Err(e) => {
            error!("❌ Error de sesión: {}", e);
            embeds::session_error_embed(&e)
        }
    }
}

async fn reply_ephemeral(ctx: &Context, command: &CommandInteraction, embed: CreateEmbed) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embed)
                    .ephemeral(true),
            ),
        )
        .await?;

    Ok(())
}

// Funciones auxiliares

/// Resuelve quién invoca: permiso de expulsar miembros y canal de voz actual
fn build_caller(
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
    member: Option<&Member>,
    text_channel: ChannelId,
) -> Caller {
    let is_admin = member
        .and_then(|m| m.permissions)
        .is_some_and(|p| p.kick_members());

    let voice_channel = guild_id.to_guild_cached(&ctx.cache).and_then(|guild| {
        guild
            .voice_states
            .get(&user_id)
            .and_then(|voice_state| voice_state.channel_id)
    });

    Caller {
        id: user_id,
        is_admin,
        voice_channel,
        text_channel,
    }
}

/// Comandos que crean la sesión si todavía no existe
fn opens_session(command: &str) -> bool {
    matches!(command, "connect" | "play")
}

/// Sólo `connect` se acepta desde fuera del canal de voz de la sesión;
/// `play` sobre una sesión conectada exige estar en su canal
fn skips_voice_check(command: &str) -> bool {
    command == "connect"
}

fn option<'a>(options: &'a [CommandDataOption], name: &str) -> Option<&'a CommandDataOptionValue> {
    options.iter().find(|opt| opt.name == name).map(|opt| &opt.value)
}

fn filter_from_options(options: &[CommandDataOption]) -> Result<FilterSpec> {
    let sub = options
        .first()
        .ok_or_else(|| anyhow!("Filtro no proporcionado"))?;
    let CommandDataOptionValue::SubCommand(args) = &sub.value else {
        return Err(anyhow!("Filtro no proporcionado"));
    };

    build_filter(&sub.name, |name| {
        option(args, name).and_then(CommandDataOptionValue::as_f64)
    })
}

/// Arma el filtro a partir del subcomando y sus argumentos numéricos
fn build_filter(kind: &str, number: impl Fn(&str) -> Option<f64>) -> Result<FilterSpec> {
    let arg = |name: &str| {
        number(name)
            .map(|v| v as f32)
            .ok_or_else(|| anyhow!("Falta el parámetro '{}'", name))
    };

    let filter = match kind {
        "tremolo" => FilterSpec::tremolo(arg("frequency")?, arg("depth")?)?,
        "vibrato" => FilterSpec::vibrato(arg("frequency")?, arg("depth")?)?,
        "karaoke" => FilterSpec::karaoke(),
        "timescale" => FilterSpec::timescale(arg("speed")?, arg("pitch")?, arg("rate")?)?,
        "8d" => FilterSpec::rotation(arg("hertz")?)?,
        other => return Err(anyhow!("Filtro desconocido: {}", other)),
    };

    Ok(filter)
}

/// Posición de la cola en base 1 a índice en base 0
fn to_index(position: i64) -> Option<usize> {
    usize::try_from(position).ok()?.checked_sub(1)
}

/// Acepta `1:30`, `1m30s`, `2m` o segundos (`90`, `90s`)
fn parse_position(text: &str) -> Result<Duration> {
    let pattern = Regex::new(r"^(?:([0-9]{1,2})[:m](?:([0-9]{1,2})s?)?|([0-9]+)s?)$")?;
    let caps = pattern
        .captures(text.trim())
        .ok_or_else(|| anyhow!("Posición inválida, usa 1:30, 1m30s o 90"))?;

    if let Some(seconds) = caps.get(3) {
        return Ok(Duration::from_secs(seconds.as_str().parse()?));
    }

    let minutes: u64 = caps.get(1).map_or(Ok(0), |m| m.as_str().parse())?;
    let seconds: u64 = caps.get(2).map_or(Ok(0), |s| s.as_str().parse())?;
    if seconds >= 60 {
        return Err(anyhow!("Los segundos deben ser menores a 60"));
    }

    Ok(Duration::from_secs(minutes * 60 + seconds))
}
