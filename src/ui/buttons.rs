use serenity::{
    all::ButtonStyle,
    builder::{CreateActionRow, CreateButton},
};

use crate::audio::session::{ControlPanel, PlaybackStatus};

/// IDs personalizados para los botones
pub mod button_ids {
    pub const PAUSE: &str = "music_pause";
    pub const RESUME: &str = "music_resume";
    pub const SKIP: &str = "music_skip";
    pub const STOP: &str = "music_stop";
    pub const SHUFFLE: &str = "music_shuffle";
    pub const LOOP_TRACK: &str = "music_loop";
    pub const QUEUE: &str = "music_queue";
}

/// Lo que pide un botón del panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Pause,
    Resume,
    Skip,
    Stop,
    Shuffle,
    ToggleLoop,
    ShowQueue,
}

impl ControlAction {
    pub fn from_custom_id(id: &str) -> Option<Self> {
        match id {
            button_ids::PAUSE => Some(Self::Pause),
            button_ids::RESUME => Some(Self::Resume),
            button_ids::SKIP => Some(Self::Skip),
            button_ids::STOP => Some(Self::Stop),
            button_ids::SHUFFLE => Some(Self::Shuffle),
            button_ids::LOOP_TRACK => Some(Self::ToggleLoop),
            button_ids::QUEUE => Some(Self::ShowQueue),
            _ => None,
        }
    }
}

/// Botones del panel de control
pub struct MusicControls {
    paused: bool,
    looping: bool,
    can_shuffle: bool,
}

impl MusicControls {
    pub fn for_panel(panel: &ControlPanel) -> Self {
        Self {
            paused: panel.status == PlaybackStatus::Paused,
            looping: panel.loop_enabled,
            can_shuffle: panel.queue_len >= crate::audio::session::MIN_SHUFFLE_LEN,
        }
    }

    pub fn rows(&self) -> Vec<CreateActionRow> {
        // Pausa y reanudar comparten lugar según el estado
        let play_pause_btn = if self.paused {
            CreateButton::new(button_ids::RESUME)
                .emoji('▶')
                .style(ButtonStyle::Success)
        } else {
            CreateButton::new(button_ids::PAUSE)
                .emoji('⏸')
                .style(ButtonStyle::Primary)
        };

        let skip_btn = CreateButton::new(button_ids::SKIP)
            .emoji('⏭')
            .style(ButtonStyle::Secondary);

        let stop_btn = CreateButton::new(button_ids::STOP)
            .emoji('⏹')
            .style(ButtonStyle::Danger);

        let shuffle_btn = CreateButton::new(button_ids::SHUFFLE)
            .emoji('🔀')
            .style(ButtonStyle::Secondary)
            .disabled(!self.can_shuffle);

        let loop_btn = CreateButton::new(button_ids::LOOP_TRACK)
            .emoji('🔂')
            .style(if self.looping {
                ButtonStyle::Success
            } else {
                ButtonStyle::Secondary
            });

        let row1 = CreateActionRow::Buttons(vec![
            play_pause_btn,
            skip_btn,
            stop_btn,
            shuffle_btn,
            loop_btn,
        ]);

        let queue_btn = CreateButton::new(button_ids::QUEUE)
            .label("Cola")
            .emoji('📋')
            .style(ButtonStyle::Secondary);

        vec![row1, CreateActionRow::Buttons(vec![queue_btn])]
    }
}
