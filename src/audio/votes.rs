use serenity::model::id::UserId;
use std::{collections::HashSet, fmt};

/// Acciones de control que un miembro sin privilegios sólo puede disparar votando.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteAction {
    Pause,
    Resume,
    Skip,
    Stop,
    Shuffle,
    Clear,
}

impl VoteAction {
    pub const ALL: [VoteAction; 6] = [
        VoteAction::Pause,
        VoteAction::Resume,
        VoteAction::Skip,
        VoteAction::Stop,
        VoteAction::Shuffle,
        VoteAction::Clear,
    ];

    pub fn label(self) -> &'static str {
        match self {
            VoteAction::Pause => "pausar",
            VoteAction::Resume => "reanudar",
            VoteAction::Skip => "saltar",
            VoteAction::Stop => "detener",
            VoteAction::Shuffle => "mezclar",
            VoteAction::Clear => "limpiar la cola",
        }
    }
}

impl fmt::Display for VoteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Con exactamente tres miembros, detener pide dos votos en lugar de uno.
/// Regla heredada y ajustada a mano; aplica sólo a `VoteAction::Stop`.
pub const STOP_WITH_THREE_MEMBERS: (usize, usize) = (3, 2);

/// Votos necesarios para `action` con `members` miembros (no bots) en el canal.
pub fn required_votes(action: VoteAction, members: usize, divisor: f64) -> usize {
    let (special_members, special_required) = STOP_WITH_THREE_MEMBERS;
    if action == VoteAction::Stop && members == special_members {
        return special_required;
    }

    (members.saturating_sub(1) as f64 / divisor).ceil() as usize
}

/// Votantes de una acción para el track actual.
#[derive(Debug, Default, Clone)]
pub struct VoteTally {
    voters: HashSet<UserId>,
}

impl VoteTally {
    /// Registra el voto; devuelve `true` sólo si este voto alcanzó el umbral.
    /// Un segundo voto del mismo miembro no cuenta y devuelve `false`.
    pub fn add_voter(&mut self, member: UserId, required: usize) -> bool {
        self.voters.insert(member) && self.voters.len() >= required
    }

    pub fn clear(&mut self) {
        self.voters.clear();
    }

    pub fn len(&self) -> usize {
        self.voters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voters.is_empty()
    }

    pub fn contains(&self, member: UserId) -> bool {
        self.voters.contains(&member)
    }
}

/// Los seis conteos de una sesión.
#[derive(Debug, Default, Clone)]
pub struct VoteBook {
    pause: VoteTally,
    resume: VoteTally,
    skip: VoteTally,
    stop: VoteTally,
    shuffle: VoteTally,
    clear: VoteTally,
}

impl VoteBook {
    pub fn tally(&self, action: VoteAction) -> &VoteTally {
        match action {
            VoteAction::Pause => &self.pause,
            VoteAction::Resume => &self.resume,
            VoteAction::Skip => &self.skip,
            VoteAction::Stop => &self.stop,
            VoteAction::Shuffle => &self.shuffle,
            VoteAction::Clear => &self.clear,
        }
    }

    pub fn tally_mut(&mut self, action: VoteAction) -> &mut VoteTally {
        match action {
            VoteAction::Pause => &mut self.pause,
            VoteAction::Resume => &mut self.resume,
            VoteAction::Skip => &mut self.skip,
            VoteAction::Stop => &mut self.stop,
            VoteAction::Shuffle => &mut self.shuffle,
            VoteAction::Clear => &mut self.clear,
        }
    }

    pub fn clear_all(&mut self) {
        for action in VoteAction::ALL {
            self.tally_mut(action).clear();
        }
    }

    pub fn is_empty(&self) -> bool {
        VoteAction::ALL.iter().all(|a| self.tally(*a).is_empty())
    }
}
