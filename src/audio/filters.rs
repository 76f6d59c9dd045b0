use std::{fmt, str::FromStr};
use thiserror::Error;

/// Bandas del ecualizador del nodo de audio
pub const EQ_BANDS: usize = 15;

#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("{name} debe estar entre {min} y {max} (recibido {value})")]
    OutOfRange {
        name: &'static str,
        min: f32,
        max: f32,
        value: f32,
    },
    #[error("{name} debe ser mayor que 0 (recibido {value})")]
    NotPositive { name: &'static str, value: f32 },
    #[error("preset de ecualizador desconocido: {0}")]
    UnknownPreset(String),
}

/// Presets de ecualizador disponibles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqPreset {
    Flat,
    Boost,
    Metal,
    Piano,
}

impl EqPreset {
    pub const ALL: [EqPreset; 4] = [EqPreset::Flat, EqPreset::Boost, EqPreset::Metal, EqPreset::Piano];

    pub fn name(self) -> &'static str {
        match self {
            EqPreset::Flat => "flat",
            EqPreset::Boost => "boost",
            EqPreset::Metal => "metal",
            EqPreset::Piano => "piano",
        }
    }

    /// Ganancias por banda (-0.25 a 1.0, 0.0 es neutro)
    pub fn gains(self) -> [f32; EQ_BANDS] {
        match self {
            EqPreset::Flat => [0.0; EQ_BANDS],
            EqPreset::Boost => [
                -0.075, 0.125, 0.125, 0.1, 0.1, 0.05, 0.075, 0.0, 0.0, 0.0, 0.0, 0.0, 0.125, 0.15,
                0.05,
            ],
            EqPreset::Metal => [
                0.0, 0.1, 0.1, 0.15, 0.13, 0.1, 0.0, 0.125, 0.175, 0.175, 0.125, 0.125, 0.1, 0.075,
                0.0,
            ],
            EqPreset::Piano => [
                -0.25, -0.25, -0.125, 0.0, 0.25, 0.25, 0.0, -0.25, -0.25, 0.0, 0.0, 0.5, 0.25,
                -0.025, 0.0,
            ],
        }
    }
}

impl FromStr for EqPreset {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EqPreset::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| FilterError::UnknownPreset(s.to_string()))
    }
}

/// Filtro aplicable a la sesión a través del nodo de audio.
///
/// Los constructores validan rangos; una `FilterSpec` construida siempre es
/// aceptable para el nodo.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterSpec {
    Equalizer(EqPreset),
    Tremolo { frequency: f32, depth: f32 },
    Vibrato { frequency: f32, depth: f32 },
    Karaoke {
        level: f32,
        mono_level: f32,
        filter_band: f32,
        filter_width: f32,
    },
    Timescale { speed: f32, pitch: f32, rate: f32 },
    Rotation { hertz: f32 },
}

impl FilterSpec {
    pub fn tremolo(frequency: f32, depth: f32) -> Result<Self, FilterError> {
        if frequency <= 0.0 {
            return Err(FilterError::NotPositive {
                name: "frequency",
                value: frequency,
            });
        }
        check_range("depth", depth, 0.0, 1.0)?;
        Ok(FilterSpec::Tremolo { frequency, depth })
    }

    pub fn vibrato(frequency: f32, depth: f32) -> Result<Self, FilterError> {
        check_range("frequency", frequency, 0.0, 14.0)?;
        check_range("depth", depth, 0.0, 1.0)?;
        Ok(FilterSpec::Vibrato { frequency, depth })
    }

    pub fn karaoke() -> Self {
        FilterSpec::Karaoke {
            level: 1.0,
            mono_level: 1.0,
            filter_band: 220.0,
            filter_width: 100.0,
        }
    }

    pub fn timescale(speed: f32, pitch: f32, rate: f32) -> Result<Self, FilterError> {
        for (name, value) in [("speed", speed), ("pitch", pitch), ("rate", rate)] {
            if value <= 0.0 {
                return Err(FilterError::NotPositive { name, value });
            }
        }
        Ok(FilterSpec::Timescale { speed, pitch, rate })
    }

    /// Audio "8D"
    pub fn rotation(hertz: f32) -> Result<Self, FilterError> {
        if hertz <= 0.0 {
            return Err(FilterError::NotPositive {
                name: "rotation",
                value: hertz,
            });
        }
        Ok(FilterSpec::Rotation { hertz })
    }

    pub fn name(&self) -> &'static str {
        match self {
            FilterSpec::Equalizer(_) => "Ecualizador",
            FilterSpec::Tremolo { .. } => "Tremolo",
            FilterSpec::Vibrato { .. } => "Vibrato",
            FilterSpec::Karaoke { .. } => "Karaoke",
            FilterSpec::Timescale { .. } => "Timescale",
            FilterSpec::Rotation { .. } => "8D",
        }
    }
}

impl fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterSpec::Equalizer(preset) => write!(f, "Ecualizador ({})", preset.name()),
            FilterSpec::Tremolo { frequency, depth } | FilterSpec::Vibrato { frequency, depth } => {
                write!(f, "{} ({frequency} Hz, {depth})", self.name())
            }
            FilterSpec::Timescale { speed, pitch, rate } => {
                write!(f, "Timescale (x{speed}, tono {pitch}, ritmo {rate})")
            }
            FilterSpec::Rotation { hertz } => write!(f, "8D ({hertz} Hz)"),
            FilterSpec::Karaoke { .. } => f.write_str("Karaoke"),
        }
    }
}

fn check_range(name: &'static str, value: f32, min: f32, max: f32) -> Result<(), FilterError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(FilterError::OutOfRange {
            name,
            min,
            max,
            value,
        })
    }
}
