use serde::{Deserialize, Serialize};

use crate::compass::hmc5883l::{FieldRange, Mode, OutputRate, Samples};
use crate::compass::CalibrationSettings;

#[derive(Serialize, Deserialize, Clone)]
pub struct Config {
    /// Déclinaison magnétique locale, en radians
    pub mag_decl: f32,
    /// Période de quiescence de l'étalonnage, en millisecondes
    pub calibration_period: u64,
    pub mode: Mode,
    pub output_rate: OutputRate,
    pub field_range: FieldRange,
    pub samples: Samples,
    /// Etalonnage connu pour amorcer le modèle, le cas échéant
    pub calibration: Option<CalibrationSettings>,
}

impl Config {
    pub fn new() -> Self {
        let config = Config {
            mag_decl: 0.0426,
            calibration_period: 1000,
            mode: Mode::Continuous,
            output_rate: OutputRate::Hz15,
            field_range: FieldRange::Ga1_3,
            samples: Samples::S1,
            calibration: None,
        };

        config
    }
}
