use std::f32::consts::PI;
use std::fmt;
use std::time::Instant;

use anyhow::bail;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::config::Config;

pub mod hmc5883l;
pub mod reader;
pub(crate) mod registry;

/// Valeur sentinelle des bornes d'étalonnage : le premier échantillon réel
/// remplace toujours le min et le max.
const BORNE_SENTINELLE: f32 = 100_000.0;

/// Période de quiescence par défaut (ms) avant de déclarer l'étalonnage terminé
const PERIODE_ETALONNAGE: u64 = 1000;

/// Structure de données issus du capteur magnétique 3 axes
#[derive(Serialize, Deserialize, Clone, Debug, Copy, Default)]
pub struct CompassData {
    pub raw_x: f32,
    pub raw_y: f32,
    pub raw_z: f32,
    pub scaled_x: f32,
    pub scaled_y: f32,
    pub scaled_z: f32,
    pub heading: f32,
}

impl fmt::Display for CompassData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Heading: {}", self.heading)
    }
}

/// Réglages d'étalonnage : bornes min/max observées par axe, déclinaison
/// magnétique (radians) et horodatage (ms) du dernier élargissement des bornes.
#[derive(Serialize, Deserialize, Clone, Debug, Copy)]
pub struct CalibrationSettings {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
    pub declination: f32,
    pub last_calibration: u64,
}

impl CalibrationSettings {
    pub fn new() -> Self {
        CalibrationSettings {
            min: Vector3::repeat(BORNE_SENTINELLE),
            max: Vector3::repeat(-BORNE_SENTINELLE),
            declination: 0.0,
            last_calibration: 0,
        }
    }
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Axe de référence pour le calcul du cap : les deux autres axes alimentent
/// atan2.
#[derive(Serialize, Deserialize, Clone, Debug, Copy, PartialEq, Eq)]
pub enum HeadingAxis {
    X,
    Y,
    Z,
}

/// Modèle boussole : détient l'état d'étalonnage et en est le seul mutateur,
/// met à l'échelle les valeurs brutes et calcule le cap.
pub struct CompassModel {
    settings: CalibrationSettings,
    calibration_period: u64,
    depart: Instant,
}

impl CompassModel {
    /// Constructeur
    pub fn new() -> Self {
        CompassModel {
            settings: CalibrationSettings::new(),
            calibration_period: PERIODE_ETALONNAGE,
            depart: Instant::now(),
        }
    }

    /// Défini la déclinaison magnétique locale, en radians
    pub fn set_declination_angle(&mut self, declination: f32) {
        self.settings.declination = declination;
    }

    /// Défini la période de quiescence de l'étalonnage, en millisecondes
    pub fn set_calibration_period(&mut self, period: u64) {
        self.calibration_period = period;
    }

    /// Amorce le modèle avec un étalonnage connu. Refuse des bornes
    /// inversées (min > max). L'horodatage est remis à zéro : la prochaine
    /// étape d'étalonnage déclarera la convergence atteinte.
    pub fn set_calibration(&mut self, settings: &CalibrationSettings) -> anyhow::Result<()> {
        for i in 0..3 {
            if settings.min[i] > settings.max[i] {
                bail!(
                    "bornes d'étalonnage invalides sur l'axe {} : min {} > max {}",
                    i,
                    settings.min[i],
                    settings.max[i]
                );
            }
        }

        self.settings = *settings;
        self.settings.last_calibration = 0;
        Ok(())
    }

    /// Copie des réglages d'étalonnage courants, à conserver par l'appelant
    /// pour une prochaine session
    pub fn get_calibration(&self) -> CalibrationSettings {
        self.settings
    }

    /// Remet les bornes d'étalonnage aux valeurs sentinelles
    pub fn reset_calibration(&mut self) {
        let declination = self.settings.declination;
        self.settings = CalibrationSettings::new();
        self.settings.declination = declination;
    }

    /// Etape d'étalonnage : élargit les bornes min/max de chaque axe avec
    /// l'échantillon fourni. Retourne true quand aucune borne n'a bougé
    /// depuis plus d'une période de quiescence.
    pub fn calibration(&mut self, data: &CompassData) -> bool {
        let now = self.millis();
        self.calibration_step(data, now)
    }

    fn calibration_step(&mut self, data: &CompassData, now: u64) -> bool {
        let raw = [data.raw_x, data.raw_y, data.raw_z];

        for (i, valeur) in raw.iter().enumerate() {
            if *valeur < self.settings.min[i] {
                self.settings.min[i] = *valeur;
                self.settings.last_calibration = now;
            }
            if *valeur > self.settings.max[i] {
                self.settings.max[i] = *valeur;
                self.settings.last_calibration = now;
            }
        }

        now.saturating_sub(self.settings.last_calibration) > self.calibration_period
    }

    /// Centre les valeurs brutes sur le point médian des bornes observées
    /// puis les normalise. Attention : le diviseur vaut (|max|+|min|)/2 et
    /// non la demi-plage (max-min)/2, les deux ne coïncident que pour des
    /// bornes symétriques. Etalonner au moins une fois avant d'appeler.
    pub fn scale_data(&self, data: &mut CompassData) {
        let s = &self.settings;

        data.scaled_x = data.raw_x - (s.max.x + s.min.x) / 2.0;
        data.scaled_y = data.raw_y - (s.max.y + s.min.y) / 2.0;
        data.scaled_z = data.raw_z - (s.max.z + s.min.z) / 2.0;

        data.scaled_x /= (s.max.x.abs() + s.min.x.abs()) / 2.0;
        data.scaled_y /= (s.max.y.abs() + s.min.y.abs()) / 2.0;
        data.scaled_z /= (s.max.z.abs() + s.min.z.abs()) / 2.0;
    }

    /// Calcule le cap à partir des deux axes complémentaires de l'axe de
    /// référence, ajoute la déclinaison puis ramène le résultat dans
    /// [0, 2π). La normalisation est en un seul passage : une déclinaison
    /// hors plage n'est pas complètement repliée.
    pub fn calculate_heading(&self, data: &mut CompassData, axis: HeadingAxis) {
        let (axis1, axis2) = match axis {
            HeadingAxis::X => (data.scaled_y, data.scaled_z),
            HeadingAxis::Y => (data.scaled_x, data.scaled_z),
            HeadingAxis::Z => (data.scaled_x, data.scaled_y),
        };

        let mut heading = axis2.atan2(axis1);
        heading += self.settings.declination;

        if heading < 0.0 {
            heading += 2.0 * PI;
        } else if heading >= 2.0 * PI {
            heading -= 2.0 * PI;
        }

        data.heading = heading;
    }

    /// Millisecondes écoulées depuis la création du modèle
    fn millis(&self) -> u64 {
        self.depart.elapsed().as_millis() as u64
    }
}

/// Capacités communes d'un capteur boussole : configuration, lecture brute
/// et étalonnage. Prendre en charge un nouveau composant se fait par une
/// nouvelle implémentation, pas par héritage.
pub trait Compass {
    /// Applique la configuration au composant et au modèle
    fn configure(&mut self, config: &Config) -> anyhow::Result<()>;

    /// Récupére les valeurs brutes des trois axes
    fn read_raw(&mut self, data: &mut CompassData) -> anyhow::Result<()>;

    /// Etape d'étalonnage, retourne true une fois la convergence atteinte
    fn calibrate(&mut self, data: &CompassData) -> bool;

    fn model(&self) -> &CompassModel;

    fn model_mut(&mut self) -> &mut CompassModel;

    /// Lecture complète : valeurs brutes, mise à l'échelle puis cap.
    /// A n'utiliser qu'une fois l'étalonnage terminé.
    fn update(&mut self, data: &mut CompassData, axis: HeadingAxis) -> anyhow::Result<()> {
        self.read_raw(data)?;
        self.model().scale_data(data);
        self.model().calculate_heading(data, axis);
        Ok(())
    }
}
