use std::thread::sleep;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail};
use serde::{Deserialize, Serialize};

use crate::compass::registry;
use crate::compass::{Compass, CompassData, CompassModel};
use crate::config::Config;
use crate::i2c::I2CBit;

/// Mode de mesure (registre MODE, bits 0-1)
#[derive(Serialize, Deserialize, Clone, Debug, Copy, PartialEq, Eq)]
pub enum Mode {
    Continuous = 0b00,
    Single = 0b01,
    Idle = 0b10,
}

impl Mode {
    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Décode les bits 0-1 du registre MODE. 0b11 est aussi un mode repos.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Mode::Continuous,
            0b01 => Mode::Single,
            _ => Mode::Idle,
        }
    }
}

/// Cadence de sortie des mesures (registre CONF_A, bits 2-4)
#[derive(Serialize, Deserialize, Clone, Debug, Copy, PartialEq, Eq)]
pub enum OutputRate {
    Hz0_75 = 0b000,
    Hz1_5 = 0b001,
    Hz3 = 0b010,
    Hz7_5 = 0b011,
    Hz15 = 0b100,
    Hz30 = 0b101,
    Hz75 = 0b110,
}

impl OutputRate {
    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Décode les bits 2-4 du registre CONF_A. 0b111 est réservé.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0b000 => Some(OutputRate::Hz0_75),
            0b001 => Some(OutputRate::Hz1_5),
            0b010 => Some(OutputRate::Hz3),
            0b011 => Some(OutputRate::Hz7_5),
            0b100 => Some(OutputRate::Hz15),
            0b101 => Some(OutputRate::Hz30),
            0b110 => Some(OutputRate::Hz75),
            _ => None,
        }
    }
}

/// Plage de champ magnétique mesurable (registre CONF_B, bits 5-7)
#[derive(Serialize, Deserialize, Clone, Debug, Copy, PartialEq, Eq)]
pub enum FieldRange {
    Ga0_88 = 0b000,
    Ga1_3 = 0b001,
    Ga1_9 = 0b010,
    Ga2_5 = 0b011,
    Ga4_0 = 0b100,
    Ga4_7 = 0b101,
    Ga5_6 = 0b110,
    Ga8_1 = 0b111,
}

impl FieldRange {
    pub fn bits(self) -> u8 {
        self as u8
    }

    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0b000 => FieldRange::Ga0_88,
            0b001 => FieldRange::Ga1_3,
            0b010 => FieldRange::Ga1_9,
            0b011 => FieldRange::Ga2_5,
            0b100 => FieldRange::Ga4_0,
            0b101 => FieldRange::Ga4_7,
            0b110 => FieldRange::Ga5_6,
            _ => FieldRange::Ga8_1,
        }
    }
}

/// Nombre d'échantillons moyennés par mesure (registre CONF_A, bits 5-6)
#[derive(Serialize, Deserialize, Clone, Debug, Copy, PartialEq, Eq)]
pub enum Samples {
    S1 = 0b00,
    S2 = 0b01,
    S4 = 0b10,
    S8 = 0b11,
}

impl Samples {
    pub fn bits(self) -> u8 {
        self as u8
    }

    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Samples::S1,
            0b01 => Samples::S2,
            0b10 => Samples::S4,
            _ => Samples::S8,
        }
    }
}

/// Boussole HMC5883L : traduit les intentions de configuration en
/// manipulation de bits sur les registres du composant et fournit la
/// lecture brute des trois axes au modèle.
pub struct Hmc5883l<B: I2CBit> {
    pub(crate) bus: B,
    address: u16,
    model: CompassModel,
}

impl<B: I2CBit> Hmc5883l<B> {
    /// Constructeur
    pub fn new(bus: B) -> anyhow::Result<Self> {
        let mut mag = Self {
            bus,
            // Particularité du composant : l'adresse effective sur le bus
            // vaut l'adresse datasheet + 1
            address: registry::HMC5883L_MAG_ADDR + 1,
            model: CompassModel::new(),
        };

        mag.set_slave()?;
        Ok(mag)
    }

    /// Adresse 7 bits effectivement utilisée sur le bus
    pub fn address(&self) -> u16 {
        self.address
    }

    fn set_slave(&mut self) -> anyhow::Result<()> {
        self.bus.set_slave(self.address)
    }

    /// Défini le mode de mesure (bits 0-1 du registre MODE)
    pub fn set_mode(&mut self, mode: Mode) -> anyhow::Result<()> {
        let mut value = self.bus.lecture_word(registry::HMC5883L_MODE)?;
        value &= 0b1111_1100;
        value |= mode.bits();
        self.bus.ecriture_word(registry::HMC5883L_MODE, value)
    }

    pub fn get_mode(&mut self) -> anyhow::Result<Mode> {
        let value = self.bus.lecture_word(registry::HMC5883L_MODE)?;
        Ok(Mode::from_bits(value & 0b0000_0011))
    }

    /// Défini la plage de champ (bits 5-7 du registre CONF_B).
    /// Attention : écrase l'octet entier, les bits restants du registre ne
    /// sont pas préservés.
    pub fn set_field_range(&mut self, range: FieldRange) -> anyhow::Result<()> {
        self.bus
            .ecriture_word(registry::HMC5883L_CONF_B, range.bits() << 5)
    }

    /// Lis la plage de champ. Le masque ne couvre que les bits 5-6 : les
    /// plages hautes sont repliées sur les quatre premières.
    pub fn get_field_range(&mut self) -> anyhow::Result<FieldRange> {
        let value = self.bus.lecture_word(registry::HMC5883L_CONF_B)?;
        Ok(FieldRange::from_bits((value >> 5) & 0b0000_0011))
    }

    /// Défini la cadence de sortie (bits 2-4 du registre CONF_A)
    pub fn set_output_rate(&mut self, rate: OutputRate) -> anyhow::Result<()> {
        let mut value = self.bus.lecture_word(registry::HMC5883L_CONF_A)?;
        value &= 0b1110_0011;
        value |= rate.bits() << 2;
        self.bus.ecriture_word(registry::HMC5883L_CONF_A, value)
    }

    pub fn get_output_rate(&mut self) -> anyhow::Result<OutputRate> {
        let value = self.bus.lecture_word(registry::HMC5883L_CONF_A)?;
        OutputRate::from_bits((value & 0b0001_1100) >> 2)
            .ok_or_else(|| anyhow!("cadence de sortie réservée (0b111)"))
    }

    /// Défini le nombre d'échantillons moyennés (bits 5-6 du registre CONF_A)
    pub fn set_averaged_samples(&mut self, samples: Samples) -> anyhow::Result<()> {
        let mut value = self.bus.lecture_word(registry::HMC5883L_CONF_A)?;
        value &= 0b1001_1111;
        value |= samples.bits() << 5;
        self.bus.ecriture_word(registry::HMC5883L_CONF_A, value)
    }

    pub fn get_averaged_samples(&mut self) -> anyhow::Result<Samples> {
        let value = self.bus.lecture_word(registry::HMC5883L_CONF_A)?;
        Ok(Samples::from_bits((value >> 5) & 0b0000_0011))
    }

    /// Récupére les trois registres d'identification (attendu : "H43")
    pub fn get_identification(&mut self) -> anyhow::Result<[u8; 3]> {
        Ok([
            self.bus.lecture_word(registry::HMC5883L_IDENT_A)?,
            self.bus.lecture_word(registry::HMC5883L_IDENT_B)?,
            self.bus.lecture_word(registry::HMC5883L_IDENT_C)?,
        ])
    }

    /// Vérifie si une mesure est disponible (bit RDY du registre STATUS)
    pub fn is_data_ready(&mut self) -> anyhow::Result<bool> {
        self.bus.lecture_bit8(
            registry::HMC5883L_STATUS,
            registry::HMC5883L_STATUS_RDY_BIT,
        )
    }

    /// Attente bornée d'une mesure disponible. Retourne une erreur si le
    /// composant ne lève pas le bit RDY dans le délai imparti.
    pub fn wait_data_ready(&mut self, timeout: Duration) -> anyhow::Result<()> {
        let depart = Instant::now();

        while !self.is_data_ready()? {
            if depart.elapsed() > timeout {
                bail!("délai dépassé en attendant une mesure du HMC5883L");
            }
            sleep(Duration::from_micros(100));
        }

        Ok(())
    }

    /// Récupére les valeurs brutes des trois axes. L'ordre physique des
    /// registres de sortie est X, Z, Y, octet de poids fort en premier.
    pub fn get_data(&mut self, data: &mut CompassData) -> anyhow::Result<()> {
        data.raw_x = self.bus.lecture_dword(registry::HMC5883L_X_H, true)? as f32;
        data.raw_z = self.bus.lecture_dword(registry::HMC5883L_Z_H, true)? as f32;
        data.raw_y = self.bus.lecture_dword(registry::HMC5883L_Y_H, true)? as f32;
        Ok(())
    }

    /// Etape d'étalonnage, déléguée au modèle
    pub fn calibration(&mut self, data: &CompassData) -> bool {
        self.model.calibration(data)
    }
}

impl<B: I2CBit> Compass for Hmc5883l<B> {
    /// Initialise le module avec la configuration fournie
    fn configure(&mut self, config: &Config) -> anyhow::Result<()> {
        println!("[HMC5883L] Initialisation (CONF A) ...");
        self.set_averaged_samples(config.samples)?;
        self.set_output_rate(config.output_rate)?;

        println!("[HMC5883L] Initialisation (CONF B) ...");
        self.set_field_range(config.field_range)?;

        println!("[HMC5883L] Initialisation (MODE) ...");
        self.set_mode(config.mode)?;

        self.model.set_declination_angle(config.mag_decl);
        self.model.set_calibration_period(config.calibration_period);
        if let Some(seed) = &config.calibration {
            self.model.set_calibration(seed)?;
        }

        println!("[HMC5883L] Fin d'initialisation.");
        Ok(())
    }

    fn read_raw(&mut self, data: &mut CompassData) -> anyhow::Result<()> {
        // Défini mon capteur sur le bus I2C
        self.set_slave()?;
        self.get_data(data)
    }

    fn calibrate(&mut self, data: &CompassData) -> bool {
        self.calibration(data)
    }

    fn model(&self) -> &CompassModel {
        &self.model
    }

    fn model_mut(&mut self) -> &mut CompassModel {
        &mut self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i2c::mock::MockI2c;

    fn boussole() -> Hmc5883l<MockI2c> {
        Hmc5883l::new(MockI2c::new()).unwrap()
    }

    #[test]
    fn test_adresse_effective_datasheet_plus_un() {
        let mag = boussole();

        assert_eq!(mag.address(), registry::HMC5883L_MAG_ADDR + 1);
        assert_eq!(mag.bus.slave, 0x1F);
    }

    #[test]
    fn test_set_output_rate_preserve_les_autres_bits() {
        let mut mag = boussole();
        mag.set_averaged_samples(Samples::S8).unwrap();
        mag.set_mode(Mode::Single).unwrap();

        mag.set_output_rate(OutputRate::Hz75).unwrap();

        assert_eq!(mag.get_output_rate().unwrap(), OutputRate::Hz75);
        assert_eq!(mag.get_averaged_samples().unwrap(), Samples::S8);
        assert_eq!(mag.get_mode().unwrap(), Mode::Single);
        assert_eq!(
            mag.bus.regs[registry::HMC5883L_CONF_A as usize],
            0b0111_1000
        );
    }

    #[test]
    fn test_set_mode_preserve_les_bits_hauts() {
        let mut mag = boussole();
        mag.bus.regs[registry::HMC5883L_MODE as usize] = 0b1000_0010;

        mag.set_mode(Mode::Single).unwrap();

        assert_eq!(mag.bus.regs[registry::HMC5883L_MODE as usize], 0b1000_0001);
        assert_eq!(mag.get_mode().unwrap(), Mode::Single);
    }

    #[test]
    fn test_set_field_range_ecrase_le_registre() {
        let mut mag = boussole();
        mag.bus.regs[registry::HMC5883L_CONF_B as usize] = 0b0000_1111;

        mag.set_field_range(FieldRange::Ga1_3).unwrap();

        // Ecriture pleine : les bits bas préexistants sont perdus
        assert_eq!(
            mag.bus.regs[registry::HMC5883L_CONF_B as usize],
            0b0010_0000
        );
        assert_eq!(mag.get_field_range().unwrap(), FieldRange::Ga1_3);
    }

    #[test]
    fn test_get_field_range_masque_deux_bits() {
        let mut mag = boussole();
        mag.set_field_range(FieldRange::Ga4_7).unwrap();

        // Le registre porte bien 0b101 mais la relecture ne masque que
        // deux bits : 0b101 est replié sur 0b01
        assert_eq!(
            mag.bus.regs[registry::HMC5883L_CONF_B as usize],
            0b1010_0000
        );
        assert_eq!(mag.get_field_range().unwrap(), FieldRange::Ga1_3);
    }

    #[test]
    fn test_get_data_ordre_x_z_y_et_complement_a_deux() {
        let mut mag = boussole();
        // X = 500, Z = -500, Y = 1, octet de poids fort en premier
        mag.bus.regs[registry::HMC5883L_X_H as usize] = 0x01;
        mag.bus.regs[registry::HMC5883L_X_L as usize] = 0xF4;
        mag.bus.regs[registry::HMC5883L_Z_H as usize] = 0xFE;
        mag.bus.regs[registry::HMC5883L_Z_L as usize] = 0x0C;
        mag.bus.regs[registry::HMC5883L_Y_H as usize] = 0x00;
        mag.bus.regs[registry::HMC5883L_Y_L as usize] = 0x01;

        let mut data = CompassData::default();
        mag.read_raw(&mut data).unwrap();

        assert_eq!(data.raw_x, 500.0);
        assert_eq!(data.raw_z, -500.0);
        assert_eq!(data.raw_y, 1.0);
    }

    #[test]
    fn test_wait_data_ready() {
        let mut mag = boussole();

        // RDY bas : délai dépassé
        assert!(mag.wait_data_ready(Duration::from_millis(2)).is_err());

        // RDY haut : retour immédiat
        mag.bus.regs[registry::HMC5883L_STATUS as usize] = 0b0000_0001;
        assert!(mag.wait_data_ready(Duration::from_millis(2)).is_ok());
    }

    #[test]
    fn test_identification() {
        let mut mag = boussole();
        mag.bus.regs[registry::HMC5883L_IDENT_A as usize] = 0x48;
        mag.bus.regs[registry::HMC5883L_IDENT_B as usize] = 0x34;
        mag.bus.regs[registry::HMC5883L_IDENT_C as usize] = 0x33;

        assert_eq!(mag.get_identification().unwrap(), *b"H43");
    }

    #[test]
    fn test_configure_ecrit_les_registres() {
        let mut mag = boussole();
        let mut config = Config::new();
        config.samples = Samples::S4;
        config.output_rate = OutputRate::Hz30;
        config.field_range = FieldRange::Ga1_9;
        config.mode = Mode::Continuous;
        config.mag_decl = 0.5;

        mag.configure(&config).unwrap();

        assert_eq!(
            mag.bus.regs[registry::HMC5883L_CONF_A as usize],
            0b0101_0100
        );
        assert_eq!(
            mag.bus.regs[registry::HMC5883L_CONF_B as usize],
            0b0100_0000
        );
        assert_eq!(mag.bus.regs[registry::HMC5883L_MODE as usize], 0b0000_0000);
        assert_eq!(mag.model().get_calibration().declination, 0.5);
    }

    #[test]
    fn test_calibrate_delegue_au_modele() {
        let mut mag = boussole();
        let data = CompassData {
            raw_x: 42.0,
            raw_y: -7.0,
            raw_z: 3.0,
            ..Default::default()
        };

        // Premier extremum observé à l'instant : pas encore convergé
        assert!(!mag.calibrate(&data));

        let bornes = mag.model().get_calibration();
        assert_eq!(bornes.min.x, 42.0);
        assert_eq!(bornes.max.x, 42.0);
        assert_eq!(bornes.min.y, -7.0);
        assert_eq!(bornes.max.z, 3.0);
    }

    #[test]
    fn test_mode_from_bits_sature_sur_repos() {
        assert_eq!(Mode::from_bits(0b00), Mode::Continuous);
        assert_eq!(Mode::from_bits(0b01), Mode::Single);
        assert_eq!(Mode::from_bits(0b10), Mode::Idle);
        assert_eq!(Mode::from_bits(0b11), Mode::Idle);
    }

    #[test]
    fn test_output_rate_reservee() {
        assert!(OutputRate::from_bits(0b111).is_none());
        assert_eq!(OutputRate::from_bits(0b100), Some(OutputRate::Hz15));
    }
}
