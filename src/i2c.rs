/// Accès registre sur un périphérique I2C adressé : écriture et lecture
/// d'octets simples, lecture de paires de registres et sondage de bits.
pub trait I2CBit {
    /// Sélectionne le périphérique adressé pour les transactions suivantes
    fn set_slave(&mut self, addr: u16) -> anyhow::Result<()>;

    /// Ecrit un octet (word) sur la position donnée d'un registre 8 bits
    fn ecriture_word(&mut self, command: u8, data: u8) -> anyhow::Result<()>;

    /// Lecture d'un octet (word) sur la position donnée d'un registre 8 bits
    fn lecture_word(&mut self, command: u8) -> anyhow::Result<u8>;

    /// Lecture de 2 octets consécutifs combinés en valeur signée 16 bits.
    /// `msb_first` indique si le premier octet lu forme les bits 8-15.
    fn lecture_dword(&mut self, command: u8, msb_first: bool) -> anyhow::Result<i16>;

    /// Lis un bit sur la position donnée d'un registre 8 bits
    fn lecture_bit8(&mut self, command: u8, bit: u8) -> anyhow::Result<bool>;
}

#[cfg(feature = "real-sensors")]
impl I2CBit for rppal::i2c::I2c {
    fn set_slave(&mut self, addr: u16) -> anyhow::Result<()> {
        self.set_slave_address(addr)?;
        Ok(())
    }

    fn ecriture_word(&mut self, command: u8, data: u8) -> anyhow::Result<()> {
        let buffer: &[u8] = &[data];
        self.block_write(command, buffer)?;
        Ok(())
    }

    fn lecture_word(&mut self, command: u8) -> anyhow::Result<u8> {
        let mut buffer = [0u8; 1];
        self.block_read(command, &mut buffer)?;
        Ok(buffer[0])
    }

    fn lecture_dword(&mut self, command: u8, msb_first: bool) -> anyhow::Result<i16> {
        let mut buffer = [0u8; 2];
        self.block_read(command, &mut buffer)?;

        let (vha, vla) = if msb_first {
            (buffer[0], buffer[1])
        } else {
            (buffer[1], buffer[0])
        };

        Ok(((vha as i16) << 8) | vla as i16)
    }

    fn lecture_bit8(&mut self, command: u8, bit: u8) -> anyhow::Result<bool> {
        let mut buffer = [0u8; 1];
        self.block_read(command, &mut buffer)?;

        Ok((buffer[0] & (1 << bit)) == (1 << bit))
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::I2CBit;

    /// Banc de registres en mémoire tenant lieu de bus pour les tests.
    pub(crate) struct MockI2c {
        pub(crate) regs: [u8; 16],
        pub(crate) slave: u16,
    }

    impl MockI2c {
        pub(crate) fn new() -> Self {
            MockI2c {
                regs: [0; 16],
                slave: 0,
            }
        }
    }

    impl I2CBit for MockI2c {
        fn set_slave(&mut self, addr: u16) -> anyhow::Result<()> {
            self.slave = addr;
            Ok(())
        }

        fn ecriture_word(&mut self, command: u8, data: u8) -> anyhow::Result<()> {
            self.regs[command as usize] = data;
            Ok(())
        }

        fn lecture_word(&mut self, command: u8) -> anyhow::Result<u8> {
            Ok(self.regs[command as usize])
        }

        fn lecture_dword(&mut self, command: u8, msb_first: bool) -> anyhow::Result<i16> {
            let (premier, second) = (self.regs[command as usize], self.regs[command as usize + 1]);

            let (vha, vla) = if msb_first {
                (premier, second)
            } else {
                (second, premier)
            };

            Ok(((vha as i16) << 8) | vla as i16)
        }

        fn lecture_bit8(&mut self, command: u8, bit: u8) -> anyhow::Result<bool> {
            Ok((self.regs[command as usize] & (1 << bit)) == (1 << bit))
        }
    }
}
