#![allow(unused)]

// HMC5883L
// L'adresse datasheet ; sur le bus le composant répond à l'adresse + 1
pub const HMC5883L_MAG_ADDR: u16 = 0x1E;

pub const HMC5883L_CONF_A: u8 = 0x00;
pub const HMC5883L_CONF_B: u8 = 0x01;
pub const HMC5883L_MODE: u8 = 0x02;
pub const HMC5883L_X_H: u8 = 0x03;
pub const HMC5883L_X_L: u8 = 0x04;
pub const HMC5883L_Z_H: u8 = 0x05;
pub const HMC5883L_Z_L: u8 = 0x06;
pub const HMC5883L_Y_H: u8 = 0x07;
pub const HMC5883L_Y_L: u8 = 0x08;
pub const HMC5883L_STATUS: u8 = 0x09;
pub const HMC5883L_IDENT_A: u8 = 0x0A;
pub const HMC5883L_IDENT_B: u8 = 0x0B;
pub const HMC5883L_IDENT_C: u8 = 0x0C;

pub const HMC5883L_STATUS_RDY_BIT: u8 = 0;
pub const HMC5883L_STATUS_LOCK_BIT: u8 = 1;
