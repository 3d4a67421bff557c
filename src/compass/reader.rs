use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::Poll;
use std::thread;
use std::time::Duration;

use anyhow::anyhow;
use futures::Stream;
use tokio_util::sync::CancellationToken;

use crate::compass::CompassData;
use crate::config::Config;

#[cfg(feature = "real-sensors")]
use super::hmc5883l::Hmc5883l;
#[cfg(feature = "real-sensors")]
use crate::compass::{Compass, HeadingAxis};
#[cfg(feature = "real-sensors")]
use rppal::i2c::I2c;

#[cfg(all(feature = "fake-sensors", not(feature = "real-sensors")))]
use rand::Rng;

/// Lecture périodique de la boussole sur un thread dédié, exposée sous
/// forme de flux. Le thread est le seul propriétaire du bus.
pub struct Reader {
    data: Arc<Mutex<anyhow::Result<CompassData>>>,
    token: CancellationToken,
}

impl Reader {
    #[allow(unused_variables)]
    pub fn new(token: CancellationToken, config: Config) -> anyhow::Result<Self> {
        // Donnée du capteur
        let data: Arc<Mutex<anyhow::Result<CompassData>>> =
            Arc::new(Mutex::new(Err(anyhow!("NOINIT"))));
        let data_thread = data.clone();

        let thread_token = token.clone();

        let reader = Reader { data, token };
        #[cfg(feature = "real-sensors")]
        {
            dbg!("[MAG] Démarrage du thread ...\n");
            thread::spawn(move || {
                let i2c = match I2c::new() {
                    Ok(i2c) => i2c,
                    Err(e) => {
                        println!("[MAG] ERREUR: {}", e);
                        return;
                    }
                };

                let mut mag = match Hmc5883l::new(i2c) {
                    Ok(mag) => mag,
                    Err(e) => {
                        println!("[MAG] ERREUR: {}", e);
                        return;
                    }
                };

                if let Err(e) = mag.configure(&config) {
                    println!("[MAG] ERREUR: {}", e);
                    return;
                }

                // Un étalonnage amorcé converge dès la première étape
                let mut etalonne = false;
                while !thread_token.is_cancelled() {
                    let mut mesure = CompassData::default();
                    if let Err(e) = mag.read_raw(&mut mesure) {
                        *data_thread.lock().unwrap() = Err(anyhow!(e));
                        continue;
                    }

                    if !etalonne {
                        etalonne = mag.calibrate(&mesure);
                        if etalonne {
                            println!("[MAG] Etalonnage terminé.");
                        }
                    } else {
                        let model = mag.model();
                        model.scale_data(&mut mesure);
                        model.calculate_heading(&mut mesure, HeadingAxis::Z);
                    }

                    *data_thread.lock().unwrap() = Ok(mesure);

                    thread::sleep(Duration::from_millis(100));
                }

                dbg!("[MAG] Fin du thread.\n");
            });
        }

        // Variante factice, utilisée seulement sans capteur réel
        #[cfg(all(feature = "fake-sensors", not(feature = "real-sensors")))]
        {
            dbg!("[MAG] Démarrage du thread [FAKE] ...\n");
            thread::spawn(move || {
                let mut rng = rand::thread_rng();

                while !thread_token.is_cancelled() {
                    let x: i16 = rng.gen();
                    let y: i16 = rng.gen();
                    let z: i16 = rng.gen();
                    let h: f32 = rng.gen();

                    let mesure = CompassData {
                        raw_x: x as f32,
                        raw_y: y as f32,
                        raw_z: z as f32,
                        heading: h,
                        ..Default::default()
                    };
                    *data_thread.lock().unwrap() = Ok(mesure);

                    thread::sleep(Duration::from_millis(100));
                }

                dbg!("[MAG] Fin du thread [FAKE].\n");
            });
        }

        Ok(reader)
    }
}

impl Stream for Reader {
    type Item = anyhow::Result<CompassData>;

    fn poll_next(
        self: Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        if self.token.is_cancelled() {
            return Poll::Ready(None);
        }

        let data = match self.data.lock().unwrap().as_ref().copied() {
            Ok(val) => Poll::Ready(Some(Ok(val))),
            Err(_e) => Poll::Ready(Some(Err(anyhow!("MAGERR")))),
        };

        data
    }
}
