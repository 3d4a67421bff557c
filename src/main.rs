mod cli;

use std::time::Duration;

use boussole::compass::reader::Reader;
use boussole::config::Config;
use clap::Parser;
use futures::StreamExt;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let args = cli::Cli::parse();
    let token = CancellationToken::new();

    let mut config = Config::new();
    config.mag_decl = args.declination.to_radians();
    config.calibration_period = args.periode;

    // Boussole
    {
        let token = token.child_token();
        let mut reader = Reader::new(token.clone(), config).unwrap();
        tokio::spawn(async move {
            while !token.is_cancelled() {
                if let Some(data) = reader.next().await {
                    match data {
                        Ok(data) => {
                            println!("[MAG] {}", data);
                        }
                        Err(_e) => {
                            // dbg!("Capteur pas encore prêt.");
                        }
                    }
                }

                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        });
    }

    // Attente du signal d'arrêt
    let _ = signal::ctrl_c().await;
    token.cancel();
}
