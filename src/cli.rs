use clap::Parser;

#[derive(Debug, Parser, Clone)]
pub struct Cli {
    /// Déclinaison magnétique locale, en degrés
    #[arg(long, default_value_t = 2.44)]
    pub declination: f32,

    /// Période de quiescence de l'étalonnage, en millisecondes
    #[arg(long, default_value_t = 1000)]
    pub periode: u64,
}
