//! retempo - change tempo, pitch, and playback rate of audio
//!
//! Processes files offline, records from the microphone, or plays a file
//! back with the transform applied.

mod cli;
mod play;
mod process;
mod record;

use tracing_subscriber::EnvFilter;

use retempo_library::Config;

use cli::Command;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let command = cli::parse(std::env::args().skip(1))?;

    // Load user config (default transform, last output folder)
    let mut config = Config::load();

    match command {
        Command::Process {
            input,
            output,
            resample,
            transform,
        } => process::run(&input, &output, resample, &transform, &mut config),
        Command::Record {
            output,
            seconds,
            transform,
        } => record::run(&output, seconds, &transform, &mut config),
        Command::Play { input, transform } => play::run(&input, &transform, &config),
        Command::Version => {
            println!(
                "retempo {} (engine id {})",
                retempo_audio::version_string(),
                retempo_audio::version_id()
            );
            Ok(())
        }
        Command::Help => {
            println!("{}", cli::USAGE);
            Ok(())
        }
    }
}
