//! Command-line parsing
//!
//! Options given on the command line win over the persisted config, which
//! wins over engine defaults.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use retempo_audio::{StreamProcessor, StretchSettings};
use retempo_library::Config;

pub const USAGE: &str = "\
usage:
  retempo process <input> <output.wav> [transform options] [--resample <hz>]
  retempo record  <output.wav> [--seconds <n>] [transform options]
  retempo play    <input> [transform options]
  retempo version

transform options:
  --tempo <ratio>         --pitch <ratio>          --rate <ratio>
  --tempo-change <pct>    --rate-change <pct>
  --pitch-octaves <d>     --pitch-semitones <d>
  --sequence-ms <ms>      --seek-window-ms <ms>    --overlap-ms <ms>
  --quick-seek            --no-anti-alias

Unset options fall back to the config file.";

/// Default recording length
const DEFAULT_RECORD_SECONDS: f64 = 10.0;

/// Transform settings requested on the command line
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TransformOptions {
    pub tempo: Option<f64>,
    pub pitch: Option<f64>,
    pub rate: Option<f64>,
    pub tempo_change: Option<f64>,
    pub rate_change: Option<f64>,
    pub pitch_octaves: Option<f64>,
    pub pitch_semitones: Option<f64>,
    pub sequence_ms: Option<u32>,
    pub seek_window_ms: Option<u32>,
    pub overlap_ms: Option<u32>,
    pub quick_seek: bool,
    pub no_anti_alias: bool,
}

impl TransformOptions {
    /// Apply config values, then these options, to `processor`
    pub fn configure(&self, config: &Config, processor: &mut StreamProcessor) -> anyhow::Result<()> {
        let rate = self.rate.or(config.rate);
        let tempo = self.tempo.or(config.tempo);
        let pitch = self.pitch.or(config.pitch);

        if let Some(rate) = rate {
            processor.set_rate(rate).context("--rate")?;
        }
        if let Some(tempo) = tempo {
            processor.set_tempo(tempo).context("--tempo")?;
        }
        if let Some(pitch) = pitch {
            processor.set_pitch(pitch).context("--pitch")?;
        }

        // Relative forms are applied last so they override a ratio
        if let Some(percent) = self.rate_change {
            processor.set_rate_change(percent).context("--rate-change")?;
        }
        if let Some(percent) = self.tempo_change {
            processor.set_tempo_change(percent).context("--tempo-change")?;
        }
        if let Some(octaves) = self.pitch_octaves {
            processor.set_pitch_octaves(octaves).context("--pitch-octaves")?;
        }
        if let Some(semitones) = self.pitch_semitones {
            processor
                .set_pitch_semitones(semitones)
                .context("--pitch-semitones")?;
        }

        processor
            .set_stretch_settings(self.stretch_settings(config))
            .context("time-stretch settings")?;
        processor.set_anti_alias(config.anti_alias.unwrap_or(true) && !self.no_anti_alias);
        Ok(())
    }

    fn stretch_settings(&self, config: &Config) -> StretchSettings {
        let base = config.stretch_settings();
        StretchSettings {
            sequence_ms: self.sequence_ms.or(base.sequence_ms),
            seek_window_ms: self.seek_window_ms.or(base.seek_window_ms),
            overlap_ms: self.overlap_ms.unwrap_or(base.overlap_ms),
            quick_seek: self.quick_seek || base.quick_seek,
        }
    }
}

/// A parsed invocation
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Process {
        input: PathBuf,
        output: PathBuf,
        resample: Option<u32>,
        transform: TransformOptions,
    },
    Record {
        output: PathBuf,
        seconds: f64,
        transform: TransformOptions,
    },
    Play {
        input: PathBuf,
        transform: TransformOptions,
    },
    Version,
    Help,
}

/// Parse arguments, excluding the program name
pub fn parse<I>(args: I) -> anyhow::Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let Some(subcommand) = args.next() else {
        return Ok(Command::Help);
    };

    let mut positional = Vec::new();
    let mut transform = TransformOptions::default();
    let mut resample = None;
    let mut seconds = None;

    while let Some(arg) = args.next() {
        let mut value = |name: &str| {
            args.next()
                .ok_or_else(|| anyhow!("missing value for {}", name))
        };

        match arg.as_str() {
            "--tempo" => transform.tempo = Some(number(&arg, value(&arg)?)?),
            "--pitch" => transform.pitch = Some(number(&arg, value(&arg)?)?),
            "--rate" => transform.rate = Some(number(&arg, value(&arg)?)?),
            "--tempo-change" => transform.tempo_change = Some(number(&arg, value(&arg)?)?),
            "--rate-change" => transform.rate_change = Some(number(&arg, value(&arg)?)?),
            "--pitch-octaves" => transform.pitch_octaves = Some(number(&arg, value(&arg)?)?),
            "--pitch-semitones" => transform.pitch_semitones = Some(number(&arg, value(&arg)?)?),
            "--sequence-ms" => transform.sequence_ms = Some(number(&arg, value(&arg)?)?),
            "--seek-window-ms" => transform.seek_window_ms = Some(number(&arg, value(&arg)?)?),
            "--overlap-ms" => transform.overlap_ms = Some(number(&arg, value(&arg)?)?),
            "--quick-seek" => transform.quick_seek = true,
            "--no-anti-alias" => transform.no_anti_alias = true,
            "--resample" => resample = Some(number(&arg, value(&arg)?)?),
            "--seconds" => seconds = Some(number(&arg, value(&arg)?)?),
            "-h" | "--help" => return Ok(Command::Help),
            flag if flag.starts_with("--") => bail!("unknown option {}", flag),
            _ => positional.push(PathBuf::from(&arg)),
        }
    }

    let command = match subcommand.as_str() {
        "process" => {
            let [input, output] = take_paths(positional, "process")?;
            Command::Process {
                input,
                output,
                resample,
                transform,
            }
        }
        "record" => {
            let [output] = take_paths(positional, "record")?;
            let seconds: f64 = seconds.unwrap_or(DEFAULT_RECORD_SECONDS);
            if !(seconds.is_finite() && seconds > 0.0) {
                bail!("--seconds must be positive");
            }
            Command::Record {
                output,
                seconds,
                transform,
            }
        }
        "play" => {
            let [input] = take_paths(positional, "play")?;
            Command::Play { input, transform }
        }
        "version" | "--version" | "-V" => Command::Version,
        "help" | "-h" | "--help" => Command::Help,
        other => bail!("unknown command {}", other),
    };

    Ok(command)
}

fn number<T>(name: &str, value: String) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("invalid value {:?} for {}", value, name))
}

fn take_paths<const N: usize>(paths: Vec<PathBuf>, command: &str) -> anyhow::Result<[PathBuf; N]> {
    let count = paths.len();
    paths
        .try_into()
        .map_err(|_| anyhow!("{} expects {} path argument(s), got {}", command, N, count))
}
