use clap::{CommandFactory, Parser};

/// Upper bound for `--gain`.
pub const MAX_GAIN: f32 = 4.0;

#[derive(Parser, Debug)]
#[command(name = "play", version, allow_negative_numbers = true)]
pub struct Args {
    /// Path or http(s) URL of the audio file
    #[arg(required_unless_present = "list_devices")]
    pub path: Option<String>,

    /// Volume: 1..=100 as a percentage, or a factor below 1 (e.g. 0.25)
    pub volume: Option<String>,

    /// Linear gain factor (0..=4); overrides the positional volume
    #[arg(long, short = 'g')]
    pub gain: Option<f32>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Use a specific output device by substring match
    #[arg(long, short = 'd')]
    pub device: Option<String>,

    /// Output sample rate in Hz (default: the file's own rate)
    #[arg(long, alias = "rate", value_parser = clap::value_parser!(u32).range(8_000..=768_000))]
    pub output_rate: Option<u32>,

    /// Audio buffered ahead of the device, in seconds
    #[arg(long, default_value_t = 0.5)]
    pub buffer_seconds: f32,

    /// Resampler input chunk size in frames (higher => more latency, lower => more overhead)
    #[arg(long, default_value_t = 1024)]
    pub chunk_frames: usize,
}

impl Args {
    /// Effective linear gain: `--gain` if given, else the positional volume.
    pub fn effective_gain(&self) -> f32 {
        match self.gain {
            Some(g) if g.is_finite() => g.clamp(0.0, MAX_GAIN),
            Some(_) => 1.0,
            None => gain_from_volume_arg(self.volume.as_deref()),
        }
    }
}

/// Separate flags clap does not know from the rest of the command line.
///
/// Unknown flags are reported by the caller and dropped so parsing carries on. Negative
/// numbers, values of known options and everything after `--` are left alone.
pub fn split_unknown_flags<I, T>(raw: I) -> (Vec<String>, Vec<String>)
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    let mut cmd = Args::command();
    cmd.build();

    let mut kept = Vec::new();
    let mut unknown = Vec::new();
    let mut positional_only = false;
    let mut value_pending = false;
    for (i, token) in raw.into_iter().map(Into::into).enumerate() {
        if i == 0 || positional_only || value_pending || !looks_like_flag(&token) {
            value_pending = false;
            kept.push(token);
            continue;
        }
        if token == "--" {
            positional_only = true;
            kept.push(token);
            continue;
        }
        match lookup_flag(&cmd, &token) {
            Some(arg) => {
                let attached = token.contains('=') || (!token.starts_with("--") && token.len() > 2);
                value_pending = arg.get_action().takes_values() && !attached;
                kept.push(token);
            }
            None => unknown.push(token),
        }
    }
    (kept, unknown)
}

fn looks_like_flag(token: &str) -> bool {
    token.len() > 1 && token.starts_with('-') && token.parse::<f64>().is_err()
}

fn lookup_flag<'a>(cmd: &'a clap::Command, token: &str) -> Option<&'a clap::Arg> {
    if let Some(long) = token.strip_prefix("--") {
        let name = long.split_once('=').map_or(long, |(name, _)| name);
        return cmd.get_arguments().find(|a| {
            a.get_long() == Some(name)
                || a.get_all_aliases().is_some_and(|aliases| aliases.contains(&name))
        });
    }
    let short = token.strip_prefix('-')?.chars().next()?;
    cmd.get_arguments().find(|a| a.get_short() == Some(short))
}

/// Map the positional volume argument to a linear gain.
///
/// `1..=100` is a percentage, `[0, 1)` a direct factor. Anything unparsable, negative or
/// non-finite plays at unity; values above 100 are capped at unity.
pub fn gain_from_volume_arg(arg: Option<&str>) -> f32 {
    let Some(value) = arg.and_then(|a| a.trim().parse::<f32>().ok()) else {
        return 1.0;
    };
    if !value.is_finite() || value < 0.0 {
        return 1.0;
    }
    if value < 1.0 {
        value
    } else if value <= 100.0 {
        value / 100.0
    } else {
        1.0
    }
}
