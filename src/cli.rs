use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "spectro", about = "Terminal audio spectrum visualizer")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG, AAC)
    pub input: PathBuf,

    /// Spectrum frames per second
    #[arg(long, default_value_t = 60)]
    pub frame_rate: u32,

    /// Frequency oversampling factor (1 = none)
    #[arg(long, default_value_t = 1)]
    pub zoom: usize,

    /// How frames are computed
    #[arg(long, value_enum, default_value_t = SourceModeArg::Buffered)]
    pub mode: SourceModeArg,

    /// Seconds of frames the buffered source keeps ahead of the clock
    #[arg(long, default_value_t = 3.0)]
    pub buffer_duration: f32,

    /// Analysis window length in samples (power of two); derived from the
    /// frame rate when omitted
    #[arg(long)]
    pub frame_length: Option<usize>,

    /// Playback volume, 0.0 to 1.0
    #[arg(long, default_value_t = 1.0)]
    pub volume: f32,

    /// Start playback this many seconds into the file
    #[arg(long)]
    pub start_at: Option<f32>,

    /// Width of the bar display in characters
    #[arg(long, default_value_t = 72)]
    pub columns: usize,

    /// Height of the bar display in rows
    #[arg(long, default_value_t = 16)]
    pub rows: usize,

    /// Config file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceModeArg {
    /// Precompute frames on a worker thread ahead of the playback clock
    Buffered,
    /// Compute each frame synchronously when the renderer asks for it
    Direct,
}
