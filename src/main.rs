mod args;
mod chunk;
mod error;
mod grid;
mod npy;
mod scp;
mod ssl;
mod stft;
mod wav;
mod wta;

use std::fs::File;
use std::io::{BufWriter, Write};

use clap::Parser;
use ndarray::{Array2, Array3};
use num_complex::Complex64;
use tracing::{debug, info, warn};

use args::{Args, MissingMask};
use chunk::{estimate_utterance, ChunkMode, DoaEstimate};
use error::{Result, SslError};
use grid::DirectionGrid;
use scp::ScriptTable;
use ssl::EPSILON;
use stft::{SpectralAnalyzer, StftConfig};
use wta::{align_mask, winner_take_all};

/// Everything shared by all utterances of a run: read-only after setup.
struct Pipeline {
    analyzer: SpectralAnalyzer,
    steer: Array3<Complex64>,
    grid: DirectionGrid,
    mode: ChunkMode,
    mask_tables: Vec<ScriptTable>,
    on_missing_mask: MissingMask,
    wta_floor: Option<f64>,
}

struct BatchReport {
    attempted: usize,
    succeeded: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    run(args)
}

fn run(args: Args) -> Result<()> {
    // Everything that can fail for the whole run fails here, before any
    // utterance is touched.
    let (min_doa, max_doa) = args::parse_doa_range(&args.doa_range)?;
    let mode = ChunkMode::resolve(args.chunk_len, args.look_back)?;
    let analyzer = SpectralAnalyzer::new(StftConfig {
        frame_len: args.frame_len,
        frame_hop: args.frame_hop,
        window: args.window,
        center: args.center,
        round_power_of_two: args.round_power_of_two,
    })?;

    if args.cpu > 0 {
        let available = std::thread::available_parallelism()
            .map(usize::from)
            .unwrap_or(1);
        if args.cpu > available {
            return Err(SslError::config(format!(
                "--cpu value ({}) exceeds the number of available cores ({available})",
                args.cpu
            )));
        }
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.cpu)
            .build_global()
            .map_err(|err| SslError::config(format!("worker pool setup failed: {err}")))?;
    }

    let steer = npy::load_steer_bank(&args.steer_vector)?;
    let (num_doa, sv_channels, sv_bins) = steer.dim();
    if sv_channels == 0 {
        return Err(SslError::config("steering bank carries no channels"));
    }
    if sv_bins != analyzer.num_bins() {
        return Err(SslError::config(format!(
            "steering bank carries {sv_bins} frequency bins but the analysis window produces {}",
            analyzer.num_bins()
        )));
    }
    let grid = DirectionGrid::new(num_doa, min_doa, max_doa, args.output)?;
    info!(
        num_doa,
        channels = sv_channels,
        bins = sv_bins,
        "steering bank loaded"
    );
    if let ChunkMode::Online {
        chunk_len,
        look_back,
    } = mode
    {
        info!(chunk_len, look_back, "online mode enabled");
    }

    let wav_table = ScriptTable::load(&args.wav_scp)?;
    if wav_table.is_empty() {
        warn!(scp = %args.wav_scp.display(), "wave script file lists no utterances");
    }
    let mask_tables = args::parse_mask_scps(&args.mask_scp)
        .iter()
        .map(|path| ScriptTable::load(path))
        .collect::<Result<Vec<_>>>()?;

    let pipeline = Pipeline {
        analyzer,
        steer,
        grid,
        mode,
        mask_tables,
        on_missing_mask: args.on_missing_mask,
        wta_floor: (args.winner_take_all >= 0.0).then_some(args.winner_take_all),
    };

    // The result sink is owned here: created before the batch, flushed and
    // closed after it, and only lent to the processing loop.
    let mut sink = BufWriter::new(File::create(&args.doa_out)?);
    let report = process_batch(&pipeline, &wav_table, &mut sink)?;
    sink.flush()?;

    info!(
        attempted = report.attempted,
        succeeded = report.succeeded,
        "batch finished"
    );
    Ok(())
}

fn process_batch(
    pipeline: &Pipeline,
    wav_table: &ScriptTable,
    sink: &mut impl Write,
) -> Result<BatchReport> {
    let mut report = BatchReport {
        attempted: 0,
        succeeded: 0,
    };
    for (key, path) in wav_table.iter() {
        report.attempted += 1;
        match pipeline.process_utterance(key, path) {
            Ok(estimate) => {
                info!(key, doa = %estimate, "utterance done");
                writeln!(sink, "{key}\t{estimate}")?;
                report.succeeded += 1;
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => warn!(key, error = %err, "utterance skipped"),
        }
    }
    Ok(report)
}

impl Pipeline {
    fn process_utterance(&self, key: &str, path: &std::path::Path) -> Result<DoaEstimate> {
        let (audio, sample_rate) = wav::load_wav(path)?;
        let stft = self.analyzer.process(audio.view())?;
        let (channels, frames, _) = stft.dim();
        debug!(key, channels, frames, sample_rate, "spectrogram ready");
        let mask = self.gather_mask(key, frames)?;
        estimate_utterance(
            stft.view(),
            self.steer.view(),
            mask.as_ref().map(|weights| weights.view()),
            self.mode,
            &self.grid,
            EPSILON,
        )
    }

    /// Join this utterance against every configured mask source, fuse when
    /// winner-take-all is enabled, and reconcile orientation against the
    /// spectrogram geometry.
    fn gather_mask(&self, key: &str, frames: usize) -> Result<Option<Array2<f64>>> {
        if self.mask_tables.is_empty() {
            return Ok(None);
        }
        let mut masks = Vec::with_capacity(self.mask_tables.len());
        for table in &self.mask_tables {
            let Some(path) = table.get(key) else {
                return Err(match self.on_missing_mask {
                    MissingMask::Fail => SslError::config(format!(
                        "utterance {key} is missing from a configured mask source"
                    )),
                    MissingMask::Skip => {
                        SslError::data("missing from a configured mask source")
                    }
                });
            };
            masks.push(npy::load_mask(path)?);
        }
        let masks = match self.wta_floor {
            Some(floor) if masks.len() > 1 => winner_take_all(&masks, floor)?,
            _ => masks,
        };
        let Some(primary) = masks.into_iter().next() else {
            return Ok(None);
        };
        let mask = align_mask(primary, self.analyzer.num_bins())?;
        if mask.nrows() != frames {
            return Err(SslError::data(format!(
                "mask covers {} frames, spectrogram has {frames}",
                mask.nrows()
            )));
        }
        Ok(Some(mask))
    }
}
