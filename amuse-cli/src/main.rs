use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use amuse_audio::{AudioBackend, AudioGraph, NullBackend, OscBackend};
use amuse_core::config::{self, Config};
use amuse_core::randomize::RandomKind;
use amuse_core::telemetry::FrameTelemetry;
use amuse_core::Session;

const DEFAULT_TICKS: u64 = 10_000;
const TICK_INTERVAL: Duration = Duration::from_micros(16_667);
const SUMMARY_EVERY: u64 = 256;

fn init_logging(verbose: bool) {
    use simplelog::{LevelFilter, WriteLogger};

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };

    let log_path = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("amuse")
        .join("amuse.log");

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = match File::create(&log_path).or_else(|_| File::create("/tmp/amuse.log")) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("amuse: cannot create log file: {}", e);
            return;
        }
    };

    if let Err(e) = WriteLogger::init(log_level, simplelog::Config::default(), log_file) {
        eprintln!("amuse: logger init failed: {}", e);
        return;
    }

    log::info!("amuse starting (log level: {:?})", log_level);
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("amuse: {}", msg);
    std::process::exit(1);
}

fn usage() {
    println!(
        "usage: amuse [options]\n\n  \
         -v, --verbose           debug logging\n  \
         --config <file.toml>    application config (default: user config dir)\n  \
         --preset <file.json>    parameter snapshot\n  \
         --randomize <kind>      symmetric | chaos | keep\n  \
         --seed <n>              seed every random stream\n  \
         --ticks <n>             stop after n ticks (default {})\n  \
         --realtime              pace ticks at 60 Hz\n  \
         --sound                 enable the melody voice\n  \
         --osc <host:port>       synthesis server (overrides config)\n  \
         --svg <file.svg>        write the vector export when done\n  \
         --dump-preset           print the effective parameters as JSON and exit",
        DEFAULT_TICKS
    );
}

fn main() -> std::io::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        usage();
        return Ok(());
    }
    let verbose = args.iter().any(|a| a == "--verbose" || a == "-v");
    init_logging(verbose);

    let app = match arg_value(&args, "--config") {
        Some(path) => Config::load_from(path.as_ref()).unwrap_or_else(|e| fail(e)),
        None => Config::load(),
    };

    let seed = arg_value(&args, "--seed").map(|s| s.parse::<u64>().unwrap_or_else(|e| fail(e)));
    let max_ticks = arg_value(&args, "--ticks")
        .map(|s| s.parse::<u64>().unwrap_or_else(|e| fail(e)))
        .unwrap_or(DEFAULT_TICKS);
    let realtime = args.iter().any(|a| a == "--realtime");

    let osc_addr = arg_value(&args, "--osc").or_else(|| app.osc_addr());
    let backend: Box<dyn AudioBackend> = match osc_addr {
        Some(addr) => match OscBackend::connect_to(addr) {
            Ok(b) => {
                log::info!(target: "audio", "sending to synthesis server at {}", addr);
                Box::new(b)
            }
            Err(e) => {
                log::warn!(target: "audio", "cannot reach {}: {}; running silent", addr, e);
                Box::new(NullBackend::new())
            }
        },
        None => Box::new(NullBackend::new()),
    };

    let mut session = Session::from_config(&app).with_audio(AudioGraph::new(backend));
    if let Some(seed) = seed {
        session = session.with_seed(seed);
    }

    // presets replace the whole snapshot, key included
    let mut params = match arg_value(&args, "--preset") {
        Some(path) => config::load_preset(path.as_ref()).unwrap_or_else(|e| fail(e)),
        None => session.config().clone(),
    };
    if args.iter().any(|a| a == "--sound") {
        params.sound_enabled = true;
    }
    session.set_config(params);

    if let Some(kind) = arg_value(&args, "--randomize") {
        let kind = match kind {
            "symmetric" => RandomKind::Symmetric,
            "chaos" => RandomKind::Chaos,
            "keep" => RandomKind::Keep,
            other => fail(format!("unknown randomize kind '{}'", other)),
        };
        session.randomize(kind);
    }

    if args.iter().any(|a| a == "--dump-preset") {
        let json = serde_json::to_string_pretty(session.config())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        println!("{}", json);
        return Ok(());
    }

    run(&mut session, max_ticks, realtime);

    if let Some(path) = arg_value(&args, "--svg") {
        let mut out = BufWriter::new(File::create(path)?);
        session.export_svg(&mut out)?;
        log::info!(
            "wrote {} segments to {}",
            session.state().segments.len(),
            path
        );
    }
    Ok(())
}

fn run(session: &mut Session, max_ticks: u64, realtime: bool) {
    let mut telemetry = FrameTelemetry::default();
    let started = Instant::now();
    session.start_new_run();

    let mut ticks = 0u64;
    while session.is_running() && ticks < max_ticks {
        let tick_start = Instant::now();
        let now = started.elapsed().as_secs_f64();

        let out = session.tick(None, now);
        session.poll_chords(now);
        ticks += 1;

        if out.run_complete {
            log::info!(target: "session", "pattern closed after {} ticks", ticks);
        }
        if let Some(note) = out.note.filter(|_| ticks % SUMMARY_EVERY == 0) {
            log::debug!(target: "audio", "note {}{} {} Hz", note.note.name(), note.octave, note.freq);
        }

        let elapsed = tick_start.elapsed();
        telemetry.record(elapsed);
        if ticks % SUMMARY_EVERY == 0 {
            let s = telemetry.take_summary();
            log::debug!(
                target: "engine",
                "ticks {}: avg {}us max {}us p95 {}us overruns {} progress {}",
                ticks,
                s.avg_us,
                s.max_us,
                s.p95_us,
                s.overruns,
                session
                    .cycle_progress()
                    .map_or_else(|| "-".to_string(), |p| format!("{:.1}%", p))
            );
        }

        if realtime && elapsed < TICK_INTERVAL {
            std::thread::sleep(TICK_INTERVAL - elapsed);
        }
    }

    session.stop();
    println!(
        "{} ticks, {} segments stored, progress {}",
        ticks,
        session.state().segments.len(),
        session
            .cycle_progress()
            .map_or_else(|| "unbounded".to_string(), |p| format!("{:.1}%", p))
    );
}
