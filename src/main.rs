use clap::Parser;
use crossbeam_channel::unbounded;
use otgw_graph::chart::{AxisBound, ChartConfig, ChartFactory, ChartSurface, Theme};
use otgw_graph::config::Config;
use otgw_graph::engine::GraphEngine;
use otgw_graph::error::ChartError;
use otgw_graph::export::{DirectorySink, DownloadSink, SaveChain};
use otgw_graph::runtime::{parse_feed_line, Command, EngineLoop, Feed};
use otgw_graph::timeseries::{Point, SystemClock};
use std::io::BufRead;
use std::path::PathBuf;

/// Graph OpenTherm gateway telemetry read as newline-delimited JSON from stdin
#[derive(Parser, Debug)]
#[command(name = "otgw-graph", version)]
struct Args {
    /// Visible and exported window, in minutes
    #[arg(long)]
    window: Option<u32>,

    /// Periodically export the window as CSV
    #[arg(long)]
    auto_export: bool,

    /// Periodically capture the chart as PNG
    #[arg(long)]
    auto_capture: bool,

    /// Directory for exports and captures
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Use the dark palette
    #[arg(long)]
    dark: bool,
}

/// Chart surface without a renderer; logs what it would draw
struct HeadlessChart {
    theme: Theme,
}

impl ChartSurface for HeadlessChart {
    fn set_option(&mut self, config: &ChartConfig) {
        log::debug!(
            "Chart option: {} series, {} panels ({:?})",
            config.series.len(),
            config.panels.len(),
            self.theme
        );
    }

    fn append_data(&mut self, series_index: usize, points: &[Point]) {
        log::trace!("Append {} point(s) to series {}", points.len(), series_index);
    }

    fn set_x_axes(&mut self, bounds: &[AxisBound]) {
        if let Some(bound) = bounds.first() {
            log::trace!("Time axes start at {}", bound.min);
        }
    }

    fn capture_png(&mut self, _background: &str) -> Result<Vec<u8>, ChartError> {
        Err(ChartError::CaptureUnsupported)
    }

    fn dispose(&mut self) {
        log::debug!("Chart disposed");
    }
}

struct HeadlessFactory;

impl ChartFactory for HeadlessFactory {
    fn create(&mut self, theme: Theme) -> Result<Box<dyn ChartSurface>, ChartError> {
        Ok(Box::new(HeadlessChart { theme }))
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = Config::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config, using defaults: {}", e);
        Config::default()
    });
    if let Some(window) = args.window {
        config.time_window_minutes = window;
    }
    config.auto_export |= args.auto_export;
    config.auto_capture |= args.auto_capture;
    if args.log_dir.is_some() {
        config.log_dir = args.log_dir;
    }
    if args.dark {
        config.theme = Theme::Dark;
    }

    let saver = SaveChain::new(
        Box::new(DirectorySink::new(config.log_dir.clone())),
        Box::new(DownloadSink::default()),
    );
    let engine = GraphEngine::new(&config, Box::new(SystemClock), Box::new(HeadlessFactory), saver);

    let (feed_tx, feed_rx) = unbounded::<Feed>();
    let (cmd_tx, cmd_rx) = unbounded::<Command>();

    // Read the feed on its own thread; EOF closes both inputs
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    log::error!("Failed to read feed: {}", e);
                    break;
                }
            };
            if let Some(feed) = parse_feed_line(&line) {
                if feed_tx.send(feed).is_err() {
                    break;
                }
            }
        }
        drop(cmd_tx);
    });

    let mut runtime = EngineLoop::new(
        engine,
        feed_rx,
        cmd_rx,
        config.render_interval(),
        config.auto_interval(),
    );
    if config.auto_capture {
        runtime.set_auto_capture(true);
    }
    if config.auto_export {
        runtime.set_auto_export(true);
    }

    let engine = runtime.run();
    log::info!(
        "Stopped with {} channel(s), {} connectivity marker(s)",
        engine.channels().len(),
        engine.markers().len()
    );
}
