//! infoscreen
//!
//! Rotating information pages on an ST7789 SPI panel.
//!
//! # Usage
//!
//! ```bash
//! # Run against the panel (needs --features hardware)
//! infoscreen run --config /etc/infoscreen.toml
//!
//! # Run headless with a recording bus
//! infoscreen run --mock
//!
//! # Render one page to a PPM file
//! infoscreen render --page crypto --output crypto.ppm
//!
//! # List pages
//! infoscreen pages
//!
//! # Flip to the next page on a running instance
//! infoscreen send next --addr 192.168.1.20:9998
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use colored::Colorize;
use log::info;

use infoscreen::config::{AppConfig, DisplayConfig};
use infoscreen::control::{self, ControlServer};
use infoscreen::pages::{registry, PageRegistry};
use infoscreen::render::{Compositor, CompositorConfig, PageSettings};
use infoscreen::resources::ResourceCache;
use infoscreen::sources::{self, system::SystemMonitor};
use infoscreen::worker::Scheduler;
use infoscreen::{logging, PageSelector, Store};
use infoscreen_display::{MockInterface, Panel, PanelConfig, St7789, StdDelay};

const DEFAULT_CONFIG: &str = "/etc/infoscreen.toml";

/// Bus operations kept by the recording backend in `--mock` runs
const MOCK_LOG_LIMIT: usize = 1024;

/// Raised by SIGINT/SIGTERM, polled by the render loop
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Information display for SPI color panels
#[derive(Parser)]
#[command(name = "infoscreen")]
#[command(author = "Prasanna Gautam")]
#[command(version = "0.1.0")]
#[command(about = "Rotating information pages on an SPI color display")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Append log output to a file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start workers, control plane and the render loop
    Run {
        /// Configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// Drive a recording bus instead of the panel
        #[arg(long)]
        mock: bool,
    },

    /// Render one page to a binary PPM file
    Render {
        /// Configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// Page index or name
        #[arg(short, long)]
        page: String,

        /// Output path
        #[arg(short, long)]
        output: PathBuf,

        /// Render at the start of the night window
        #[arg(long)]
        night: bool,
    },

    /// List the pages in display order
    Pages,

    /// Send a command to a running instance
    Send {
        /// Command (next, status)
        command: String,

        /// Control address
        #[arg(short, long, default_value = "127.0.0.1:9998")]
        addr: String,

        /// Reply timeout in milliseconds
        #[arg(long, default_value_t = 2000)]
        timeout_ms: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Run { config, mock } => handle_run(&config, mock),
        Commands::Render {
            config,
            page,
            output,
            night,
        } => handle_render(&config, &page, &output, night),
        Commands::Pages => handle_pages(),
        Commands::Send {
            command,
            addr,
            timeout_ms,
        } => handle_send(&addr, &command, Duration::from_millis(timeout_ms)),
    }
}

fn load_config(path: &Path) -> Result<AppConfig> {
    AppConfig::load(path).with_context(|| format!("Failed to load configuration from {}", path.display()))
}

fn panel_config(display: &DisplayConfig) -> PanelConfig {
    PanelConfig {
        width: display.width,
        height: display.height,
        madctl: display.madctl,
        ..PanelConfig::default()
    }
}

fn open_panel(display: &DisplayConfig, mock: bool) -> Result<Box<dyn Panel>> {
    if mock {
        info!("Using recording bus instead of the panel");
        let bus = MockInterface::new()
            .with_max_transfer(display.max_transfer)
            .with_log_limit(MOCK_LOG_LIMIT);
        return Ok(Box::new(St7789::new(bus, StdDelay, panel_config(display))));
    }
    open_hardware_panel(display)
}

#[cfg(feature = "hardware")]
fn open_hardware_panel(display: &DisplayConfig) -> Result<Box<dyn Panel>> {
    use infoscreen_display::hal::{LinuxConfig, LinuxInterface};

    let iface = LinuxInterface::open(LinuxConfig {
        spi_device: display.spi_device.clone(),
        speed_hz: display.speed_hz,
        gpio_chip: display.gpio_chip.clone(),
        dc_line: display.dc_line,
        rst_line: display.rst_line,
        cs_line: display.cs_line,
        max_transfer: display.max_transfer,
    })
    .with_context(|| format!("Failed to open panel on {}", display.spi_device))?;
    Ok(Box::new(St7789::new(iface, StdDelay, panel_config(display))))
}

#[cfg(not(feature = "hardware"))]
fn open_hardware_panel(_display: &DisplayConfig) -> Result<Box<dyn Panel>> {
    anyhow::bail!("built without the `hardware` feature; rebuild with it or pass --mock")
}

#[cfg(unix)]
extern "C" fn handle_signal(_: libc::c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

#[cfg(unix)]
fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGINT, handle_signal as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handle_signal as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
fn install_signal_handlers() {}

fn handle_run(config_path: &Path, mock: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let pages: &PageRegistry = registry();

    let store = Arc::new(Store::with_defaults());
    let selector = Arc::new(PageSelector::new(pages.len()));
    let resources = Arc::new(ResourceCache::new(config.assets.dir.clone(), config.assets.width_scale));
    let settings = PageSettings::from_config(&config)?;
    let compositor_config = CompositorConfig::from_config(&config)?;
    let panel = open_panel(&config.display, mock)?;

    let mut scheduler = Scheduler::new(Arc::clone(&store));
    let workers = sources::register_workers(&mut scheduler, &config.sources)?;
    info!("{} workers running", workers);

    let mut control = if config.control.enabled {
        Some(ControlServer::start(&config.control.bind, Arc::clone(&selector))?)
    } else {
        info!("Control plane disabled");
        None
    };

    install_signal_handlers();
    let mut compositor = Compositor::new(
        pages,
        store,
        selector,
        resources,
        settings,
        panel,
        compositor_config,
    );
    compositor.run(&SHUTDOWN);

    info!("Shutting down");
    scheduler.shutdown();
    if let Some(control) = control.as_mut() {
        control.stop();
    }
    compositor.shutdown();
    let stats = compositor.panel_stats();
    info!(
        "Panel: {} frames written, {} dropped, {} reinitializations",
        stats.frames_written, stats.frames_dropped, stats.reinitializations
    );
    Ok(())
}

fn resolve_page(pages: &PageRegistry, page: &str) -> Result<usize> {
    let index = match page.parse::<usize>() {
        Ok(index) => Some(index).filter(|i| *i < pages.len()),
        Err(_) => pages.position(page),
    };
    index.with_context(|| format!("Unknown page: {page}. Use 'infoscreen pages' to list them."))
}

fn handle_render(config_path: &Path, page: &str, output: &Path, night: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let pages = registry();
    let index = resolve_page(pages, page)?;

    // one local sample so the system widgets show real numbers
    let store = Arc::new(Store::with_defaults());
    store.update(SystemMonitor::new().collect());

    let compositor_config = CompositorConfig::from_config(&config)?;
    let now = if night {
        Local::now().date_naive().and_time(compositor_config.night.start)
    } else {
        Local::now().naive_local()
    };
    let bus = MockInterface::new().with_log_limit(MOCK_LOG_LIMIT);
    let compositor = Compositor::new(
        pages,
        store,
        Arc::new(PageSelector::new(pages.len())),
        Arc::new(ResourceCache::new(config.assets.dir.clone(), config.assets.width_scale)),
        PageSettings::from_config(&config)?,
        Box::new(St7789::new(bus, StdDelay, panel_config(&config.display))),
        compositor_config,
    );

    let frame = compositor
        .render_page(index, now)
        .with_context(|| format!("Failed to render page {page}"))?;
    fs::write(output, frame.to_ppm()).with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "{} page {} ({}x{}) -> {}",
        "Rendered".green().bold(),
        page.white().bold(),
        frame.width(),
        frame.height(),
        output.display()
    );
    Ok(())
}

fn handle_pages() -> Result<()> {
    println!("{}", "=".repeat(60));
    println!("{}", "Pages".cyan().bold());
    println!("{}", "=".repeat(60));
    for (index, page) in registry().iter().enumerate() {
        println!("  {:>2}  {:<10} {}", index, page.name().white().bold(), page.description());
    }
    println!("\n{}", "=".repeat(60));
    println!(
        "Use {} to preview one",
        "infoscreen render --page <name> --output page.ppm".cyan()
    );
    Ok(())
}

fn handle_send(addr: &str, command: &str, timeout: Duration) -> Result<()> {
    let reply = control::send_command(addr, command, timeout)?;
    println!("{}", reply);
    Ok(())
}
