//! Render loop: decides when to redraw, composes the selected page and hands
//! the frame to the panel
//!
//! ```text
//!   every check interval
//!          │
//!          ▼
//!   page changed? ── no ──► redraw interval elapsed? ── no ──► idle
//!          │ yes                       │ yes
//!          ▼                           ▼
//!   palette ─► snapshot + render ─► dim at night ─► Panel::write_frame
//!                    │
//!                    └─ error/panic ─► count; N in a row ─► selector.reset()
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDateTime};
use log::{debug, error, info, warn};

use infoscreen_display::{Frame, Panel, PanelStats};

use super::context::{PageSettings, RenderContext};
use crate::config::AppConfig;
use crate::error::{ConfigError, RenderError};
use crate::pages::PageRegistry;
use crate::resources::ResourceCache;
use crate::selector::PageSelector;
use crate::store::Store;
use crate::theme::{apply_brightness, palette_at, NightWindow};
use crate::worker::panic_message;

/// Loop cadence and geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositorConfig {
    pub width: u32,
    pub height: u32,
    /// Sleep between ticks
    pub check_interval: Duration,
    /// Redraw period while the page stays the same
    pub redraw_interval: Duration,
    /// Consecutive render failures before falling back to page 0
    pub max_consecutive_failures: u32,
    pub night: NightWindow,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            check_interval: Duration::from_millis(20),
            redraw_interval: Duration::from_secs(1),
            max_consecutive_failures: 3,
            night: NightWindow::default(),
        }
    }
}

impl CompositorConfig {
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            width: u32::from(config.display.width),
            height: u32::from(config.display.height),
            check_interval: config.render.check_interval(),
            redraw_interval: config.render.redraw_interval(),
            max_consecutive_failures: config.render.max_consecutive_failures.max(1),
            night: config.night.window()?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompositorStats {
    pub redraws: u64,
    pub render_failures: u64,
    pub resets: u64,
}

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to redraw yet
    Idle,
    /// Page rendered; `written` is false when the panel dropped the frame
    Drawn { page: usize, written: bool },
    /// Render failed, previous frame kept
    Failed { page: usize },
    /// Render failed too often; selector forced back to page 0
    Reset,
}

pub struct Compositor<'r> {
    registry: &'r PageRegistry,
    store: Arc<Store>,
    selector: Arc<PageSelector>,
    resources: Arc<ResourceCache>,
    settings: PageSettings,
    panel: Box<dyn Panel>,
    config: CompositorConfig,
    shown_page: Option<usize>,
    last_redraw: Option<Instant>,
    failures: u32,
    stats: CompositorStats,
}

impl<'r> Compositor<'r> {
    pub fn new(
        registry: &'r PageRegistry,
        store: Arc<Store>,
        selector: Arc<PageSelector>,
        resources: Arc<ResourceCache>,
        settings: PageSettings,
        panel: Box<dyn Panel>,
        config: CompositorConfig,
    ) -> Self {
        Self {
            registry,
            store,
            selector,
            resources,
            settings,
            panel,
            config,
            shown_page: None,
            last_redraw: None,
            failures: 0,
            stats: CompositorStats::default(),
        }
    }

    pub fn stats(&self) -> CompositorStats {
        self.stats
    }

    pub fn panel_stats(&self) -> PanelStats {
        self.panel.stats()
    }

    /// Compose page `index` as it would look at local time `now`
    ///
    /// Panics inside the page are caught and reported as
    /// [`RenderError::Panic`]. Night frames come back already dimmed.
    pub fn render_page(&self, index: usize, now: NaiveDateTime) -> Result<Frame, RenderError> {
        let palette = palette_at(now.time(), &self.config.night);
        let ctx = RenderContext {
            width: self.config.width,
            height: self.config.height,
            palette,
            now,
            resources: &self.resources,
            settings: &self.settings,
        };

        let registry = self.registry;
        let store = &self.store;
        let mut frame = panic::catch_unwind(AssertUnwindSafe(|| registry.render(index, store, &ctx)))
            .map_err(|payload| RenderError::Panic(panic_message(payload.as_ref())))??;

        if palette.night {
            apply_brightness(&mut frame, palette.brightness);
        }
        Ok(frame)
    }

    fn needs_redraw(&self, page: usize, instant: Instant) -> bool {
        match (self.shown_page, self.last_redraw) {
            (Some(shown), Some(last)) => {
                shown != page || instant.saturating_duration_since(last) >= self.config.redraw_interval
            }
            _ => true,
        }
    }

    /// One pass of the loop at the given wall clock and monotonic instant
    pub fn tick_at(&mut self, now: NaiveDateTime, instant: Instant) -> TickOutcome {
        let page = self.selector.current();
        if !self.needs_redraw(page, instant) {
            return TickOutcome::Idle;
        }
        if self.shown_page != Some(page) {
            let name = self.registry.get(page).map(|p| p.name()).unwrap_or("?");
            info!("Showing page {} ({})", page, name);
        }
        self.shown_page = Some(page);
        self.last_redraw = Some(instant);

        match self.render_page(page, now) {
            Ok(frame) => {
                self.failures = 0;
                self.stats.redraws += 1;
                let written = self.panel.write_frame(&frame);
                debug!("Redrew page {} (written: {})", page, written);
                TickOutcome::Drawn { page, written }
            }
            Err(e) => {
                self.failures += 1;
                self.stats.render_failures += 1;
                error!(
                    "Render of page {} failed ({}/{}): {}",
                    page, self.failures, self.config.max_consecutive_failures, e
                );
                if self.failures >= self.config.max_consecutive_failures {
                    warn!("Too many render failures, returning to page 0");
                    self.selector.reset();
                    self.failures = 0;
                    self.stats.resets += 1;
                    return TickOutcome::Reset;
                }
                TickOutcome::Failed { page }
            }
        }
    }

    pub fn tick(&mut self) -> TickOutcome {
        self.tick_at(Local::now().naive_local(), Instant::now())
    }

    /// Tick until `shutdown` is raised
    pub fn run(&mut self, shutdown: &AtomicBool) {
        if !self.panel.initialize() {
            warn!("Display not ready, retrying with the first frame");
        }
        info!(
            "Render loop started (check {:?}, redraw {:?})",
            self.config.check_interval, self.config.redraw_interval
        );
        while !shutdown.load(Ordering::SeqCst) {
            self.tick();
            thread::sleep(self.config.check_interval);
        }
        info!(
            "Render loop stopped after {} redraws, {} failures",
            self.stats.redraws, self.stats.render_failures
        );
    }

    /// Blank and release the panel
    pub fn shutdown(&mut self) {
        self.panel.clear();
        self.panel.close();
    }
}
