//! Page registry
//!
//! | # | Page      | Reads                                   |
//! |---|-----------|-----------------------------------------|
//! | 0 | clock     | weather, system, market tickers         |
//! | 1 | system    | local metrics                           |
//! | 2 | tracking  | parcels                                 |
//! | 3 | crypto    | tickers, candles, balance history       |
//! | 4 | calendar  | none (wall clock + countdown setting)   |
//! | 5 | fleet     | monitored hosts                         |
//! | 6 | streamers | live streamers                          |
//! | 7 | messages  | channel posts                           |
//!
//! Pages are pure: they read a [`Snapshot`] of their declared keys and the
//! [`RenderContext`], and never write to the store.

pub mod calendar;
pub mod clock;
pub mod crypto;
pub mod fleet;
pub mod messages;
pub mod streamers;
pub mod system;
pub mod tracking;

use once_cell::sync::Lazy;

use infoscreen_display::Frame;

use crate::error::RenderError;
use crate::render::{Canvas, RenderContext};
use crate::store::{Snapshot, Store};
use crate::theme::fill_gradient;

/// One screen of information
pub trait Page: Send + Sync {
    /// Short identifier used in logs and the CLI
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Store keys copied into the snapshot before drawing
    fn keys(&self) -> &'static [&'static str];

    /// Draw on top of the themed background
    fn draw(&self, canvas: &mut Canvas, snap: &Snapshot, ctx: &RenderContext<'_>) -> Result<(), RenderError>;

    /// Produce a full frame: gradient background, then [`Page::draw`]
    fn render(&self, snap: &Snapshot, ctx: &RenderContext<'_>) -> Result<Frame, RenderError> {
        let mut frame = Frame::new(ctx.width, ctx.height);
        fill_gradient(&mut frame, ctx.palette.bg_top, ctx.palette.bg_bottom);
        let mut canvas = Canvas::new(frame);
        self.draw(&mut canvas, snap, ctx)?;
        Ok(canvas.into_frame())
    }
}

/// Ordered set of pages
pub struct PageRegistry {
    pages: Vec<Box<dyn Page>>,
}

impl PageRegistry {
    pub fn new(pages: Vec<Box<dyn Page>>) -> Self {
        Self { pages }
    }

    /// The built-in page order
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(clock::ClockPage),
            Box::new(system::SystemPage),
            Box::new(tracking::TrackingPage),
            Box::new(crypto::CryptoPage),
            Box::new(calendar::CalendarPage),
            Box::new(fleet::FleetPage),
            Box::new(streamers::StreamersPage),
            Box::new(messages::MessagesPage),
        ])
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&dyn Page> {
        self.pages.get(index).map(|p| p.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Page> {
        self.pages.iter().map(|p| p.as_ref())
    }

    /// Position of the page called `name`
    pub fn position(&self, name: &str) -> Option<usize> {
        self.pages.iter().position(|p| p.name().eq_ignore_ascii_case(name))
    }

    /// Snapshot the page's keys from `store` and render it
    pub fn render(&self, index: usize, store: &Store, ctx: &RenderContext<'_>) -> Result<Frame, RenderError> {
        let page = self.get(index).ok_or(RenderError::UnknownPage(index))?;
        let snap = store.snapshot(page.keys());
        page.render(&snap, ctx)
    }
}

static REGISTRY: Lazy<PageRegistry> = Lazy::new(PageRegistry::standard);

/// Process-wide registry with the built-in pages
pub fn registry() -> &'static PageRegistry {
    &REGISTRY
}
