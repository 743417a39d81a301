use crate::surface::{LineStyle, Surface};
use crate::track::Track;

/// Keeps the line shown on the surface in sync with a track. The attached
/// line is never edited in place; every rebuild detaches the old line and
/// attaches a new one bound to the current vertices.
pub struct TrackRenderer<L> {
    line: Option<L>,
    style: LineStyle,
    rebuilds: usize,
}

impl<L> TrackRenderer<L> {
    pub fn new(style: LineStyle) -> Self {
        Self {
            line: None,
            style: style,
            rebuilds: 0,
        }
    }

    pub fn style(&self) -> &LineStyle {
        &self.style
    }

    pub fn is_attached(&self) -> bool {
        self.line.is_some()
    }

    /// Number of rebuilds done so far
    pub fn rebuilds(&self) -> usize {
        self.rebuilds
    }

    pub fn rebuild<S>(&mut self, surface: &mut S, track: &Track)
    where S: Surface<Line = L> {
        self.detach(surface);
        self.line = Some(surface.attach_line(track.points(), &self.style));
        self.rebuilds += 1;
        log::debug!("Track line rebuilt with {} vertices", track.len());
    }

    pub fn detach<S>(&mut self, surface: &mut S)
    where S: Surface<Line = L> {
        if let Some(old) = self.line.take() {
            surface.detach_line(old);
        }
    }
}
