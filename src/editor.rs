use crate::overlay::DeleteOverlay;
use crate::panel::ElevationPanel;
use crate::renderer::TrackRenderer;
use crate::surface::{LineStyle, PointerTarget, Surface};
use crate::track::{SharedTrack, TrackError};

use egui::Pos2;
use hoydedata::Coord;
use std::sync::Arc;

// Distance in pixels within which a click hits a vertex
pub const NEARBY: f32 = 8.0;

/// Index of the point whose screen position is closest to `pos`, if within
/// `tolerance` pixels.
pub fn nearest_vertex<F>(points: &[Coord], pos: Pos2, tolerance: f32,
                         to_screen: F) -> Option<usize>
where F: Fn(&Coord) -> Option<Pos2> {
    points.iter().enumerate()
        .filter_map(|(i, c)| to_screen(c).map(|p| (i, p.distance(pos))))
        .filter(|(_, d)| *d <= tolerance)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

/// Owns the track together with the line showing it, the delete menu and
/// the elevation panel. The surface is passed in by the caller on every
/// operation that needs it.
pub struct TrackEditor<S: Surface> {
    track: SharedTrack,
    renderer: TrackRenderer<S::Line>,
    overlay: DeleteOverlay<S::Listener>,
    panel: Option<ElevationPanel>,
}

impl<S: Surface> TrackEditor<S> {
    pub fn new(track: SharedTrack, style: LineStyle,
               panel: Option<ElevationPanel>) -> Self {
        Self {
            track: track,
            renderer: TrackRenderer::new(style),
            overlay: DeleteOverlay::new(),
            panel: panel,
        }
    }

    pub fn track(&self) -> &SharedTrack {
        &self.track
    }

    pub fn renderer(&self) -> &TrackRenderer<S::Line> {
        &self.renderer
    }

    pub fn overlay(&self) -> &DeleteOverlay<S::Listener> {
        &self.overlay
    }

    pub fn panel(&self) -> Option<&ElevationPanel> {
        self.panel.as_ref()
    }

    pub fn panel_mut(&mut self) -> Option<&mut ElevationPanel> {
        self.panel.as_mut()
    }

    /// Show the track as it is now and request a new elevation profile.
    pub fn rebuild(&mut self, surface: &mut S) {
        let track = self.track.read();

        self.renderer.rebuild(surface, &track);

        if let Some(panel) = self.panel.as_mut() {
            panel.refresh(&track);
        }
    }

    pub fn append_vertex(&mut self, surface: &mut S, v: Coord) {
        self.track.write().push(v);
        log::info!("Added vertex {}", v);
        self.rebuild(surface);
    }

    pub fn remove_at(&mut self, surface: &mut S, i: usize)
                     -> Result<Coord, TrackError> {
        let v = self.track.write().remove(i)?;
        log::info!("Removed vertex {} ({})", i, v);
        self.rebuild(surface);
        Ok(v)
    }

    pub fn replace(&mut self, surface: &mut S, points: Vec<Coord>) {
        self.overlay.close(surface);
        self.track.write().replace(points);
        self.rebuild(surface);
    }

    /// Drag a vertex of an editable track to `c`.
    pub fn move_vertex(&mut self, surface: &mut S, i: usize, c: Coord)
                       -> bool {
        if !self.renderer.style().editable {
            return false;
        }

        if let Err(e) = self.track.write().set(i, c) {
            log::warn!("Cannot move vertex: {}", e);
            return false;
        }

        log::debug!("Moved vertex {} to {}", i, c);
        self.rebuild(surface);
        true
    }

    /// Index of the vertex shown closest to `pos`, if within `tolerance`
    /// pixels.
    pub fn vertex_at(&self, surface: &S, pos: Pos2, tolerance: f32)
                     -> Option<usize> {
        let track = self.track.read();

        nearest_vertex(track.points(), pos, tolerance, |c| surface.to_screen(c))
    }

    pub fn open_menu(&mut self, surface: &mut S, index: usize) -> bool {
        self.overlay.open(surface, &self.track, index)
    }

    /// Right click on the surface. Opens the delete menu if a vertex was
    /// hit.
    pub fn context_menu(&mut self, surface: &mut S, pos: Pos2) -> bool {
        match self.vertex_at(surface, pos, NEARBY) {
            Some(i) => self.open_menu(surface, i),
            None => false,
        }
    }

    /// The delete menu's action was chosen.
    pub fn confirm_delete(&mut self, surface: &mut S) -> Option<Coord> {
        let removal = self.overlay.confirm_delete(surface)?;

        if Arc::ptr_eq(&removal.track, &self.track) {
            self.rebuild(surface);
        }

        Some(removal.vertex)
    }

    pub fn pointer_down(&mut self, surface: &mut S, target: PointerTarget) {
        self.overlay.pointer_down(surface, target);
    }

    pub fn menu_position(&self, surface: &S) -> Option<Pos2> {
        self.overlay.draw(surface)
    }

    /// Remove everything from the surface.
    pub fn teardown(&mut self, surface: &mut S) {
        self.overlay.close(surface);
        self.renderer.detach(surface);
    }
}
