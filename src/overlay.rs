use crate::surface::{PointerTarget, Surface};
use crate::track::{SharedTrack, Track};

use egui::Pos2;
use hoydedata::Coord;
use parking_lot::RwLock;
use std::sync::{Arc, Weak};

/// The vertex targeted for deletion. The track is not owned by the
/// selection; if it is dropped while the menu is open nothing is deleted.
#[derive(Clone, Debug)]
pub struct Selection {
    track: Weak<RwLock<Track>>,
    index: usize,
    anchor: Coord,
}

impl Selection {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn track(&self) -> Option<SharedTrack> {
        self.track.upgrade()
    }
}

/// A vertex removed through the menu.
pub struct Removal {
    pub track: SharedTrack,
    pub index: usize,
    pub vertex: Coord,
}

enum State<H> {
    Closed,
    Open {
        selection: Selection,
        listener: H,
    },
}

/// Floating menu with a single "Delete" action for one vertex of a track.
/// While open it listens for pointer-down events on the surface and closes
/// on any of them not aimed at the menu itself.
pub struct DeleteOverlay<H> {
    state: State<H>,
}

impl<H> DeleteOverlay<H> {
    pub fn new() -> Self {
        Self {
            state: State::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, State::Open { .. })
    }

    pub fn selection(&self) -> Option<&Selection> {
        match &self.state {
            State::Open { selection, .. } => Some(selection),
            State::Closed => None,
        }
    }

    /// Open the menu at vertex `index` of `track`. An open menu is moved to
    /// the new vertex, dropping the old selection. Returns false, leaving the
    /// menu as it was, if there is no such vertex.
    pub fn open<S>(&mut self, surface: &mut S, track: &SharedTrack,
                   index: usize) -> bool
    where S: Surface<Listener = H> {
        let Some(anchor) = track.read().get(index) else {
            log::warn!("Cannot open delete menu at missing vertex {}", index);
            return false;
        };

        let selection = Selection {
            track: Arc::downgrade(track),
            index: index,
            anchor: anchor,
        };

        self.state = match std::mem::replace(&mut self.state, State::Closed) {
            State::Open { listener, .. } => State::Open {
                selection: selection,
                listener: listener,
            },
            State::Closed => State::Open {
                selection: selection,
                listener: surface.listen_pointer_down(),
            },
        };

        log::debug!("Delete menu opened at vertex {} ({})", index, anchor);
        true
    }

    /// Detach the menu and forget the selection. Closing a closed menu does
    /// nothing.
    pub fn close<S>(&mut self, surface: &mut S)
    where S: Surface<Listener = H> {
        if let State::Open { listener, .. } =
            std::mem::replace(&mut self.state, State::Closed) {
            surface.unlisten(listener);
            log::debug!("Delete menu closed");
        }
    }

    /// Delete the selected vertex and close. Without a selection, or if the
    /// track has changed at the selected index, the menu is only closed.
    pub fn confirm_delete<S>(&mut self, surface: &mut S) -> Option<Removal>
    where S: Surface<Listener = H> {
        let selection = self.selection().cloned();
        self.close(surface);

        let selection = selection?;
        let Some(track) = selection.track() else {
            log::debug!("Selected track no longer exists");
            return None;
        };

        let vertex = {
            let mut t = track.write();

            // The vertex must still be where it was when selected
            if t.get(selection.index) != Some(selection.anchor) {
                log::warn!("Stale selection: vertex {} has changed",
                           selection.index);
                return None;
            }

            t.remove(selection.index).ok()?
        };

        log::info!("Deleted vertex {} ({})", selection.index, vertex);

        Some(Removal {
            track: track,
            index: selection.index,
            vertex: vertex,
        })
    }

    /// Pointer-down somewhere on the surface. Returns true if the menu was
    /// closed by it.
    pub fn pointer_down<S>(&mut self, surface: &mut S, target: PointerTarget)
                           -> bool
    where S: Surface<Listener = H> {
        if !self.is_open() || target == PointerTarget::Overlay {
            return false;
        }

        self.close(surface);
        true
    }

    /// Screen position to show the menu at. None when closed or when the
    /// surface cannot project yet.
    pub fn draw<S>(&self, surface: &S) -> Option<Pos2>
    where S: Surface<Listener = H> {
        let selection = self.selection()?;
        surface.to_screen(&selection.anchor)
    }
}

impl<H> Default for DeleteOverlay<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::mock::MockSurface;

    fn abc() -> SharedTrack {
        Track::from_points(vec![
            Coord::new(10.0, 10.0),
            Coord::new(20.0, 20.0),
            Coord::new(30.0, 30.0),
        ]).shared()
    }

    #[test]
    fn confirm_removes_selected_vertex_only() {
        for i in 0..3 {
            let mut surface = MockSurface::default();
            let mut overlay = DeleteOverlay::new();
            let track = abc();
            let mut expected = abc().read().points().to_vec();
            expected.remove(i);

            assert!(overlay.open(&mut surface, &track, i));
            let removal = overlay.confirm_delete(&mut surface).unwrap();

            assert_eq!(removal.index, i);
            assert_eq!(track.read().points(), &expected[..]);
            assert!(!overlay.is_open());
            assert!(surface.listeners.is_empty());
        }
    }

    #[test]
    fn close_twice_is_close_once() {
        let mut surface = MockSurface::default();
        let mut overlay = DeleteOverlay::new();
        let track = abc();

        overlay.open(&mut surface, &track, 1);
        overlay.close(&mut surface);
        overlay.close(&mut surface);

        assert!(!overlay.is_open());
        assert!(overlay.selection().is_none());
        assert!(surface.listeners.is_empty());
        assert_eq!(track.read().len(), 3);
    }

    #[test]
    fn confirm_on_closed_menu_does_nothing() {
        let mut surface = MockSurface::default();
        let mut overlay = DeleteOverlay::<u32>::new();

        assert!(overlay.confirm_delete(&mut surface).is_none());
        assert!(surface.listeners.is_empty());
    }

    #[test]
    fn reopen_targets_latest_track() {
        let mut surface = MockSurface::default();
        let mut overlay = DeleteOverlay::new();
        let first = abc();
        let second = abc();

        overlay.open(&mut surface, &first, 0);
        overlay.open(&mut surface, &second, 2);
        assert_eq!(surface.listeners.len(), 1);

        let removal = overlay.confirm_delete(&mut surface).unwrap();

        assert!(Arc::ptr_eq(&removal.track, &second));
        assert_eq!(first.read().len(), 3);
        assert_eq!(second.read().len(), 2);
        assert_eq!(second.read().get(1), Some(Coord::new(20.0, 20.0)));
    }

    #[test]
    fn open_at_missing_vertex_is_refused() {
        let mut surface = MockSurface::default();
        let mut overlay = DeleteOverlay::new();

        assert!(!overlay.open(&mut surface, &abc(), 3));
        assert!(!overlay.is_open());
        assert!(surface.listeners.is_empty());
    }

    #[test]
    fn outside_pointer_down_closes_without_deleting() {
        let mut surface = MockSurface::default();
        let mut overlay = DeleteOverlay::new();
        let track = abc();

        overlay.open(&mut surface, &track, 1);
        assert!(!overlay.pointer_down(&mut surface, PointerTarget::Overlay));
        assert!(overlay.is_open());

        assert!(overlay.pointer_down(&mut surface, PointerTarget::Elsewhere));
        assert!(!overlay.is_open());
        assert!(surface.listeners.is_empty());
        assert_eq!(track.read().len(), 3);

        assert!(!overlay.pointer_down(&mut surface, PointerTarget::Elsewhere));
    }

    #[test]
    fn draw_follows_selection() {
        let mut surface = MockSurface::default();
        let mut overlay = DeleteOverlay::new();
        let track = abc();

        assert_eq!(overlay.draw(&surface), None);

        overlay.open(&mut surface, &track, 1);
        assert_eq!(overlay.draw(&surface), Some(Pos2::new(20.0, 20.0)));

        surface.no_projection = true;
        assert_eq!(overlay.draw(&surface), None);
    }

    #[test]
    fn dropped_track_is_not_touched() {
        let mut surface = MockSurface::default();
        let mut overlay = DeleteOverlay::new();
        let track = abc();

        overlay.open(&mut surface, &track, 1);
        drop(track);

        assert!(overlay.confirm_delete(&mut surface).is_none());
        assert!(!overlay.is_open());
    }

    #[test]
    fn stale_index_is_ignored() {
        let mut surface = MockSurface::default();
        let mut overlay = DeleteOverlay::new();
        let track = abc();

        overlay.open(&mut surface, &track, 2);
        track.write().replace(vec![Coord::new(1.0, 1.0)]);

        assert!(overlay.confirm_delete(&mut surface).is_none());
        assert_eq!(track.read().len(), 1);
    }

    #[test]
    fn shifted_vertex_is_not_deleted() {
        let mut surface = MockSurface::default();
        let mut overlay = DeleteOverlay::new();
        let track = abc();

        overlay.open(&mut surface, &track, 1);
        track.write().remove(0).unwrap();

        assert!(overlay.confirm_delete(&mut surface).is_none());
        assert!(!overlay.is_open());
        assert_eq!(track.read().points(),
                   &[Coord::new(20.0, 20.0), Coord::new(30.0, 30.0)]);
    }
}
