mod app;
mod canvas;
mod channel;
mod config;
mod editor;
mod egui_map;
mod elevation;
mod overlay;
mod panel;
mod renderer;
mod surface;
mod track;

pub use crate::app::{App, run_cmdui};
pub use crate::canvas::init_with_canvas;
pub use crate::config::{CONFIG, Config, MapType};
pub use crate::editor::TrackEditor;
pub use crate::elevation::{ElevationError, ElevationResult, ElevationService,
                           ElevationSource, elevation_along_path, open_atlas,
                           sample_path};
pub use crate::overlay::{DeleteOverlay, Removal, Selection};
pub use crate::panel::{ChartContent, ChartOptions, ChartRow, ChartTable,
                       ElevationPanel};
pub use crate::renderer::TrackRenderer;
pub use crate::surface::{LineStyle, PointerTarget, Surface};
pub use crate::track::{SharedTrack, Track, TrackError};
