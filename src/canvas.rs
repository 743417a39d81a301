use crate::app::{App, run_cmdui};
use crate::channel::{CanvasMsg, CanvasReceiver, CanvasSender,
                     create_canvas_channel};
use crate::config::CONFIG;
use crate::editor::{NEARBY, TrackEditor, nearest_vertex};
use crate::egui_map::{init_with_app, EguiMapState};
use crate::elevation::ElevationService;
use crate::panel::{ChartOptions, ElevationPanel};
use crate::surface::{LineStyle, PointerTarget, Surface};
use crate::track::{SharedTrack, Track};

use eframe::CreationContext;
use egui::{Pos2, ViewportCommand};
use galileo::{Color, Map, MapBuilder, MapView};
use galileo::control::{EventPropagation, MapController, MouseButton,
                       UserEvent, UserEventHandler};
use galileo::layer::{FeatureId, FeatureLayer};
use galileo::layer::raster_tile_layer::{RasterTileLayerBuilder,
                                        RestTileProvider};
use galileo::symbol::{CirclePointSymbol, SimpleContourSymbol};
use galileo_types::cartesian::{CartesianPoint2d, Point2};
use galileo_types::geo::{Crs, GeoPoint, NewGeoPoint, Projection};
use galileo_types::geo::impls::GeoPoint2d;
use galileo_types::geometry_type::CartesianSpace2d;
use galileo_types::impls::Contour;
use hoydedata::Coord;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

type LineLayer = FeatureLayer<Point2, Contour<Point2>, SimpleContourSymbol,
                              CartesianSpace2d>;
type HandleLayer = FeatureLayer<Point2, Point2, CirclePointSymbol,
                                CartesianSpace2d>;

fn terminal_controller(track: SharedTrack, elevation: ElevationService,
                       tx: CanvasSender) {
    let mut app = App::new(track, &CONFIG.track_fname, elevation,
                           CONFIG.sample_count, Some(tx));
    run_cmdui(&mut app);
}

pub fn init_with_canvas(track: SharedTrack, elevation: ElevationService) {
    // Create canvas channel and spawn off terminal controller thread
    let (canvas_tx, canvas_rx) = create_canvas_channel();

    let canvas_tx_cloned = canvas_tx.clone();
    let track_cloned = track.clone();
    let elevation_cloned = elevation.clone();
    let handler = std::thread::spawn(move || terminal_controller(
        track_cloned, elevation_cloned, canvas_tx_cloned));

    let res = init_with_app("Sporkart", Box::new(|cc| Ok(Box::new(Canvas::new(
        cc,
        track,
        elevation,
        canvas_tx,
        canvas_rx,
    )))));

    if let Err(e) = res {
        log::error!("Unable to open map window: {}", e);
        return;
    }

    // Wait for the terminal to finish
    let _ = handler.join();
}

fn project(c: &Coord) -> Option<Point2> {
    let proj = Crs::EPSG3857.get_projection::<GeoPoint2d, Point2>()?;
    let (lat, lon) = c.latlon();

    proj.project(&GeoPoint2d::latlon(lat, lon))
}

fn unproject(p: &Point2) -> Option<Coord> {
    let proj = Crs::EPSG3857.get_projection::<GeoPoint2d, Point2>()?;
    let gp = proj.unproject(p)?;

    Some(Coord::from_latlon(gp.lat(), gp.lon()))
}

// Pixel position of `c` in a view with its upper left corner at `origin`
fn screen_position(origin: &Point2, resolution: f64, c: &Coord)
                   -> Option<Pos2> {
    let p = project(c)?;

    Some(Pos2::new(
        ((p.x() - origin.x())/resolution) as f32,
        ((origin.y() - p.y())/resolution) as f32,
    ))
}

fn map_coord(map: &Map, p: Point2) -> Option<Coord> {
    map.view().screen_to_map(p).and_then(|p| unproject(&p))
}

/// A track line on the map: the contour and its vertex handles.
pub struct TrackLine {
    contour: Option<FeatureId>,
    handles: Vec<FeatureId>,
}

/// The galileo layers the editor draws on, together with what is needed to
/// project coordinates to the screen.
pub struct MapSurface {
    lines: Arc<RwLock<LineLayer>>,
    handles: Arc<RwLock<HandleLayer>>,
    // Map position of the upper left corner of the view
    origin: Option<Point2>,
    resolution: f64,
    listeners: Vec<u32>,
    next_listener: u32,
}

impl MapSurface {
    fn new(style: &LineStyle) -> Self {
        let [r, g, b, a] = style.rgba();
        let color = Color::rgba(r, g, b, a);

        Self {
            lines: Arc::new(RwLock::new(FeatureLayer::new(
                vec![],
                SimpleContourSymbol::new(color, style.stroke_weight as f64),
                Crs::EPSG3857,
            ))),
            handles: Arc::new(RwLock::new(FeatureLayer::new(
                vec![],
                CirclePointSymbol::new(color, 4.0*style.stroke_weight as f64),
                Crs::EPSG3857,
            ))),
            origin: None,
            resolution: 1.0,
            listeners: vec![],
            next_listener: 0,
        }
    }

    fn update_view(&mut self, map: &Map) {
        self.origin = map.view().screen_to_map(Point2::new(0.0, 0.0));
        self.resolution = map.view().resolution();
    }

    fn is_listening(&self) -> bool {
        !self.listeners.is_empty()
    }
}

impl Surface for MapSurface {
    type Line = TrackLine;
    type Listener = u32;

    fn attach_line(&mut self, points: &[Coord], style: &LineStyle)
                   -> TrackLine {
        let projected: Vec<Point2> = points.iter()
            .filter_map(project)
            .collect();

        let mut handles = vec![];

        if style.editable {
            let mut layer = self.handles.write();

            for p in &projected {
                let id = layer.features_mut().add(*p);
                layer.update_feature(id);
                handles.push(id);
            }
        }

        let mut layer = self.lines.write();
        let id = layer.features_mut().add(Contour::open(projected));
        layer.update_feature(id);

        TrackLine {
            contour: Some(id),
            handles: handles,
        }
    }

    fn detach_line(&mut self, line: TrackLine) {
        if let Some(id) = line.contour {
            let mut layer = self.lines.write();
            layer.features_mut().remove(id);
            layer.update_feature(id);
        }

        let mut layer = self.handles.write();

        for id in line.handles {
            layer.features_mut().remove(id);
            layer.update_feature(id);
        }
    }

    fn to_screen(&self, c: &Coord) -> Option<Pos2> {
        screen_position(&self.origin?, self.resolution, c)
    }

    fn listen_pointer_down(&mut self) -> u32 {
        self.next_listener += 1;
        self.listeners.push(self.next_listener);
        self.next_listener
    }

    fn unlisten(&mut self, listener: u32) {
        self.listeners.retain(|l| *l != listener);
    }
}

// Translates map events to canvas messages. Dragging a vertex handle moves
// the vertex; other drags pan the map.
struct MouseHandler {
    canvas_tx: CanvasSender,
    track: SharedTrack,
    editable: bool,
    dragging: RwLock<Option<usize>>,
}

impl MouseHandler {
    fn new(canvas_tx: CanvasSender, track: SharedTrack, editable: bool)
           -> Self {
        Self {
            canvas_tx: canvas_tx,
            track: track,
            editable: editable,
            dragging: RwLock::new(None),
        }
    }

    fn vertex_under(&self, map: &Map, p: Point2) -> Option<usize> {
        let view = map.view();
        let origin = view.screen_to_map(Point2::new(0.0, 0.0))?;
        let resolution = view.resolution();
        let track = self.track.read();

        nearest_vertex(track.points(), Pos2::new(p.x() as f32, p.y() as f32),
                       NEARBY, |c| screen_position(&origin, resolution, c))
    }
}

impl UserEventHandler for MouseHandler {
    fn handle(&self, ev: &UserEvent, map: &mut Map) -> EventPropagation {
        match ev {
            UserEvent::ButtonPressed(_, _) => {
                let _ = self.canvas_tx.send(CanvasMsg::PointerDown);
                map.redraw();

                EventPropagation::Propagate
            },
            UserEvent::Click(MouseButton::Left, mouse_event) => {
                if let Some(c) = map_coord(map,
                                           mouse_event.screen_pointer_position) {
                    let _ = self.canvas_tx.send(CanvasMsg::AppendVertex(c));
                    map.redraw();
                }

                EventPropagation::Stop
            },
            UserEvent::Click(MouseButton::Right, mouse_event) => {
                let p = mouse_event.screen_pointer_position;
                let _ = self.canvas_tx.send(CanvasMsg::ContextMenu(
                    [p.x() as f32, p.y() as f32]));
                map.redraw();

                EventPropagation::Stop
            },
            UserEvent::DragStarted(MouseButton::Left, mouse_event) => {
                if !self.editable {
                    return EventPropagation::Propagate;
                }

                match self.vertex_under(map,
                                        mouse_event.screen_pointer_position) {
                    Some(i) => {
                        *self.dragging.write() = Some(i);
                        EventPropagation::Stop
                    },
                    None => EventPropagation::Propagate,
                }
            },
            UserEvent::Drag(MouseButton::Left, _, mouse_event) => {
                let Some(i) = *self.dragging.read() else {
                    return EventPropagation::Propagate;
                };

                if let Some(c) = map_coord(map,
                                           mouse_event.screen_pointer_position) {
                    let _ = self.canvas_tx.send(CanvasMsg::MoveVertex(i, c));
                    map.redraw();
                }

                EventPropagation::Stop
            },
            UserEvent::DragEnded(MouseButton::Left, _) => {
                match self.dragging.write().take() {
                    Some(_) => EventPropagation::Stop,
                    None => EventPropagation::Propagate,
                }
            },
            _ => EventPropagation::Propagate,
        }
    }
}

// Apply a message to the editor. Messages for the window itself are handed
// back.
fn dispatch<S: Surface>(editor: &mut TrackEditor<S>, surface: &mut S,
                        msg: CanvasMsg) -> Option<CanvasMsg> {
    match msg {
        CanvasMsg::AppendVertex(c) => {
            editor.append_vertex(surface, c);
        },
        CanvasMsg::MoveVertex(i, c) => {
            editor.move_vertex(surface, i, c);
        },
        CanvasMsg::PointerDown => {
            editor.pointer_down(surface, PointerTarget::Elsewhere);
        },
        CanvasMsg::ContextMenu([x, y]) => {
            editor.context_menu(surface, Pos2::new(x, y));
        },
        CanvasMsg::TrackChanged => {
            editor.rebuild(surface);
        },
        CanvasMsg::ReplaceTrack(points) => {
            editor.replace(surface, points);
        },
        CanvasMsg::ResetView | CanvasMsg::Quit => {
            return Some(msg);
        },
    }

    None
}

pub struct Canvas {
    state: Arc<RwLock<EguiMapState>>,
    surface: MapSurface,
    editor: TrackEditor<MapSurface>,
    rx: CanvasReceiver,
}

impl Canvas {
    pub fn new(
        cc: &CreationContext<'_>,
        track: SharedTrack,
        elevation: ElevationService,
        canvas_tx: CanvasSender,
        canvas_rx: CanvasReceiver,
    ) -> Self {
        let ctx = cc.egui_ctx.clone();
        let render_state = cc
            .wgpu_render_state
            .clone()
            .expect("failed to get wgpu context");

        let map_type = CONFIG.map_type;
        let provider = RestTileProvider::new(
            move |index| map_type.tile_url(index.z, index.x, index.y),
            None,
            false,
        );

        let raster_layer = RasterTileLayerBuilder::new_with_provider(provider)
            .build()
            .expect("failed to create layer");

        let center = track.read().get(0)
            .unwrap_or_else(|| Track::seed().points()[0]);
        let (lat, lon) = center.latlon();

        let style = CONFIG.line_style();
        let surface = MapSurface::new(&style);

        let mut map = MapBuilder::default()
            .with_latlon(lat, lon)
            .with_z_level(CONFIG.zoom)
            .with_layer(raster_layer)
            .build();

        map.layers_mut().push(surface.lines.clone());
        map.layers_mut().push(surface.handles.clone());

        let map_state = Arc::new(RwLock::new(
            EguiMapState::new(map, ctx, render_state)));

        {
            let mut state_mut = map_state.write();
            state_mut.add_handler(MouseHandler::new(canvas_tx, track.clone(),
                                                    style.editable));
            state_mut.add_handler(MapController::default());
        }

        let panel = if CONFIG.elevation {
            Some(ElevationPanel::new(elevation, CONFIG.sample_count,
                                     ChartOptions::default()))
        }
        else {
            None
        };

        let mut ret = Self {
            state: map_state,
            surface: surface,
            editor: TrackEditor::new(track, style, panel),
            rx: canvas_rx,
        };

        ret.editor.rebuild(&mut ret.surface);

        return ret;
    }

    fn reset_view(&mut self) {
        let Some(c) = self.editor.track().read().get(0) else {
            return;
        };

        let (lat, lon) = c.latlon();
        let mut state = self.state.write();
        let res = state.map().view().resolution();
        let view = MapView::new(&GeoPoint2d::latlon(lat, lon), res);
        state.map_mut().set_view(view);
    }

    fn check_channel(&mut self) -> bool {
        while let Ok(msg) = self.rx.try_recv() {
            if matches!(msg, CanvasMsg::PointerDown)
                && !self.surface.is_listening() {
                continue;
            }

            match dispatch(&mut self.editor, &mut self.surface, msg) {
                Some(CanvasMsg::ResetView) => {
                    self.reset_view();
                },
                Some(CanvasMsg::Quit) => {
                    return true;
                },
                _ => {},
            }
        }

        return false;
    }

    fn show_delete_menu(&mut self, ctx: &egui::Context, map_rect: egui::Rect) {
        let Some(p) = self.editor.menu_position(&self.surface) else {
            return;
        };

        let mut delete = false;

        egui::Area::new(egui::Id::new("delete_menu"))
            .fixed_pos(map_rect.min + p.to_vec2())
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    delete = ui.button("Delete").clicked();
                });
            });

        if delete {
            self.editor.confirm_delete(&mut self.surface);
        }
    }
}

impl eframe::App for Canvas {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let quit = self.check_channel();

        if quit || ctx.input(|i| i.viewport().close_requested()) {
            self.editor.teardown(&mut self.surface);
        }

        if quit {
            ctx.send_viewport_cmd(ViewportCommand::Close);
            return;
        }

        // Keep listening to the terminal while the window is idle
        ctx.request_repaint_after(Duration::from_millis(250));

        if let Some(panel) = self.editor.panel_mut() {
            panel.poll();

            if panel.is_pending() {
                ctx.request_repaint_after(Duration::from_millis(100));
            }

            egui::TopBottomPanel::bottom("elevation").show(ctx, |ui| {
                panel.show(ui);
            });
        }

        let mut map_rect = egui::Rect::NOTHING;

        egui::CentralPanel::default().show(ctx, |ui| {
            let mut state = self.state.write();
            map_rect = state.render(ui);
            self.surface.update_view(state.map());
        });

        self.show_delete_menu(ctx, map_rect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elevation::mock::Slope;
    use crate::surface::mock::MockSurface;
    use cmdui::CmdApp;
    use galileo::control::{EventProcessor, RawUserEvent};
    use galileo_types::cartesian::Size;

    fn map() -> Map {
        let mut map = MapBuilder::default()
            .with_latlon(68.648, 23.24)
            .with_z_level(14)
            .build();
        map.set_size(Size::new(800.0, 600.0));
        map
    }

    // Feed raw pointer events through a processor holding only the mouse
    // handler and collect what it sent
    fn run(map: &mut Map, track: SharedTrack, raw: Vec<RawUserEvent>)
           -> Vec<CanvasMsg> {
        let (tx, rx): (CanvasSender, CanvasReceiver) = create_canvas_channel();
        let mut processor = EventProcessor::default();
        processor.add_handler(MouseHandler::new(tx, track, true));

        for ev in raw {
            processor.handle(ev, map);
        }

        rx.try_iter().collect()
    }

    fn click(button: MouseButton, x: f64, y: f64) -> Vec<RawUserEvent> {
        vec![
            RawUserEvent::PointerMoved(Point2::new(x, y)),
            RawUserEvent::ButtonPressed(button),
            RawUserEvent::ButtonReleased(button),
        ]
    }

    #[test]
    fn left_click_appends_vertex() {
        let mut map = map();
        let msgs = run(&mut map, Track::new().shared(),
                       click(MouseButton::Left, 100.0, 100.0));

        assert!(matches!(msgs.first(), Some(CanvasMsg::PointerDown)));
        assert!(msgs.iter().any(|m| matches!(m, CanvasMsg::AppendVertex(_))));
    }

    #[test]
    fn right_click_asks_for_menu() {
        let mut map = map();
        let msgs = run(&mut map, Track::new().shared(),
                       click(MouseButton::Right, 100.0, 120.0));

        assert!(matches!(msgs.first(), Some(CanvasMsg::PointerDown)));
        assert!(msgs.iter().any(
            |m| matches!(m, CanvasMsg::ContextMenu([x, y])
                         if *x == 100.0 && *y == 120.0)));
        assert!(!msgs.iter().any(|m| matches!(m, CanvasMsg::AppendVertex(_))));
    }

    #[test]
    fn dragging_a_handle_moves_vertex() {
        let mut map = map();
        let c = map_coord(&map, Point2::new(400.0, 300.0))
            .expect("map has a view");
        let track = Track::from_points(vec![c]).shared();

        let msgs = run(&mut map, track, vec![
            RawUserEvent::PointerMoved(Point2::new(400.0, 300.0)),
            RawUserEvent::ButtonPressed(MouseButton::Left),
            RawUserEvent::PointerMoved(Point2::new(420.0, 300.0)),
            RawUserEvent::PointerMoved(Point2::new(450.0, 300.0)),
            RawUserEvent::ButtonReleased(MouseButton::Left),
        ]);

        assert!(msgs.iter().any(|m| matches!(m, CanvasMsg::MoveVertex(0, _))));
        assert!(!msgs.iter().any(|m| matches!(m, CanvasMsg::AppendVertex(_))));
    }

    #[test]
    fn dragging_elsewhere_moves_nothing() {
        let mut map = map();
        let c = map_coord(&map, Point2::new(400.0, 300.0))
            .expect("map has a view");
        let track = Track::from_points(vec![c]).shared();

        let msgs = run(&mut map, track, vec![
            RawUserEvent::PointerMoved(Point2::new(100.0, 100.0)),
            RawUserEvent::ButtonPressed(MouseButton::Left),
            RawUserEvent::PointerMoved(Point2::new(120.0, 100.0)),
            RawUserEvent::PointerMoved(Point2::new(150.0, 100.0)),
            RawUserEvent::ButtonReleased(MouseButton::Left),
        ]);

        assert!(!msgs.iter().any(|m| matches!(m, CanvasMsg::MoveVertex(..))));
    }

    #[test]
    fn opened_track_drops_selection() {
        let old = vec![Coord::new(100.0, 100.0), Coord::new(200.0, 100.0),
                       Coord::new(300.0, 100.0)];
        let new = vec![Coord::new(500.0, 500.0), Coord::new(600.0, 500.0),
                       Coord::new(700.0, 500.0)];
        let fname = std::env::temp_dir()
            .join(format!("sporkart-open-{}.json", std::process::id()));
        let fname = fname.to_str().unwrap().to_string();
        Track::from_points(new.clone()).write(&fname, "test").unwrap();

        let mut surface = MockSurface::default();
        let track = Track::from_points(old).shared();
        let mut editor = TrackEditor::new(track.clone(), LineStyle::default(),
                                          None);
        editor.rebuild(&mut surface);

        let (tx, rx) = create_canvas_channel();
        let mut app = App::new(track.clone(), "", ElevationService::spawn(
            || Ok(Slope)), 75, Some(tx));

        assert!(editor.open_menu(&mut surface, 2));
        app.execute_line("open track", &vec![fname.clone()]).unwrap();
        let _ = std::fs::remove_file(&fname);

        let for_window: Vec<CanvasMsg> = rx.try_iter()
            .filter_map(|msg| dispatch(&mut editor, &mut surface, msg))
            .collect();

        assert!(matches!(for_window[..], [CanvasMsg::ResetView]));
        assert!(!editor.overlay().is_open());
        assert!(surface.listeners.is_empty());
        assert_eq!(editor.confirm_delete(&mut surface), None);
        assert_eq!(track.read().points(), &new[..]);
        assert_eq!(surface.visible_line(), Some(&new));
    }

    #[test]
    fn terminal_edit_rebuilds_line() {
        let mut surface = MockSurface::default();
        let track = Track::from_points(vec![Coord::new(1.0, 1.0)]).shared();
        let mut editor = TrackEditor::new(track.clone(), LineStyle::default(),
                                          None);
        editor.rebuild(&mut surface);

        track.write().push(Coord::new(2.0, 2.0));

        assert!(dispatch(&mut editor, &mut surface,
                         CanvasMsg::TrackChanged).is_none());
        assert_eq!(surface.visible_line(),
                   Some(&vec![Coord::new(1.0, 1.0), Coord::new(2.0, 2.0)]));
        assert!(matches!(dispatch(&mut editor, &mut surface, CanvasMsg::Quit),
                         Some(CanvasMsg::Quit)));
    }
}
