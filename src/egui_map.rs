use eframe::AppCreator;
use egui::{Event, Image, ImageSource, Rect, Sense, TextureId, Vec2};
use egui::load::SizedTexture;
use egui_wgpu::RenderState;
use egui_wgpu::wgpu::{FilterMode, TextureView};
use galileo::{Map, Messenger};
use galileo::control::{EventProcessor, MouseButton, RawUserEvent,
                       UserEventHandler};
use galileo::galileo_types::cartesian::{Point2, Size};
use galileo::layer::attribution::Attribution;
use galileo::render::WgpuRenderer;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::runtime::Runtime;

/// Open the map window. A tokio runtime is kept alive in the background for
/// the tile loaders.
pub fn init_with_app(title: &str, app_creator: AppCreator<'_>)
                     -> eframe::Result {
    let rt = Runtime::new().expect("Unable to create Runtime");
    let _enter = rt.enter();

    std::thread::spawn(move || {
        rt.block_on(async {
            loop {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        })
    });

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1000.0, 1000.0])
            .with_min_inner_size([300.0, 220.0]),
        ..Default::default()
    };

    eframe::run_native(title, native_options, app_creator)
}

/// A galileo map rendered to a texture and shown as an egui image.
pub struct EguiMapState {
    map: Map,
    egui_render_state: RenderState,
    renderer: WgpuRenderer,
    requires_redraw: Arc<AtomicBool>,
    texture_id: TextureId,
    texture_view: TextureView,
    event_processor: EventProcessor,
}

impl EguiMapState {
    pub fn new(
        mut map: Map,
        ctx: egui::Context,
        render_state: RenderState,
    ) -> Self {
        let requires_redraw = Arc::new(AtomicBool::new(true));
        let messenger = MapStateMessenger {
            context: ctx,
            requires_redraw: requires_redraw.clone(),
        };

        map.set_messenger(Some(messenger.clone()));
        for layer in map.layers_mut().iter_mut() {
            layer.set_messenger(Box::new(messenger.clone()));
        }

        // Placeholder size until the first frame tells the real one
        let size = Size::new(1, 1);
        map.set_size(size.cast());

        let renderer = WgpuRenderer::new_with_device_and_texture(
            render_state.device.clone(),
            render_state.queue.clone(),
            size,
        );
        let texture = renderer
            .get_target_texture_view()
            .expect("failed to get map texture");
        let texture_id = render_state.renderer.write().register_native_texture(
            &render_state.device,
            &texture,
            FilterMode::Nearest,
        );

        Self {
            map: map,
            egui_render_state: render_state,
            renderer: renderer,
            requires_redraw: requires_redraw,
            texture_id: texture_id,
            texture_view: texture,
            event_processor: EventProcessor::default(),
        }
    }

    pub fn add_handler(&mut self, handler: impl UserEventHandler + 'static) {
        self.event_processor.add_handler(handler);
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut Map {
        &mut self.map
    }

    /// Draw the map into all the available space. Returns the screen
    /// rectangle the map occupies.
    pub fn render(&mut self, ui: &mut egui::Ui) -> Rect {
        let available_size = ui.available_size();
        let map_size = self.renderer.size().cast::<f32>();

        let (rect, response) = ui.allocate_exact_size(available_size,
                                                      Sense::click_and_drag());

        if let Some(attributions) = self.collect_attributions() {
            egui::Window::new("Attributions")
                .collapsible(false)
                .title_bar(false)
                .anchor(egui::Align2::RIGHT_BOTTOM, [-10., -10.])
                .auto_sized()
                .show(ui.ctx(), |ui| {
                    ui.horizontal(|ui| {
                        for (i, a) in attributions.iter().enumerate() {
                            if i > 0 {
                                ui.label(" | ");
                            }
                            Self::show_attribution(ui, a);
                        }
                    });
                });
        }

        // Only while the pointer is over the map or a drag is going on
        if self.event_processor.is_dragging() || response.contains_pointer() {
            let events = ui.input(|input_state| input_state.events.clone());
            self.process_events(&events, [-rect.left(), -rect.top()]);
        }

        self.map.animate();

        if available_size[0] != map_size.width()
            || available_size[1] != map_size.height() {
            self.resize_map(available_size);
        }

        if self.requires_redraw.swap(false, Ordering::Relaxed) {
            self.draw();
        }

        Image::new(ImageSource::Texture(SizedTexture::new(
            self.texture_id,
            Vec2::new(map_size.width(), map_size.height()),
        )))
        .paint_at(ui, rect);

        rect
    }

    fn collect_attributions(&self) -> Option<Vec<Attribution>> {
        let all_layer: Vec<Attribution> = self
            .map
            .layers()
            .iter()
            .filter_map(|layer| layer.attribution())
            .collect();

        if all_layer.is_empty() {
            None
        } else {
            Some(all_layer)
        }
    }

    fn show_attribution(ui: &mut egui::Ui, attribution: &Attribution) {
        if let Some(url) = attribution.get_url() {
            ui.hyperlink_to(attribution.get_text(), url);
        } else {
            ui.label(attribution.get_text());
        }
    }

    fn resize_map(&mut self, size: Vec2) {
        let size = Size::new(size.x as f64, size.y as f64);
        self.map.set_size(size);

        let size = Size::new(size.width() as u32, size.height() as u32);
        self.renderer.resize(size);

        // Resizing creates a new texture, which must be registered with egui
        let texture = self
            .renderer
            .get_target_texture_view()
            .expect("failed to get map texture");
        let texture_id = self
            .egui_render_state
            .renderer
            .write()
            .register_native_texture(
                &self.egui_render_state.device,
                &texture,
                FilterMode::Nearest,
            );

        self.texture_id = texture_id;
        self.texture_view = texture;

        self.map.redraw();
    }

    fn draw(&mut self) {
        self.map.load_layers();
        self.renderer
            .render_to_texture_view(&self.map, &self.texture_view);
    }

    fn process_events(&mut self, events: &[Event], offset: [f32; 2]) {
        for event in events {
            if let Some(raw_event) = Self::convert_event(event, offset) {
                self.event_processor.handle(raw_event, &mut self.map);
            }
        }
    }

    fn convert_event(event: &Event, offset: [f32; 2]) -> Option<RawUserEvent> {
        match event {
            Event::PointerButton {
                button, pressed, ..
            } => {
                let button = match button {
                    egui::PointerButton::Primary => MouseButton::Left,
                    egui::PointerButton::Secondary => MouseButton::Right,
                    egui::PointerButton::Middle => MouseButton::Middle,
                    _ => MouseButton::Other,
                };

                Some(match pressed {
                    true => RawUserEvent::ButtonPressed(button),
                    false => RawUserEvent::ButtonReleased(button),
                })
            }
            Event::PointerMoved(position) => {
                Some(RawUserEvent::PointerMoved(Point2::new(
                    (position.x + offset[0]) as f64,
                    (position.y + offset[1]) as f64,
                )))
            }
            Event::MouseWheel { delta, .. } => {
                let zoom = delta[1] as f64;
                if zoom.abs() < 0.0001 {
                    return None;
                }

                Some(RawUserEvent::Scroll(zoom))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MapStateMessenger {
    pub requires_redraw: Arc<AtomicBool>,
    pub context: egui::Context,
}

impl Messenger for MapStateMessenger {
    fn request_redraw(&self) {
        if !self.requires_redraw.swap(true, Ordering::Relaxed) {
            self.context.request_repaint();
        }
    }
}
