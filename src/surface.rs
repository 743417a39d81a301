use egui::Pos2;
use hoydedata::Coord;

/// Appearance of the track line.
#[derive(Clone, Debug, PartialEq)]
pub struct LineStyle {
    pub editable: bool,
    pub stroke_color: [u8; 3],
    pub stroke_opacity: f32,
    pub stroke_weight: f32,
}

impl Default for LineStyle {
    fn default() -> Self {
        Self {
            editable: true,
            stroke_color: [0xff, 0, 0],
            stroke_opacity: 1.0,
            stroke_weight: 2.0,
        }
    }
}

impl LineStyle {
    pub fn parse_color(hex: &str) -> Result<[u8; 3], String> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);

        if digits.len() != 6 || !digits.is_ascii() {
            return Err(format!("Invalid color '{}'", hex));
        }

        let mut rgb = [0; 3];

        for (i, c) in rgb.iter_mut().enumerate() {
            *c = u8::from_str_radix(&digits[2*i..2*i + 2], 16)
                .map_err(|_| format!("Invalid color '{}'", hex))?;
        }

        Ok(rgb)
    }

    pub fn rgba(&self) -> [u8; 4] {
        let [r, g, b] = self.stroke_color;
        let a = (self.stroke_opacity.clamp(0.0, 1.0)*255.0).round() as u8;

        [r, g, b, a]
    }
}

/// What a pointer-down event on the map landed on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerTarget {
    Overlay,
    Elsewhere,
}

/// The rendering surface the track editor draws on. The map canvas implements
/// it on top of galileo layers; tests use a recording mock.
pub trait Surface {
    type Line;
    type Listener;

    /// Attach a new line showing `points`.
    fn attach_line(&mut self, points: &[Coord], style: &LineStyle) -> Self::Line;

    /// Detach a line previously returned by `attach_line`.
    fn detach_line(&mut self, line: Self::Line);

    /// Project a coordinate to a pixel position on the surface. None if the
    /// surface has no projection yet.
    fn to_screen(&self, c: &Coord) -> Option<Pos2>;

    fn listen_pointer_down(&mut self) -> Self::Listener;

    fn unlisten(&mut self, listener: Self::Listener);
}

#[cfg(test)]
pub mod mock {
    use super::*;

    /// Surface recording what is attached. Projects east/north straight to
    /// pixels.
    #[derive(Default)]
    pub struct MockSurface {
        pub lines: Vec<(u32, Vec<Coord>)>,
        pub attached: u32,
        pub detached: u32,
        pub listeners: Vec<u32>,
        pub next_id: u32,
        pub no_projection: bool,
    }

    impl MockSurface {
        pub fn visible_line(&self) -> Option<&Vec<Coord>> {
            assert!(self.lines.len() <= 1, "more than one line attached");
            self.lines.first().map(|(_, pts)| pts)
        }
    }

    impl Surface for MockSurface {
        type Line = u32;
        type Listener = u32;

        fn attach_line(&mut self, points: &[Coord], _: &LineStyle) -> u32 {
            self.next_id += 1;
            self.attached += 1;
            self.lines.push((self.next_id, points.to_vec()));
            self.next_id
        }

        fn detach_line(&mut self, line: u32) {
            self.detached += 1;
            self.lines.retain(|(id, _)| *id != line);
        }

        fn to_screen(&self, c: &Coord) -> Option<Pos2> {
            if self.no_projection {
                None
            }
            else {
                Some(Pos2::new(c.e, c.n))
            }
        }

        fn listen_pointer_down(&mut self) -> u32 {
            self.next_id += 1;
            self.listeners.push(self.next_id);
            self.next_id
        }

        fn unlisten(&mut self, listener: u32) {
            let before = self.listeners.len();
            self.listeners.retain(|l| *l != listener);
            assert_eq!(before, self.listeners.len() + 1,
                       "listener removed twice");
        }
    }
}
