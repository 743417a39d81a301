use crate::elevation::{ElevationError, ElevationResult};

use crossbeam_channel::{Sender, Receiver, unbounded};
use hoydedata::Coord;

/// Messages to the canvas, from the map event handler and from the terminal
/// interface.
#[derive(Debug)]
pub enum CanvasMsg {
    AppendVertex(Coord),
    MoveVertex(usize, Coord),
    PointerDown,
    ContextMenu([f32; 2]),
    TrackChanged,
    ReplaceTrack(Vec<Coord>),
    ResetView,
    Quit,
}

pub struct ElevationRequest {
    pub seq: u64,
    pub path: Vec<Coord>,
    pub sample_count: usize,
    pub reply: ReplySender,
}

#[derive(Debug)]
pub struct ElevationReply {
    pub seq: u64,
    pub result: Result<Vec<ElevationResult>, ElevationError>,
}

pub type CanvasSender = Sender<CanvasMsg>;
pub type CanvasReceiver = Receiver<CanvasMsg>;

pub type ElevationRequestSender = Sender<ElevationRequest>;
pub type ElevationRequestReceiver = Receiver<ElevationRequest>;

pub type ReplySender = Sender<ElevationReply>;
pub type ReplyReceiver = Receiver<ElevationReply>;

pub fn create_canvas_channel() -> (CanvasSender, CanvasReceiver) {
    unbounded()
}

pub fn create_request_channel()
    -> (ElevationRequestSender, ElevationRequestReceiver) {
    unbounded()
}

pub fn create_reply_channel() -> (ReplySender, ReplyReceiver) {
    unbounded()
}
