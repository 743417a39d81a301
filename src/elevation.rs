use crate::channel::{ElevationReply, ElevationRequest,
                     ElevationRequestReceiver, ElevationRequestSender,
                     ReplySender, create_reply_channel,
                     create_request_channel};

use crossbeam_channel::{RecvTimeoutError, unbounded};
use hoydedata::{Atlas, Coord, MsgReceiver, MsgSender};
use std::time::Duration;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ElevationResult {
    pub location: Coord,
    pub elevation: f64,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ElevationError {
    #[error("Track has no vertices")]
    EmptyPath,
    #[error("Sample count must be positive")]
    NoSamples,
    #[error("No elevation data at {location}: {cause}")]
    NoData { location: String, cause: String },
    #[error("Elevation service unavailable: {0}")]
    Unavailable(String),
}

/// Anything that can tell the elevation at a coordinate. Failures carry
/// their cause.
pub trait ElevationSource {
    fn elevation_at(&self, c: &Coord) -> Result<f64, String>;
}

impl ElevationSource for Atlas {
    fn elevation_at(&self, c: &Coord) -> Result<f64, String> {
        self.lookup(c)
            .map(Into::into)
            .map_err(|e| format!("{:?}", e))
    }
}

// Thread for outputting hoydedata messages
fn hoydedata_output(mrx: MsgReceiver) {
    loop {
        match mrx.recv_timeout(Duration::from_secs(1)) {
            Ok(msg) => {
                log::info!("{}", msg);
            },
            Err(RecvTimeoutError::Disconnected) => {
                break;
            },
            Err(RecvTimeoutError::Timeout) => {
            },
        }
    }
}

/// Open the height model, or a generated one for trying things out.
pub fn open_atlas(mockup: bool) -> Result<Atlas, String> {
    if mockup {
        return Ok(Atlas::new_mockup());
    }

    let (mtx, mrx): (MsgSender, MsgReceiver) = unbounded();

    std::thread::spawn(move || hoydedata_output(mrx));

    Atlas::new(1.0, Some(mtx)).map_err(|e| format!("{:?}", e))
}

/// Pick `count` points spread evenly by distance along the path, both end
/// points included. A path without extent gives `count` copies of its only
/// location.
pub fn sample_path(points: &[Coord], count: usize) -> Vec<Coord> {
    let Some(first) = points.first() else {
        return vec![];
    };

    // Distance from the start to each vertex
    let mut dist = Vec::with_capacity(points.len());
    let mut acc = 0.0;
    dist.push(acc);

    for w in points.windows(2) {
        acc += (w[1] - w[0]).abs();
        dist.push(acc);
    }

    let total = acc;

    if count == 1 || total == 0.0 {
        return vec![*first; count];
    }

    let mut samples = Vec::with_capacity(count);
    let mut seg = 0;

    for i in 0..count {
        let d = total*(i as f32)/((count - 1) as f32);

        // Advance to the segment containing distance d
        while seg + 2 < points.len() && dist[seg + 1] < d {
            seg += 1;
        }

        let (a, b) = (points[seg], points[seg + 1]);
        let len = dist[seg + 1] - dist[seg];

        let c = if len == 0.0 {
            a
        }
        else {
            let t = ((d - dist[seg])/len).clamp(0.0, 1.0);
            a + (b - a)*t
        };

        samples.push(c);
    }

    samples
}

pub fn elevation_along_path<S>(source: &S, points: &[Coord], count: usize)
                               -> Result<Vec<ElevationResult>, ElevationError>
where S: ElevationSource + ?Sized {
    if points.is_empty() {
        return Err(ElevationError::EmptyPath);
    }

    if count == 0 {
        return Err(ElevationError::NoSamples);
    }

    sample_path(points, count).into_iter()
        .map(|c| match source.elevation_at(&c) {
            Ok(h) => Ok(ElevationResult {
                location: c,
                elevation: h,
            }),
            Err(e) => Err(ElevationError::NoData {
                location: c.to_string(),
                cause: e,
            }),
        })
        .collect()
}

// Worker thread owning the elevation source
fn elevation_worker<S, F>(make_source: F,
                          rx: ElevationRequestReceiver)
where F: FnOnce() -> Result<S, String>, S: ElevationSource {
    let source = make_source();

    match &source {
        Ok(_) => log::info!("Elevation service ready"),
        Err(e) => log::warn!("Elevation service unavailable: {}", e),
    }

    for req in rx.iter() {
        let result = match &source {
            Ok(s) => elevation_along_path(s, &req.path, req.sample_count),
            Err(e) => Err(ElevationError::Unavailable(e.clone())),
        };

        log::debug!("Elevation request {} done", req.seq);

        let _ = req.reply.send(ElevationReply {
            seq: req.seq,
            result: result,
        });
    }
}

/// Handle to the elevation worker. Requests are answered on the reply
/// channel given with each request, in the order they were made.
#[derive(Clone)]
pub struct ElevationService {
    tx: ElevationRequestSender,
}

impl ElevationService {
    /// Start the worker. The source is created on the worker thread, so it
    /// does not have to be `Send`.
    pub fn spawn<S, F>(make_source: F) -> Self
    where F: FnOnce() -> Result<S, String> + Send + 'static,
          S: ElevationSource + 'static {
        let (tx, rx) = create_request_channel();

        std::thread::spawn(move || elevation_worker(make_source, rx));

        Self {
            tx: tx,
        }
    }

    pub fn request(&self, seq: u64, path: Vec<Coord>, sample_count: usize,
                   reply: ReplySender) -> Result<(), ElevationError> {
        self.tx.send(ElevationRequest {
            seq: seq,
            path: path,
            sample_count: sample_count,
            reply: reply,
        }).map_err(|_| ElevationError::Unavailable(
            "worker has stopped".to_string()))
    }

    /// Make a request and wait for the answer.
    pub fn elevation_along_path(&self, path: Vec<Coord>, sample_count: usize)
                                -> Result<Vec<ElevationResult>, ElevationError> {
        let (tx, rx) = create_reply_channel();
        self.request(0, path, sample_count, tx)?;

        match rx.recv() {
            Ok(reply) => reply.result,
            Err(_) => Err(ElevationError::Unavailable(
                "worker has stopped".to_string())),
        }
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;

    /// Elevation equal to the north coordinate, no data south of zero.
    pub struct Slope;

    impl ElevationSource for Slope {
        fn elevation_at(&self, c: &Coord) -> Result<f64, String> {
            if c.n < 0.0 {
                Err("south of the map".to_string())
            }
            else {
                Ok(c.n as f64)
            }
        }
    }
}
