use geo_types::Point;
use gpx::{Gpx, GpxVersion, Metadata, Track as GpxTrack, TrackSegment, Waypoint};
use hoydedata::Coord;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::sync::Arc;
use thiserror::Error;

// Track drawn when no track file is given (lat, lon)
const SEED_LATLON: [(f64, f64); 3] = [
    (68.64707602559126, 23.24568533956898),
    (68.64815309781908, 23.234119862631882),
    (68.64898339551324, 23.232691904630304),
];

/// The track is shared between the canvas and the terminal interface.
pub type SharedTrack = Arc<RwLock<Track>>;

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("No vertex at position {index} (track has {len} vertices)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Unable to access {fname}: {source}")]
    Io {
        fname: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid gpx file {0}: {1}")]
    Gpx(String, String),
    #[error("Invalid json file {0}: {1}")]
    Json(String, String),
    #[error("File {0} contains no track")]
    NoTrack(String),
    #[error("Filename must end with .gpx or .json")]
    BadExtension,
}

/// Ordered sequence of vertices making up the drawn track. Insertion order is
/// track order. Removing a vertex shifts the later indices down by one.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Track {
    points: Vec<Coord>,
}

impl Track {
    pub fn new() -> Self {
        Self {
            points: vec![],
        }
    }

    pub fn from_points(points: Vec<Coord>) -> Self {
        Self {
            points: points,
        }
    }

    pub fn seed() -> Self {
        Self::from_points(SEED_LATLON.iter()
                          .map(|(lat, lon)| Coord::from_latlon(*lat, *lon))
                          .collect())
    }

    pub fn shared(self) -> SharedTrack {
        Arc::new(RwLock::new(self))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<Coord> {
        self.points.get(i).copied()
    }

    pub fn points(&self) -> &[Coord] {
        &self.points
    }

    pub fn push(&mut self, c: Coord) {
        self.points.push(c);
    }

    pub fn remove(&mut self, i: usize) -> Result<Coord, TrackError> {
        if i >= self.points.len() {
            return Err(TrackError::IndexOutOfRange {
                index: i,
                len: self.points.len(),
            });
        }

        Ok(self.points.remove(i))
    }

    /// Move vertex `i` to `c`. Returns the old position.
    pub fn set(&mut self, i: usize, c: Coord) -> Result<Coord, TrackError> {
        let len = self.points.len();
        let Some(p) = self.points.get_mut(i) else {
            return Err(TrackError::IndexOutOfRange {
                index: i,
                len: len,
            });
        };

        Ok(std::mem::replace(p, c))
    }

    pub fn replace(&mut self, points: Vec<Coord>) {
        self.points = points;
    }

    /// Length of the track in meters
    pub fn length(&self) -> f32 {
        self.points.windows(2)
            .map(|w| (w[1] - w[0]).abs())
            .sum()
    }

    pub fn read(fname: &str) -> Result<Self, TrackError> {
        if fname.ends_with(".gpx") {
            Track::read_gpx(fname)
        }
        else if fname.ends_with(".json") {
            Track::read_json(fname)
        }
        else {
            Err(TrackError::BadExtension)
        }
    }

    pub fn write(&self, fname: &str, name: &str) -> Result<(), TrackError> {
        if fname.ends_with(".gpx") {
            self.write_gpx(fname, name)
        }
        else if fname.ends_with(".json") {
            self.write_json(fname)
        }
        else {
            Err(TrackError::BadExtension)
        }
    }

    pub fn read_gpx(fname: &str) -> Result<Self, TrackError> {
        let file = File::open(fname).map_err(|e| TrackError::Io {
            fname: fname.to_string(),
            source: e,
        })?;
        let reader = BufReader::new(file);

        let gpx: Gpx = gpx::read(reader)
            .map_err(|e| TrackError::Gpx(fname.to_string(), e.to_string()))?;

        // Assume first segment of the first track is the one to use.
        let Some(segment) = gpx.tracks.first()
            .and_then(|t| t.segments.first()) else {
            return Err(TrackError::NoTrack(fname.to_string()));
        };

        let points = segment.points.iter()
            .map(|wp| Coord::from_latlon(wp.point().y(), wp.point().x()))
            .collect();

        Ok(Self::from_points(points))
    }

    pub fn write_gpx(&self, fname: &str, name: &str) -> Result<(), TrackError> {
        // Coordinates in the gpx file are stored in the WGS-84 system.
        let points = self.points.iter()
            .map(|p| {
                let (lat, lon) = p.latlon();
                Waypoint::new(Point::new(lon, lat))
            })
            .collect();

        let track = GpxTrack {
            name: Some(name.to_string()),
            comment: None,
            description: None,
            source: None,
            links: vec![],
            type_: None,
            number: None,
            segments: vec![TrackSegment { points: points }],
        };
        let gpx = Gpx {
            version: GpxVersion::Gpx11,
            creator: None,
            metadata: Some(Metadata {
                name: Some(name.to_string()),
                description: None,
                author: None,
                links: vec![],
                time: None,
                keywords: None,
                copyright: None,
                bounds: None,
            }),
            waypoints: vec![],
            tracks: vec![track],
            routes: vec![],
        };

        let file = File::create(fname).map_err(|e| TrackError::Io {
            fname: fname.to_string(),
            source: e,
        })?;

        gpx::write(&gpx, BufWriter::new(file))
            .map_err(|e| TrackError::Gpx(fname.to_string(), e.to_string()))
    }

    pub fn read_json(fname: &str) -> Result<Self, TrackError> {
        let data = fs::read_to_string(fname).map_err(|e| TrackError::Io {
            fname: fname.to_string(),
            source: e,
        })?;

        serde_json::from_str::<Track>(&data)
            .map_err(|e| TrackError::Json(fname.to_string(), e.to_string()))
    }

    pub fn write_json(&self, fname: &str) -> Result<(), TrackError> {
        let data = serde_json::to_string(&self)
            .map_err(|e| TrackError::Json(fname.to_string(), e.to_string()))?;

        fs::write(fname, data).map_err(|e| TrackError::Io {
            fname: fname.to_string(),
            source: e,
        })
    }

    pub fn print_summary(&self) {
        println!("Track: {}", self);
        for (i, p) in self.points.iter().enumerate() {
            println!("  {:3}  {}", i + 1, p);
        }
        println!("Length: {:.0}m", self.length());
    }
}

impl fmt::Display for Track {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.points.first(), self.points.last()) {
            (Some(a), Some(b)) => {
                write!(formatter, "{} -> {} ({} pts)", a, b, self.points.len())
            },
            _ => {
                write!(formatter, "empty")
            },
        }
    }
}
