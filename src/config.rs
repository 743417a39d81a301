use crate::panel::DEFAULT_SAMPLE_COUNT;
use crate::surface::LineStyle;

use clap::{arg, ArgMatches};
use config::{*, ext::*};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt::Display;

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MapType {
    Terrain,
    Roadmap,
}

impl MapType {
    pub fn tile_url(&self, z: impl Display, x: impl Display, y: impl Display)
                    -> String {
        match self {
            MapType::Terrain => format!(
                "https://tile.opentopomap.org/{}/{}/{}.png", z, x, y),
            MapType::Roadmap => format!(
                "https://tile.openstreetmap.org/{}/{}/{}.png", z, x, y),
        }
    }
}

#[derive(Deserialize, Serialize, Debug)]
pub struct Config {
    pub maps: String,
    pub headless: bool,
    pub mockup: bool,
    pub elevation: bool,
    pub track_fname: String,
    pub sample_count: usize,
    pub zoom: u32,
    pub map_type: MapType,
    pub stroke_color: String,
    pub stroke_opacity: f32,
    pub stroke_weight: f32,
    pub command: String,
}

lazy_static! {
    pub static ref CONFIG: Config = Config::new();
}

pub const CLAP_STYLING: clap::builder::styling::Styles =
    clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

fn command() -> clap::Command {
    clap::Command::new("sporkart")
        .bin_name("sporkart")
        .styles(CLAP_STYLING)
        .args([
            arg!(-m --maps <DIR> "Directory with height maps"),
            arg!(-t --track <FILE> "Read track from gpx or json file"),
            arg!(-H --headless "Don't show map window"),
            arg!(--mockup "Use generated elevation data"),
            arg!(-e --elevation "Show elevation profile below the map"),
            arg!(--samples <N> "Number of elevation samples")
                .value_parser(clap::value_parser!(usize)),
            arg!(-z --zoom <N> "Initial zoom level")
                .value_parser(clap::value_parser!(u32)),
            arg!(--"map-type" <TYPE> "Background map")
                .value_parser(["terrain", "roadmap"]),
            arg!(--"stroke-color" <HEX> "Track color, e.g. #FF0000"),
        ])
        .subcommand_required(false)
        .subcommand(clap::command!("profile"))
}

impl Config {
    pub fn new() -> Self {
        // Parse command line
        let matches = command().get_matches();

        match Config::from_matches(&matches) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(2);
            },
        }
    }

    pub fn parse_from<I, T>(args: I) -> Result<Self, String>
    where I: IntoIterator<Item = T>, T: Into<OsString> + Clone {
        let matches = command().try_get_matches_from(args)
            .map_err(|e| e.to_string())?;

        Config::from_matches(&matches)
    }

    fn from_matches(matches: &ArgMatches) -> Result<Self, String> {
        let string_arg = |name: &str, default: &str| {
            matches.get_one::<String>(name)
                .cloned()
                .unwrap_or(default.to_string())
        };

        let mut headless = matches.get_flag("headless");
        let mut command = "";

        if let Some((cmd, _)) = matches.subcommand() {
            command = cmd;
            headless = true;
        }

        let maps = string_arg("maps", "/media/ekstern/hoydedata");
        let track_fname = string_arg("track", "");
        let map_type = string_arg("map-type", "terrain");
        let stroke_color = string_arg("stroke-color", "#FF0000");
        LineStyle::parse_color(&stroke_color)?;

        let samples = matches.get_one::<usize>("samples")
            .copied()
            .unwrap_or(DEFAULT_SAMPLE_COUNT)
            .to_string();
        let zoom = matches.get_one::<u32>("zoom")
            .copied()
            .unwrap_or(14)
            .to_string();
        let headless = headless.to_string();
        let mockup = matches.get_flag("mockup").to_string();
        let elevation = matches.get_flag("elevation").to_string();

        // Create config with default settings
        let config = DefaultConfigurationBuilder::new()
            .add_in_memory(&[
                ("maps", maps.as_str()),
                ("headless", headless.as_str()),
                ("mockup", mockup.as_str()),
                ("elevation", elevation.as_str()),
                ("track_fname", track_fname.as_str()),
                ("sample_count", samples.as_str()),
                ("zoom", zoom.as_str()),
                ("map_type", map_type.as_str()),
                ("stroke_color", stroke_color.as_str()),
                ("stroke_opacity", "1.0"),
                ("stroke_weight", "2"),
                ("command", command),
            ])
            .build()
            .map_err(|e| format!("Invalid configuration: {:?}", e))?;

        Ok(config.reify())
    }

    pub fn map_dir(&self) -> String {
        let mut md = self.maps.clone();
        if !md.ends_with("/") {
            md.push('/');
        }

        md
    }

    pub fn line_style(&self) -> LineStyle {
        LineStyle {
            editable: true,
            // Checked when parsing
            stroke_color: LineStyle::parse_color(&self.stroke_color)
                .unwrap_or([0xff, 0, 0]),
            stroke_opacity: self.stroke_opacity,
            stroke_weight: self.stroke_weight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::parse_from(["sporkart"]).unwrap();

        assert!(!config.headless);
        assert!(!config.elevation);
        assert_eq!(config.sample_count, 75);
        assert_eq!(config.zoom, 14);
        assert_eq!(config.map_type, MapType::Terrain);
        assert_eq!(config.track_fname, "");
        assert_eq!(config.line_style(), LineStyle::default());
    }

    #[test]
    fn subcommand_implies_headless() {
        let config = Config::parse_from(["sporkart", "profile"]).unwrap();

        assert!(config.headless);
        assert_eq!(config.command, "profile");
    }

    #[test]
    fn options() {
        let config = Config::parse_from([
            "sporkart", "-e", "--samples", "20", "--map-type", "roadmap",
            "-t", "tur.gpx", "--stroke-color", "#0000ff", "-m", "/data",
        ]).unwrap();

        assert!(config.elevation);
        assert_eq!(config.sample_count, 20);
        assert_eq!(config.map_type, MapType::Roadmap);
        assert_eq!(config.track_fname, "tur.gpx");
        assert_eq!(config.line_style().stroke_color, [0, 0, 255]);
        assert_eq!(config.map_dir(), "/data/");
    }

    #[test]
    fn bad_color_is_rejected() {
        assert!(Config::parse_from(["sporkart", "--stroke-color", "red"])
                .is_err());
    }

    #[test]
    fn tile_urls() {
        assert_eq!(MapType::Terrain.tile_url(14, 1, 2),
                   "https://tile.opentopomap.org/14/1/2.png");
    }
}
