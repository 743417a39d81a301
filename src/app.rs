use crate::channel::{CanvasMsg, CanvasSender};
use crate::elevation::ElevationService;
use crate::track::{SharedTrack, Track};

use cmdui::{CmdApp, CmdUI, CommandPart, KeywordExpander};
use hoydedata::Coord;
use std::ops::Range;

const COMMAND_LIST: &'static [&'static str] = &[
    "add point <coord>",
    "rm point <pos>",
    "show track",
    "show profile",
    "open track <filename>",
    "store track <filename>",
    "help",
];

pub fn run_cmdui(app: &mut App) {
    let kw_exp = SporKeywordExpander::new();
    CmdUI::new(app, Some(&kw_exp)).read_commands();
}

pub struct SporKeywordExpander {
}

impl SporKeywordExpander {
    pub fn new() -> Self {
        Self {}
    }
}

impl KeywordExpander for SporKeywordExpander {
    fn command_list<'a>(&self) -> &'a [&'a str] {
        return COMMAND_LIST;
    }

    fn expand_keyword(&self, cp: &CommandPart, parts: &Vec<String>)
                      -> Vec<String> {
        let lpart = &parts[parts.len() - 1];

        match cp.as_str() {
            "<filename>"  => { self.expand_filename(lpart) },
            s             => { vec![s.to_string()] },
        }
    }
}

/// Terminal interface to the track. Shares the track with the map window,
/// if there is one, and tells it to redraw after each change.
pub struct App {
    track: SharedTrack,
    track_fname: String,
    track_stored: bool,
    elevation: ElevationService,
    sample_count: usize,
    opt_tx: Option<CanvasSender>,
}

impl App {
    pub fn new(track: SharedTrack, track_fname: &str,
               elevation: ElevationService, sample_count: usize,
               opt_tx: Option<CanvasSender>) -> Self {
        Self {
            track: track,
            track_fname: track_fname.to_string(),
            track_stored: true,
            elevation: elevation,
            sample_count: sample_count,
            opt_tx: opt_tx,
        }
    }

    pub fn track(&self) -> &SharedTrack {
        &self.track
    }

    pub fn parse_int_range(intstr: &str, range: Range<usize>)
                           -> Result<usize, String> {
        if let Ok(length) = intstr.parse() {
            if range.contains(&length) {
                return Ok(length);
            }
            else {
                if range.len() == 1 {
                    return Err(format!("Expected number {}", range.start));
                }
                else {
                    return Err(format!("Expected number in range {}..{}",
                                       range.start, range.end - 1));
                }
            }
        }
        else {
            return Err(format!("Expected number, got '{}'", intstr));
        }
    }

    fn parse_coord(&self, coordstr: &str) -> Result<Coord, String> {
        if let Ok(coord) = coordstr.parse() {
            return Ok(coord);
        }
        else {
            return Err(format!("Expected coord, got '{}'", coordstr));
        }
    }

    fn add_point(&mut self, args: &Vec<String>) -> Result<(), String> {
        if args.len() != 1 {
            return Err("Expected one argument".to_string());
        }

        let c = self.parse_coord(&args[0])?;
        self.track.write().push(c);
        self.track_changed();
        Ok(())
    }

    fn rm_point(&mut self, args: &Vec<String>) -> Result<(), String> {
        let len = self.track.read().len();

        if len == 0 {
            return Err("No points defined".to_string());
        }

        if args.len() != 1 {
            return Err("Expected one argument".to_string());
        }

        // Positions are counted from 1
        let n = App::parse_int_range(&args[0], 1..len + 1)? - 1;
        self.track.write().remove(n).map_err(|e| e.to_string())?;
        self.track_changed();
        Ok(())
    }

    fn show_track(&self) {
        let track = self.track.read();

        if track.is_empty() {
            println!("No track");
        }
        else {
            track.print_summary();
        }
    }

    pub fn show_profile(&self) -> Result<(), String> {
        let points = self.track.read().points().to_vec();
        let results = self.elevation
            .elevation_along_path(points, self.sample_count)
            .map_err(|e| format!("Cannot show elevation profile: {}", e))?;

        println!("Sample    Elevation (m)");
        for (i, r) in results.iter().enumerate() {
            println!("{:6}    {:8.1}", i + 1, r.elevation);
        }

        Ok(())
    }

    fn open_track(&mut self, fname: &str) -> Result<(), String> {
        let t = Track::read(fname).map_err(|e| e.to_string())?;
        let points = t.points().to_vec();
        self.track_fname = fname.to_string();
        self.track_stored = true;

        // With a map window, the canvas replaces the track after closing the
        // delete menu
        if let Some(tx) = &self.opt_tx {
            let _ = tx.send(CanvasMsg::ReplaceTrack(points));
            let _ = tx.send(CanvasMsg::ResetView);
        }
        else {
            self.track.write().replace(points);
        }

        Ok(())
    }

    fn store_track(&mut self, opt_fname: Option<&str>) -> Result<(), String> {
        if let Some(fname) = opt_fname {
            self.track_fname = fname.to_string();
        }

        if self.track_fname == "" {
            return Err("Missing filename.".to_string());
        }

        self.track.read().write(&self.track_fname, "Sporkart")
            .map_err(|e| e.to_string())?;
        self.track_stored = true;
        println!("Track stored to {}", &self.track_fname);

        Ok(())
    }

    fn help(&self) {
        println!("{}", COMMAND_LIST.join("\n"));
    }

    fn expects_num_arguments(parts: &Vec<String>, n: usize)
                             -> Result<(), String> {
        if parts.len() < n {
            return Err(format!("Expected {} arguments", n));
        }
        else {
            return Ok(());
        }
    }

    fn track_changed(&mut self) {
        self.track_stored = false;

        if let Some(tx) = &self.opt_tx {
            let _ = tx.send(CanvasMsg::TrackChanged);
        }
    }
}

impl CmdApp for App {
    fn command_list<'a>(&self) -> &'a [&'a str] {
        return COMMAND_LIST;
    }

    fn execute_line(&mut self, cmd: &str, args: &Vec<String>)
                    -> Result<(), String> {
        log::debug!("Executing command {} - {}", cmd, args.join(" "));
        match cmd {
            "add point" => {
                self.add_point(args)?;
            },
            "rm point" => {
                self.rm_point(args)?;
            },
            "show track" => {
                self.show_track();
            },
            "show profile" => {
                self.show_profile()?;
            },
            "open track" => {
                App::expects_num_arguments(args, 1)?;
                self.open_track(&args[0])?;
            },
            "store track" => {
                self.store_track(<dyn CmdApp>::opt_part(args, 0))?;
            },
            "help" => {
                self.help();
            },
            _ => {
                unreachable!("Bad command");
            },
        }

        Ok(())
    }

    fn exit(&mut self) {
        if !self.track_stored {
            println!("Save track to {}? (Y/n)", &self.track_fname);
            if self.confirm_yes_no() {
                if let Err(e) = self.store_track(None) {
                    println!("{}", e);
                }
            }
        }

        if let Some(tx) = &self.opt_tx {
            let _ = tx.send(CanvasMsg::Quit);
        }
    }
}
