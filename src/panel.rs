use crate::channel::{ElevationReply, ReplyReceiver, ReplySender,
                     create_reply_channel};
use crate::elevation::{ElevationResult, ElevationService};
use crate::track::Track;

use crossbeam_channel::RecvTimeoutError;
use egui::Color32;
use egui_plot::{Bar, BarChart, Legend, Plot};
use std::time::{Duration, Instant};

pub const DEFAULT_SAMPLE_COUNT: usize = 75;

#[derive(Clone, Debug, PartialEq)]
pub struct ChartRow {
    pub sample: String,
    pub elevation: f64,
}

/// Data handed to the chart. One row per elevation sample.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChartTable {
    rows: Vec<ChartRow>,
}

impl ChartTable {
    pub const COLUMNS: [&'static str; 2] = ["Sample", "Elevation"];

    pub fn from_results(results: &[ElevationResult]) -> Self {
        Self {
            rows: results.iter()
                .map(|r| ChartRow {
                    sample: String::new(),
                    elevation: r.elevation,
                })
                .collect(),
        }
    }

    pub fn rows(&self) -> &[ChartRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct ChartOptions {
    pub background_color: Color32,
    pub height: f32,
    pub legend: bool,
    pub title: String,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            background_color: Color32::WHITE,
            height: 150.0,
            legend: false,
            title: "Elevation (m)".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ChartContent {
    Empty,
    Data(ChartTable),
    Error(String),
}

/// Bar chart of the elevation along the track. Each refresh sends one
/// request to the elevation service; answers are picked up by `poll`.
/// Answers older than the last one shown are dropped.
pub struct ElevationPanel {
    service: ElevationService,
    sample_count: usize,
    options: ChartOptions,
    tx: ReplySender,
    rx: ReplyReceiver,
    last_seq: u64,
    applied_seq: u64,
    content: ChartContent,
}

impl ElevationPanel {
    pub fn new(service: ElevationService, sample_count: usize,
               options: ChartOptions) -> Self {
        let (tx, rx) = create_reply_channel();

        Self {
            service: service,
            sample_count: sample_count,
            options: options,
            tx: tx,
            rx: rx,
            last_seq: 0,
            applied_seq: 0,
            content: ChartContent::Empty,
        }
    }

    pub fn content(&self) -> &ChartContent {
        &self.content
    }

    pub fn is_pending(&self) -> bool {
        self.applied_seq < self.last_seq
    }

    /// Request a new profile for the track. Returns the request's sequence
    /// number.
    pub fn refresh(&mut self, track: &Track) -> u64 {
        self.last_seq += 1;
        let seq = self.last_seq;

        log::debug!("Requesting elevation profile {} ({} samples)", seq,
                    self.sample_count);

        if let Err(e) = self.service.request(seq, track.points().to_vec(),
                                             self.sample_count,
                                             self.tx.clone()) {
            self.apply(ElevationReply {
                seq: seq,
                result: Err(e),
            });
        }

        seq
    }

    /// Show the answer to a request. Returns false if it was dropped for
    /// being older than what is shown.
    pub fn apply(&mut self, reply: ElevationReply) -> bool {
        if reply.seq <= self.applied_seq {
            log::debug!("Dropping stale elevation profile {}", reply.seq);
            return false;
        }

        self.applied_seq = reply.seq;
        self.content = match reply.result {
            Ok(results) => ChartContent::Data(
                ChartTable::from_results(&results)),
            Err(e) => {
                log::warn!("Elevation request failed: {}", e);
                ChartContent::Error(
                    format!("Cannot show elevation profile: {}", e))
            },
        };

        true
    }

    /// Apply all answers that have arrived. Returns true if the chart
    /// changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;

        while let Ok(reply) = self.rx.try_recv() {
            changed |= self.apply(reply);
        }

        changed
    }

    /// Block until the latest request has been answered or the timeout
    /// runs out. Returns true if it was answered.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        while self.is_pending() {
            let left = deadline.saturating_duration_since(Instant::now());

            match self.rx.recv_timeout(left) {
                Ok(reply) => {
                    self.apply(reply);
                },
                Err(RecvTimeoutError::Timeout) => {
                    return false;
                },
                Err(RecvTimeoutError::Disconnected) => {
                    return false;
                },
            }
        }

        true
    }

    pub fn show(&self, ui: &mut egui::Ui) {
        egui::Frame::default()
            .fill(self.options.background_color)
            .show(ui, |ui| {
                ui.label(&self.options.title);

                match &self.content {
                    ChartContent::Empty => {
                        ui.label("No elevation data");
                    },
                    ChartContent::Error(msg) => {
                        ui.colored_label(Color32::RED, msg);
                    },
                    ChartContent::Data(table) => {
                        let bars = table.rows().iter().enumerate()
                            .map(|(i, row)| Bar::new(i as f64, row.elevation)
                                 .name(&row.sample))
                            .collect();
                        let chart = BarChart::new(bars)
                            .name(ChartTable::COLUMNS[1]);

                        let mut plot = Plot::new("elevation_profile")
                            .height(self.options.height)
                            .allow_drag(false)
                            .allow_zoom(false)
                            .allow_scroll(false);

                        if self.options.legend {
                            plot = plot.legend(Legend::default());
                        }

                        plot.show(ui, |plot_ui| plot_ui.bar_chart(chart));
                    },
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ElevationReply;
    use crate::elevation::ElevationError;
    use crate::elevation::mock::Slope;
    use hoydedata::Coord;

    const WAIT: Duration = Duration::from_secs(5);

    fn two_points() -> Track {
        Track::from_points(vec![Coord::new(0.0, 0.0), Coord::new(0.0, 740.0)])
    }

    fn panel() -> ElevationPanel {
        ElevationPanel::new(ElevationService::spawn(|| Ok(Slope)),
                            DEFAULT_SAMPLE_COUNT, ChartOptions::default())
    }

    #[test]
    fn profile_has_one_row_per_sample() {
        let mut panel = panel();

        panel.refresh(&two_points());
        assert!(panel.wait(WAIT));

        let ChartContent::Data(table) = panel.content() else {
            panic!("expected data, got {:?}", panel.content());
        };

        assert_eq!(table.len(), 75);
        assert!(table.rows().iter().all(|r| r.sample.is_empty()));
        assert!((table.rows()[74].elevation - 740.0).abs() < 0.1);
        assert!((table.rows()[1].elevation - 10.0).abs() < 0.1);
    }

    #[test]
    fn failure_shows_cause() {
        let service = ElevationService::spawn(
            || Err::<Slope, _>("map directory missing".to_string()));
        let mut panel = ElevationPanel::new(service, DEFAULT_SAMPLE_COUNT,
                                            ChartOptions::default());

        panel.refresh(&two_points());
        assert!(panel.wait(WAIT));

        let ChartContent::Error(msg) = panel.content() else {
            panic!("expected error, got {:?}", panel.content());
        };

        assert!(msg.contains("map directory missing"));
    }

    #[test]
    fn empty_track_is_an_error() {
        let mut panel = panel();

        panel.refresh(&Track::new());
        assert!(panel.wait(WAIT));

        assert_eq!(panel.content(), &ChartContent::Error(
            format!("Cannot show elevation profile: {}",
                    ElevationError::EmptyPath)));
    }

    #[test]
    fn stale_replies_are_dropped() {
        let mut panel = panel();
        let newer = ElevationReply {
            seq: 2,
            result: Ok(vec![]),
        };
        let older = ElevationReply {
            seq: 1,
            result: Err(ElevationError::EmptyPath),
        };

        assert!(panel.apply(newer));
        assert!(!panel.apply(older));
        assert_eq!(panel.content(), &ChartContent::Data(ChartTable::default()));
    }

    #[test]
    fn later_refresh_wins() {
        let mut panel = panel();
        let mut track = two_points();

        panel.refresh(&track);
        track.push(Coord::new(0.0, 1480.0));
        panel.refresh(&track);
        assert!(panel.wait(WAIT));
        assert!(!panel.is_pending());

        let ChartContent::Data(table) = panel.content() else {
            panic!("expected data");
        };

        assert!((table.rows()[74].elevation - 1480.0).abs() < 0.1);
    }

    #[test]
    fn poll_without_replies_changes_nothing() {
        let mut panel = panel();

        assert!(!panel.poll());
        assert_eq!(panel.content(), &ChartContent::Empty);
    }
}
