//! Event log (`.dat`) and solution summary (`.sol`) writers.
//!
//! One function per output line kind, a small dispatcher module in the style of a
//! one-file-per-export-kind telemetry split — here there's no Arrow/Parquet schema to
//! build since the target format is a flat, whitespace-delimited text line, so each
//! writer is a plain buffered-`Write` function rather than a record-batch builder.

use std::io::{self, Write};

use crate::ids::{CustId, NodeId, Tick, VehlId};

/// One line of the event log. Each variant corresponds to a single-letter line tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `<t> R <vid> <node> <node> …` — new route committed.
    RouteCommitted { vehicle: VehlId, nodes: Vec<NodeId> },
    /// `<t> V <vid> <node> [<vid> <node> …]` — vehicle positions at time t.
    Positions { positions: Vec<(VehlId, NodeId)> },
    /// `<t> M <vid> [<cid>|−<cid> …]` — match/unmatch committed (negative = remove).
    MatchCommitted {
        vehicle: VehlId,
        added: Vec<CustId>,
        removed: Vec<CustId>,
    },
    /// `<t> P <cid> …` — pickup events.
    Pickups(Vec<CustId>),
    /// `<t> D <cid> …` — dropoff events.
    Dropoffs(Vec<CustId>),
    /// `<t> A <vid> …` — vehicle arrival events.
    Arrivals(Vec<VehlId>),
    /// `<t> T <cid> …` — customer timeout events.
    Timeouts(Vec<CustId>),
}

impl Event {
    /// Render this event as one `.dat` line, without the leading `<t>` (the caller
    /// supplies that via [`EventLog::record`], since the tick is shared context, not
    /// part of the event itself).
    fn render(&self) -> String {
        match self {
            Event::RouteCommitted { vehicle, nodes } => {
                let nodes = nodes.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(" ");
                format!("R {vehicle} {nodes}")
            }
            Event::Positions { positions } => {
                let body = positions
                    .iter()
                    .map(|(v, n)| format!("{v} {n}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("V {body}")
            }
            Event::MatchCommitted { vehicle, added, removed } => {
                let mut parts = vec![vehicle.to_string()];
                parts.extend(added.iter().map(|c| c.to_string()));
                parts.extend(removed.iter().map(|c| format!("-{c}")));
                format!("M {}", parts.join(" "))
            }
            Event::Pickups(ids) => format!("P {}", join(ids)),
            Event::Dropoffs(ids) => format!("D {}", join(ids)),
            Event::Arrivals(ids) => format!("A {}", join(ids)),
            Event::Timeouts(ids) => format!("T {}", join(ids)),
        }
    }
}

fn join<T: std::fmt::Display>(ids: &[T]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(" ")
}

/// A buffered `.dat` event log writer. Boxes its writer (rather than taking `W:
/// Write` as a type parameter) so an [`Engine`](crate::engine::Engine) and
/// [`Harness`](crate::harness::Harness) sharing one log across two threads can both
/// hold an `Arc<Mutex<EventLog>>` without infecting their own type signatures with a
/// writer generic.
pub struct EventLog {
    writer: io::BufWriter<Box<dyn Write + Send>>,
}

impl EventLog {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: io::BufWriter::new(Box::new(writer)),
        }
    }

    /// Append one event at tick `now`, as `<t> <tag> ...`.
    pub fn record(&mut self, now: Tick, event: &Event) -> io::Result<()> {
        writeln!(self.writer, "{now} {}", event.render())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// One-line solution summary (`.sol`): problem name, road, counts, base cost, solution
/// cost, match counts, average pickup delay, average trip delay.
#[derive(Debug, Clone, PartialEq)]
pub struct SolutionSummary {
    pub problem_name: String,
    pub road_network_name: String,
    pub vehicle_count: usize,
    pub customer_count: usize,
    pub base_cost: crate::ids::Meters,
    pub solution_cost: crate::ids::Meters,
    pub matched_count: usize,
    pub canceled_count: usize,
    pub average_pickup_delay: f64,
    pub average_trip_delay: f64,
}

impl SolutionSummary {
    pub fn write_to(&self, mut writer: impl Write) -> io::Result<()> {
        writeln!(
            writer,
            "{} {} {} {} {} {} {} {} {:.3} {:.3}",
            self.problem_name,
            self.road_network_name,
            self.vehicle_count,
            self.customer_count,
            self.base_cost,
            self.solution_cost,
            self.matched_count,
            self.canceled_count,
            self.average_pickup_delay,
            self.average_trip_delay,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn renders_match_line_with_removals_as_negative() {
        let event = Event::MatchCommitted {
            vehicle: VehlId(1),
            added: vec![CustId(3)],
            removed: vec![CustId(2)],
        };
        assert_eq!(event.render(), "M 1 3 -2");
    }

    #[test]
    fn event_log_writes_tagged_lines() {
        let shared = Arc::new(Mutex::new(Vec::new()));
        let mut log = EventLog::new(SharedBuf(shared.clone()));
        log.record(10, &Event::Pickups(vec![CustId(1), CustId(2)])).unwrap();
        log.record(30, &Event::Dropoffs(vec![CustId(1)])).unwrap();
        log.flush().unwrap();
        let text = String::from_utf8(shared.lock().unwrap().clone()).unwrap();
        assert_eq!(text, "10 P 1 2\n30 D 1\n");
    }

    #[test]
    fn timeout_line_matches_scenario_e_shape() {
        let event = Event::Timeouts(vec![CustId(1)]);
        assert_eq!(event.render(), "T 1");
    }

    #[test]
    fn solution_summary_is_one_line() {
        let summary = SolutionSummary {
            problem_name: "prob".into(),
            road_network_name: "roadA".into(),
            vehicle_count: 1,
            customer_count: 1,
            base_cost: 400,
            solution_cost: 400,
            matched_count: 1,
            canceled_count: 0,
            average_pickup_delay: 0.0,
            average_trip_delay: 0.0,
        };
        let mut buf = Vec::new();
        summary.write_to(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "prob roadA 1 1 400 400 1 0 0.000 0.000\n");
    }
}
