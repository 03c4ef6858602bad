use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use intersection_core::approach::{ApproachId, PairId, SignalOutput, approach_by_id};
use intersection_core::controller::{ControllerConfig, IntersectionController, SignalSink};
use intersection_core::repl::catalog;
use intersection_core::repl::grammar::{self, Command};
use intersection_core::repl::status::{StatusFormatter, StatusSnapshot};
use intersection_core::telemetry::{EventId, TelemetryRecorder};
use intersection_core::timing::Millis;

/// Upper bound for a single `advance`, keeping a mistyped duration from stalling the console.
const MAX_ADVANCE_MS: u64 = 10 * 60 * 1_000;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    Interactive,
    SingleRequest,
    CompetingRequests,
    BusyApproach,
    Handoff,
}

impl TranscriptProfile {
    pub const SCENARIOS: [TranscriptProfile; 4] = [
        TranscriptProfile::SingleRequest,
        TranscriptProfile::CompetingRequests,
        TranscriptProfile::BusyApproach,
        TranscriptProfile::Handoff,
    ];

    pub fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::Interactive => "transcripts/emulator-session.log",
            TranscriptProfile::SingleRequest => "transcripts/scenario-single-request.log",
            TranscriptProfile::CompetingRequests => "transcripts/scenario-competing-requests.log",
            TranscriptProfile::BusyApproach => "transcripts/scenario-busy-approach.log",
            TranscriptProfile::Handoff => "transcripts/scenario-handoff.log",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Interactive => "Intersection emulator session transcript",
            TranscriptProfile::SingleRequest => "Single request served after the arbitration window",
            TranscriptProfile::CompetingRequests => "Both pairs request within one window",
            TranscriptProfile::BusyApproach => "Busy approach earns the longest green",
            TranscriptProfile::Handoff => "Caution handoff between pairs",
        }
    }

    /// Pair granted GO at start-up; the interactive console boots like the firmware.
    pub fn config(self) -> ControllerConfig {
        match self {
            TranscriptProfile::Interactive => {
                ControllerConfig::default().with_initial_pair(PairId::A)
            }
            _ => ControllerConfig::default(),
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        let profile = match tag.to_ascii_lowercase().as_str() {
            "interactive" | "session" => Self::Interactive,
            "single" | "single-request" => Self::SingleRequest,
            "competing" | "competing-requests" => Self::CompetingRequests,
            "busy" | "busy-approach" => Self::BusyApproach,
            "handoff" => Self::Handoff,
            _ => return Err(format!("Unknown transcript profile `{tag}`")),
        };
        Ok(profile)
    }
}

/// Sink that buffers head changes until the session prints them.
#[derive(Default)]
pub struct ConsoleSignalSink {
    changes: Vec<(ApproachId, SignalOutput)>,
}

impl ConsoleSignalSink {
    fn drain(&mut self) -> impl Iterator<Item = (ApproachId, SignalOutput)> + '_ {
        self.changes.drain(..)
    }
}

impl SignalSink for ConsoleSignalSink {
    fn set_signal(&mut self, approach: ApproachId, output: SignalOutput) {
        self.changes.push((approach, output));
    }
}

pub struct Session {
    controller: IntersectionController<ConsoleSignalSink>,
    telemetry: TelemetryRecorder<Millis>,
    cursor: EventId,
    now: Millis,
    transcript: TranscriptLogger,
}

impl Session {
    pub fn new(profile: TranscriptProfile) -> io::Result<Self> {
        Self::with_config(profile, profile.config())
    }

    pub fn with_config(profile: TranscriptProfile, config: ControllerConfig) -> io::Result<Self> {
        let transcript = TranscriptLogger::new(profile)?;
        let mut controller = IntersectionController::new(config, ConsoleSignalSink::default());
        // Bring-up writes are not interesting on the console.
        controller.sink_mut().drain().for_each(drop);

        Ok(Self {
            controller,
            telemetry: TelemetryRecorder::new(),
            cursor: 0,
            now: Millis::ZERO,
            transcript,
        })
    }

    pub fn now(&self) -> Millis {
        self.now
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        self.transcript
            .append_line(self.now, TranscriptRole::Host, trimmed)?;

        let lines = match grammar::parse(trimmed) {
            Ok(Command::Detect(approach)) => self.handle_detect(approach),
            Ok(Command::Advance(duration)) => {
                let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
                if millis > MAX_ADVANCE_MS {
                    vec![format!("ERR advance limited to {MAX_ADVANCE_MS}ms")]
                } else {
                    self.handle_advance(millis)
                }
            }
            Ok(Command::Status) => self.handle_status(),
            Ok(Command::Help(help)) => handle_help(help.topic),
            Err(err) => vec![format!("ERR syntax {err}")],
        };

        self.record_output(&lines)?;
        Ok(lines)
    }

    fn handle_detect(&mut self, approach: ApproachId) -> Vec<String> {
        let verdict = self
            .controller
            .on_vehicle_detected(approach, self.now, &mut self.telemetry);
        let mut lines = Vec::new();
        self.collect_activity(&mut lines);
        lines.push(if verdict.is_accepted() {
            format!("OK detect {approach}")
        } else {
            format!("OK detect {approach} (debounced)")
        });
        lines
    }

    fn handle_advance(&mut self, millis: u64) -> Vec<String> {
        let mut lines = Vec::new();
        let step = self.controller.config().timing.tick_period_ms.max(1);
        let mut elapsed: u64 = 0;
        while elapsed < millis {
            let remaining = u32::try_from(millis - elapsed).unwrap_or(u32::MAX);
            let tick = step.min(remaining);
            self.now = self.now.offset(tick);
            elapsed += u64::from(tick);
            self.controller.on_tick(self.now, &mut self.telemetry);
            self.collect_activity(&mut lines);
        }
        lines.push(format!("OK now={}", self.now));
        lines
    }

    fn handle_status(&self) -> Vec<String> {
        let snapshot = StatusSnapshot::capture(&self.controller, self.now);
        let mut lines = vec![format!("time {}", self.now)];
        match StatusFormatter::new(&snapshot).to_lines() {
            Ok(rendered) => lines.extend(rendered),
            Err(_) => lines.push("ERR status line overflow".to_string()),
        }
        lines
    }

    /// Turns fresh telemetry and head changes into console lines.
    fn collect_activity(&mut self, lines: &mut Vec<String>) {
        for record in self.telemetry.since(self.cursor) {
            let level = if record.event.is_warning() { "WARN" } else { "EVT" };
            lines.push(format!("{level} t={} {record}", record.timestamp));
        }
        self.cursor = self.telemetry.next_event_id();

        for (approach, output) in self.controller.sink_mut().drain() {
            lines.push(format!(
                "SIG {} {}",
                approach_by_id(approach).name,
                output_label(output)
            ));
        }
    }

    fn record_output(&mut self, lines: &[String]) -> io::Result<()> {
        for line in lines {
            self.transcript
                .append_line(self.now, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

fn handle_help(topic: Option<&str>) -> Vec<String> {
    match topic {
        Some(target) => match catalog::find(target) {
            Some(spec) => vec![format!("{:<20} - {}", spec.usage, spec.summary)],
            None => {
                let names: Vec<&str> = catalog::commands().iter().map(|spec| spec.name).collect();
                vec![
                    format!("No help available for `{target}`."),
                    format!("Available topics: {}", names.join(", ")),
                ]
            }
        },
        None => {
            let mut lines = vec!["Available commands:".to_string()];
            for spec in catalog::commands() {
                lines.push(format!("  {:<20} - {}", spec.usage, spec.summary));
            }
            lines.push("Type `help <command>` for a specific command.".to_string());
            lines
        }
    }
}

fn output_label(output: SignalOutput) -> &'static str {
    match output {
        SignalOutput::Stop => "stop",
        SignalOutput::Caution => "caution",
        SignalOutput::Go => "go",
        SignalOutput::Off => "off",
    }
}

#[derive(Clone, Copy)]
enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let path = Path::new(profile.log_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header(profile)?;
        Ok(logger)
    }

    fn write_header(&mut self, profile: TranscriptProfile) -> io::Result<()> {
        writeln!(self.writer, "# {}", profile.header())?;
        writeln!(
            self.writer,
            "# Timestamps are simulated controller milliseconds"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(&mut self, now: Millis, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            now.ticks(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}
