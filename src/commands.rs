//! Operator command interpreter
//!
//! Text commands from the console (or any other line source) are parsed into
//! a [`Command`], checked against the lattice, and only then applied. A
//! rejected command never leaves the plant half-modified.

use log::{info, warn};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::alarm::AlarmMode;
use crate::error::{CommandError, CommandResult};
use crate::lattice::{ElementId, ElementKind};
use crate::procedures::{self, PRESSURE_STEP, PUMP_STEP, ROD_STEP, STARTUP_PUMP_FLOW};
use crate::ramp::RampTarget;
use crate::reactor::{Reactor, EVENT_LOG_CAPACITY};
use crate::state::{PumpId, MAX_PRESSURE_BAR};

/// Highest accepted sensor override [K]
pub const MAX_SENSOR_TEMP_K: f64 = 3500.0;

/// Highest accepted pump flow
pub const MAX_PUMP_FLOW: f64 = 200.0;

/// Lines shown by `log` without an argument
pub const DEFAULT_LOG_LINES: usize = 10;

pub const HELP: &[&str] = &[
    "start                          begin the startup sequence",
    "scram                          emergency shutdown",
    "set <id|*> <0-100> [/override] ramp rod insertion (* = manual rods, /override adds auto rods)",
    "temp <sensor-id> <0-3500>      pin a temperature sensor reading [K]",
    "pressure <0-200>               ramp system pressure [bar]",
    "pump <id|*> <flow|on|off>      ramp pump flow (on = 120, off = 0)",
    "reset                          restore defaults, reactor offline",
    "stage <cmd> | run | clear | list",
    "arccs [accept|reject|on|off]   supervisory controller recommendations",
    "status [json]                  plant status",
    "info <id>                      element details",
    "log [n]                        recent events",
    "help                           this list",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RodSelector {
    One(ElementId),
    /// `*`: every manual rod, plus the auto rods with `/override`
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpSelector {
    One(PumpId),
    All,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PumpSetting {
    Flow(f64),
    On,
    Off,
}

impl PumpSetting {
    fn flow(self) -> f64 {
        match self {
            PumpSetting::Flow(f) => f,
            PumpSetting::On => STARTUP_PUMP_FLOW,
            PumpSetting::Off => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageAction {
    Add(String),
    Run,
    Clear,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArccsAction {
    Show,
    Accept,
    Reject,
    Enable,
    Disable,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Scram,
    Set {
        rods: RodSelector,
        insertion: f64,
        override_auto: bool,
    },
    Temp {
        sensor: ElementId,
        kelvin: f64,
    },
    Pressure(f64),
    Pump {
        pumps: PumpSelector,
        setting: PumpSetting,
    },
    Reset,
    Stage(StageAction),
    Arccs(ArccsAction),
    Status {
        json: bool,
    },
    Help,
    Info(ElementId),
    Log(usize),
}

fn parse_id(token: &str) -> CommandResult<ElementId> {
    token
        .parse()
        .map_err(|_| CommandError::validation(format!("Invalid id '{token}'")))
}

fn parse_value(token: &str, what: &str, min: f64, max: f64) -> CommandResult<f64> {
    let value: f64 = token
        .parse()
        .ok()
        .filter(|v: &f64| v.is_finite())
        .ok_or_else(|| CommandError::validation(format!("Invalid {what} '{token}'")))?;
    if !(min..=max).contains(&value) {
        return Err(CommandError::validation(format!(
            "{what} must be between {min} and {max}, got {value}"
        )));
    }
    Ok(value)
}

fn expect_args(tokens: &[&str], min: usize, max: usize, usage: &str) -> CommandResult<()> {
    let n = tokens.len() - 1;
    if n < min || n > max {
        return Err(CommandError::validation(format!("Usage: {usage}")));
    }
    Ok(())
}

/// Parse one command line. Checks syntax and ranges only; whether ids exist
/// is checked by the interpreter when the line is staged or executed.
pub fn parse(line: &str) -> CommandResult<Command> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some(&head) = tokens.first() else {
        return Err(CommandError::validation("Empty command"));
    };

    match head.to_ascii_lowercase().as_str() {
        "start" => expect_args(&tokens, 0, 0, "start").map(|_| Command::Start),
        "scram" => expect_args(&tokens, 0, 0, "scram").map(|_| Command::Scram),
        "reset" => expect_args(&tokens, 0, 0, "reset").map(|_| Command::Reset),
        "help" => Ok(Command::Help),
        "set" => {
            let usage = "set <id|*> <0-100> [/override]";
            expect_args(&tokens, 2, 3, usage)?;
            let override_auto = match tokens.get(3) {
                None => false,
                Some(&"/override") => true,
                Some(_) => return Err(CommandError::validation(format!("Usage: {usage}"))),
            };
            let rods = match tokens[1] {
                "*" => RodSelector::All,
                id => RodSelector::One(parse_id(id)?),
            };
            let insertion = parse_value(tokens[2], "Insertion", 0.0, 100.0)?;
            Ok(Command::Set {
                rods,
                insertion,
                override_auto,
            })
        }
        "temp" => {
            expect_args(&tokens, 2, 2, "temp <sensor-id> <0-3500>")?;
            Ok(Command::Temp {
                sensor: parse_id(tokens[1])?,
                kelvin: parse_value(tokens[2], "Temperature", 0.0, MAX_SENSOR_TEMP_K)?,
            })
        }
        "pressure" => {
            expect_args(&tokens, 1, 1, "pressure <0-200>")?;
            parse_value(tokens[1], "Pressure", 0.0, MAX_PRESSURE_BAR).map(Command::Pressure)
        }
        "pump" => {
            expect_args(&tokens, 2, 2, "pump <id|*> <flow|on|off>")?;
            let pumps = match tokens[1] {
                "*" => PumpSelector::All,
                id => PumpSelector::One(parse_id(id)?),
            };
            let setting = match tokens[2].to_ascii_lowercase().as_str() {
                "on" => PumpSetting::On,
                "off" => PumpSetting::Off,
                flow => PumpSetting::Flow(parse_value(flow, "Flow", 0.0, MAX_PUMP_FLOW)?),
            };
            Ok(Command::Pump { pumps, setting })
        }
        "stage" => {
            let usage = "stage <command> | stage run | stage clear | stage list";
            expect_args(&tokens, 1, usize::MAX, usage)?;
            match (tokens[1], tokens.len()) {
                ("run", 2) => Ok(Command::Stage(StageAction::Run)),
                ("clear", 2) => Ok(Command::Stage(StageAction::Clear)),
                ("list", 2) => Ok(Command::Stage(StageAction::List)),
                _ => {
                    let staged = tokens[1..].join(" ");
                    if matches!(parse(&staged)?, Command::Stage(_)) {
                        return Err(CommandError::validation("Stage commands cannot be staged"));
                    }
                    Ok(Command::Stage(StageAction::Add(staged)))
                }
            }
        }
        "arccs" => {
            expect_args(&tokens, 0, 1, "arccs [accept|reject|on|off]")?;
            let action = match tokens.get(1).map(|t| t.to_ascii_lowercase()) {
                None => ArccsAction::Show,
                Some(t) => match t.as_str() {
                    "accept" => ArccsAction::Accept,
                    "reject" => ArccsAction::Reject,
                    "on" => ArccsAction::Enable,
                    "off" => ArccsAction::Disable,
                    _ => return Err(CommandError::validation("Usage: arccs [accept|reject|on|off]")),
                },
            };
            Ok(Command::Arccs(action))
        }
        "status" => {
            expect_args(&tokens, 0, 1, "status [json]")?;
            match tokens.get(1) {
                None => Ok(Command::Status { json: false }),
                Some(t) if t.eq_ignore_ascii_case("json") => Ok(Command::Status { json: true }),
                Some(_) => Err(CommandError::validation("Usage: status [json]")),
            }
        }
        "info" => {
            expect_args(&tokens, 1, 1, "info <id>")?;
            parse_id(tokens[1]).map(Command::Info)
        }
        "log" => {
            expect_args(&tokens, 0, 1, "log [n]")?;
            match tokens.get(1) {
                None => Ok(Command::Log(DEFAULT_LOG_LINES)),
                Some(t) => {
                    let n = parse_value(t, "Line count", 1.0, EVENT_LOG_CAPACITY as f64)?;
                    Ok(Command::Log(n as usize))
                }
            }
        }
        other => Err(CommandError::validation(format!(
            "Unknown command '{other}' (try 'help')"
        ))),
    }
}

/// Gate in front of `start`; the PIN dialog lives outside the core
pub trait StartAuthorizer: Send + Sync {
    fn authorize(&self) -> bool;
}

/// Authorizer that accepts every start request
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl StartAuthorizer for AllowAll {
    fn authorize(&self) -> bool {
        true
    }
}

/// Executes commands against a shared reactor
pub struct Interpreter {
    reactor: Arc<Reactor>,
    staged: Mutex<Vec<String>>,
    authorizer: Arc<dyn StartAuthorizer>,
}

impl Interpreter {
    pub fn new(reactor: Arc<Reactor>) -> Self {
        Self::with_authorizer(reactor, Arc::new(AllowAll))
    }

    pub fn with_authorizer(reactor: Arc<Reactor>, authorizer: Arc<dyn StartAuthorizer>) -> Self {
        Self {
            reactor,
            staged: Mutex::new(Vec::new()),
            authorizer,
        }
    }

    pub fn reactor(&self) -> &Arc<Reactor> {
        &self.reactor
    }

    fn staged(&self) -> MutexGuard<'_, Vec<String>> {
        self.staged.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Parse, validate and run one line. Ramps and startup are spawned, so
    /// this must be called from within a tokio runtime.
    pub fn execute(&self, line: &str) -> CommandResult<Vec<String>> {
        let result = parse(line).and_then(|cmd| self.run(cmd));
        if let Err(e) = &result {
            warn!("Command '{}' rejected: {e}", line.trim());
        }
        result
    }

    fn run(&self, cmd: Command) -> CommandResult<Vec<String>> {
        self.check(&cmd)?;
        match cmd {
            Command::Start => self.start(),
            Command::Scram => {
                procedures::scram(&self.reactor);
                Ok(vec!["SCRAM executed: all rods inserted".to_string()])
            }
            Command::Set {
                rods,
                insertion,
                override_auto,
            } => self.set_rods(rods, insertion, override_auto),
            Command::Temp { sensor, kelvin } => self.pin_sensor(sensor, kelvin),
            Command::Pressure(bar) => {
                self.reactor.ramp(RampTarget::Pressure, bar, PRESSURE_STEP);
                self.reactor.log_event(format!("Pressure ramp to {bar:.1} bar"));
                Ok(vec![format!("Ramping pressure to {bar:.1} bar")])
            }
            Command::Pump { pumps, setting } => self.set_pumps(pumps, setting),
            Command::Reset => {
                self.reactor.reset();
                self.staged().clear();
                Ok(vec!["Reactor reset to defaults".to_string()])
            }
            Command::Stage(action) => self.stage(action),
            Command::Arccs(action) => self.arccs(action),
            Command::Status { json } => self.status(json),
            Command::Help => Ok(HELP.iter().map(|l| l.to_string()).collect()),
            Command::Info(id) => self.info(id),
            Command::Log(n) => Ok(self.reactor.read(|st| st.events.recent(n))),
        }
    }

    fn start(&self) -> CommandResult<Vec<String>> {
        if !self.authorizer.authorize() {
            return Err(CommandError::rejected("Start not authorized"));
        }
        procedures::begin_startup(&self.reactor).map_err(|e| CommandError::rejected(e.to_string()))?;
        Ok(vec!["Startup sequence initiated".to_string()])
    }

    /// Domain checks against the lattice and pump set; run both when a line
    /// is staged and when it executes
    fn check(&self, cmd: &Command) -> CommandResult<()> {
        match *cmd {
            Command::Set {
                rods: RodSelector::One(id),
                override_auto,
                ..
            } => self.check_rod(id, override_auto),
            Command::Temp { sensor, .. } => self.check_sensor(sensor),
            Command::Pump {
                pumps: PumpSelector::One(id),
                ..
            } => self.check_pump(id),
            Command::Info(id) => self.check_element(id).map(|_| ()),
            _ => Ok(()),
        }
    }

    fn check_element(&self, id: ElementId) -> CommandResult<ElementKind> {
        self.reactor
            .lattice()
            .element(id)
            .map(|e| e.kind)
            .ok_or_else(|| CommandError::domain(format!("No element with id {id}")))
    }

    fn check_rod(&self, id: ElementId, override_auto: bool) -> CommandResult<()> {
        match self.check_element(id)? {
            ElementKind::ControlRod => Ok(()),
            ElementKind::AutoRod if override_auto => Ok(()),
            ElementKind::AutoRod => Err(CommandError::domain(format!(
                "Element {id} is an auto rod; use /override"
            ))),
            kind => Err(CommandError::domain(format!(
                "Element {id} is a {}, not a control rod",
                kind.label()
            ))),
        }
    }

    fn check_sensor(&self, id: ElementId) -> CommandResult<()> {
        match self.check_element(id)? {
            ElementKind::TemperatureSensor => Ok(()),
            kind => Err(CommandError::domain(format!(
                "Element {id} is a {}, not a temperature sensor",
                kind.label()
            ))),
        }
    }

    fn check_pump(&self, id: PumpId) -> CommandResult<()> {
        if self.reactor.read(|st| st.surface.flow(id)).is_none() {
            return Err(CommandError::domain(format!("No pump with id {id}")));
        }
        Ok(())
    }

    fn set_rods(&self, rods: RodSelector, insertion: f64, override_auto: bool) -> CommandResult<Vec<String>> {
        let lattice = self.reactor.lattice();
        let targets = match rods {
            RodSelector::One(id) => vec![id],
            RodSelector::All => {
                let mut ids = lattice.ids_of_type(ElementKind::ControlRod);
                if override_auto {
                    ids.extend(lattice.ids_of_type(ElementKind::AutoRod));
                }
                ids
            }
        };

        for &id in &targets {
            self.reactor.ramp(RampTarget::Rod(id), insertion, ROD_STEP);
        }
        let what = match rods {
            RodSelector::One(id) => format!("rod {id}"),
            RodSelector::All => format!("{} rods", targets.len()),
        };
        self.reactor
            .log_event(format!("Operator: {what} to {insertion:.1}% insertion"));
        Ok(vec![format!("Moving {what} to {insertion:.1}%")])
    }

    fn pin_sensor(&self, sensor: ElementId, kelvin: f64) -> CommandResult<Vec<String>> {
        self.reactor.update(|st| {
            st.sensor_overrides.insert(sensor, kelvin);
            st.derived.sensor_readings.insert(sensor, kelvin);
            st.log_event(format!("Operator: sensor {sensor} set to {kelvin:.1} K"));
        });
        Ok(vec![format!("Sensor {sensor} reading set to {kelvin:.1} K")])
    }

    fn set_pumps(&self, pumps: PumpSelector, setting: PumpSetting) -> CommandResult<Vec<String>> {
        let ids: Vec<PumpId> = match pumps {
            PumpSelector::One(id) => vec![id],
            PumpSelector::All => self.reactor.read(|st| st.surface.pumps.keys().copied().collect()),
        };

        let flow = setting.flow();
        self.reactor.update(|st| {
            for id in &ids {
                if let Some(pump) = st.surface.pumps.get_mut(id) {
                    pump.on = flow > 0.0;
                }
            }
        });
        for &id in &ids {
            self.reactor.ramp(RampTarget::Pump(id), flow, PUMP_STEP);
        }
        let what = match pumps {
            PumpSelector::One(id) => format!("pump {id}"),
            PumpSelector::All => "all pumps".to_string(),
        };
        self.reactor
            .log_event(format!("Operator: {what} to flow {flow:.0}"));
        Ok(vec![format!("Ramping {what} to flow {flow:.0}")])
    }

    fn stage(&self, action: StageAction) -> CommandResult<Vec<String>> {
        match action {
            StageAction::Add(line) => {
                self.check(&parse(&line)?)?;
                let mut staged = self.staged();
                staged.push(line.clone());
                Ok(vec![format!("Staged #{}: {line}", staged.len())])
            }
            StageAction::Clear => {
                self.staged().clear();
                Ok(vec!["Staged commands cleared".to_string()])
            }
            StageAction::List => {
                let staged = self.staged();
                if staged.is_empty() {
                    return Ok(vec!["No commands staged".to_string()]);
                }
                Ok(staged
                    .iter()
                    .enumerate()
                    .map(|(i, l)| format!("{}. {l}", i + 1))
                    .collect())
            }
            StageAction::Run => {
                let batch = std::mem::take(&mut *self.staged());
                if batch.is_empty() {
                    return Ok(vec!["No commands staged".to_string()]);
                }
                info!("Running {} staged command(s)", batch.len());
                Ok(self.run_batch(&batch))
            }
        }
    }

    /// Execute lines in order; a failing line is reported and skipped
    fn run_batch(&self, batch: &[String]) -> Vec<String> {
        let mut out = Vec::new();
        for line in batch {
            match self.execute(line) {
                Ok(lines) => {
                    out.push(format!("> {line}"));
                    out.extend(lines);
                }
                Err(e) => out.push(format!("> {line}: {e}")),
            }
        }
        out
    }

    fn arccs(&self, action: ArccsAction) -> CommandResult<Vec<String>> {
        match action {
            ArccsAction::Show => {
                let (enabled, pending) = self
                    .reactor
                    .read(|st| (st.arccs.is_enabled(), st.arccs.pending().to_vec()));
                let mut out = vec![format!("ARCCS {}", if enabled { "enabled" } else { "disabled" })];
                if pending.is_empty() {
                    out.push("No pending recommendations".to_string());
                } else {
                    out.extend(pending.iter().map(|c| format!("  {c}")));
                }
                Ok(out)
            }
            ArccsAction::Accept => {
                let batch = self.reactor.update(|st| st.arccs.take_pending());
                if batch.is_empty() {
                    return Ok(vec!["No pending recommendations".to_string()]);
                }
                self.reactor
                    .log_event(format!("Operator accepted {} ARCCS recommendation(s)", batch.len()));
                Ok(self.run_batch(&batch))
            }
            ArccsAction::Reject => {
                let dropped = self.reactor.update(|st| {
                    let n = st.arccs.pending().len();
                    st.arccs.clear_pending();
                    n
                });
                self.reactor
                    .log_event(format!("Operator rejected {dropped} ARCCS recommendation(s)"));
                Ok(vec![format!("Discarded {dropped} recommendation(s)")])
            }
            ArccsAction::Enable | ArccsAction::Disable => {
                let enabled = action == ArccsAction::Enable;
                self.reactor.update(|st| {
                    st.arccs.set_enabled(enabled);
                    st.log_event(format!("ARCCS {}", if enabled { "enabled" } else { "disabled" }));
                });
                Ok(vec![format!("ARCCS {}", if enabled { "enabled" } else { "disabled" })])
            }
        }
    }

    fn status(&self, json: bool) -> CommandResult<Vec<String>> {
        let snap = self.reactor.snapshot();
        let ramps = self.reactor.ramps().active_targets();
        if json {
            let text = serde_json::to_string(&snap).map_err(|e| CommandError::rejected(e.to_string()))?;
            return Ok(vec![text]);
        }

        let mut out = vec![
            format!(
                "Reactor: {} (Running={})",
                snap.lifecycle.label(),
                if snap.running { "YES" } else { "NO" }
            ),
            format!("Power: {:.1}%", snap.power),
            format!("Coolant: {:.1} K", snap.coolant_temp),
            format!("Pressure: {:.1} bar", snap.pressure),
            format!("Radiation: {:.2} mSv/h", snap.radiation),
            format!("Fuel (avg): {:.1}%", snap.avg_fuel),
            format!(
                "Turbine: {:.0} rpm, {:.0} MW(e)",
                snap.turbine_rpm, snap.electrical_mw
            ),
            format!("Coolant flow: {:.0}", snap.total_flow),
        ];
        if let Some(tilt) = snap.flux_tilt {
            out.push(format!("Flux tilt: {tilt:.2}"));
        }
        out.push(if snap.alerts.is_empty() {
            "Alerts: none".to_string()
        } else {
            format!("Alerts: {}", snap.alerts.join(", "))
        });
        let red = snap.alarms.iter().filter(|a| a.mode == AlarmMode::Red).count();
        out.push(format!(
            "Alarms: {} active ({red} red)",
            snap.alarms.len()
        ));
        if !ramps.is_empty() {
            let mut line = String::from("Ramps:");
            for target in &ramps {
                let _ = write!(line, " [{target}]");
            }
            out.push(line);
        }
        if !snap.recommendations.is_empty() {
            out.push(format!(
                "ARCCS: {} pending recommendation(s)",
                snap.recommendations.len()
            ));
        }
        Ok(out)
    }

    fn info(&self, id: ElementId) -> CommandResult<Vec<String>> {
        let element = self
            .reactor
            .lattice()
            .element(id)
            .ok_or_else(|| CommandError::domain(format!("No element with id {id}")))?;

        Ok(self.reactor.read(|st| {
            let mut out = vec![format!(
                "Element {id}: {} [{}] at row {}, column {}",
                element.kind.label(),
                element.kind.symbol(),
                element.row,
                element.col
            )];
            if let Some(alarm) = st.alarms.state(id) {
                out.push(format!(
                    "Alarm: {}{}{}",
                    alarm.mode().label(),
                    if alarm.is_flashing() { ", flashing" } else { "" },
                    if alarm.is_latched() { ", latched" } else { "" }
                ));
            }
            if let Some(text) = st.alarms.text(id) {
                out.push(format!("Message: {text}"));
            }
            if let Some(t) = st.derived.local_temp.get(&id) {
                out.push(format!("Local temperature: {t:.1} K"));
            }
            if let Some(f) = self.reactor.local_flux(st, id) {
                out.push(format!("Local flux: {f:.3}"));
            }
            if let Some(f) = st.derived.fuel.get(&id) {
                out.push(format!("Fuel remaining: {f:.2}%"));
            }
            if let Some(v) = st.surface.insertion(id) {
                out.push(format!("Insertion: {v:.1}%"));
            }
            if let Some(&pinned) = st.sensor_overrides.get(&id) {
                out.push(format!("Sensor pinned at {pinned:.1} K"));
            }
            out
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set() {
        assert_eq!(
            parse("set 29 40").unwrap(),
            Command::Set {
                rods: RodSelector::One(29),
                insertion: 40.0,
                override_auto: false
            }
        );
        assert_eq!(
            parse("SET * 100 /override").unwrap(),
            Command::Set {
                rods: RodSelector::All,
                insertion: 100.0,
                override_auto: true
            }
        );
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        assert!(matches!(parse("set 29 150"), Err(CommandError::Validation(_))));
        assert!(matches!(parse("set 29 -1"), Err(CommandError::Validation(_))));
        assert!(matches!(parse("temp 12 4000"), Err(CommandError::Validation(_))));
        assert!(matches!(parse("pressure 201"), Err(CommandError::Validation(_))));
        assert!(matches!(parse("pump 1 NaN"), Err(CommandError::Validation(_))));
        assert!(matches!(parse("log 0"), Err(CommandError::Validation(_))));
    }

    #[test]
    fn test_parse_rejects_bad_shape() {
        assert!(matches!(parse(""), Err(CommandError::Validation(_))));
        assert!(matches!(parse("set 29"), Err(CommandError::Validation(_))));
        assert!(matches!(parse("set 29 10 /force"), Err(CommandError::Validation(_))));
        assert!(matches!(parse("set x 10"), Err(CommandError::Validation(_))));
        assert!(matches!(parse("launch"), Err(CommandError::Validation(_))));
        assert!(matches!(parse("scram now"), Err(CommandError::Validation(_))));
    }

    #[test]
    fn test_parse_pump_and_stage() {
        assert_eq!(
            parse("pump * on").unwrap(),
            Command::Pump {
                pumps: PumpSelector::All,
                setting: PumpSetting::On
            }
        );
        assert_eq!(
            parse("pump 3 75.5").unwrap(),
            Command::Pump {
                pumps: PumpSelector::One(3),
                setting: PumpSetting::Flow(75.5)
            }
        );
        assert_eq!(
            parse("stage set 29 10").unwrap(),
            Command::Stage(StageAction::Add("set 29 10".to_string()))
        );
        assert_eq!(parse("stage run").unwrap(), Command::Stage(StageAction::Run));
        assert!(matches!(parse("stage stage run"), Err(CommandError::Validation(_))));
        assert!(matches!(parse("stage set 29 500"), Err(CommandError::Validation(_))));
    }

    #[test]
    fn test_parse_misc() {
        assert_eq!(parse("status json").unwrap(), Command::Status { json: true });
        assert_eq!(parse("arccs").unwrap(), Command::Arccs(ArccsAction::Show));
        assert_eq!(parse("arccs off").unwrap(), Command::Arccs(ArccsAction::Disable));
        assert_eq!(parse("log").unwrap(), Command::Log(DEFAULT_LOG_LINES));
        assert_eq!(parse("info 55").unwrap(), Command::Info(55));
    }
}
