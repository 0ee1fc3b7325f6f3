//! Scripted procedures: startup and SCRAM
//!
//! Startup runs as a background task and waits on each phase's ramps before
//! moving on. It never blocks the tick or command intake. SCRAM is a
//! synchronous override that wins over anything in flight.

use log::{debug, info, warn};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::lattice::{ElementId, ElementKind};
use crate::ramp::{RampHandle, RampOutcome, RampTarget};
use crate::reactor::{Lifecycle, Reactor};

/// Pump flow reached during startup
pub const STARTUP_PUMP_FLOW: f64 = 120.0;

/// Operating pressure [bar]
pub const OPERATING_PRESSURE: f64 = 70.0;

/// Manual rod insertion at the end of startup [%]
pub const MANUAL_ROD_TARGET: f64 = 0.0;

/// Auto rod insertion at the end of startup [%]
pub const AUTO_ROD_OPERATING: f64 = 25.0;

/// Pump flow forced by SCRAM
pub const EMERGENCY_FLOW: f64 = 150.0;

/// Ramp steps per interval
pub const ROD_STEP: f64 = 2.0;
pub const PUMP_STEP: f64 = 5.0;
pub const PRESSURE_STEP: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartupError {
    #[error("Startup already in progress")]
    AlreadyInProgress,

    #[error("Reactor must be offline to start (currently {0})")]
    NotOffline(&'static str),
}

/// Why a startup stopped short of Running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupOutcome {
    Running,
    /// A phase ramp did not complete, or the lifecycle was changed under us
    Aborted { phase: &'static str },
}

/// Launch the startup procedure in the background.
///
/// Fails immediately if another startup holds the latch or the reactor is
/// not Offline/Scrammed. Authorization happens before this is called.
pub fn begin_startup(reactor: &Arc<Reactor>) -> Result<JoinHandle<StartupOutcome>, StartupError> {
    if !reactor.try_claim_startup() {
        return Err(StartupError::AlreadyInProgress);
    }

    let admitted = reactor.update(|st| match st.lifecycle {
        Lifecycle::Offline | Lifecycle::Scrammed => {
            st.lifecycle = Lifecycle::StartupInProgress;
            st.log_event("Startup sequence initiated");
            Ok(())
        }
        other => Err(StartupError::NotOffline(other.label())),
    });
    if let Err(e) = admitted {
        reactor.release_startup();
        return Err(e);
    }

    let reactor = Arc::clone(reactor);
    Ok(tokio::spawn(async move {
        let outcome = run_startup(&reactor).await;
        if let StartupOutcome::Aborted { phase } = outcome {
            reactor.update(|st| {
                // a reset has already replaced the log
                if st.lifecycle == Lifecycle::StartupInProgress {
                    st.lifecycle = Lifecycle::Offline;
                    st.log_event(format!("Startup aborted during {phase}"));
                }
            });
            warn!("Startup aborted during {phase}");
        }
        reactor.release_startup();
        outcome
    }))
}

async fn run_startup(reactor: &Arc<Reactor>) -> StartupOutcome {
    let manual = reactor.lattice().ids_of_type(ElementKind::ControlRod);
    let auto = reactor.lattice().ids_of_type(ElementKind::AutoRod);

    // Phase 1: safety check, report only
    let (temp, pressure) = reactor.read(|st| (st.derived.coolant_temp, st.derived.pressure));
    reactor.log_event(format!(
        "Safety check: coolant {temp:.1} K, pressure {pressure:.1} bar, {} manual / {} auto rods",
        manual.len(),
        auto.len()
    ));

    // Phase 2: every rod fully in before anything moves
    let stale = reactor.ramps().cancel_where(|t| matches!(t, RampTarget::Rod(_)));
    if stale > 0 {
        debug!("Startup cancelled {stale} rod ramp(s)");
    }
    reactor.update(|st| {
        for v in st.surface.rods.values_mut() {
            *v = 100.0;
        }
        st.log_event("All rods verified fully inserted");
    });

    // Phase 3: circulation
    let pumps: Vec<_> = reactor.read(|st| st.surface.pumps.keys().copied().collect());
    let circulating = reactor.update(|st| {
        if st.lifecycle != Lifecycle::StartupInProgress {
            return false;
        }
        st.surface.pumps.values_mut().for_each(|p| p.on = true);
        true
    });
    if !circulating {
        return StartupOutcome::Aborted { phase: "pump ramp-up" };
    }
    let handles = pumps
        .iter()
        .map(|&id| reactor.ramp_while_starting(RampTarget::Pump(id), STARTUP_PUMP_FLOW, PUMP_STEP))
        .collect();
    if !phase(reactor, "pump ramp-up", handles).await {
        return StartupOutcome::Aborted { phase: "pump ramp-up" };
    }

    // Phase 4: pressurize
    let handle = reactor.ramp_while_starting(RampTarget::Pressure, OPERATING_PRESSURE, PRESSURE_STEP);
    if !phase(reactor, "pressurization", vec![handle]).await {
        return StartupOutcome::Aborted { phase: "pressurization" };
    }

    // Phase 5: manual rods out in two alternating batches
    let (first, second): (Vec<(usize, ElementId)>, Vec<(usize, ElementId)>) =
        manual.iter().copied().enumerate().partition(|(i, _)| i % 2 == 0);
    for (name, batch) in [("rod withdrawal batch 1", first), ("rod withdrawal batch 2", second)] {
        let handles = batch
            .into_iter()
            .map(|(_, id)| reactor.ramp_while_starting(RampTarget::Rod(id), MANUAL_ROD_TARGET, ROD_STEP))
            .collect();
        if !phase(reactor, name, handles).await {
            return StartupOutcome::Aborted { phase: name };
        }
    }

    // Phase 6: auto rods to their operating insertion
    let handles = auto
        .iter()
        .map(|&id| reactor.ramp_while_starting(RampTarget::Rod(id), AUTO_ROD_OPERATING, ROD_STEP))
        .collect();
    if !phase(reactor, "auto rod positioning", handles).await {
        return StartupOutcome::Aborted { phase: "auto rod positioning" };
    }

    let promoted = reactor.update(|st| {
        if st.lifecycle != Lifecycle::StartupInProgress {
            return false;
        }
        st.lifecycle = Lifecycle::Running;
        st.log_event("Startup complete, reactor running");
        true
    });
    if promoted {
        StartupOutcome::Running
    } else {
        StartupOutcome::Aborted { phase: "completion" }
    }
}

/// Wait for every ramp of a phase; true if all were admitted and completed
/// and the reactor is still starting up
async fn phase(reactor: &Reactor, name: &str, handles: Vec<Option<RampHandle>>) -> bool {
    info!("Startup phase: {name} ({} ramp(s))", handles.len());
    let mut completed = true;
    for handle in handles {
        let Some(handle) = handle else {
            completed = false;
            continue;
        };
        let target = handle.target();
        let outcome = handle.wait().await;
        if outcome != RampOutcome::Completed {
            warn!("Startup ramp on {target} ended as {outcome:?}");
            completed = false;
        }
    }
    completed && reactor.lifecycle() == Lifecycle::StartupInProgress
}

/// Emergency shutdown: cancel every ramp, insert every rod, force emergency
/// circulation. Decay-heat relaxation is left to the tick.
pub fn scram(reactor: &Reactor) {
    // Lifecycle first: startup registers no ramp once it has changed.
    reactor.update(|st| st.lifecycle = Lifecycle::Scrammed);
    let cancelled = reactor.ramps().cancel_all();
    reactor.update(|st| {
        for v in st.surface.rods.values_mut() {
            *v = 100.0;
        }
        for pump in st.surface.pumps.values_mut() {
            pump.on = true;
            pump.flow = EMERGENCY_FLOW;
        }
        st.log_event(format!("SCRAM: all rods inserted, {cancelled} ramp(s) cancelled"));
    });
    warn!("SCRAM executed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use std::time::Duration;

    fn reactor() -> Arc<Reactor> {
        Arc::new(
            Reactor::new(SimConfig {
                seed: Some(3),
                ..SimConfig::default()
            })
            .unwrap(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_reaches_operating_point() {
        let reactor = reactor();
        let handle = begin_startup(&reactor).unwrap();
        assert_eq!(reactor.lifecycle(), Lifecycle::StartupInProgress);
        assert_eq!(handle.await.unwrap(), StartupOutcome::Running);

        let snap = reactor.snapshot();
        assert!(snap.running);
        assert!(!reactor.startup_claimed());
        assert!(snap.pumps.values().all(|p| p.on && p.flow == STARTUP_PUMP_FLOW));
        assert_eq!(snap.pressure, OPERATING_PRESSURE);
        for id in reactor.lattice().ids_of_type(ElementKind::ControlRod) {
            assert_eq!(snap.rods[&id], MANUAL_ROD_TARGET);
        }
        for id in reactor.lattice().ids_of_type(ElementKind::AutoRod) {
            assert_eq!(snap.rods[&id], AUTO_ROD_OPERATING);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_startup_is_refused() {
        let reactor = reactor();
        let _first = begin_startup(&reactor).unwrap();
        assert_eq!(begin_startup(&reactor).unwrap_err(), StartupError::AlreadyInProgress);
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_refused_while_running() {
        let reactor = reactor();
        reactor.update(|st| st.lifecycle = Lifecycle::Running);
        assert!(matches!(begin_startup(&reactor), Err(StartupError::NotOffline(_))));
        assert!(!reactor.startup_claimed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scram_during_startup_aborts_it() {
        let reactor = reactor();
        let handle = begin_startup(&reactor).unwrap();
        tokio::time::sleep(Duration::from_secs(12)).await;

        scram(&reactor);
        let snap = reactor.snapshot();
        assert_eq!(snap.lifecycle, Lifecycle::Scrammed);
        assert!(snap.rods.values().all(|&v| v == 100.0));
        assert!(snap.pumps.values().all(|p| p.flow == EMERGENCY_FLOW));

        assert!(matches!(handle.await.unwrap(), StartupOutcome::Aborted { .. }));
        assert_eq!(reactor.lifecycle(), Lifecycle::Scrammed);
        assert!(reactor.ramps().active_targets().is_empty());

        // SCRAM stays authoritative after the cancelled ramps wake up
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(reactor.snapshot().rods.values().all(|&v| v == 100.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_phase_aborts_to_offline() {
        let reactor = reactor();
        let handle = begin_startup(&reactor).unwrap();
        tokio::time::sleep(Duration::from_millis(550)).await;
        let _operator = reactor.ramp(RampTarget::Pump(1), 0.0, PUMP_STEP);

        assert!(matches!(
            handle.await.unwrap(),
            StartupOutcome::Aborted { phase: "pump ramp-up" }
        ));
        assert_eq!(reactor.lifecycle(), Lifecycle::Offline);
        assert!(!reactor.startup_claimed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_cancels_pending_rod_withdrawals() {
        let reactor = reactor();
        let _manual = reactor.ramp(RampTarget::Rod(29), 0.0, ROD_STEP);
        let _auto = reactor.ramp(RampTarget::Rod(20), 0.0, ROD_STEP);
        let _handle = begin_startup(&reactor).unwrap();

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(reactor.lifecycle(), Lifecycle::StartupInProgress);
        assert!(reactor.snapshot().rods.values().all(|&v| v == 100.0));
        assert!(reactor
            .ramps()
            .active_targets()
            .iter()
            .all(|t| matches!(t, RampTarget::Pump(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_during_startup_leaves_fresh_log() {
        let reactor = reactor();
        let handle = begin_startup(&reactor).unwrap();
        tokio::time::sleep(Duration::from_secs(4)).await;

        reactor.reset();
        assert!(matches!(handle.await.unwrap(), StartupOutcome::Aborted { .. }));
        assert_eq!(reactor.lifecycle(), Lifecycle::Offline);
        assert!(reactor.read(|st| st.events.is_empty()));
        assert!(reactor.ramps().active_targets().is_empty());

        tokio::time::sleep(Duration::from_secs(5)).await;
        let snap = reactor.snapshot();
        assert!(snap.rods.values().all(|&v| v == 100.0));
        assert!(snap.pumps.values().all(|p| !p.on && p.flow == 0.0));
    }
}
