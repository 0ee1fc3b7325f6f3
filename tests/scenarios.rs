use rbmk_core::alarm::AlarmMode;
use rbmk_core::commands::{Interpreter, StartAuthorizer};
use rbmk_core::{CommandError, ElementKind, Lifecycle, Reactor, Scheduler, SimConfig};
use std::sync::Arc;
use std::time::Duration;

fn reactor(seed: u64) -> Arc<Reactor> {
    let config = SimConfig {
        seed: Some(seed),
        ..SimConfig::default()
    };
    Arc::new(Reactor::new(config).expect("default config is valid"))
}

fn status_line(interp: &Interpreter) -> String {
    interp.execute("status").unwrap().join("\n")
}

struct DenyAll;

impl StartAuthorizer for DenyAll {
    fn authorize(&self) -> bool {
        false
    }
}

#[tokio::test(start_paused = true)]
async fn invalid_commands_leave_state_unchanged() {
    let reactor = reactor(11);
    let interp = Interpreter::new(Arc::clone(&reactor));
    let before = reactor.snapshot();

    assert!(matches!(interp.execute("set 29 150"), Err(CommandError::Validation(_))));
    assert!(matches!(interp.execute("set 9999 50"), Err(CommandError::Domain(_))));
    // 30 is a fuel channel, 20 an auto rod
    assert!(matches!(interp.execute("set 30 50"), Err(CommandError::Domain(_))));
    assert!(matches!(interp.execute("set 20 50"), Err(CommandError::Domain(_))));
    assert!(matches!(interp.execute("temp 29 500"), Err(CommandError::Domain(_))));
    assert!(matches!(interp.execute("pump 7 on"), Err(CommandError::Domain(_))));
    assert!(matches!(interp.execute("pump 1 fast"), Err(CommandError::Validation(_))));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(reactor.snapshot(), before);
    assert!(reactor.ramps().active_targets().is_empty());
}

#[tokio::test(start_paused = true)]
async fn auto_rod_moves_only_with_override() {
    let reactor = reactor(12);
    let interp = Interpreter::new(Arc::clone(&reactor));

    interp.execute("set 20 40 /override").unwrap();
    interp.execute("set * 80").unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    let snap = reactor.snapshot();
    assert_eq!(snap.rods[&20], 40.0);
    assert_eq!(snap.rods[&52], 100.0);
    for id in reactor.lattice().ids_of_type(ElementKind::ControlRod) {
        assert_eq!(snap.rods[&id], 80.0);
    }
}

#[tokio::test(start_paused = true)]
async fn startup_reaches_running_and_scram_is_immediate() {
    let reactor = reactor(13);
    let scheduler = Scheduler::spawn(Arc::clone(&reactor), None);
    let interp = Interpreter::new(Arc::clone(&reactor));

    interp.execute("start").unwrap();
    assert!(matches!(interp.execute("start"), Err(CommandError::Rejected(_))));
    tokio::time::sleep(Duration::from_secs(40)).await;

    assert!(status_line(&interp).contains("Running=YES"));
    let snap = reactor.snapshot();
    assert!(snap.power > 75.0 && snap.power < 100.0, "power {}", snap.power);
    assert!((293.0..=800.0).contains(&snap.coolant_temp));
    assert!(snap.electrical_mw > 0.0);

    interp.execute("scram").unwrap();
    assert!(status_line(&interp).contains("Running=NO"));
    let snap = reactor.snapshot();
    assert_eq!(snap.lifecycle, Lifecycle::Scrammed);
    assert!(snap.rods.values().all(|&v| v == 100.0));

    // power decays through the tick loop
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(reactor.snapshot().power < 1.0);
    scheduler.shutdown();
}

#[tokio::test(start_paused = true)]
async fn unauthorized_start_is_rejected() {
    let reactor = reactor(14);
    let interp = Interpreter::with_authorizer(Arc::clone(&reactor), Arc::new(DenyAll));
    assert!(matches!(interp.execute("start"), Err(CommandError::Rejected(_))));
    assert_eq!(reactor.lifecycle(), Lifecycle::Offline);
}

#[tokio::test(start_paused = true)]
async fn later_pump_command_wins() {
    let reactor = reactor(15);
    let interp = Interpreter::new(Arc::clone(&reactor));

    interp.execute("pump 1 120").unwrap();
    interp.execute("pump 1 off").unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    let pump = reactor.snapshot().pumps[&1];
    assert_eq!(pump.flow, 0.0);
    assert!(!pump.on);
}

#[tokio::test(start_paused = true)]
async fn reset_twice_equals_reset_once() {
    let once = reactor(16);
    let twice = reactor(16);
    for r in [&once, &twice] {
        let interp = Interpreter::new(Arc::clone(r));
        interp.execute("pump * on").unwrap();
        interp.execute("set * 30").unwrap();
        interp.execute("temp 55 900").unwrap();
    }
    tokio::time::sleep(Duration::from_secs(1)).await;

    Interpreter::new(Arc::clone(&once)).execute("reset").unwrap();
    let interp = Interpreter::new(Arc::clone(&twice));
    interp.execute("reset").unwrap();
    interp.execute("reset").unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(once.snapshot(), twice.snapshot());
    assert_eq!(once.lifecycle(), Lifecycle::Offline);
    assert!(once.snapshot().rods.values().all(|&v| v == 100.0));
    assert!(once.read(|st| st.sensor_overrides.is_empty()));
}

#[tokio::test(start_paused = true)]
async fn staged_commands_run_in_order() {
    let reactor = reactor(17);
    let interp = Interpreter::new(Arc::clone(&reactor));

    assert_eq!(interp.execute("stage run").unwrap(), vec!["No commands staged"]);
    interp.execute("stage set 29 50").unwrap();
    interp.execute("stage set 29 10").unwrap();
    assert!(matches!(interp.execute("stage set 9999 10"), Err(CommandError::Domain(_))));
    assert_eq!(interp.execute("stage list").unwrap().len(), 2);

    // nothing happens until run
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(reactor.snapshot().rods[&29], 100.0);

    interp.execute("stage run").unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(reactor.snapshot().rods[&29], 10.0);
    assert_eq!(interp.execute("stage run").unwrap(), vec!["No commands staged"]);
}

#[tokio::test(start_paused = true)]
async fn hot_sensor_raises_red_alarm_and_flashing_implies_on() {
    let reactor = reactor(18);
    let interp = Interpreter::new(Arc::clone(&reactor));
    reactor.update(|st| st.lifecycle = Lifecycle::Running);

    interp.execute("temp 55 3000").unwrap();
    for _ in 0..3 {
        reactor.tick();
        reactor.toggle_flash_phase();
    }

    reactor.read(|st| {
        assert_eq!(st.alarms.state(55).unwrap().mode(), AlarmMode::Red);
        for (id, s) in st.alarms.states() {
            assert!(!s.is_flashing() || s.mode() != AlarmMode::Off, "element {id}");
        }
    });

    interp.execute("scram").unwrap();
    reactor.tick();
    assert!(reactor.snapshot().alarms.is_empty());
}

#[tokio::test(start_paused = true)]
async fn status_json_and_info_report_plant() {
    let reactor = reactor(19);
    let interp = Interpreter::new(Arc::clone(&reactor));
    reactor.tick();

    let json = interp.execute("status json").unwrap().join("");
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["running"], serde_json::Value::Bool(false));
    assert_eq!(value["lifecycle"], "Offline");

    let info = interp.execute("info 55").unwrap();
    assert!(info[0].contains("temperature sensor"), "{}", info[0]);
    assert!(matches!(interp.execute("info 0"), Err(CommandError::Domain(_))));
}

#[tokio::test(start_paused = true)]
async fn start_reinserts_rods_already_being_withdrawn() {
    let reactor = reactor(20);
    let interp = Interpreter::new(Arc::clone(&reactor));

    interp.execute("set * 0 /override").unwrap();
    interp.execute("start").unwrap();
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    // still ramping pumps; no rod moves before the withdrawal batches
    assert_eq!(reactor.lifecycle(), Lifecycle::StartupInProgress);
    assert!(reactor.snapshot().rods.values().all(|&v| v == 100.0));
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(reactor.snapshot().rods.values().all(|&v| v == 100.0));
}

#[tokio::test(start_paused = true)]
async fn arccs_recommendation_runs_only_when_accepted() {
    let reactor = reactor(21);
    let interp = Interpreter::new(Arc::clone(&reactor));
    reactor.update(|st| st.lifecycle = Lifecycle::Running);

    for _ in 0..3 {
        reactor.tick();
    }
    let pending = reactor.read(|st| st.arccs.pending().to_vec());
    assert_eq!(pending.iter().filter(|c| *c == "pump * on").count(), 1);

    // the controller alone never executes its recommendations
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(reactor.snapshot().total_flow, 0.0);
    assert!(interp.execute("arccs").unwrap().iter().any(|l| l.contains("pump * on")));

    let out = interp.execute("arccs accept").unwrap();
    assert_eq!(out.iter().filter(|l| *l == "> pump * on").count(), 1);
    assert!(reactor.read(|st| st.arccs.pending().is_empty()));

    tokio::time::sleep(Duration::from_secs(5)).await;
    let snap = reactor.snapshot();
    assert_eq!(snap.total_flow, 720.0);
    assert!(snap.pumps.values().all(|p| p.on));
    assert_eq!(interp.execute("arccs accept").unwrap(), vec!["No pending recommendations"]);
}

#[tokio::test(start_paused = true)]
async fn arccs_reject_discards_batch() {
    let reactor = reactor(22);
    let interp = Interpreter::new(Arc::clone(&reactor));
    reactor.update(|st| st.lifecycle = Lifecycle::Running);
    reactor.tick();

    let pending = reactor.read(|st| st.arccs.pending().len());
    assert!(pending > 0);
    assert_eq!(
        interp.execute("arccs reject").unwrap(),
        vec![format!("Discarded {pending} recommendation(s)")]
    );
    assert!(reactor.read(|st| st.arccs.pending().is_empty()));
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(reactor.snapshot().total_flow, 0.0);
}

#[tokio::test(start_paused = true)]
async fn staging_checks_pumps_and_element_kinds() {
    let reactor = reactor(23);
    let interp = Interpreter::new(Arc::clone(&reactor));

    assert!(matches!(interp.execute("stage pump 99 on"), Err(CommandError::Domain(_))));
    // 1 is a reflector, 30 fuel, 20 an auto rod without /override
    assert!(matches!(interp.execute("stage set 1 50"), Err(CommandError::Domain(_))));
    assert!(matches!(interp.execute("stage temp 30 500"), Err(CommandError::Domain(_))));
    assert!(matches!(interp.execute("stage set 20 50"), Err(CommandError::Domain(_))));
    assert_eq!(interp.execute("stage list").unwrap(), vec!["No commands staged"]);

    interp.execute("stage set 20 50 /override").unwrap();
    interp.execute("stage pump 6 on").unwrap();
    assert_eq!(interp.execute("stage list").unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn reset_during_startup_leaves_clean_event_log() {
    let reactor = reactor(24);
    let interp = Interpreter::new(Arc::clone(&reactor));

    interp.execute("start").unwrap();
    tokio::time::sleep(Duration::from_secs(4)).await;
    interp.execute("reset").unwrap();

    // let the aborted startup task wind down
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(interp.execute("log").unwrap().is_empty());
    assert_eq!(reactor.lifecycle(), Lifecycle::Offline);
    assert!(!reactor.startup_claimed());
    assert!(reactor.ramps().active_targets().is_empty());
}
