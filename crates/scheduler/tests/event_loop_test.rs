//! Integration tests driving the event loop through a recording host.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::HashMap;
use std::time::Duration;

use tickloop_scheduler::{
    CallbackHost, DispatchError, Error, EventLoop, LoopConfig, LoopState, ManualClock,
    ManualWaiter, TimerContext, TimerId, TimerKind,
};

/// Scripted behaviour for one timer.
#[derive(Debug, Clone, Default)]
struct Script {
    label: &'static str,
    delete_self: bool,
    delete: Vec<TimerId>,
    spawn: Vec<(f64, TimerKind)>,
    fail: bool,
}

impl Script {
    fn named(label: &'static str) -> Self {
        Self {
            label,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Bind(TimerId),
    Unbind(TimerId),
    Invoke(TimerId, &'static str),
}

#[derive(Debug, Default)]
struct RecordingHost {
    scripts: HashMap<TimerId, Script>,
    log: Vec<Event>,
}

impl RecordingHost {
    fn invokes(&self) -> Vec<&'static str> {
        self.log
            .iter()
            .filter_map(|e| match e {
                Event::Invoke(_, label) => Some(*label),
                _ => None,
            })
            .collect()
    }

    fn unbinds(&self, id: TimerId) -> usize {
        self.log.iter().filter(|e| **e == Event::Unbind(id)).count()
    }
}

impl CallbackHost for RecordingHost {
    type Callback = Script;

    fn bind(&mut self, id: TimerId, callback: Script) {
        self.log.push(Event::Bind(id));
        self.scripts.insert(id, callback);
    }

    fn unbind(&mut self, id: TimerId) {
        self.log.push(Event::Unbind(id));
        self.scripts.remove(&id);
    }

    fn invoke(
        &mut self,
        id: TimerId,
        timers: &mut TimerContext<'_, Script>,
    ) -> Result<(), DispatchError> {
        let script = self
            .scripts
            .get(&id)
            .cloned()
            .ok_or_else(|| DispatchError::new("unbound timer"))?;
        self.log.push(Event::Invoke(id, script.label));

        assert_eq!(timers.current(), Some(id));
        for victim in &script.delete {
            timers.delete_timer(*victim);
        }
        for (delay, kind) in &script.spawn {
            timers
                .create_timer(Script::named("spawned"), *delay, *kind)
                .map_err(|e| DispatchError::new(e.to_string()))?;
        }
        if script.delete_self {
            assert!(timers.delete_timer(id));
        }
        if script.fail {
            return Err(DispatchError::new(format!("{} failed", script.label)));
        }
        Ok(())
    }
}

type TestLoop = EventLoop<RecordingHost, ManualClock, ManualWaiter>;

fn setup(config: LoopConfig) -> (TestLoop, ManualClock) {
    let clock = ManualClock::new(0.0);
    let waiter = ManualWaiter::new(clock.clone());
    let event_loop =
        EventLoop::with_parts(config, RecordingHost::default(), clock.clone(), waiter).unwrap();
    (event_loop, clock)
}

#[test]
fn test_one_shot_round_trip() {
    let (mut event_loop, clock) = setup(LoopConfig::default());
    let id = event_loop
        .create_timer(Script::named("once"), 40.0, TimerKind::OneShot)
        .unwrap();

    clock.advance(41.0);
    event_loop.tick().unwrap();

    assert_eq!(
        event_loop.host().log,
        vec![Event::Bind(id), Event::Invoke(id, "once"), Event::Unbind(id)]
    );
    assert!(event_loop.timers().is_empty());
}

#[test]
fn test_repeating_timer_fires_each_period() {
    let (mut event_loop, clock) = setup(LoopConfig::default());
    event_loop
        .create_timer(Script::named("beat"), 100.0, TimerKind::Repeating)
        .unwrap();

    for _ in 0..4 {
        clock.advance(100.0);
        event_loop.tick().unwrap();
    }

    assert_eq!(event_loop.host().invokes(), vec!["beat"; 4]);
    assert_eq!(event_loop.timers().len(), 1);
    let next = event_loop.timers().nearest().unwrap().target();
    assert!((next - 500.0).abs() < f64::EPSILON);
}

#[test]
fn test_self_delete_unbinds_exactly_once() {
    let (mut event_loop, clock) = setup(LoopConfig::default());
    let other = event_loop
        .create_timer(Script::named("other"), 1_000.0, TimerKind::OneShot)
        .unwrap();
    let id = event_loop
        .create_timer(
            Script {
                delete_self: true,
                ..Script::named("self")
            },
            10.0,
            TimerKind::Repeating,
        )
        .unwrap();

    clock.advance(10.0);
    event_loop.tick().unwrap();
    clock.advance(10.0);
    event_loop.tick().unwrap();

    assert_eq!(event_loop.host().invokes(), vec!["self"]);
    assert_eq!(event_loop.host().unbinds(id), 1);
    assert!(event_loop.timers().contains(other));
    assert!(!event_loop.timers().contains(id));
}

/// Test that a timer spawned by a self-deleting callback is ordered among the
/// timers still waiting.
///
/// # GIVEN
/// One-shots at 5ms and 50ms, and a repeating timer at 10ms that deletes
/// itself and spawns a 10ms one-shot
///
/// # WHEN
/// The loop ticks past 10ms and then runs to completion
///
/// # THEN
/// The spawned timer lands between the remaining ones, fires before the 50ms
/// one-shot, and every binding is released exactly once
#[test]
fn test_self_delete_with_spawn_keeps_order() {
    let (mut event_loop, clock) = setup(LoopConfig::default());
    let early = event_loop
        .create_timer(Script::named("early"), 5.0, TimerKind::OneShot)
        .unwrap();
    let late = event_loop
        .create_timer(Script::named("late"), 50.0, TimerKind::OneShot)
        .unwrap();
    let id = event_loop
        .create_timer(
            Script {
                delete_self: true,
                spawn: vec![(10.0, TimerKind::OneShot)],
                ..Script::named("self")
            },
            10.0,
            TimerKind::Repeating,
        )
        .unwrap();

    clock.advance(5.0);
    event_loop.tick().unwrap();
    clock.advance(5.0);
    event_loop.tick().unwrap();

    let targets: Vec<f64> = event_loop.timers().records().iter().map(|r| r.target()).collect();
    assert_eq!(targets, vec![50.0, 20.0]);
    assert_eq!(event_loop.timers().nearest().unwrap().kind(), TimerKind::OneShot);
    assert!(!event_loop.timers().contains(id));
    assert_eq!(event_loop.host().unbinds(id), 1);

    event_loop.run().unwrap();

    assert_eq!(
        event_loop.host().invokes(),
        vec!["early", "self", "spawned", "late"]
    );
    assert_eq!(event_loop.host().unbinds(early), 1);
    assert_eq!(event_loop.host().unbinds(late), 1);
    assert_eq!(event_loop.host().unbinds(id), 1);
    assert!(event_loop.host().scripts.is_empty());
    assert!(event_loop.timers().is_empty());
    assert_eq!(event_loop.state(), LoopState::Halted);
}

#[test]
fn test_capacity_boundary() {
    let (mut event_loop, _clock) = setup(LoopConfig::default().with_max_timers(3));
    for delay in [10.0, 20.0, 30.0] {
        event_loop
            .create_timer(Script::named("fill"), delay, TimerKind::OneShot)
            .unwrap();
    }

    let before: Vec<_> = event_loop.timers().records().iter().map(|r| r.id()).collect();
    let err = event_loop
        .create_timer(Script::named("overflow"), 5.0, TimerKind::OneShot)
        .unwrap_err();

    assert_eq!(err, Error::ResourceExhausted { capacity: 3 });
    let after: Vec<_> = event_loop.timers().records().iter().map(|r| r.id()).collect();
    assert_eq!(before, after);
    assert_eq!(event_loop.host().log.len(), 3);
}

#[test]
fn test_unknown_deletion_is_harmless() {
    let (mut event_loop, _clock) = setup(LoopConfig::default());
    let id = event_loop
        .create_timer(Script::named("kept"), 10.0, TimerKind::OneShot)
        .unwrap();

    assert!(!event_loop.delete_timer(TimerId::new(999).unwrap()));
    assert!(event_loop.timers().contains(id));
    assert_eq!(event_loop.host().log, vec![Event::Bind(id)]);
}

#[test]
fn test_callback_deletes_pending_timer() {
    let (mut event_loop, clock) = setup(LoopConfig::default());
    let victim = event_loop
        .create_timer(Script::named("victim"), 50.0, TimerKind::OneShot)
        .unwrap();
    event_loop
        .create_timer(
            Script {
                delete: vec![victim],
                ..Script::named("killer")
            },
            10.0,
            TimerKind::OneShot,
        )
        .unwrap();

    event_loop.run().unwrap();

    assert_eq!(event_loop.host().invokes(), vec!["killer"]);
    assert_eq!(event_loop.host().unbinds(victim), 1);
}

#[test]
fn test_run_terminates_after_spawned_timers() {
    let (mut event_loop, _clock) = setup(LoopConfig::default());
    let summary = event_loop
        .run_function(Script {
            spawn: vec![(20.0, TimerKind::OneShot), (30.0, TimerKind::OneShot)],
            ..Script::named("entry")
        })
        .unwrap();

    assert_eq!(event_loop.host().invokes(), vec!["entry", "spawned", "spawned"]);
    assert_eq!(summary.fired, 3);
    assert_eq!(event_loop.state(), LoopState::Halted);
    assert!(event_loop.host().scripts.is_empty());
    assert_eq!(event_loop.stats().created, 3);
    assert_eq!(event_loop.stats().discarded, 3);
}

#[test]
fn test_dispatch_failure_halts_run() {
    let (mut event_loop, _clock) = setup(LoopConfig::default());
    let later = event_loop
        .create_timer(Script::named("later"), 500.0, TimerKind::OneShot)
        .unwrap();
    let failing = event_loop
        .create_timer(
            Script {
                fail: true,
                ..Script::named("bad")
            },
            10.0,
            TimerKind::OneShot,
        )
        .unwrap();

    let err = event_loop.run().unwrap_err();
    match err {
        Error::DispatchFailed { id, reason } => {
            assert_eq!(id, failing);
            assert_eq!(reason, "bad failed");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(event_loop.host().unbinds(failing), 1);
    assert!(event_loop.timers().contains(later));
    assert!(event_loop.timers().expiring().is_none());
    assert_eq!(event_loop.state(), LoopState::Halted);
}

#[test]
fn test_wait_is_clamped_to_minimum() {
    let config = LoopConfig {
        min_wait_ms: 5.0,
        ..LoopConfig::default()
    };
    let (mut event_loop, _clock) = setup(config);
    event_loop
        .create_timer(Script::named("soon"), 2.0, TimerKind::OneShot)
        .unwrap();

    event_loop.run().unwrap();
    assert_eq!(event_loop.waiter().waits(), vec![Duration::from_millis(5)]);
}
