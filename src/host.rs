//! A callback host that plays back the behaviour described by a [`Plan`].

use std::collections::{BTreeMap, HashMap};

use tickloop_core::{DispatchError, TimerId};
use tickloop_scheduler::{CallbackHost, Clock, EventLoop, RunSummary, TimerContext, Waiter};
use tracing::{debug, info};

use crate::plan::{Plan, PlanError, TimerSpec};

/// Host whose callbacks are timer names from a plan.
#[derive(Debug, Default)]
pub struct ScriptHost {
    specs: HashMap<String, TimerSpec>,
    bindings: HashMap<TimerId, String>,
    /// Fires of each live timer instance.
    instance_fires: HashMap<TimerId, u64>,
    /// Fires per timer name, across all instances.
    fires: BTreeMap<String, u64>,
}

impl ScriptHost {
    #[must_use]
    pub fn new(plan: &Plan) -> Self {
        Self {
            specs: plan
                .timers
                .iter()
                .map(|spec| (spec.name.clone(), spec.clone()))
                .collect(),
            ..Self::default()
        }
    }

    /// Fire counts per timer name. Names that never fired are absent.
    #[must_use]
    pub const fn fires(&self) -> &BTreeMap<String, u64> {
        &self.fires
    }

    /// Total fires of `name`.
    #[must_use]
    pub fn fire_count(&self, name: &str) -> u64 {
        self.fires.get(name).copied().unwrap_or(0)
    }

    /// Number of timers with a bound callback.
    #[must_use]
    pub fn live(&self) -> usize {
        self.bindings.len()
    }

    fn spec(&self, name: &str) -> Result<&TimerSpec, DispatchError> {
        self.specs
            .get(name)
            .ok_or_else(|| DispatchError::new(format!("timer '{name}' is not in the plan")))
    }
}

impl CallbackHost for ScriptHost {
    type Callback = String;

    fn bind(&mut self, id: TimerId, name: String) {
        debug!(timer_id = %id, timer = %name, "Bound plan timer");
        self.bindings.insert(id, name);
    }

    fn unbind(&mut self, id: TimerId) {
        self.instance_fires.remove(&id);
        if let Some(name) = self.bindings.remove(&id) {
            debug!(timer_id = %id, timer = %name, "Unbound plan timer");
        }
    }

    fn invoke(
        &mut self,
        id: TimerId,
        timers: &mut TimerContext<'_, String>,
    ) -> Result<(), DispatchError> {
        let name = self
            .bindings
            .get(&id)
            .cloned()
            .ok_or_else(|| DispatchError::new(format!("no plan timer bound to {id}")))?;
        let spec = self.spec(&name)?.clone();

        let fire = self.instance_fires.entry(id).or_default();
        *fire = fire.saturating_add(1);
        let fire = *fire;
        let total = self.fires.entry(name.clone()).or_default();
        *total = total.saturating_add(1);
        info!(timer_id = %id, timer = %name, fire, now = timers.now(), "Timer fired");

        for target in &spec.cancel {
            let victims: Vec<TimerId> = self
                .bindings
                .iter()
                .filter(|(_, bound)| *bound == target)
                .map(|(victim, _)| *victim)
                .collect();
            for victim in victims {
                timers.delete_timer(victim);
            }
        }

        for target in &spec.spawn {
            let child = self.spec(target)?;
            timers
                .create_timer(target.clone(), child.delay_ms, child.kind())
                .map_err(|e| {
                    DispatchError::new(format!("timer '{name}' could not spawn '{target}': {e}"))
                })?;
        }

        if spec.cancel_after == Some(fire) {
            timers.delete_timer(id);
        }

        if spec.fail_on == Some(fire) {
            return Err(DispatchError::new(format!(
                "timer '{name}' failed on fire {fire}"
            )));
        }

        Ok(())
    }
}

/// Create the plan's initial timers and run the loop until it halts.
///
/// With an `entry`, the loop is entered through `run_function`; otherwise
/// it just runs.
///
/// # Errors
///
/// Returns `Loop` for creation failures and for any error that stopped the
/// run.
pub fn run_plan<K: Clock, W: Waiter>(
    plan: &Plan,
    event_loop: &mut EventLoop<ScriptHost, K, W>,
) -> Result<RunSummary, PlanError> {
    for spec in plan.initial_timers() {
        event_loop.create_timer(spec.name.clone(), spec.delay_ms, spec.kind())?;
    }

    let summary = match &plan.entry {
        Some(entry) => event_loop.run_function(entry.clone())?,
        None => event_loop.run()?,
    };
    Ok(summary)
}
