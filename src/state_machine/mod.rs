//! State machine core (C8): state table, override-SM hook, deferred
//! queue, re-entry guard, and transition timeout — the most direct port
//! of `ubgps_sm_process`/`ubgps_queue_state_change`/
//! `ubgps_process_state_change_queue` from the original driver header.

pub mod init;

use std::collections::VecDeque;
use std::time::Duration;

use crate::timer::TimerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpsState {
    PowerOff,
    Initialization,
    ColdStart,
    WarmStart,
    HotStart,
    FixAcquired,
}

impl GpsState {
    pub fn is_searching(self) -> bool {
        matches!(self, GpsState::ColdStart | GpsState::WarmStart | GpsState::HotStart)
    }
}

/// Externally requested state. Only these three are valid targets
/// (spec.md §3) — `SearchFix` is realized as whichever of COLD/WARM/HOT
/// start applies, decided by the init sub-sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetState {
    Off,
    SearchFix,
    FixAcquired,
}

#[derive(Debug, Clone)]
pub enum Event {
    /// Caller-supplied transition timeout accompanies every target-state
    /// request (spec.md §5/§6: "caller-supplied seconds").
    TargetState(TargetState, Duration),
    NavPvt { has_fix: bool },
    Timeout(TimerId),
    AidAlpReady,
    AlpSrvRequest,
    /// Raised by the init sub-sequencer when it has decided which of
    /// COLD/WARM/HOT start to enter, or that init failed.
    InitOutcome(InitOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Enter(GpsState),
    Failed { reinit_cold: bool },
}

/// Side effects the core requests from its host. Kept as a trait so the
/// re-entrancy/deferred-queue logic is unit-testable without a full
/// driver, and so a test double can stand in during scenario tests.
pub trait StateEffects {
    fn enter_state(&mut self, state: GpsState);
    fn publish_state_change(&mut self, state: GpsState);
    fn publish_target_reached(&mut self, state: GpsState);
    fn publish_target_timeout(&mut self);
    fn arm_target_timeout(&mut self, timeout: Duration) -> TimerId;
    fn cancel_timer(&mut self, id: TimerId);
    fn start_init_sequence(&mut self);
    fn power_off(&mut self);
}

/// Installable replacement for the default transition table — the
/// override hook from spec.md §4.8. The init sub-sequencer installs
/// itself here while `current == Initialization`.
pub trait StateMachine {
    /// Return `true` if this call consumed the event (the default table
    /// is then skipped for this event).
    fn handle(&mut self, core: &mut Core, effects: &mut dyn StateEffects, event: &Event) -> bool;
}

pub struct Core {
    pub current: GpsState,
    pub new_state: Option<GpsState>,
    pub target: TargetState,
    pub in_state_change: bool,
    in_sm_process: u8,
    in_queue_process: bool,
    deferred: VecDeque<(TargetState, Duration)>,
    pub target_timer_id: Option<TimerId>,
    override_sm: Option<Box<dyn StateMachine>>,
}

impl Default for Core {
    fn default() -> Self {
        Self::new()
    }
}

impl Core {
    pub fn new() -> Self {
        Core {
            current: GpsState::PowerOff,
            new_state: None,
            target: TargetState::Off,
            in_state_change: false,
            in_sm_process: 0,
            in_queue_process: false,
            deferred: VecDeque::new(),
            target_timer_id: None,
            override_sm: None,
        }
    }

    pub fn install_override(&mut self, sm: Box<dyn StateMachine>) {
        self.override_sm = Some(sm);
    }

    pub fn clear_override(&mut self) {
        self.override_sm = None;
    }

    pub fn reentry_depth(&self) -> u8 {
        self.in_sm_process
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Inject an event. This is `ubgps_sm_process`: if a call is already
    /// in progress and the event is a `TARGET_STATE`, it is deferred
    /// rather than processed inline (spec.md §4.8 step 1).
    pub fn process(&mut self, effects: &mut dyn StateEffects, event: Event) {
        if self.in_sm_process > 0 {
            if let Event::TargetState(t, timeout) = event {
                self.deferred.push_back((t, timeout));
                return;
            }
        }

        self.in_sm_process = self.in_sm_process.saturating_add(1);
        self.dispatch(effects, event);
        self.in_sm_process = self.in_sm_process.saturating_sub(1);

        if self.in_sm_process == 0 {
            self.drain_deferred(effects);
        }
    }

    fn drain_deferred(&mut self, effects: &mut dyn StateEffects) {
        if self.in_queue_process {
            return;
        }
        self.in_queue_process = true;
        while let Some((t, timeout)) = self.deferred.pop_front() {
            self.process(effects, Event::TargetState(t, timeout));
        }
        self.in_queue_process = false;
    }

    fn dispatch(&mut self, effects: &mut dyn StateEffects, event: Event) {
        let mut override_sm = self.override_sm.take();
        let consumed = if let Some(sm) = override_sm.as_mut() {
            sm.handle(self, effects, &event)
        } else {
            false
        };
        self.override_sm = override_sm;

        if !consumed {
            self.default_handle(effects, event);
        }
    }

    fn default_handle(&mut self, effects: &mut dyn StateEffects, event: Event) {
        match event {
            Event::TargetState(t, timeout) => self.accept_target(effects, t, timeout),
            Event::NavPvt { has_fix } => self.handle_nav_pvt(effects, has_fix),
            Event::Timeout(id) => {
                if self.target_timer_id == Some(id) {
                    self.target_timer_id = None;
                    effects.publish_target_timeout();
                    self.target = Self::current_as_target(self.current);
                }
            }
            Event::InitOutcome(outcome) => self.handle_init_outcome(effects, outcome),
            Event::AidAlpReady | Event::AlpSrvRequest => {
                // Handled by the aiding subsystem directly; the core state
                // table has no reaction to these.
            }
        }
    }

    fn accept_target(&mut self, effects: &mut dyn StateEffects, target: TargetState, timeout: Duration) {
        self.target = target;
        if let Some(id) = self.target_timer_id.take() {
            effects.cancel_timer(id);
        }
        self.target_timer_id = Some(effects.arm_target_timeout(timeout));

        match (self.current, target) {
            (GpsState::PowerOff, TargetState::SearchFix | TargetState::FixAcquired) => {
                self.transition_to(effects, GpsState::Initialization);
                effects.start_init_sequence();
            }
            (_, TargetState::Off) if self.current != GpsState::PowerOff => {
                effects.power_off();
                self.transition_to(effects, GpsState::PowerOff);
            }
            _ => {
                // Already on the way there, or already at the target —
                // check_target_reached below handles publishing.
            }
        }
        self.check_target_reached(effects);
    }

    fn handle_nav_pvt(&mut self, effects: &mut dyn StateEffects, has_fix: bool) {
        if has_fix && self.current.is_searching() {
            self.transition_to(effects, GpsState::FixAcquired);
        } else if !has_fix && self.current == GpsState::FixAcquired {
            self.transition_to(effects, GpsState::ColdStart);
        }
    }

    fn handle_init_outcome(&mut self, effects: &mut dyn StateEffects, outcome: InitOutcome) {
        match outcome {
            InitOutcome::Enter(state) => self.transition_to(effects, state),
            InitOutcome::Failed { reinit_cold } => {
                if reinit_cold {
                    self.transition_to(effects, GpsState::Initialization);
                    effects.start_init_sequence();
                } else {
                    effects.power_off();
                    self.transition_to(effects, GpsState::PowerOff);
                }
            }
        }
    }

    fn transition_to(&mut self, effects: &mut dyn StateEffects, state: GpsState) {
        if state == self.current {
            self.check_target_reached(effects);
            return;
        }
        self.new_state = Some(state);
        self.in_state_change = true;
        effects.enter_state(state);
        self.current = state;
        self.new_state = None;
        self.in_state_change = false;
        effects.publish_state_change(state);
        self.check_target_reached(effects);
    }

    fn check_target_reached(&mut self, effects: &mut dyn StateEffects) {
        let reached = match self.target {
            TargetState::Off => self.current == GpsState::PowerOff,
            TargetState::SearchFix => self.current.is_searching() || self.current == GpsState::FixAcquired,
            TargetState::FixAcquired => self.current == GpsState::FixAcquired,
        };
        if reached {
            if let Some(id) = self.target_timer_id.take() {
                effects.cancel_timer(id);
            }
            effects.publish_target_reached(self.current);
        }
    }

    fn current_as_target(state: GpsState) -> TargetState {
        match state {
            GpsState::PowerOff => TargetState::Off,
            GpsState::FixAcquired => TargetState::FixAcquired,
            _ => TargetState::SearchFix,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    #[derive(Default, Clone)]
    struct Log {
        state_changes: Vec<GpsState>,
        target_reached: Vec<GpsState>,
        timeouts: u32,
        init_started: u32,
        powered_off: u32,
        next_timer: u16,
    }

    struct Recorder(Rc<RefCell<Log>>);

    impl StateEffects for Recorder {
        fn enter_state(&mut self, _state: GpsState) {}
        fn publish_state_change(&mut self, state: GpsState) {
            self.0.borrow_mut().state_changes.push(state);
        }
        fn publish_target_reached(&mut self, state: GpsState) {
            self.0.borrow_mut().target_reached.push(state);
        }
        fn publish_target_timeout(&mut self) {
            self.0.borrow_mut().timeouts += 1;
        }
        fn arm_target_timeout(&mut self, _timeout: Duration) -> TimerId {
            let mut log = self.0.borrow_mut();
            log.next_timer += 1;
            TimerId(log.next_timer)
        }
        fn cancel_timer(&mut self, _id: TimerId) {}
        fn start_init_sequence(&mut self) {
            self.0.borrow_mut().init_started += 1;
        }
        fn power_off(&mut self) {
            self.0.borrow_mut().powered_off += 1;
        }
    }

    #[test]
    fn target_state_reached_eventually_published() {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut core = Core::new();
        let mut effects = Recorder(log.clone());

        core.process(&mut effects, Event::TargetState(TargetState::SearchFix, TEST_TIMEOUT));
        assert_eq!(log.borrow().init_started, 1);
        core.process(&mut effects, Event::InitOutcome(InitOutcome::Enter(GpsState::ColdStart)));
        assert_eq!(log.borrow().target_reached, vec![GpsState::ColdStart]);
    }

    #[test]
    fn reentrant_target_state_is_deferred_and_runs_fifo() {
        // A side effect (start_init_sequence) re-enters the core with a
        // second TARGET_STATE while the first call is still on the stack.
        struct Reentrant {
            log: Rc<RefCell<Log>>,
        }
        impl StateEffects for Reentrant {
            fn enter_state(&mut self, _state: GpsState) {}
            fn publish_state_change(&mut self, state: GpsState) {
                self.log.borrow_mut().state_changes.push(state);
            }
            fn publish_target_reached(&mut self, state: GpsState) {
                self.log.borrow_mut().target_reached.push(state);
            }
            fn publish_target_timeout(&mut self) {}
            fn arm_target_timeout(&mut self, _timeout: Duration) -> TimerId {
                TimerId(1)
            }
            fn cancel_timer(&mut self, _id: TimerId) {}
            fn start_init_sequence(&mut self) {
                self.log.borrow_mut().init_started += 1;
            }
            fn power_off(&mut self) {
                self.log.borrow_mut().powered_off += 1;
            }
        }

        let log = Rc::new(RefCell::new(Log::default()));
        let mut core = Core::new();
        let mut effects = Reentrant { log: log.clone() };

        // Manually simulate re-entrancy: bump the depth counter as if we
        // were inside an outer process() call, then submit two targets.
        core.in_sm_process = 1;
        core.process(&mut effects, Event::TargetState(TargetState::FixAcquired, TEST_TIMEOUT));
        core.process(&mut effects, Event::TargetState(TargetState::Off, TEST_TIMEOUT));
        assert_eq!(core.deferred_len(), 2);
        assert_eq!(core.target, TargetState::Off); // unapplied: target field untouched while deferred

        // Unwind: outer frame completes, draining the FIFO queue.
        core.in_sm_process = 0;
        core.drain_deferred_for_test(&mut effects);
        assert_eq!(core.deferred_len(), 0);
    }

    #[test]
    fn timeout_reverts_target_to_current() {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut core = Core::new();
        let mut effects = Recorder(log.clone());

        core.process(&mut effects, Event::TargetState(TargetState::FixAcquired, TEST_TIMEOUT));
        let timer = core.target_timer_id.unwrap();
        core.process(&mut effects, Event::Timeout(timer));
        assert_eq!(log.borrow().timeouts, 1);
        assert_eq!(core.target, TargetState::Off); // reverted to current (still PowerOff pre-init ack)
    }

    #[test]
    fn unrelated_timeout_does_not_fire_target_timeout() {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut core = Core::new();
        let mut effects = Recorder(log.clone());
        core.process(&mut effects, Event::TargetState(TargetState::SearchFix, TEST_TIMEOUT));
        core.process(&mut effects, Event::Timeout(TimerId(9999)));
        assert_eq!(log.borrow().timeouts, 0);
    }
}

#[cfg(test)]
impl Core {
    /// Test-only hook to directly exercise `drain_deferred` without going
    /// through a full `process()` call.
    fn drain_deferred_for_test(&mut self, effects: &mut dyn StateEffects) {
        self.drain_deferred(effects);
    }
}
