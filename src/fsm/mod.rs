//! Function-pointer finite state machine engine for the dispense-verify
//! cycle.
//!
//! Classic embedded FSM pattern ported to Rust:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                    │
//! │  ┌────────────────┬──────────┬──────────┬───────────────────┐  │
//! │  │ StateId        │ on_enter │ on_exit  │ on_update         │  │
//! │  ├────────────────┼──────────┼──────────┼───────────────────┤  │
//! │  │ Idle           │ fn(ctx)  │ —        │ fn(ctx)->Option<> │  │
//! │  │ Dispensing     │ fn(ctx)  │ fn(ctx)  │ fn(ctx)->Option<> │  │
//! │  │ Dropped        │ fn(ctx)  │ —        │ fn(ctx)->Option<> │  │
//! │  │ DispenseFailed │ fn(ctx)  │ —        │ fn(ctx)->Option<> │  │
//! │  │ HandChecking   │ fn(ctx)  │ fn(ctx)  │ fn(ctx)->Option<> │  │
//! │  │ Taken          │ fn(ctx)  │ —        │ fn(ctx)->Option<> │  │
//! │  │ Missed         │ fn(ctx)  │ —        │ fn(ctx)->Option<> │  │
//! │  │ Done           │ fn(ctx)  │ —        │ fn(ctx)->Option<> │  │
//! │  └────────────────┴──────────┴──────────┴───────────────────┘  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.
//! If it returns `Some(next_id)`, the engine runs `on_exit` for the
//! current state, then `on_enter` for the next, and updates the
//! current pointer.  All functions receive `&mut CycleContext`.
//!
//! [`run_cycle`] drives one reminder from `Idle` through `Dispensing`
//! and back to `Idle`, blocking the caller for the whole bounded cycle.

pub mod context;
pub mod states;

use context::CycleContext;
use log::info;

use crate::repository::model::DoseResult;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all dispense-verify states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Idle = 0,
    Dispensing = 1,
    Dropped = 2,
    DispenseFailed = 3,
    HandChecking = 4,
    Taken = 5,
    Missed = 6,
    Done = 7,
}

impl StateId {
    /// Total number of states — used to size the table array.
    pub const COUNT: usize = 8;

    /// Convert an index back to `StateId`.  Panics on out-of-range in
    /// debug builds; returns `Idle` in release.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::Dispensing,
            2 => Self::Dropped,
            3 => Self::DispenseFailed,
            4 => Self::HandChecking,
            5 => Self::Taken,
            6 => Self::Missed,
            7 => Self::Done,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Idle
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn = fn(&mut CycleContext<'_>);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut CycleContext<'_>) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
/// Stored in a fixed-size array — no heap, no `dyn`.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
///
/// Owns the state table (array of [`StateDescriptor`]); the
/// [`CycleContext`] is threaded through every handler call.
pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    /// Index of the currently active state.
    current: usize,
}

impl Fsm {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut CycleContext<'_>) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM by one tick.
    ///
    /// 1. Call `on_update` for the current state.
    /// 2. If it returns `Some(next)`, execute the transition:
    ///    `on_exit(current)` → update pointer → `on_enter(next)`.
    pub fn tick(&mut self, ctx: &mut CycleContext<'_>) {
        let next = (self.table[self.current].on_update)(ctx);

        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    /// Force an immediate transition regardless of what `on_update`
    /// would return.  Used to kick a cycle off from `Idle`.
    pub fn force_transition(&mut self, next: StateId, ctx: &mut CycleContext<'_>) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    /// The current state's identity.
    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut CycleContext<'_>) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}

// ---------------------------------------------------------------------------
// Cycle driver
// ---------------------------------------------------------------------------

/// Summary of one completed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub result: DoseResult,
    pub bursts: u32,
    pub dropped: bool,
    pub cue_periods: u32,
}

/// Run one full dispense-verify cycle for `ctx.reminder`.
///
/// Blocks until the machine is back in `Idle`.  The tick count is bounded
/// by `max_bursts + total_cue_periods` plus a handful of transitions.
pub fn run_cycle(ctx: &mut CycleContext<'_>) -> CycleReport {
    let mut fsm = Fsm::new(states::build_state_table(), StateId::Idle);
    fsm.start(ctx);
    fsm.force_transition(StateId::Dispensing, ctx);
    while fsm.current_state() != StateId::Idle {
        fsm.tick(ctx);
    }

    CycleReport {
        // Every path to Idle passes a terminal state that sets it.
        result: ctx.result.unwrap_or(DoseResult::Missed),
        bursts: ctx.bursts,
        dropped: ctx.dropped,
        cue_periods: ctx.cue_periods,
    }
}
