//! Concrete state handler functions and table builder.
//!
//! Each state is defined by three plain `fn` pointers — no closures, no
//! dynamic dispatch, no heap.  Every `on_update` call performs one
//! bounded unit of blocking work (one motor burst or one cue period), so
//! a full cycle is a finite number of ticks.
//!
//! ```text
//!  IDLE ──[run_cycle]──▶ DISPENSING ──[chute sensor]──▶ DROPPED
//!    ▲                       │                            │
//!    │                [bursts exhausted]                  ▼
//!    │                       ▼                      HAND_CHECKING
//!    │                DISPENSE_FAILED             │              │
//!    │                       │              [hand seen]   [window over]
//!    │                       │                    ▼              ▼
//!    │                       │                  TAKEN         MISSED
//!    │                       ▼                    │              │
//!    └────────────────────  DONE ◀────────────────┴──────────────┘
//! ```
//!
//! `DispenseFailed`, `Taken` and `Missed` each report exactly one outcome
//! to the observer, set the failure indicator, update the display and
//! choose the settle delay `Done` observes before returning to `Idle`.

use log::{debug, info, warn};

use super::context::{CycleContext, lcd_line};
use super::{StateDescriptor, StateId};
use crate::repository::model::DoseResult;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once per cycle.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0 — Idle
        StateDescriptor {
            id: StateId::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        // Index 1 — Dispensing
        StateDescriptor {
            id: StateId::Dispensing,
            name: "Dispensing",
            on_enter: Some(dispensing_enter),
            on_exit: Some(dispensing_exit),
            on_update: dispensing_update,
        },
        // Index 2 — Dropped
        StateDescriptor {
            id: StateId::Dropped,
            name: "Dropped",
            on_enter: Some(dropped_enter),
            on_exit: None,
            on_update: dropped_update,
        },
        // Index 3 — DispenseFailed
        StateDescriptor {
            id: StateId::DispenseFailed,
            name: "DispenseFailed",
            on_enter: Some(dispense_failed_enter),
            on_exit: None,
            on_update: to_done,
        },
        // Index 4 — HandChecking
        StateDescriptor {
            id: StateId::HandChecking,
            name: "HandChecking",
            on_enter: Some(hand_checking_enter),
            on_exit: Some(hand_checking_exit),
            on_update: hand_checking_update,
        },
        // Index 5 — Taken
        StateDescriptor {
            id: StateId::Taken,
            name: "Taken",
            on_enter: Some(taken_enter),
            on_exit: None,
            on_update: to_done,
        },
        // Index 6 — Missed
        StateDescriptor {
            id: StateId::Missed,
            name: "Missed",
            on_enter: Some(missed_enter),
            on_exit: None,
            on_update: to_done,
        },
        // Index 7 — Done
        StateDescriptor {
            id: StateId::Done,
            name: "Done",
            on_enter: Some(done_enter),
            on_exit: None,
            on_update: done_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE state
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut CycleContext<'_>) {
    ctx.hw.all_off();
}

fn idle_update(_ctx: &mut CycleContext<'_>) -> Option<StateId> {
    // Leaves only through `Fsm::force_transition`.
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  DISPENSING state — bounded motor bursts until the chute sensor fires
// ═══════════════════════════════════════════════════════════════════════════

fn dispensing_enter(ctx: &mut CycleContext<'_>) {
    ctx.bursts = 0;
    ctx.dropped = false;
    ctx.hw.show_text("Dispensing...", lcd_line(&ctx.reminder.med));
    let now = ctx.now_ms();
    ctx.observer.dispense_attempt(ctx.reminder, now);
    info!(
        "DISPENSING: id={} up to {} bursts",
        ctx.reminder.id, ctx.timing.max_bursts
    );
}

fn dispensing_update(ctx: &mut CycleContext<'_>) -> Option<StateId> {
    if ctx.bursts >= ctx.timing.max_bursts {
        warn!("DISPENSING: no pill after {} bursts", ctx.bursts);
        return Some(StateId::DispenseFailed);
    }

    ctx.bursts += 1;
    ctx.hw.motor_forward();
    ctx.delay_ms(ctx.timing.burst_ms);
    ctx.hw.motor_stop();

    let (drop_polls, drop_poll_ms) = (ctx.timing.drop_polls(), ctx.timing.drop_poll_ms);
    let (pause_polls, pause_poll_ms) = (ctx.timing.pause_polls(), ctx.timing.pause_poll_ms);
    if ctx.poll_dispense_sensor(drop_polls, drop_poll_ms)
        || ctx.poll_dispense_sensor(pause_polls, pause_poll_ms)
    {
        ctx.dropped = true;
        info!("DISPENSING: drop detected on burst {}", ctx.bursts);
        return Some(StateId::Dropped);
    }

    debug!("DISPENSING: burst {} no drop", ctx.bursts);
    None
}

fn dispensing_exit(ctx: &mut CycleContext<'_>) {
    ctx.hw.motor_stop();
}

// ═══════════════════════════════════════════════════════════════════════════
//  DROPPED state
// ═══════════════════════════════════════════════════════════════════════════

fn dropped_enter(ctx: &mut CycleContext<'_>) {
    info!("DROPPED: pill in tray, id={}", ctx.reminder.id);
}

fn dropped_update(_ctx: &mut CycleContext<'_>) -> Option<StateId> {
    Some(StateId::HandChecking)
}

// ═══════════════════════════════════════════════════════════════════════════
//  DISPENSE_FAILED state
// ═══════════════════════════════════════════════════════════════════════════

fn dispense_failed_enter(ctx: &mut CycleContext<'_>) {
    let now = ctx.now_ms();
    ctx.observer.dispense_failed(ctx.reminder, now);
    let settle_ms = ctx.timing.fail_settle_ms;
    finish(ctx, DoseResult::Missed, "DROP FAIL", settle_ms);
}

// ═══════════════════════════════════════════════════════════════════════════
//  HAND_CHECKING state — cue pulses until the hand sensor fires
// ═══════════════════════════════════════════════════════════════════════════

fn hand_checking_enter(ctx: &mut CycleContext<'_>) {
    ctx.cue_periods = 0;
    ctx.hw.show_text("Check hand...", "");
    info!(
        "HAND_CHECKING: {} cycles x {}ms",
        ctx.timing.hand_cycles, ctx.timing.hand_cycle_ms
    );
}

fn hand_checking_update(ctx: &mut CycleContext<'_>) -> Option<StateId> {
    if ctx.cue_periods >= ctx.timing.total_cue_periods() {
        info!("HAND_CHECKING: window over, no pickup");
        return Some(StateId::Missed);
    }

    ctx.cue_periods += 1;
    ctx.hw.sound_cue(true);
    ctx.delay_ms(ctx.timing.cue_on_ms);
    ctx.hw.sound_cue(false);

    if ctx.hw.read_hand_sensor() {
        info!("HAND_CHECKING: pickup on period {}", ctx.cue_periods);
        return Some(StateId::Taken);
    }
    ctx.delay_ms(ctx.timing.cue_off_ms);
    None
}

fn hand_checking_exit(ctx: &mut CycleContext<'_>) {
    ctx.hw.sound_cue(false);
}

// ═══════════════════════════════════════════════════════════════════════════
//  TAKEN / MISSED states
// ═══════════════════════════════════════════════════════════════════════════

fn taken_enter(ctx: &mut CycleContext<'_>) {
    let settle_ms = ctx.timing.outcome_settle_ms;
    finish(ctx, DoseResult::Taken, "Taken", settle_ms);
}

fn missed_enter(ctx: &mut CycleContext<'_>) {
    let settle_ms = ctx.timing.outcome_settle_ms;
    finish(ctx, DoseResult::Missed, "MISSED", settle_ms);
}

fn to_done(_ctx: &mut CycleContext<'_>) -> Option<StateId> {
    Some(StateId::Done)
}

/// Shared terminal action: report, indicate, display, pick the settle delay.
fn finish(ctx: &mut CycleContext<'_>, result: DoseResult, label: &str, settle_ms: u32) {
    ctx.result = Some(result);
    ctx.settle_ms = settle_ms;
    let now = ctx.now_ms();
    ctx.observer.outcome(ctx.reminder, result, now);
    ctx.hw.set_failure_indicator(result == DoseResult::Missed);
    ctx.hw.show_text(label, lcd_line(&ctx.reminder.med));
    info!("{}: id={}", result.as_str().to_uppercase(), ctx.reminder.id);
}

// ═══════════════════════════════════════════════════════════════════════════
//  DONE state
// ═══════════════════════════════════════════════════════════════════════════

fn done_enter(ctx: &mut CycleContext<'_>) {
    ctx.delay_ms(ctx.settle_ms);
    ctx.hw.show_text("Waiting...", "");
}

fn done_update(_ctx: &mut CycleContext<'_>) -> Option<StateId> {
    Some(StateId::Idle)
}
