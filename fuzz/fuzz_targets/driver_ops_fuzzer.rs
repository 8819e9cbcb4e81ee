//! Fuzz target for driver event sequencing
//!
//! # Strategy
//!
//! - Arbitrary sequences of public driver operations
//! - Payload first bytes select machine and visitor reactions: reentrant
//!   writes, aborts, visitor failures, machine failures, owner teardown
//!
//! # Invariants
//!
//! - The state machine is never entered during dispatch or another `process`
//! - `report_error` is called at most once, and exactly once in the error state
//! - Nothing is processed after the error report
//! - No event stays queued between calls and the owner guard is released

#![no_main]

use cinder_harness::{
    DriverOp, DriverSnapshot, InvariantRegistry, ScriptedHarness, chaos_responder,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|ops: Vec<DriverOp>| {
    let mut harness = ScriptedHarness::new(chaos_responder);
    let invariants = InvariantRegistry::standard();

    for op in ops.iter().take(256) {
        op.apply(&mut harness);
        invariants.assert_all(&DriverSnapshot::capture(&harness), &format!("after {op:?}"));
        assert_eq!(harness.owner.guard_count(), 0, "guard leaked after {op:?}");
    }
});
