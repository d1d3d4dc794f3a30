//! Shared interrupt line.

mod common;

use common::{Timer, new_log, t};
use emu_core::{CpuBus, DeviceId, SyncTag};
use machine_msx::{MachineBuilder, MachineConfig, Motherboard};
use proptest::prelude::*;

fn board_with(count: usize) -> (Motherboard, Vec<DeviceId>) {
    let log = new_log();
    let mut builder = MachineBuilder::new(&MachineConfig::default());
    let ids = (0..count)
        .map(|_| builder.add_device(Timer::new("src", &log)))
        .collect();
    (builder.build().unwrap(), ids)
}

#[test]
fn line_stays_up_until_last_source_lowers() {
    let (mut board, ids) = board_with(2);
    board.raise_irq(ids[0]);
    board.raise_irq(ids[1]);
    board.lower_irq(ids[0]);
    assert!(board.irq_pending());
    board.lower_irq(ids[1]);
    assert!(!board.irq_pending());
}

#[test]
fn devices_raise_from_their_handlers() {
    let log = new_log();
    let mut builder = MachineBuilder::new(&MachineConfig::default());
    let mut vdp = Timer::new("vdp", &log);
    vdp.raise_on = Some(SyncTag(1));
    let vdp = builder.add_device(vdp);
    let mut board = builder.build().unwrap();

    board.register_point(t(10), vdp, SyncTag(1));
    assert!(!board.irq_pending());
    board.dispatch_due(t(10));
    assert!(board.irq_pending());
    assert_eq!(board.irq_count(), 1);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "raised the IRQ line twice")]
fn double_raise_is_a_bug() {
    let (mut board, ids) = board_with(1);
    board.raise_irq(ids[0]);
    board.raise_irq(ids[0]);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "lowered the IRQ line without raising it")]
fn lower_without_raise_is_a_bug() {
    let (mut board, ids) = board_with(1);
    board.lower_irq(ids[0]);
}

proptest! {
    #[test]
    fn pending_iff_any_source_raised(
        order in Just((0..8usize).collect::<Vec<_>>()).prop_shuffle(),
        lowered in 0..=8usize,
    ) {
        let (mut board, ids) = board_with(8);
        for &i in &order {
            board.raise_irq(ids[i]);
        }
        prop_assert_eq!(board.irq_count(), 8);
        for &i in order.iter().rev().take(lowered) {
            board.lower_irq(ids[i]);
        }
        prop_assert_eq!(board.irq_count(), 8 - lowered);
        prop_assert_eq!(board.irq_pending(), lowered < 8);
    }
}
