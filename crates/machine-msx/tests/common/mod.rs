//! Devices and a scripted CPU shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use emu_core::{
    Cpu, CpuBus, Device, DeviceContext, EmuDuration, EmuTime, IoDevice, MemoryDevice, Schedulable,
    SyncTag,
};

/// Shared event log, written by devices and read by the test.
pub type Log = Rc<RefCell<Vec<String>>>;

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn take(log: &Log) -> Vec<String> {
    std::mem::take(&mut *log.borrow_mut())
}

/// Route `tracing` output to the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

pub fn t(ticks: u64) -> EmuTime {
    EmuTime::from_ticks(ticks)
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// 64K of memory that logs every access with its name.
pub struct Ram {
    name: &'static str,
    data: Vec<u8>,
    log: Log,
}

impl Ram {
    pub fn new(name: &'static str, fill: u8, log: &Log) -> Self {
        Self {
            name,
            data: vec![fill; 0x1_0000],
            log: Rc::clone(log),
        }
    }
}

impl Device for Ram {
    fn name(&self) -> &str {
        self.name
    }

    fn as_memory(&mut self) -> Option<&mut dyn MemoryDevice> {
        Some(self)
    }
}

impl MemoryDevice for Ram {
    fn read_mem(&mut self, address: u16, _time: EmuTime, _ctx: &mut DeviceContext<'_>) -> u8 {
        self.log
            .borrow_mut()
            .push(format!("{} read {address:04X}", self.name));
        self.data[usize::from(address)]
    }

    fn peek_mem(&self, address: u16) -> u8 {
        self.data[usize::from(address)]
    }

    fn write_mem(&mut self, address: u16, value: u8, _time: EmuTime, _ctx: &mut DeviceContext<'_>) {
        self.log
            .borrow_mut()
            .push(format!("{} write {address:04X}={value:02X}", self.name));
        self.data[usize::from(address)] = value;
    }
}

// ---------------------------------------------------------------------------
// Scheduling
// ---------------------------------------------------------------------------

/// Logs every wake-up as `"<name>@<ticks>#<tag>"`. Optionally re-arms
/// itself `period` ticks later, and can stop the run loop on a given tag.
pub struct Timer {
    name: &'static str,
    log: Log,
    pub period: Option<u64>,
    pub stop_on: Option<SyncTag>,
    pub raise_on: Option<SyncTag>,
}

impl Timer {
    pub fn new(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            log: Rc::clone(log),
            period: None,
            stop_on: None,
            raise_on: None,
        }
    }

    pub fn periodic(name: &'static str, period: u64, log: &Log) -> Self {
        Self {
            period: Some(period),
            ..Self::new(name, log)
        }
    }
}

impl Device for Timer {
    fn name(&self) -> &str {
        self.name
    }

    fn reset(&mut self, _time: EmuTime, _ctx: &mut DeviceContext<'_>) {
        self.log.borrow_mut().push(format!("{} reset", self.name));
    }

    fn as_schedulable(&mut self) -> Option<&mut dyn Schedulable> {
        Some(self)
    }
}

impl Schedulable for Timer {
    fn on_sync_point(&mut self, time: EmuTime, tag: SyncTag, ctx: &mut DeviceContext<'_>) {
        self.log
            .borrow_mut()
            .push(format!("{}@{}#{}", self.name, time.ticks(), tag.0));
        if let Some(period) = self.period {
            ctx.register_point_after(EmuDuration::from_ticks(period as i64), tag);
        }
        if self.raise_on == Some(tag) && !ctx.irq_asserted() {
            ctx.raise_irq();
        }
        if self.stop_on == Some(tag) {
            ctx.stop_emulation();
        }
    }
}

// ---------------------------------------------------------------------------
// I/O
// ---------------------------------------------------------------------------

/// Port device standing in for the PPI: a write to its port loads the
/// primary slot register, a read returns the last value written.
pub struct SlotSelect {
    latch: u8,
}

impl SlotSelect {
    pub fn new() -> Self {
        Self { latch: 0 }
    }
}

impl Device for SlotSelect {
    fn name(&self) -> &str {
        "ppi"
    }

    fn reset(&mut self, _time: EmuTime, _ctx: &mut DeviceContext<'_>) {
        self.latch = 0;
    }

    fn as_io(&mut self) -> Option<&mut dyn IoDevice> {
        Some(self)
    }
}

impl IoDevice for SlotSelect {
    fn read_io(&mut self, _port: u16, _time: EmuTime, _ctx: &mut DeviceContext<'_>) -> u8 {
        self.latch
    }

    fn peek_io(&self, _port: u16) -> u8 {
        self.latch
    }

    fn write_io(&mut self, _port: u16, value: u8, _time: EmuTime, ctx: &mut DeviceContext<'_>) {
        self.latch = value;
        ctx.write_primary_slots(value);
    }
}

/// Logs lifecycle hooks as `"<name> <hook>"`.
pub struct Hooks {
    name: &'static str,
    log: Log,
}

impl Hooks {
    pub fn new(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            log: Rc::clone(log),
        }
    }

    fn note(&self, hook: &str) {
        self.log.borrow_mut().push(format!("{} {hook}", self.name));
    }
}

impl Device for Hooks {
    fn name(&self) -> &str {
        self.name
    }

    fn init(&mut self, _ctx: &mut DeviceContext<'_>) {
        self.note("init");
    }

    fn reset(&mut self, _time: EmuTime, _ctx: &mut DeviceContext<'_>) {
        self.note("reset");
    }

    fn start(&mut self, _ctx: &mut DeviceContext<'_>) {
        self.note("start");
    }

    fn stop(&mut self, _ctx: &mut DeviceContext<'_>) {
        self.note("stop");
    }

    fn destroy(&mut self, _ctx: &mut DeviceContext<'_>) {
        self.note("destroy");
    }
}

// ---------------------------------------------------------------------------
// CPU
// ---------------------------------------------------------------------------

/// One scripted "instruction".
#[derive(Debug, Clone, Copy)]
pub enum Op {
    Nop,
    Read(u16),
    Write(u16, u8),
    In(u16),
    Out(u16, u8),
}

/// A CPU that replays a script, one op per `step` ticks, then idles.
/// Values it reads are kept in `reads`.
pub struct ScriptCpu {
    time: EmuTime,
    step: EmuDuration,
    script: VecDeque<Op>,
    pub reads: Vec<u8>,
    pub slices: usize,
}

impl ScriptCpu {
    pub fn new(step: u64, script: impl IntoIterator<Item = Op>) -> Self {
        Self {
            time: EmuTime::ZERO,
            step: EmuDuration::from_ticks(step as i64),
            script: script.into_iter().collect(),
            reads: Vec::new(),
            slices: 0,
        }
    }
}

impl Cpu for ScriptCpu {
    fn time(&self) -> EmuTime {
        self.time
    }

    fn execute<B: CpuBus>(&mut self, bus: &mut B, limit: EmuTime) -> EmuTime {
        self.slices += 1;
        while self.time < limit.min(bus.next_sync_time()) {
            match self.script.pop_front().unwrap_or(Op::Nop) {
                Op::Nop => {}
                Op::Read(address) => self.reads.push(bus.read_mem(address, self.time)),
                Op::Write(address, value) => bus.write_mem(address, value, self.time),
                Op::In(port) => self.reads.push(bus.read_io(port, self.time)),
                Op::Out(port, value) => bus.write_io(port, value, self.time),
            }
            self.time += self.step;
        }
        self.time
    }

    fn set_time(&mut self, time: EmuTime) {
        self.time = time;
    }

    fn reset(&mut self, time: EmuTime) {
        self.time = time;
        self.script.clear();
    }
}
