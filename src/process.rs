//! The public "provided surface" (spec §6): getpid/getppid, fork, wait,
//! exit, signal, kill, brk, and the two exec variants, plus the CPU loop's
//! `handle_pending_signals` safe point.
//!
//! `ProcessCore` owns the process-scope state (spec §3's lifecycle group);
//! it borrows the five external collaborators per call rather than owning
//! them, since they belong to the embedding emulator and outlive any single
//! syscall dispatch.

use std::io::Read;

use nix::unistd::ForkResult;

use crate::argv;
use crate::break_tracker::{BreakTracker, BRK_FAILURE_ADDR};
use crate::collaborators::{Cpu, ErrnoTranslator, ExecutionState, Filesystem, Loader, Ram};
use crate::error::MinixErrno;
use crate::logging::PidFileLogger;
use crate::pid::{MinixPid, ProcessTable};
use crate::signal::{self, DrainedAction, HandlerTable, SignalHandler, SIG_ERR};
use crate::signal_map::MinixSignal;
use crate::wait_status::{HostWaitStatus, WaitStat};

/// Translate a raw MINIX signal number into the validated enum. ProcessOps
/// owns id/flag translation per spec §2's data flow; a number outside
/// `[1, 16]` is the "translation miss" spec §7's taxonomy assigns `EINVAL`
/// to.
fn validate_signal(raw: i16) -> Option<MinixSignal> {
    u8::try_from(raw).ok().and_then(MinixSignal::from_u8)
}

/// Where the loaded executable's text+data is copied in emulated RAM.
/// Kept as a `ProcessCore` field (not a crate-wide constant) because spec §6
/// calls these out as constants that come from the collaborators, not ones
/// this crate gets to invent.
pub struct MemoryLayout {
    pub stack_base: u32,
    pub executable_base: u32,
}

pub struct ProcessCore {
    table: ProcessTable,
    handlers: HandlerTable,
    break_tracker: BreakTracker,
    initial_break: u32,
    exit_status: i16,
    layout: MemoryLayout,
}

impl ProcessCore {
    /// spec §4.1 `init()`: build a fresh table for a process that just
    /// started, with the real host self/parent pids.
    pub fn init(self_host_pid: i32, parent_host_pid: i32, layout: MemoryLayout) -> Self {
        PidFileLogger::new().install();
        ProcessCore {
            table: ProcessTable::init(self_host_pid, parent_host_pid),
            handlers: HandlerTable::default(),
            break_tracker: BreakTracker::new(),
            initial_break: 0,
            exit_status: 0,
            layout,
        }
    }

    pub fn exit_status(&self) -> i16 {
        self.exit_status
    }

    /// `getpid`/`getppid` combined, matching the original's single
    /// `MINIXCompat_Processes_GetProcessIDs` entry point.
    pub fn get_process_ids(&self) -> (MinixPid, MinixPid) {
        let (pid, ppid) = (self.table.self_minix_pid(), self.table.parent_minix_pid());
        log::debug!("getpid() -> {pid}");
        log::debug!("getppid() -> {ppid}");
        (pid, ppid)
    }

    /// spec §4.6: reserve the slot and PID before forking so parent and
    /// child observe identical pre-fork state, then fork the host.
    ///
    /// # Safety
    /// Per spec §5 there is exactly one host thread running the CPU loop;
    /// `fork()` is only sound under that single-threaded invariant.
    pub fn fork(&mut self, errors: &dyn ErrnoTranslator, on_child: impl FnOnce()) -> i16 {
        let (slot, new_minix_pid) = self.table.reserve_child();

        // SAFETY: spec §5 guarantees a single host thread.
        let result = match unsafe { nix::unistd::fork() } {
            Ok(ForkResult::Parent { child }) => {
                self.table.set_slot(slot, child.as_raw(), new_minix_pid);
                new_minix_pid
            }
            Ok(ForkResult::Child) => {
                // Reinitialize logging first, matching the original's
                // `MINIXCompat_Log_Initialize()` at the top of the child path
                // — a log file descriptor inherited across fork still points
                // at the parent's file.
                PidFileLogger::new().install();
                on_child();
                let new_self_host_pid = nix::unistd::getpid().as_raw();
                self.table.reparent_after_fork(slot, new_self_host_pid, new_minix_pid);
                0
            }
            Err(errno) => {
                self.table.rollback_reservation();
                errors.minix_for_host(errno as i32).as_negated_i16()
            }
        };

        log::debug!("fork() -> {result}");
        result
    }

    /// spec §4.7: loop past EINTR, translate/encode the result, and drop
    /// terminal (non-stopped) pids from the table.
    pub fn wait(&mut self, errors: &dyn ErrnoTranslator, minix_stat_loc: &mut i16) -> MinixPid {
        loop {
            let mut raw_status: libc::c_int = 0;
            // SAFETY: `&mut raw_status` is a valid out-pointer for the
            // duration of the call.
            let host_pid = unsafe { libc::wait(&mut raw_status) };
            if host_pid == -1 {
                let errno = nix::errno::Errno::last();
                if errno == nix::errno::Errno::EINTR {
                    continue;
                }
                let result = errors.minix_for_host(errno as i32).as_negated_i16();
                log::debug!("wait() -> {result}");
                return result;
            }

            let minix_pid = self.table.minix_for_host(host_pid);
            let stat = WaitStat::encode(HostWaitStatus(raw_status));
            *minix_stat_loc = stat.raw() as i16;

            if stat.is_terminal() {
                // A reaped host pid this table never tracked (e.g. an
                // inherited grandchild) has no entry to remove; `remove`
                // asserts a positive MinixPid; a miss here must not panic.
                if minix_pid > 0 {
                    self.table.remove(minix_pid);
                } else {
                    log::debug!("wait(): reaped host pid {host_pid} with no process table entry");
                }
            }

            log::debug!("wait({:#06x} = {:?}) -> {minix_pid}", *minix_stat_loc as u16, stat.classify());
            return minix_pid;
        }
    }

    /// spec §4.8: record the status and ask the CPU to finish up. Does not
    /// return to the guest; the embedding emulator's loop is expected to
    /// stop scheduling this process once `cpu.change_state(Finished)` runs.
    pub fn exit(&mut self, status: i16, cpu: &mut dyn Cpu) {
        self.exit_status = status;
        cpu.change_state(ExecutionState::Finished);
        log::debug!("exit({status})");
    }

    /// spec §4.5 `signal(2)`. `signal_number` is a raw, not-yet-validated
    /// MINIX signal number; an out-of-range value is the translation miss
    /// spec §7 covers, reported here as `SIG_ERR` since there is no old
    /// handler to return.
    pub fn signal(&mut self, signal_number: i16, new_handler: SignalHandler) -> SignalHandler {
        let Some(minix_signal) = validate_signal(signal_number) else {
            log::debug!("signal({signal_number}, {new_handler:#010x}) -> SIG_ERR (unknown signal)");
            return SIG_ERR;
        };
        signal::install(&mut self.handlers, minix_signal, new_handler)
    }

    /// spec §4.5 `kill(2)`. `signal_number` is a raw, not-yet-validated
    /// MINIX signal number; translation miss returns `EINVAL` per spec §7's
    /// taxonomy.
    pub fn kill(&self, pid: MinixPid, signal_number: i16, errors: &dyn ErrnoTranslator) -> i16 {
        assert!(pid > 0, "kill() requires a positive MinixPid");
        let Some(minix_signal) = validate_signal(signal_number) else {
            log::debug!("kill({pid}, {signal_number}) -> EINVAL (unknown signal)");
            return MinixErrno::EInval.as_negated_i16();
        };
        match signal::kill(&self.table, pid, minix_signal, errors) {
            Ok(()) => 0,
            Err(e) => e.as_negated_i16(),
        }
    }

    /// The CPU loop's safe point (spec §4.4 step 2): drain pending host
    /// signals, injecting guest frames or folding a default-terminate into
    /// `exit()`.
    pub fn handle_pending_signals(&mut self, cpu: &mut dyn Cpu) {
        if let Some(DrainedAction::DefaultTerminate(stat)) = signal::drain(&self.handlers, &mut *cpu) {
            let status = stat.exitstat as i16;
            self.exit(status, cpu);
        }
    }

    /// spec §4.9 `brk(2)`.
    pub fn brk(&mut self, requested: u32, resulting_addr: &mut u32) -> i16 {
        let result = match self.break_tracker.request(requested, self.initial_break) {
            Ok(addr) => {
                *resulting_addr = addr;
                0
            }
            Err(e) => {
                *resulting_addr = BRK_FAILURE_ADDR;
                e.as_negated_i16()
            }
        };
        log::debug!("brk({requested:#010x}, -> {:#010x}) -> {result}", *resulting_addr);
        result
    }

    /// Shared loader pipeline for both exec variants (spec §4.10
    /// `load_tool`).
    fn load_tool(
        &mut self,
        path: &str,
        filesystem: &dyn Filesystem,
        loader: &dyn Loader,
        ram: &mut dyn Ram,
        errors: &dyn ErrnoTranslator,
    ) -> Result<(), i16> {
        let host_path = filesystem.host_path_for(path);

        // TODO: support `#!`-prefixed interpreter scripts (never implemented
        // upstream either; see DESIGN.md).
        std::fs::metadata(&host_path)
            .map_err(|e| errors.minix_for_host(e.raw_os_error().unwrap_or(0)).as_negated_i16())?;

        let mut file = std::fs::File::open(&host_path)
            .map_err(|_| MinixErrno::EIo.as_negated_i16())?;

        let image = loader
            .load(&mut file as &mut dyn Read)
            .map_err(|e| errors.minix_for_host(e.raw_os_error().unwrap_or(0)).as_negated_i16())?;

        ram.copy_from_host(self.layout.executable_base, &image.text_and_data);
        self.initial_break = image.initial_break;
        Ok(())
    }

    /// spec §4.10 Variant A: `execute_with_stack_block`, used during
    /// fork-exec where argv/envp are already laid out as emulated offsets.
    pub fn exec_stack(
        &mut self,
        path: &str,
        host_stack_buf: &mut [u8],
        filesystem: &dyn Filesystem,
        loader: &dyn Loader,
        ram: &mut dyn Ram,
        cpu: &mut dyn Cpu,
        errors: &dyn ErrnoTranslator,
    ) -> i16 {
        log::debug!("execute_with_stack_block(\"{path}\")");
        ram.clear();

        if let Err(code) = self.load_tool(path, filesystem, loader, ram, errors) {
            log::debug!("execute_with_stack_block(\"{path}\") -> {code}");
            return code;
        }

        relocate_stack_buffer(host_stack_buf, self.layout.stack_base);

        ram.copy_from_host(self.layout.stack_base, host_stack_buf);
        cpu.change_state(ExecutionState::Ready);
        log::debug!("execute_with_stack_block(\"{path}\") -> 0");
        0
    }

    /// spec §4.10 Variant B: `execute_with_host_params`, used at initial
    /// entry from the host. Does not pre-clear RAM (see DESIGN.md).
    pub fn exec_host(
        &mut self,
        path: &str,
        argv: &[&str],
        envp: &[&str],
        filesystem: &dyn Filesystem,
        loader: &dyn Loader,
        ram: &mut dyn Ram,
        cpu: &mut dyn Cpu,
        errors: &dyn ErrnoTranslator,
    ) -> i16 {
        log::debug!("execute_with_host_params(\"{path}\")");
        if let Err(code) = self.load_tool(path, filesystem, loader, ram, errors) {
            log::debug!("execute_with_host_params(\"{path}\") -> {code}");
            return code;
        }

        let marshalled = argv::marshal(self.layout.stack_base, argv, envp);
        ram.copy_from_host(self.layout.stack_base, &marshalled.pointer_block);
        ram.copy_from_host(
            self.layout.stack_base + marshalled.pointer_block.len() as u32,
            &marshalled.content_block,
        );

        cpu.change_state(ExecutionState::Ready);
        log::debug!("execute_with_host_params(\"{path}\") -> 0");
        0
    }
}

/// Relocate the argc-skipped argv/envp pointer slots of a stack buffer
/// built by the guest itself (spec §4.10 Variant A step): every nonzero
/// pointer is an offset that becomes absolute once rebased by `stack_base`.
fn relocate_stack_buffer(buf: &mut [u8], stack_base: u32) {
    // Skip argc (first 4 bytes), then walk argv pointers until the NULL,
    // then envp pointers until the NULL.
    let mut offset = 4;
    offset = relocate_pointer_run(buf, offset, stack_base);
    offset += 4; // the NULL terminating argv
    relocate_pointer_run(buf, offset, stack_base);
}

fn relocate_pointer_run(buf: &mut [u8], mut offset: usize, stack_base: u32) -> usize {
    loop {
        let word = u32::from_be_bytes(buf[offset..offset + 4].try_into().unwrap());
        if word == 0 {
            return offset;
        }
        buf[offset..offset + 4].copy_from_slice(&(word + stack_base).to_be_bytes());
        offset += 4;
    }
}
