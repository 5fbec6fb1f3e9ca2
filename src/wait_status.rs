//! Encoding a host wait status into MINIX's 16-bit two-byte `WaitStat`.
//!
//! Ground truth is `MINIXCompat_Processes_MINIXStatForHostStat` in
//! `MINIXCompat_Processes.c`. The encoder is bug-compatible with real MINIX
//! 1.5: both the exited and signaled cases produce `sigstat == 0`, which is
//! genuinely ambiguous on the wire — see the module-level discussion in
//! DESIGN.md (Open Question 1). We don't invent a new encoding; we only
//! choose a self-consistent *internal* classification that never needs to
//! tell those two cases apart (spec §4.7 treats them identically).

/// A host wait status, the `libc::waitpid`-style bitfield. We only need to
/// classify it, not use it further, so this is just a `c_int` wrapper to
/// keep call sites readable.
#[derive(Clone, Copy, Debug)]
pub struct HostWaitStatus(pub i32);

impl HostWaitStatus {
    fn exited(self) -> bool {
        libc_wifexited(self.0)
    }
    fn stopped(self) -> bool {
        libc_wifstopped(self.0)
    }
    fn signaled(self) -> bool {
        libc_wifsignaled(self.0)
    }
    fn exit_status(self) -> u8 {
        libc_wexitstatus(self.0) as u8
    }
    fn stop_signal(self) -> u8 {
        libc_wstopsig(self.0) as u8
    }
    fn term_signal(self) -> u8 {
        libc_wtermsig(self.0) as u8
    }
}

// The `WIF*`/`W*` family are macros in glibc, reimplemented here in terms of
// the raw bit layout documented in `sys/wait.h` so this module has no libc
// dependency of its own; `crate::process` is the only place that actually
// talks to the host `wait(2)` and hands us the raw status.
fn libc_wifexited(status: i32) -> bool {
    status & 0x7f == 0
}
fn libc_wexitstatus(status: i32) -> i32 {
    (status >> 8) & 0xff
}
fn libc_wifsignaled(status: i32) -> bool {
    // Same bit trick glibc's `__WIFSIGNALED` uses: true for any low 7 bits
    // in 1..=0x7e, false for 0 (exited) and 0x7f (stopped).
    ((status & 0x7f) + 1) as i8 >> 1 > 0
}
fn libc_wtermsig(status: i32) -> i32 {
    status & 0x7f
}
fn libc_wifstopped(status: i32) -> bool {
    status & 0xff == 0x7f
}
fn libc_wstopsig(status: i32) -> i32 {
    libc_wexitstatus(status)
}

/// MINIX's SIGKILL number, used as the "anything else" fallback.
const MINIX_SIGKILL: u8 = crate::signal_map::MinixSignal::Kill as u8;

/// The MINIX-side 16-bit wait status: low byte `exitstat`, high byte
/// `sigstat`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitStat {
    pub exitstat: u8,
    pub sigstat: u8,
}

/// A classification of a [`WaitStat`], folding the exited/signaled
/// ambiguity into a single `Exited` case (see module docs).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    Exited(u8),
    Stopped(u8),
    Other,
}

impl WaitStat {
    pub fn raw(self) -> u16 {
        u16::from_le_bytes([self.exitstat, self.sigstat])
    }

    pub fn from_raw(raw: u16) -> Self {
        let [exitstat, sigstat] = raw.to_le_bytes();
        WaitStat { exitstat, sigstat }
    }

    /// Encode a raw host `wait(2)` status per spec §4.2.
    pub fn encode(host_status: HostWaitStatus) -> Self {
        if host_status.exited() {
            WaitStat { exitstat: host_status.exit_status(), sigstat: 0 }
        } else if host_status.stopped() {
            WaitStat { exitstat: host_status.stop_signal(), sigstat: 0x7f }
        } else if host_status.signaled() {
            WaitStat { exitstat: host_status.term_signal(), sigstat: 0 }
        } else {
            WaitStat { exitstat: MINIX_SIGKILL, sigstat: 0 }
        }
    }

    /// `true` for MINIX's `sigstat == 0x7F` stopped encoding.
    pub fn is_stopped(self) -> bool {
        self.sigstat == 0x7f
    }

    /// `true` for anything that isn't "stopped" — i.e. the process is no
    /// longer waitable and should be removed from the process table
    /// (spec §4.7 treats exited and signaled identically for this purpose).
    pub fn is_terminal(self) -> bool {
        !self.is_stopped()
    }

    pub fn classify(self) -> Classification {
        if self.is_stopped() {
            Classification::Stopped(self.exitstat)
        } else {
            Classification::Exited(self.exitstat)
        }
    }

    /// Build a synthetic terminal status for a signal's default action
    /// (spec §4.4 Open Question 3): same shape the encoder uses for a real
    /// signaled host status.
    pub fn synthetic_signaled(signo: u8) -> Self {
        WaitStat { exitstat: signo, sigstat: 0 }
    }
}
