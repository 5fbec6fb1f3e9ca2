//! The fixed bijection between MINIX's 16 signal numbers and host signals.
//!
//! Grounded on `MINIXCompat_Processes_HostSignalForMINIXSignal` and its
//! inverse in `MINIXCompat_Processes.c`. Two MINIX signals the host doesn't
//! have — `SIGUNUSED` and `SIGSTKFLT` — are proxied onto host signals that
//! are rarely raised for real (`SIGXFSZ`, `SIGXCPU` respectively).

use nix::sys::signal::Signal;

/// MINIX signal numbers 1..=16, in the original's declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum MinixSignal {
    Hup = 1,
    Int = 2,
    Quit = 3,
    Ill = 4,
    Trap = 5,
    Abrt = 6,
    Unused = 7,
    Fpe = 8,
    Kill = 9,
    Usr1 = 10,
    Segv = 11,
    Usr2 = 12,
    Pipe = 13,
    Alrm = 14,
    Term = 15,
    Stkflt = 16,
}

impl MinixSignal {
    pub const MIN: u8 = MinixSignal::Hup as u8;
    pub const MAX: u8 = MinixSignal::Stkflt as u8;

    /// All 16 signals in ascending numeric order, the order `drain()` must
    /// process pending signals in (spec §5 ordering guarantee (i)).
    pub const ALL: [MinixSignal; 16] = [
        MinixSignal::Hup,
        MinixSignal::Int,
        MinixSignal::Quit,
        MinixSignal::Ill,
        MinixSignal::Trap,
        MinixSignal::Abrt,
        MinixSignal::Unused,
        MinixSignal::Fpe,
        MinixSignal::Kill,
        MinixSignal::Usr1,
        MinixSignal::Segv,
        MinixSignal::Usr2,
        MinixSignal::Pipe,
        MinixSignal::Alrm,
        MinixSignal::Term,
        MinixSignal::Stkflt,
    ];

    pub fn from_u8(n: u8) -> Option<MinixSignal> {
        Self::ALL.into_iter().find(|s| *s as u8 == n)
    }

    /// The host `Signal` this MINIX signal is delivered as.
    pub fn to_host(self) -> Signal {
        match self {
            MinixSignal::Hup => Signal::SIGHUP,
            MinixSignal::Int => Signal::SIGINT,
            MinixSignal::Quit => Signal::SIGQUIT,
            MinixSignal::Ill => Signal::SIGILL,
            MinixSignal::Trap => Signal::SIGTRAP,
            MinixSignal::Abrt => Signal::SIGABRT,
            MinixSignal::Unused => Signal::SIGXFSZ,
            MinixSignal::Fpe => Signal::SIGFPE,
            MinixSignal::Kill => Signal::SIGKILL,
            MinixSignal::Usr1 => Signal::SIGUSR1,
            MinixSignal::Segv => Signal::SIGSEGV,
            MinixSignal::Usr2 => Signal::SIGUSR2,
            MinixSignal::Pipe => Signal::SIGPIPE,
            MinixSignal::Alrm => Signal::SIGALRM,
            MinixSignal::Term => Signal::SIGTERM,
            MinixSignal::Stkflt => Signal::SIGXCPU,
        }
    }

    /// Inverse of [`to_host`](Self::to_host). Returns `None` for any host
    /// signal not in the bijection, which callers treat as "ignore".
    pub fn from_host(signal: Signal) -> Option<MinixSignal> {
        match signal {
            Signal::SIGHUP => Some(MinixSignal::Hup),
            Signal::SIGINT => Some(MinixSignal::Int),
            Signal::SIGQUIT => Some(MinixSignal::Quit),
            Signal::SIGILL => Some(MinixSignal::Ill),
            Signal::SIGTRAP => Some(MinixSignal::Trap),
            Signal::SIGABRT => Some(MinixSignal::Abrt),
            Signal::SIGXFSZ => Some(MinixSignal::Unused),
            Signal::SIGFPE => Some(MinixSignal::Fpe),
            Signal::SIGKILL => Some(MinixSignal::Kill),
            Signal::SIGUSR1 => Some(MinixSignal::Usr1),
            Signal::SIGSEGV => Some(MinixSignal::Segv),
            Signal::SIGUSR2 => Some(MinixSignal::Usr2),
            Signal::SIGPIPE => Some(MinixSignal::Pipe),
            Signal::SIGALRM => Some(MinixSignal::Alrm),
            Signal::SIGTERM => Some(MinixSignal::Term),
            Signal::SIGXCPU => Some(MinixSignal::Stkflt),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bijection_round_trips_for_all_16() {
        for s in MinixSignal::ALL {
            let host = s.to_host();
            assert_eq!(MinixSignal::from_host(host), Some(s), "{s:?} -> {host:?}");
        }
    }

    #[test]
    fn unmapped_host_signal_is_none() {
        assert_eq!(MinixSignal::from_host(Signal::SIGCHLD), None);
    }

    #[test]
    fn from_u8_covers_the_full_range() {
        for n in MinixSignal::MIN..=MinixSignal::MAX {
            assert!(MinixSignal::from_u8(n).is_some());
        }
        assert!(MinixSignal::from_u8(0).is_none());
        assert!(MinixSignal::from_u8(17).is_none());
    }
}
