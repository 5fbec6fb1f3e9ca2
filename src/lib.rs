//! Process table, signal delivery, argv/envp marshalling, and heap-break
//! tracking for a MINIX 1.5 (m68k) host compatibility layer.
//!
//! This crate implements the process-management core only: it consumes a
//! CPU emulator, emulated RAM, an executable loader, a filesystem path
//! translator, and an errno translator through the traits in
//! [`collaborators`], and exposes the "provided surface" — fork, wait, exit,
//! signal, kill, brk, and the two exec variants — through
//! [`process::ProcessCore`].

pub mod argv;
pub mod break_tracker;
pub mod collaborators;
pub mod error;
pub mod logging;
pub mod pid;
pub mod process;
pub mod signal;
pub mod signal_map;
pub mod wait_status;

pub use collaborators::{Cpu, ErrnoTranslator, ExecutionState, Filesystem, LoadedImage, Loader, Ram};
pub use error::{MinixErrno, MinixResult};
pub use pid::{HostPid, MinixPid, ProcessTable};
pub use process::{MemoryLayout, ProcessCore};
pub use signal::{HandlerTable, SignalHandler, SIG_DFL, SIG_ERR, SIG_IGN};
pub use signal_map::MinixSignal;
pub use wait_status::WaitStat;
