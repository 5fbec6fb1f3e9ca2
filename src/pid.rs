//! Bidirectional mapping between small MINIX process IDs and host PIDs.
//!
//! Grounded on `MINIXCompat_Processes_*TableEntry` in
//! `MINIXCompat_Processes.c`: an unordered, linearly-searched array of
//! `(host_pid, minix_pid)` pairs, growing by 1.5x when full. Lookup speed
//! doesn't matter here — MINIX's own `NR_PROCS` table is tiny.

pub type MinixPid = i16;
pub type HostPid = i32;

/// MINIX's own `NR_PROCS`; the table starts at this capacity.
const INITIAL_CAPACITY: usize = 32;

/// The MinixPid assigned to the emulated process at startup.
pub const SELF_MINIX_PID: MinixPid = 7;
/// The pseudo-ancestor standing in for the emulated process's parent shell.
pub const PSEUDO_PARENT_MINIX_PID: MinixPid = 6;
/// First MinixPid handed out by `next_free_pid`.
pub const FIRST_DYNAMIC_PID: MinixPid = 8;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Entry {
    host_pid: HostPid,
    minix_pid: MinixPid,
}

impl Entry {
    fn is_free(&self) -> bool {
        self.host_pid == 0
    }
}

/// The process table itself, plus the monotonic MinixPid allocator.
///
/// Slot 0 always represents "self"; slot 1 always represents "self's
/// parent"; the rest are children, allocated from slot 2 up.
#[derive(Debug)]
pub struct ProcessTable {
    entries: Vec<Entry>,
    next_minix_pid: MinixPid,
}

impl ProcessTable {
    /// Build a fresh table for a process that has just started: slot 0 is
    /// `self_host_pid`/`SELF_MINIX_PID`, slot 1 is
    /// `parent_host_pid`/`PSEUDO_PARENT_MINIX_PID`.
    pub fn init(self_host_pid: HostPid, parent_host_pid: HostPid) -> Self {
        let mut entries = vec![Entry::default(); INITIAL_CAPACITY];
        entries[0] = Entry { host_pid: self_host_pid, minix_pid: SELF_MINIX_PID };
        entries[1] = Entry { host_pid: parent_host_pid, minix_pid: PSEUDO_PARENT_MINIX_PID };
        ProcessTable { entries, next_minix_pid: FIRST_DYNAMIC_PID }
    }

    pub fn self_minix_pid(&self) -> MinixPid {
        self.entries[0].minix_pid
    }

    pub fn parent_minix_pid(&self) -> MinixPid {
        self.entries[1].minix_pid
    }

    /// Linear scan for the MinixPid owning `host_pid`, or `-1` on miss.
    pub fn minix_for_host(&self, host_pid: HostPid) -> MinixPid {
        self.entries
            .iter()
            .find(|e| !e.is_free() && e.host_pid == host_pid)
            .map_or(-1, |e| e.minix_pid)
    }

    /// Linear scan for the HostPid owning `minix_pid`, or `-1` on miss.
    pub fn host_for_minix(&self, minix_pid: MinixPid) -> HostPid {
        self.entries
            .iter()
            .find(|e| !e.is_free() && e.minix_pid == minix_pid)
            .map_or(-1, |e| e.host_pid)
    }

    /// Find a free slot at index ≥ 2, growing the table by 1.5x if none
    /// exist. Returns the slot index; the caller fills it in.
    fn next_free_slot(&mut self) -> usize {
        if let Some(idx) = self.entries.iter().skip(2).position(Entry::is_free) {
            return idx + 2;
        }

        let old_len = self.entries.len();
        let new_len = old_len + old_len / 2;
        self.entries.resize(new_len, Entry::default());
        log::trace!("process table grew from {old_len} to {new_len} entries");
        old_len
    }

    /// Reserve a free slot and allocate the next MinixPid, without
    /// performing the host fork. See [`crate::process::ProcessCore::fork`]
    /// for why this has to happen before the host `fork()`.
    pub(crate) fn reserve_child(&mut self) -> (usize, MinixPid) {
        let slot = self.next_free_slot();
        let minix_pid = self.next_minix_pid;
        self.next_minix_pid += 1;
        (slot, minix_pid)
    }

    /// Undo a reservation after a failed host fork. The slot itself was
    /// never written to, so it's already free; only the PID counter rolls
    /// back.
    pub(crate) fn rollback_reservation(&mut self) {
        self.next_minix_pid -= 1;
    }

    pub(crate) fn set_slot(&mut self, slot: usize, host_pid: HostPid, minix_pid: MinixPid) {
        self.entries[slot] = Entry { host_pid, minix_pid };
    }

    fn slot(&self, slot: usize) -> Entry {
        self.entries[slot]
    }

    /// Child-side reparenting after a successful fork (spec §4.6):
    /// `table[k] = table[1]`, `table[1] = table[0]`, `table[0] = (new self)`.
    pub(crate) fn reparent_after_fork(&mut self, slot: usize, new_self_host_pid: HostPid, new_self_minix_pid: MinixPid) {
        let old_parent = self.slot(1);
        let old_self = self.slot(0);
        self.entries[slot] = old_parent;
        self.entries[1] = old_self;
        self.entries[0] = Entry { host_pid: new_self_host_pid, minix_pid: new_self_minix_pid };
    }

    /// Remove the entry for `minix_pid`, freeing its slot. Requires
    /// `minix_pid > 0`.
    pub fn remove(&mut self, minix_pid: MinixPid) {
        assert!(minix_pid > 0, "remove() requires a positive MinixPid");
        if let Some(e) = self.entries.iter_mut().find(|e| e.minix_pid == minix_pid) {
            *e = Entry::default();
        } else {
            log::trace!("remove({minix_pid}): no matching process table entry");
        }
    }

    /// Number of live (non-free) entries, for test assertions.
    #[cfg(test)]
    fn live_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_free()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_sets_up_self_and_parent() {
        let table = ProcessTable::init(1000, 999);
        assert_eq!(table.self_minix_pid(), SELF_MINIX_PID);
        assert_eq!(table.parent_minix_pid(), PSEUDO_PARENT_MINIX_PID);
        assert_eq!(table.minix_for_host(1000), SELF_MINIX_PID);
        assert_eq!(table.minix_for_host(999), PSEUDO_PARENT_MINIX_PID);
    }

    #[test]
    fn miss_returns_negative_one() {
        let table = ProcessTable::init(1000, 999);
        assert_eq!(table.minix_for_host(12345), -1);
        assert_eq!(table.host_for_minix(42), -1);
    }

    #[test]
    fn reserve_then_set_slot_round_trips() {
        let mut table = ProcessTable::init(1000, 999);
        let (slot, pid) = table.reserve_child();
        assert_eq!(pid, FIRST_DYNAMIC_PID);
        assert_eq!(table.live_count(), 2);
        table.set_slot(slot, 2000, pid);
        assert_eq!(table.host_for_minix(pid), 2000);
        assert_eq!(table.live_count(), 3);
    }

    #[test]
    fn rollback_decrements_next_pid_only() {
        let mut table = ProcessTable::init(1000, 999);
        let (_slot, pid) = table.reserve_child();
        assert_eq!(pid, FIRST_DYNAMIC_PID);
        table.rollback_reservation();
        let (_slot2, pid2) = table.reserve_child();
        assert_eq!(pid2, FIRST_DYNAMIC_PID);
    }

    #[test]
    fn table_grows_when_full() {
        let mut table = ProcessTable::init(1000, 999);
        let starting_cap = table.entries.len();
        for i in 0..(starting_cap - 2) {
            let (slot, pid) = table.reserve_child();
            table.set_slot(slot, 2000 + i as i32, pid);
        }
        assert_eq!(table.entries.len(), starting_cap);
        let (slot, pid) = table.reserve_child();
        assert!(table.entries.len() > starting_cap);
        table.set_slot(slot, 9999, pid);
        assert_eq!(table.host_for_minix(pid), 9999);
    }

    #[test]
    fn remove_frees_slot() {
        let mut table = ProcessTable::init(1000, 999);
        let (slot, pid) = table.reserve_child();
        table.set_slot(slot, 2000, pid);
        table.remove(pid);
        assert_eq!(table.minix_for_host(2000), -1);
        assert_eq!(table.host_for_minix(pid), -1);
    }

    #[test]
    fn reparent_after_fork_matches_spec_ordering() {
        // Parent has self=7 (host 1000), parent=6 (host 999).
        let mut table = ProcessTable::init(1000, 999);
        let (slot, child_pid) = table.reserve_child();
        // Simulate the child process inheriting this table, then
        // reparenting itself.
        table.reparent_after_fork(slot, 2000, child_pid);
        assert_eq!(table.self_minix_pid(), child_pid);
        assert_eq!(table.host_for_minix(child_pid), 2000);
        assert_eq!(table.parent_minix_pid(), SELF_MINIX_PID);
        assert_eq!(table.host_for_minix(SELF_MINIX_PID), 1000);
        // Slot `slot` now holds what used to be slot 1 (old parent).
        assert_eq!(table.slot(slot).minix_pid, PSEUDO_PARENT_MINIX_PID);
        assert_eq!(table.slot(slot).host_pid, 999);
    }
}
