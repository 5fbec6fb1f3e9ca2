//! Cross-component scenarios from spec.md §8 that need more than one module
//! at once, exercised against a real host fork/wait rather than fakes.

use minixcompat_process::{ErrnoTranslator, MemoryLayout, MinixErrno, MinixSignal, ProcessCore, WaitStat};

struct FakeErrors;

impl ErrnoTranslator for FakeErrors {
    fn minix_for_host(&self, host_errno: i32) -> MinixErrno {
        MinixErrno::Other(host_errno)
    }
}

fn layout() -> MemoryLayout {
    MemoryLayout { stack_base: 0x0020_0000, executable_base: 0x0000_0000 }
}

/// S2 (fork numbering) + S3 (wait cleanup), combined because S3 needs S2's
/// children to already exist. A lone `#[test]` in its own integration
/// binary, so there's no risk of a sibling test's `wait()` reaping these
/// children out from under it.
#[test]
fn s2_fork_numbering_then_s3_wait_cleanup() {
    let mut core = ProcessCore::init(std::process::id() as i32, 1, layout());

    let mut child_minix_pids = Vec::new();
    for expected in [8i16, 9, 10] {
        let result = core.fork(&FakeErrors, || {});
        if result == 0 {
            // Child: leave immediately with a distinguishable exit code
            // rather than running the rest of this test function twice.
            std::process::exit(42);
        }
        assert_eq!(result, expected, "minix pids must be handed out monotonically from 8");
        child_minix_pids.push(result);
    }

    let mut reaped = Vec::new();
    for _ in 0..3 {
        let mut stat: i16 = 0;
        let minix_pid = core.wait(&FakeErrors, &mut stat);
        assert!(
            child_minix_pids.contains(&minix_pid),
            "wait returned a minix pid we never forked: {minix_pid}"
        );
        let decoded = WaitStat::from_raw(stat as u16);
        assert_eq!(decoded.sigstat, 0);
        assert_eq!(decoded.exitstat, 42);
        reaped.push(minix_pid);
    }
    reaped.sort();
    assert_eq!(reaped, vec![8, 9, 10]);

    // S3: once `wait` has reaped a terminal child, it's gone from the table
    // — every one of these pids should now be unreachable by kill.
    for pid in [8i16, 9, 10] {
        assert_eq!(
            core.kill(pid, MinixSignal::Term as i16, &FakeErrors),
            MinixErrno::ESrch.as_negated_i16(),
            "pid {pid} should have been removed from the table by wait()"
        );
    }
}

/// S1: a freshly initialized core reports the fixed pseudo-identity the
/// spec assigns the emulated process at startup.
#[test]
fn s1_fresh_init_reports_fixed_identity() {
    let core = ProcessCore::init(std::process::id() as i32, 1, layout());
    let (pid, ppid) = core.get_process_ids();
    assert_eq!(pid, 7);
    assert_eq!(ppid, 6);
}
