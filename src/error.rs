//! MINIX-side error codes and the internal `Result` alias.
//!
//! Everything inside this crate that can fail returns `Result<T, MinixErrno>`.
//! Only at the "provided surface" (the functions in [`crate::process`] that
//! mirror the MINIX syscall ABI) do we flatten that down to the
//! negated-errno-in-register convention the emulated CPU expects.

use std::fmt;

/// A MINIX-side errno, already translated from whatever the host reported.
///
/// The fixed variants are the ones this crate itself raises directly (see
/// spec §7's taxonomy); `Other` carries anything [`ErrnoTranslator`] handed
/// back for a host failure we don't special-case.
///
/// [`ErrnoTranslator`]: crate::collaborators::ErrnoTranslator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MinixErrno {
    /// Unknown MINIX signal number, or other invalid-argument condition.
    EInval,
    /// No such process: a MinixPid wasn't found in the process table.
    ESrch,
    /// `brk` was asked to move outside the permitted window.
    ENoMem,
    /// Loader/filesystem I/O failure without a more specific host errno.
    EIo,
    /// Any other host errno, already translated to its MINIX equivalent.
    Other(i32),
}

pub type MinixResult<T> = Result<T, MinixErrno>;

impl MinixErrno {
    /// The MINIX errno's numeric value, matching the constants used
    /// throughout the original `MINIXCompat_Errors` headers.
    pub fn code(&self) -> i32 {
        match *self {
            MinixErrno::EInval => 22,
            MinixErrno::ESrch => 3,
            MinixErrno::ENoMem => 12,
            MinixErrno::EIo => 5,
            MinixErrno::Other(code) => code,
        }
    }

    /// The value a syscall entry point returns on failure: `-errno` fit into
    /// the 16-bit register MINIX uses for syscall results.
    pub fn as_negated_i16(&self) -> i16 {
        -(self.code() as i16)
    }
}

impl fmt::Display for MinixErrno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MinixErrno::EInval => write!(f, "EINVAL"),
            MinixErrno::ESrch => write!(f, "ESRCH"),
            MinixErrno::ENoMem => write!(f, "ENOMEM"),
            MinixErrno::EIo => write!(f, "EIO"),
            MinixErrno::Other(code) => write!(f, "errno {code}"),
        }
    }
}

impl std::error::Error for MinixErrno {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negation_fits_in_i16() {
        assert_eq!(MinixErrno::EInval.as_negated_i16(), -22);
        assert_eq!(MinixErrno::ESrch.as_negated_i16(), -3);
        assert_eq!(MinixErrno::ENoMem.as_negated_i16(), -12);
    }
}
