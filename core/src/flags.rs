//! Open-flag parsing and capability derivation.

use bitflags::bitflags;

use crate::error::{VfsError, VfsErrorKind, VfsResult};
use crate::stats::{R_OK, W_OK};

bitflags! {
    /// Open semantics flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct OpenFlags: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const APPEND = 1 << 2;
        const TRUNC = 1 << 3;
        const CREATE = 1 << 4;
        const EXCL = 1 << 5;
        const SYNC = 1 << 6;
    }
}

impl OpenFlags {
    /// Translate an `fopen`-style flag string.
    ///
    /// Recognized: `r`, `r+`, `rs`, `sr`, `rs+`, `sr+`, `w`, `wx`, `xw`,
    /// `w+`, `wx+`, `xw+`, `a`, `ax`, `xa`, `a+`, `ax+`, `xa+`.
    pub fn from_flag_str(flag: &str) -> VfsResult<Self> {
        let flags = match flag {
            "r" => OpenFlags::READ,
            "rs" | "sr" => OpenFlags::READ | OpenFlags::SYNC,
            "r+" => OpenFlags::READ | OpenFlags::WRITE,
            "rs+" | "sr+" => OpenFlags::READ | OpenFlags::WRITE | OpenFlags::SYNC,
            "w" => OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNC,
            "wx" | "xw" => {
                OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNC | OpenFlags::EXCL
            }
            "w+" => OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNC,
            "wx+" | "xw+" => {
                OpenFlags::READ
                    | OpenFlags::WRITE
                    | OpenFlags::CREATE
                    | OpenFlags::TRUNC
                    | OpenFlags::EXCL
            }
            "a" => OpenFlags::WRITE | OpenFlags::APPEND | OpenFlags::CREATE,
            "ax" | "xa" => {
                OpenFlags::WRITE | OpenFlags::APPEND | OpenFlags::CREATE | OpenFlags::EXCL
            }
            "a+" => OpenFlags::READ | OpenFlags::WRITE | OpenFlags::APPEND | OpenFlags::CREATE,
            "ax+" | "xa+" => {
                OpenFlags::READ
                    | OpenFlags::WRITE
                    | OpenFlags::APPEND
                    | OpenFlags::CREATE
                    | OpenFlags::EXCL
            }
            _ => return Err(VfsError::new(VfsErrorKind::InvalidInput, "open")),
        };
        Ok(flags)
    }

    /// Validate a raw bit set.
    pub fn from_raw(bits: u32) -> VfsResult<Self> {
        OpenFlags::from_bits(bits).ok_or(VfsError::new(VfsErrorKind::InvalidInput, "open"))
    }

    pub fn readable(self) -> bool {
        self.contains(OpenFlags::READ)
    }

    pub fn writable(self) -> bool {
        self.intersects(OpenFlags::WRITE | OpenFlags::APPEND | OpenFlags::TRUNC)
    }

    pub fn appendable(self) -> bool {
        self.contains(OpenFlags::APPEND)
    }

    pub fn truncating(self) -> bool {
        self.contains(OpenFlags::TRUNC)
    }

    pub fn exclusive(self) -> bool {
        self.contains(OpenFlags::EXCL)
    }

    /// Whether the target must already exist (no `CREATE`).
    pub fn must_exist(self) -> bool {
        !self.contains(OpenFlags::CREATE)
    }

    /// The minimum access set (`R_OK`/`W_OK` bits) the caller must hold on
    /// the target for this open to be allowed.
    pub fn access_mode(self) -> u32 {
        let mut want = 0;
        if self.readable() {
            want |= R_OK;
        }
        if self.writable() {
            want |= W_OK;
        }
        want
    }
}
