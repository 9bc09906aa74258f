//! Leak reporting.

use std::fmt;
use std::io::{self, Write};

use serde::Serialize;

use crate::callsite::CallSite;

/// An allocation that is still live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeakRecord {
    pub site: CallSite,
    /// Payload address.
    pub addr: usize,
    /// Payload size in bytes.
    pub size: usize,
}

impl fmt::Display for LeakRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LEAK CHECK: {}: allocated object {:#x} with size {}",
            self.site, self.addr, self.size
        )
    }
}

/// One line per record, in the order given.
pub fn write_leak_report<W: Write + ?Sized>(leaks: &[LeakRecord], out: &mut W) -> io::Result<()> {
    for leak in leaks {
        writeln!(out, "{leak}")?;
    }
    Ok(())
}
