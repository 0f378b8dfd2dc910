use std::{fs, io::Write, path::Path, time::Duration, time::Instant};

use crate::error::{HwError, Result};

/// Write-then-rename so a crash mid-write never leaves a torn record.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}

/// Wait until `level()` returns `wanted`, or a timeout expires. Polls in
/// small intervals to avoid CPU spinning during the echo wait.
pub fn wait_for_level_with_timeout(
    mut level: impl FnMut() -> bool,
    wanted: bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<Duration> {
    let start = Instant::now();
    let deadline = start + timeout;
    while level() != wanted {
        if Instant::now() >= deadline {
            return Err(HwError::Timeout);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(start.elapsed())
}
