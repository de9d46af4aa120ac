//! Shell-script stand-ins for yt-dlp and ffmpeg.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    os::unix::fs::OpenOptionsExt,
    path::Path,
    sync::{Mutex, MutexGuard, PoisonError},
};

static SCRIPTS: Mutex<()> = Mutex::new(());

/// Hold for the whole test when it writes or runs a script. A child forked
/// while another thread still has a script open for writing keeps that fd,
/// and exec of the script then fails with ETXTBSY.
pub fn exclusive() -> MutexGuard<'static, ()> {
    SCRIPTS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Writes an executable `/bin/sh` script. Call with [`exclusive`] held.
pub fn write_script(path: &Path, body: &str) {
    let _ = fs::remove_file(path);
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o755)
        .open(path)
        .unwrap();
    file.write_all(format!("#!/bin/sh\n{body}\n").as_bytes()).unwrap();
    file.sync_all().unwrap();
}
