use std::io;
use std::os::unix::io::RawFd;
use termios::{tcsetattr, Termios, ECHO, ICANON, TCSANOW, VMIN, VTIME};

/// Scoped raw-mode switch for a terminal descriptor.
///
/// Entering disables canonical input and echo so every keystroke is
/// delivered as-is; reads block per byte (`VMIN=1`, `VTIME=0`). The saved
/// state is restored on drop, which covers every exit path of an editor
/// session: accepted line, control-key exits, I/O errors and unwinding.
pub struct RawMode {
    fd: RawFd,
    saved: Termios,
}

impl RawMode {
    /// Switch the terminal behind `fd` into raw mode.
    pub fn enter(fd: RawFd) -> io::Result<RawMode> {
        let saved = Termios::from_fd(fd)?;
        let mut raw = saved;
        raw.c_lflag &= !(ICANON | ECHO);
        raw.c_cc[VMIN] = 1;
        raw.c_cc[VTIME] = 0;
        tcsetattr(fd, TCSANOW, &raw)?;
        Ok(RawMode { fd, saved })
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = tcsetattr(self.fd, TCSANOW, &self.saved);
    }
}
