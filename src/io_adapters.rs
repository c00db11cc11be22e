use std::io::{Read, Result as IoResult, Write};
use std::os::unix::io::RawFd;

/// Reader over a borrowed raw descriptor.
///
/// Built-in commands take `&mut dyn Read`; wrapping the stdin slot of an
/// [`crate::command::IoTriple`] in this adapter lets them consume whatever
/// the evaluator wired up there. The descriptor is not closed on drop; its
/// owner (the shell, a redirect file, a pipe end) remains responsible.
pub struct FdReader(pub RawFd);

impl Read for FdReader {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        nix::unistd::read(self.0, buf).map_err(Into::into)
    }
}

/// Writer over a borrowed raw descriptor, the output-side twin of [`FdReader`].
pub struct FdWriter(pub RawFd);

impl Write for FdWriter {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        nix::unistd::write(self.0, buf).map_err(Into::into)
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}
