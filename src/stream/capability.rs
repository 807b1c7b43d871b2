//! Optional capabilities forwarded by the decorators.

use bytes::Bytes;
use std::fs::File;
use std::io::{self, Cursor};
use std::net::{Shutdown, TcpStream};

/// Release a stream's underlying resource
pub trait Close {
    fn close(&mut self) -> io::Result<()>;
}

/// Random-access reads that do not move any cursor
pub trait RangeRead {
    /// Read into `buf` starting at `offset`. A short count means the end of
    /// the data was reached.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;
}

/// Total size of the underlying object, when known
pub trait ObjectSize {
    fn size(&self) -> Option<u64>;
}

/// Close each item in order, stopping at the first failure
pub fn close_all(closers: &mut [&mut dyn Close]) -> io::Result<()> {
    for closer in closers.iter_mut() {
        if let Err(err) = closer.close() {
            tracing::error!(error = %err, "failed to close writer");
            return Err(err);
        }
    }
    Ok(())
}

pub(crate) fn read_slice_at(data: &[u8], buf: &mut [u8], offset: u64) -> usize {
    let Ok(start) = usize::try_from(offset) else {
        return 0;
    };
    if start >= data.len() {
        return 0;
    }
    let n = buf.len().min(data.len() - start);
    buf[..n].copy_from_slice(&data[start..start + n]);
    n
}

impl<C: Close + ?Sized> Close for Box<C> {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl<C: Close + ?Sized> Close for &mut C {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl<T> Close for Cursor<T> {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Close for Vec<u8> {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Close for &[u8] {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Close for io::Empty {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Close for io::Sink {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Close for io::Stdout {
    fn close(&mut self) -> io::Result<()> {
        io::Write::flush(self)
    }
}

impl Close for io::Stdin {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Close for File {
    /// Flushes without syncing to disk
    fn close(&mut self) -> io::Result<()> {
        io::Write::flush(self)
    }
}

impl Close for TcpStream {
    fn close(&mut self) -> io::Result<()> {
        match self.shutdown(Shutdown::Both) {
            Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

impl RangeRead for [u8] {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        Ok(read_slice_at(self, buf, offset))
    }
}

impl RangeRead for Vec<u8> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        Ok(read_slice_at(self, buf, offset))
    }
}

impl RangeRead for Bytes {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        Ok(read_slice_at(self, buf, offset))
    }
}

impl<T: AsRef<[u8]>> RangeRead for Cursor<T> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        Ok(read_slice_at(self.get_ref().as_ref(), buf, offset))
    }
}

#[cfg(unix)]
impl RangeRead for File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(self, buf, offset)
    }
}

impl<T: AsRef<[u8]>> ObjectSize for Cursor<T> {
    fn size(&self) -> Option<u64> {
        Some(self.get_ref().as_ref().len() as u64)
    }
}

impl ObjectSize for File {
    fn size(&self) -> Option<u64> {
        self.metadata().ok().map(|m| m.len())
    }
}
