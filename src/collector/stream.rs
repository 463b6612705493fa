//! Full-frame reads from a blocking device stream.

use crate::collector::event::{Event, EVENT_SIZE};
use std::io::{self, ErrorKind, Read};

/// Outcome of reading one frame.
#[derive(Debug)]
pub enum Frame {
    /// A complete record was read and decoded. Records of types the
    /// tracker does not count are still returned here.
    Event(Event),
    /// The stream ended. A partial trailing record is treated the same way.
    Closed,
}

/// Reads exactly [`EVENT_SIZE`] bytes per frame from an input stream.
pub struct FrameReader<R> {
    inner: R,
    buf: [u8; EVENT_SIZE],
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: [0u8; EVENT_SIZE],
        }
    }

    /// Read the next frame, looping over short reads until a full record is
    /// available or the stream ends.
    pub fn next_frame(&mut self) -> io::Result<Frame> {
        match self.inner.read_exact(&mut self.buf) {
            Ok(()) => Event::decode(&self.buf)
                .map(Frame::Event)
                .map_err(|e| io::Error::new(ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(Frame::Closed),
            Err(e) => Err(e),
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::event::{EventCode, EventType, EventValue};
    use std::io::Cursor;

    /// Hands out at most `chunk` bytes per read call.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.chunk.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    fn key_lift(code: u16) -> Event {
        Event {
            time_sec: 1,
            time_usec: 2,
            kind: EventType::KEY,
            code: EventCode(code),
            value: EventValue::LIFT,
        }
    }

    #[test]
    fn test_reads_consecutive_frames() {
        let mut bytes = key_lift(30).encode().to_vec();
        bytes.extend_from_slice(&key_lift(31).encode());
        let mut reader = FrameReader::new(Cursor::new(bytes));

        assert!(matches!(reader.next_frame().unwrap(), Frame::Event(e) if e.code == EventCode(30)));
        assert!(matches!(reader.next_frame().unwrap(), Frame::Event(e) if e.code == EventCode(31)));
        assert!(matches!(reader.next_frame().unwrap(), Frame::Closed));
    }

    #[test]
    fn test_short_reads_are_reassembled() {
        let stream = Trickle {
            data: key_lift(44).encode().to_vec(),
            pos: 0,
            chunk: 5,
        };
        let mut reader = FrameReader::new(stream);
        assert!(matches!(reader.next_frame().unwrap(), Frame::Event(e) if e.code == EventCode(44)));
    }

    #[test]
    fn test_unknown_event_types_are_returned() {
        let sync = Event {
            time_sec: 1,
            time_usec: 2,
            kind: EventType(0x00),
            code: EventCode(0),
            value: EventValue(0),
        };
        let mut bytes = sync.encode().to_vec();
        bytes.extend_from_slice(&key_lift(30).encode());
        let mut reader = FrameReader::new(Cursor::new(bytes));

        match reader.next_frame().unwrap() {
            Frame::Event(e) => {
                assert_eq!(e, sync);
                assert!(e.classify().is_none());
            }
            other => panic!("unexpected frame {other:?}"),
        }
        assert!(matches!(reader.next_frame().unwrap(), Frame::Event(e) if e.code == EventCode(30)));
    }

    #[test]
    fn test_partial_tail_is_closed() {
        let mut bytes = key_lift(30).encode().to_vec();
        bytes.extend_from_slice(&[1, 2, 3]);
        let mut reader = FrameReader::new(Cursor::new(bytes));

        assert!(matches!(reader.next_frame().unwrap(), Frame::Event(_)));
        assert!(matches!(reader.next_frame().unwrap(), Frame::Closed));
    }
}
