//! OSC-style control messages carried inside channel frames.
//!
//! Layout: a NUL-terminated address path padded to 4 bytes, a type-tag string
//! beginning with `,` padded the same way, then the argument values in
//! big-endian order. Encoding and decoding work on caller-owned buffers and
//! never allocate.

use crate::channel::{FramedReader, FramedWriter};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OscArg<'a> {
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Str(&'a str),
    True,
    False,
    Nil,
}

impl OscArg<'_> {
    pub fn tag(&self) -> u8 {
        match self {
            OscArg::Int(_) => b'i',
            OscArg::Float(_) => b'f',
            OscArg::Long(_) => b'h',
            OscArg::Double(_) => b'd',
            OscArg::Str(_) => b's',
            OscArg::True => b'T',
            OscArg::False => b'F',
            OscArg::Nil => b'N',
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match *self {
            OscArg::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            OscArg::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OscArg::Str(v) => Some(v),
            _ => None,
        }
    }
}

const fn padded(len: usize) -> usize {
    (len + 4) & !3
}

fn payload_len(tag: u8) -> Option<usize> {
    match tag {
        b'i' | b'f' => Some(4),
        b'h' | b'd' => Some(8),
        b'T' | b'F' | b'N' => Some(0),
        _ => None,
    }
}

struct Cursor<'b> {
    buf: &'b mut [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        let end = self.pos + bytes.len();
        if end > self.buf.len() {
            return Err(Error::OutOfRange {
                accessed: end,
                size: self.buf.len(),
            });
        }
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    fn put_padded_str(&mut self, text: &[u8]) -> Result<()> {
        let total = padded(text.len());
        self.put(text)?;
        let zeros = [0u8; 4];
        self.put(&zeros[..total - text.len()])
    }
}

/// Serialises a message into `buf`, returning the encoded length.
pub fn encode(buf: &mut [u8], path: &str, args: &[OscArg<'_>]) -> Result<usize> {
    if !path.starts_with('/') || path.contains('\0') {
        return Err(Error::Malformed("address must start with '/'"));
    }
    let mut cursor = Cursor { buf, pos: 0 };
    cursor.put_padded_str(path.as_bytes())?;

    let tags_len = padded(1 + args.len());
    let tags_start = cursor.pos;
    cursor.put(&[b','])?;
    for arg in args {
        cursor.put(&[arg.tag()])?;
    }
    let zeros = [0u8; 4];
    let written = cursor.pos - tags_start;
    cursor.put(&zeros[..tags_len - written])?;

    for arg in args {
        match *arg {
            OscArg::Int(v) => cursor.put(&v.to_be_bytes())?,
            OscArg::Float(v) => cursor.put(&v.to_be_bytes())?,
            OscArg::Long(v) => cursor.put(&v.to_be_bytes())?,
            OscArg::Double(v) => cursor.put(&v.to_be_bytes())?,
            OscArg::Str(v) => {
                if v.contains('\0') {
                    return Err(Error::Malformed("string argument contains NUL"));
                }
                cursor.put_padded_str(v.as_bytes())?
            }
            OscArg::True | OscArg::False | OscArg::Nil => {}
        }
    }
    Ok(cursor.pos)
}

/// Reads a padded string starting at `start`; returns it and the offset of the
/// next field.
fn read_padded_str(data: &[u8], start: usize) -> Result<(&str, usize)> {
    let rest = data
        .get(start..)
        .ok_or(Error::Malformed("truncated message"))?;
    let nul = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or(Error::Malformed("unterminated string"))?;
    let text = std::str::from_utf8(&rest[..nul]).map_err(|_| Error::Malformed("string is not UTF-8"))?;
    let next = start + padded(nul);
    if next > data.len() {
        return Err(Error::Malformed("string padding is truncated"));
    }
    Ok((text, next))
}

/// Borrowed view over one encoded message. Parsing validates the whole
/// message, so argument access afterwards cannot fail on malformed data.
#[derive(Debug, Clone, Copy)]
pub struct OscMessage<'a> {
    data: &'a [u8],
    path: &'a str,
    types: &'a str,
    args_start: usize,
}

impl<'a> OscMessage<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let (path, tags_start) = read_padded_str(data, 0)?;
        if !path.starts_with('/') {
            return Err(Error::Malformed("address must start with '/'"));
        }
        let (tags, args_start) = read_padded_str(data, tags_start)?;
        let types = tags
            .strip_prefix(',')
            .ok_or(Error::Malformed("type tags must start with ','"))?;

        let mut offset = args_start;
        for tag in types.bytes() {
            offset = match tag {
                b's' => read_padded_str(data, offset)?.1,
                tag => match payload_len(tag) {
                    Some(len) => offset + len,
                    None => return Err(Error::invalid_args("osc", types)),
                },
            };
            if offset > data.len() {
                return Err(Error::OutOfRange {
                    accessed: offset,
                    size: data.len(),
                });
            }
        }

        Ok(Self {
            data,
            path,
            types,
            args_start,
        })
    }

    pub fn path(&self) -> &'a str {
        self.path
    }

    /// Type tags without the leading `,`.
    pub fn types(&self) -> &'a str {
        self.types
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn args(&self) -> OscArgs<'a> {
        OscArgs {
            data: self.data,
            tags: self.types.as_bytes(),
            offset: self.args_start,
        }
    }

    pub fn arg(&self, index: usize) -> Result<OscArg<'a>> {
        self.args().nth(index).ok_or(Error::OutOfRange {
            accessed: index,
            size: self.len(),
        })
    }
}

pub struct OscArgs<'a> {
    data: &'a [u8],
    tags: &'a [u8],
    offset: usize,
}

impl<'a> OscArgs<'a> {
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut raw = [0u8; N];
        raw.copy_from_slice(&self.data[self.offset..self.offset + N]);
        self.offset += N;
        raw
    }
}

impl<'a> Iterator for OscArgs<'a> {
    type Item = OscArg<'a>;

    fn next(&mut self) -> Option<OscArg<'a>> {
        let (&tag, rest) = self.tags.split_first()?;
        self.tags = rest;
        let arg = match tag {
            b'i' => OscArg::Int(i32::from_be_bytes(self.take())),
            b'f' => OscArg::Float(f32::from_be_bytes(self.take())),
            b'h' => OscArg::Long(i64::from_be_bytes(self.take())),
            b'd' => OscArg::Double(f64::from_be_bytes(self.take())),
            b's' => {
                let (text, next) = read_padded_str(self.data, self.offset).ok()?;
                self.offset = next;
                OscArg::Str(text)
            }
            b'T' => OscArg::True,
            b'F' => OscArg::False,
            _ => OscArg::Nil,
        };
        Some(arg)
    }
}

/// Fails with [`Error::InvalidArgs`] unless `found` equals `expected`.
pub fn assert_types_are(port: &'static str, expected: &str, found: &str) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(Error::invalid_args(port, found))
    }
}

/// Host-side writer that encodes messages and frames them onto a channel.
pub struct OscWriter {
    writer: FramedWriter,
    buffer: Box<[u8]>,
}

impl OscWriter {
    pub fn new(writer: FramedWriter, max_message: usize) -> Self {
        Self {
            writer,
            buffer: vec![0u8; max_message].into_boxed_slice(),
        }
    }

    /// Encodes and sends one message. `Ok(false)` when the ring had no room
    /// and the message was dropped.
    pub fn write(&mut self, path: &str, args: &[OscArg<'_>]) -> Result<bool> {
        let len = encode(&mut self.buffer, path, args)?;
        Ok(self.writer.write_with_length(&self.buffer[..len]))
    }

    pub fn dropped(&self) -> u64 {
        self.writer.dropped()
    }

    pub fn write_space(&self) -> usize {
        self.writer.write_space()
    }
}

/// Reader that keeps the most recent frame in a preallocated buffer.
pub struct OscReader {
    reader: FramedReader,
    buffer: Box<[u8]>,
    len: usize,
}

impl OscReader {
    pub fn new(reader: FramedReader, max_message: usize) -> Self {
        Self {
            reader,
            buffer: vec![0u8; max_message].into_boxed_slice(),
            len: 0,
        }
    }

    /// Pulls the next frame. `Ok(false)` when the channel is empty.
    pub fn read_msg(&mut self) -> Result<bool> {
        match self.reader.read_msg(&mut self.buffer)? {
            Some(len) => {
                self.len = len;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Raw payload of the last frame read.
    pub fn payload(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    pub fn message(&self) -> Result<OscMessage<'_>> {
        OscMessage::parse(self.payload())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::framed_channel;

    #[test]
    fn gain_message_layout() {
        let mut buf = [0u8; 32];
        let len = encode(&mut buf, "/gain", &[OscArg::Float(0.5)]).unwrap();
        assert_eq!(len, 8 + 4 + 4);
        assert_eq!(&buf[..8], b"/gain\0\0\0");
        assert_eq!(&buf[8..12], b",f\0\0");
        assert_eq!(&buf[12..16], &0.5f32.to_be_bytes());
    }

    #[test]
    fn parse_reads_back_mixed_arguments() {
        let mut buf = [0u8; 64];
        let len = encode(
            &mut buf,
            "/mix",
            &[
                OscArg::Int(-3),
                OscArg::Str("left"),
                OscArg::Double(1.5),
                OscArg::True,
            ],
        )
        .unwrap();
        let msg = OscMessage::parse(&buf[..len]).unwrap();
        assert_eq!(msg.path(), "/mix");
        assert_eq!(msg.types(), "isdT");
        assert_eq!(msg.arg(1).unwrap(), OscArg::Str("left"));
        assert_eq!(msg.arg(2).unwrap(), OscArg::Double(1.5));
        assert!(matches!(msg.arg(4), Err(Error::OutOfRange { accessed: 4, size: 4 })));
    }

    #[test]
    fn encode_into_small_buffer_is_out_of_range() {
        let mut buf = [0u8; 8];
        assert!(matches!(
            encode(&mut buf, "/gain", &[OscArg::Float(1.0)]),
            Err(Error::OutOfRange { .. })
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(OscMessage::parse(b"gain\0\0\0\0"), Err(Error::Malformed(_))));
        assert!(matches!(OscMessage::parse(b"/gain"), Err(Error::Malformed(_))));
        assert!(matches!(
            OscMessage::parse(b"/g\0\0,f\0\0\0\0"),
            Err(Error::OutOfRange { accessed: 12, size: 10 })
        ));
        assert!(matches!(
            OscMessage::parse(b"/g\0\0,x\0\0"),
            Err(Error::InvalidArgs { port: "osc", .. })
        ));
    }

    #[test]
    fn type_mismatch_names_port_and_types() {
        assert!(assert_types_are("/gain", "f", "f").is_ok());
        let err = assert_types_are("/gain", "f", "i").unwrap_err();
        assert!(matches!(err, Error::InvalidArgs { port: "/gain", .. }));
    }

    #[test]
    fn writer_and_reader_share_a_channel() {
        let (writer, reader) = framed_channel(64);
        let mut writer = OscWriter::new(writer, 32);
        let mut reader = OscReader::new(reader, 32);
        assert!(!reader.read_msg().unwrap());
        assert!(writer.write("/gain", &[OscArg::Float(0.25)]).unwrap());
        assert!(reader.read_msg().unwrap());
        let msg = reader.message().unwrap();
        assert_eq!(msg.path(), "/gain");
        assert_eq!(msg.arg(0).unwrap().as_f32(), Some(0.25));
    }
}
