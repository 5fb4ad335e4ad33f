// In: src/store/protocol.rs

//! The framed wire protocol spoken between a store connection and `StoreServer`.
//!
//! Every message is one frame: `[tag: u8][len: u32 LE][payload: len bytes]`.
//! Requests and responses use disjoint tag ranges so a desynchronized peer is
//! detected instead of misread.

use std::io::{self, Read, Write};

//==================================================================================
// Format Constants
//==================================================================================

/// Width of an object ID on the wire.
pub const ID_LEN: usize = 20;
/// Frames larger than this are rejected before allocating. (1 GiB)
const MAX_FRAME_LEN: usize = 1 << 30;

const TAG_PUT: u8 = 0x01;
const TAG_GET: u8 = 0x02;
const TAG_DELETE: u8 = 0x03;
const TAG_CONTAINS: u8 = 0x04;
const TAG_DISCONNECT: u8 = 0x05;

const TAG_OK: u8 = 0x80;
const TAG_DATA: u8 = 0x81;
const TAG_BOOL: u8 = 0x82;
const TAG_TIMEOUT: u8 = 0x83;
const TAG_ERROR: u8 = 0x84;

pub type ObjectKey = [u8; ID_LEN];

//==================================================================================
// Messages
//==================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Seal `data` under `id`. Fails if `id` already exists.
    Put { id: ObjectKey, data: Vec<u8> },
    /// Wait up to `timeout_ms` for `id` to appear, then return its bytes.
    Get { id: ObjectKey, timeout_ms: u64 },
    Delete { id: ObjectKey },
    Contains { id: ObjectKey },
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ok,
    Data(Vec<u8>),
    Bool(bool),
    Timeout(String),
    Error(String),
}

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

fn split_id(payload: &[u8]) -> io::Result<(ObjectKey, &[u8])> {
    if payload.len() < ID_LEN {
        return Err(invalid(format!(
            "frame payload of {} bytes is shorter than an object id",
            payload.len()
        )));
    }
    let (id, rest) = payload.split_at(ID_LEN);
    let mut key = [0u8; ID_LEN];
    key.copy_from_slice(id);
    Ok((key, rest))
}

impl Request {
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match self {
            Request::Put { id, data } => {
                let mut payload = Vec::with_capacity(ID_LEN + data.len());
                payload.extend_from_slice(id);
                payload.extend_from_slice(data);
                write_frame(w, TAG_PUT, &payload)
            }
            Request::Get { id, timeout_ms } => {
                let mut payload = Vec::with_capacity(ID_LEN + 8);
                payload.extend_from_slice(id);
                payload.extend_from_slice(&timeout_ms.to_le_bytes());
                write_frame(w, TAG_GET, &payload)
            }
            Request::Delete { id } => write_frame(w, TAG_DELETE, id),
            Request::Contains { id } => write_frame(w, TAG_CONTAINS, id),
            Request::Disconnect => write_frame(w, TAG_DISCONNECT, &[]),
        }
    }

    /// Reads the next request. `Ok(None)` means the peer closed the socket cleanly.
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Option<Self>> {
        let Some((tag, payload)) = read_frame(r)? else {
            return Ok(None);
        };
        let request = match tag {
            TAG_PUT => {
                let (id, data) = split_id(&payload)?;
                Request::Put { id, data: data.to_vec() }
            }
            TAG_GET => {
                let (id, rest) = split_id(&payload)?;
                let timeout: [u8; 8] = rest
                    .try_into()
                    .map_err(|_| invalid(format!("get request carries {} timeout bytes", rest.len())))?;
                Request::Get { id, timeout_ms: u64::from_le_bytes(timeout) }
            }
            TAG_DELETE => Request::Delete { id: split_id(&payload)?.0 },
            TAG_CONTAINS => Request::Contains { id: split_id(&payload)?.0 },
            TAG_DISCONNECT => Request::Disconnect,
            other => return Err(invalid(format!("unknown request tag {:#04x}", other))),
        };
        Ok(Some(request))
    }
}

impl Response {
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match self {
            Response::Ok => write_frame(w, TAG_OK, &[]),
            Response::Data(data) => write_frame(w, TAG_DATA, data),
            Response::Bool(b) => write_frame(w, TAG_BOOL, &[*b as u8]),
            Response::Timeout(msg) => write_frame(w, TAG_TIMEOUT, msg.as_bytes()),
            Response::Error(msg) => write_frame(w, TAG_ERROR, msg.as_bytes()),
        }
    }

    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let (tag, payload) = read_frame(r)?.ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "store closed the connection")
        })?;
        let text = |p: Vec<u8>| String::from_utf8_lossy(&p).into_owned();
        match tag {
            TAG_OK => Ok(Response::Ok),
            TAG_DATA => Ok(Response::Data(payload)),
            TAG_BOOL => match payload.as_slice() {
                [b] => Ok(Response::Bool(*b != 0)),
                _ => Err(invalid(format!("bool response carries {} bytes", payload.len()))),
            },
            TAG_TIMEOUT => Ok(Response::Timeout(text(payload))),
            TAG_ERROR => Ok(Response::Error(text(payload))),
            other => Err(invalid(format!("unknown response tag {:#04x}", other))),
        }
    }
}

//==================================================================================
// Framing
//==================================================================================

pub fn write_frame<W: Write>(w: &mut W, tag: u8, payload: &[u8]) -> io::Result<()> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|&len| len as usize <= MAX_FRAME_LEN)
        .ok_or_else(|| invalid(format!("frame payload of {} bytes is too large", payload.len())))?;
    w.write_all(&[tag])?;
    w.write_all(&len.to_le_bytes())?;
    w.write_all(payload)?;
    w.flush()
}

/// Reads one frame. A clean EOF before the tag byte yields `Ok(None)`.
pub fn read_frame<R: Read>(r: &mut R) -> io::Result<Option<(u8, Vec<u8>)>> {
    let mut tag = [0u8; 1];
    match r.read_exact(&mut tag) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(invalid(format!("frame of {} bytes exceeds the {} byte limit", len, MAX_FRAME_LEN)));
    }

    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)?;
    Ok(Some((tag[0], payload)))
}
