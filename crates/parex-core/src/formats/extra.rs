//! Zip extra-field side channel.
//!
//! Each extra field is a little-endian `(header id: u16, size: u16)` pair
//! followed by `size` bytes of data. Two fields matter for extraction:
//!
//! - `0x7875` Info-ZIP "new unix": `version: u8`, `uid_size: u8`,
//!   `uid[uid_size]`, `gid_size: u8`, `gid[gid_size]`
//! - `0x5455` extended timestamp: `flags: u8`, then a signed 32-bit
//!   modification time when bit 0 of `flags` is set

use std::io::Cursor;
use std::io::Read;
use std::time::Duration;
use std::time::SystemTime;

use byteorder::LittleEndian;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;

use crate::ExtractionError;
use crate::Result;

/// Header id of the Info-ZIP new unix ownership field.
pub const INFOZIP_NEW_UNIX: u16 = 0x7875;

/// Header id of the extended timestamp field.
pub const EXTENDED_TIMESTAMP: u16 = 0x5455;

/// Owner and group identifiers carried by an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnixOwner {
    /// User id.
    pub uid: u32,
    /// Group id.
    pub gid: u32,
}

/// The extra fields extraction cares about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtraFields {
    /// Ownership from the Info-ZIP new unix field.
    pub owner: Option<UnixOwner>,
    /// Modification time from the extended timestamp field.
    pub modified: Option<SystemTime>,
}

/// Parses a raw extra-field block.
///
/// Unknown fields are skipped, as is trailing padding too short to hold a
/// field header.
///
/// # Errors
///
/// Returns `InvalidArchive` if a field body is truncated, or if a known
/// field is malformed.
///
/// # Examples
///
/// ```
/// use parex_core::formats::extra::{encode_unix_owner, parse};
///
/// let fields = parse(&encode_unix_owner(1000, 100))?;
/// let owner = fields.owner.expect("owner present");
/// assert_eq!((owner.uid, owner.gid), (1000, 100));
/// # Ok::<(), parex_core::ExtractionError>(())
/// ```
pub fn parse(extra: &[u8]) -> Result<ExtraFields> {
    let mut fields = ExtraFields::default();
    let mut cursor = Cursor::new(extra);

    // Fewer than four trailing bytes are padding, not a field.
    while remaining(&cursor) >= 4 {
        let id = cursor.read_u16::<LittleEndian>()?;
        let size = usize::from(cursor.read_u16::<LittleEndian>()?);
        if remaining(&cursor) < size {
            return Err(malformed(&format!(
                "extra field {id:#06x} declares {size} bytes but only {} remain",
                remaining(&cursor)
            )));
        }

        let mut body = vec![0u8; size];
        cursor.read_exact(&mut body)?;

        match id {
            INFOZIP_NEW_UNIX => fields.owner = Some(parse_unix_owner(&body)?),
            EXTENDED_TIMESTAMP => fields.modified = parse_extended_timestamp(&body)?,
            _ => {}
        }
    }

    Ok(fields)
}

fn parse_unix_owner(body: &[u8]) -> Result<UnixOwner> {
    let mut cursor = Cursor::new(body);
    let version = cursor
        .read_u8()
        .map_err(|_| malformed("empty unix ownership field"))?;
    if version != 1 {
        return Err(malformed(&format!(
            "unsupported unix ownership field version {version}"
        )));
    }
    let uid = read_sized_id(&mut cursor, "uid")?;
    let gid = read_sized_id(&mut cursor, "gid")?;
    Ok(UnixOwner { uid, gid })
}

fn read_sized_id(cursor: &mut Cursor<&[u8]>, what: &str) -> Result<u32> {
    let size = cursor
        .read_u8()
        .map_err(|_| malformed(&format!("missing {what} size")))?;
    if size > 8 {
        return Err(malformed(&format!("{what} size {size} exceeds 8 bytes")));
    }
    if size == 0 {
        return Ok(0);
    }
    let value = cursor
        .read_uint::<LittleEndian>(usize::from(size))
        .map_err(|_| malformed(&format!("truncated {what}")))?;
    u32::try_from(value).map_err(|_| malformed(&format!("{what} {value} does not fit in 32 bits")))
}

fn parse_extended_timestamp(body: &[u8]) -> Result<Option<SystemTime>> {
    let mut cursor = Cursor::new(body);
    let flags = cursor
        .read_u8()
        .map_err(|_| malformed("empty extended timestamp field"))?;
    if flags & 1 == 0 || body.len() < 5 {
        return Ok(None);
    }
    let secs = cursor.read_i32::<LittleEndian>()?;
    Ok(Some(unix_time(i64::from(secs))))
}

/// Encodes an Info-ZIP new unix field holding 4-byte ids.
#[must_use]
pub fn encode_unix_owner(uid: u32, gid: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(15);
    // Writes into a Vec cannot fail.
    let _ = out.write_u16::<LittleEndian>(INFOZIP_NEW_UNIX);
    let _ = out.write_u16::<LittleEndian>(11);
    out.push(1);
    out.push(4);
    let _ = out.write_u32::<LittleEndian>(uid);
    out.push(4);
    let _ = out.write_u32::<LittleEndian>(gid);
    out
}

/// Encodes an extended timestamp field carrying only a modification time.
#[must_use]
pub fn encode_extended_timestamp(mtime_secs: i32) -> Vec<u8> {
    let mut out = Vec::with_capacity(9);
    let _ = out.write_u16::<LittleEndian>(EXTENDED_TIMESTAMP);
    let _ = out.write_u16::<LittleEndian>(5);
    out.push(1);
    let _ = out.write_i32::<LittleEndian>(mtime_secs);
    out
}

/// Converts signed seconds since the unix epoch into a `SystemTime`.
pub(crate) fn unix_time(secs: i64) -> SystemTime {
    let offset = Duration::from_secs(secs.unsigned_abs());
    if secs >= 0 {
        SystemTime::UNIX_EPOCH + offset
    } else {
        SystemTime::UNIX_EPOCH - offset
    }
}

fn remaining(cursor: &Cursor<&[u8]>) -> usize {
    let len = cursor.get_ref().len();
    len.saturating_sub(usize::try_from(cursor.position()).unwrap_or(len))
}

fn malformed(reason: &str) -> ExtractionError {
    ExtractionError::InvalidArchive(format!("malformed extra field: {reason}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        assert_eq!(parse(&[]).unwrap(), ExtraFields::default());
    }

    #[test]
    fn test_parse_unix_owner() {
        let fields = parse(&encode_unix_owner(501, 20)).unwrap();
        assert_eq!(fields.owner, Some(UnixOwner { uid: 501, gid: 20 }));
        assert_eq!(fields.modified, None);
    }

    #[test]
    fn test_parse_variable_width_ids() {
        // version 1, 2-byte uid 0x0102, 1-byte gid 7
        let body = [1u8, 2, 0x02, 0x01, 1, 7];
        let mut extra = vec![0x75, 0x78, body.len() as u8, 0];
        extra.extend_from_slice(&body);

        let owner = parse(&extra).unwrap().owner.unwrap();
        assert_eq!(owner, UnixOwner { uid: 0x0102, gid: 7 });
    }

    #[test]
    fn test_parse_extended_timestamp() {
        let fields = parse(&encode_extended_timestamp(1_623_760_240)).unwrap();
        assert_eq!(
            fields.modified,
            Some(SystemTime::UNIX_EPOCH + Duration::from_secs(1_623_760_240))
        );
    }

    #[test]
    fn test_parse_negative_timestamp() {
        let fields = parse(&encode_extended_timestamp(-60)).unwrap();
        assert_eq!(
            fields.modified,
            Some(SystemTime::UNIX_EPOCH - Duration::from_secs(60))
        );
    }

    #[test]
    fn test_parse_skips_unknown_fields() {
        let mut extra = vec![0x01, 0x00, 0x04, 0x00, 0xde, 0xad, 0xbe, 0xef];
        extra.extend(encode_unix_owner(1, 2));
        extra.extend(encode_extended_timestamp(10));

        let fields = parse(&extra).unwrap();
        assert_eq!(fields.owner, Some(UnixOwner { uid: 1, gid: 2 }));
        assert!(fields.modified.is_some());
    }

    #[test]
    fn test_parse_ignores_trailing_padding() {
        assert_eq!(parse(&[0, 0]).unwrap(), ExtraFields::default());
        assert_eq!(parse(&[0x75, 0x78, 0x0b]).unwrap(), ExtraFields::default());

        let mut extra = encode_unix_owner(7, 8);
        extra.extend_from_slice(&[0, 0, 0]);
        assert_eq!(
            parse(&extra).unwrap().owner,
            Some(UnixOwner { uid: 7, gid: 8 })
        );
    }

    #[test]
    fn test_parse_truncated_body_header() {
        let result = parse(&[0x75, 0x78, 0x0b, 0x00, 0x01]);
        assert!(matches!(result, Err(ExtractionError::InvalidArchive(_))));
    }

    #[test]
    fn test_parse_truncated_body() {
        let mut extra = encode_unix_owner(1, 2);
        extra.truncate(extra.len() - 2);
        assert!(parse(&extra).is_err());
    }

    #[test]
    fn test_parse_rejects_oversized_id() {
        let body = [1u8, 9, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0];
        let mut extra = vec![0x75, 0x78, body.len() as u8, 0];
        extra.extend_from_slice(&body);
        assert!(parse(&extra).is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_version() {
        let body = [2u8, 1, 0, 1, 0];
        let mut extra = vec![0x75, 0x78, body.len() as u8, 0];
        extra.extend_from_slice(&body);
        assert!(parse(&extra).is_err());
    }
}
