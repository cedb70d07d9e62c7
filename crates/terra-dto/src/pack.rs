//! Optional packed encoding for territory deltas (component G). The
//! paired-array form in [`crate::response`] is required; this is a
//! compression the server may negotiate per connection via
//! `usePackedDeltas`.

use crate::response::{Coords, DeltaCoords};

/// LEB128 varint-encode `add`/`sub` coordinate arrays into one byte stream:
/// `[add.len, add.x*, add.y*, sub.len, sub.x*, sub.y*]`.
pub fn pack(delta: &DeltaCoords) -> Vec<u8> {
    let mut out = Vec::new();
    pack_coords(&delta.add, &mut out);
    pack_coords(&delta.sub, &mut out);
    out
}

fn pack_coords(coords: &Coords, out: &mut Vec<u8>) {
    write_varint(coords.x.len() as u64, out);
    for &v in &coords.x {
        write_varint(v as u64, out);
    }
    for &v in &coords.y {
        write_varint(v as u64, out);
    }
}

pub fn unpack(bytes: &[u8]) -> Option<DeltaCoords> {
    let mut cursor = 0usize;
    let add = unpack_coords(bytes, &mut cursor)?;
    let sub = unpack_coords(bytes, &mut cursor)?;
    Some(DeltaCoords { add, sub })
}

fn unpack_coords(bytes: &[u8], cursor: &mut usize) -> Option<Coords> {
    let len = read_varint(bytes, cursor)? as usize;
    let mut x = Vec::with_capacity(len);
    for _ in 0..len {
        x.push(read_varint(bytes, cursor)? as u32);
    }
    let mut y = Vec::with_capacity(len);
    for _ in 0..len {
        y.push(read_varint(bytes, cursor)? as u32);
    }
    Some(Coords { x, y })
}

fn write_varint(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

fn read_varint(bytes: &[u8], cursor: &mut usize) -> Option<u64> {
    let mut result: u64 = 0;
    let mut shift = 0;
    loop {
        let byte = *bytes.get(*cursor)?;
        *cursor += 1;
        result |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_deltas() {
        let delta = DeltaCoords {
            add: Coords {
                x: vec![0, 1, 255, 1000, u32::MAX],
                y: vec![5, 6, 7, 8, 9],
            },
            sub: Coords {
                x: vec![],
                y: vec![],
            },
        };
        let packed = pack(&delta);
        assert_eq!(unpack(&packed).unwrap(), delta);
    }

    #[test]
    fn round_trips_empty_delta() {
        let delta = DeltaCoords::default();
        assert_eq!(unpack(&pack(&delta)).unwrap(), delta);
    }

    #[test]
    fn truncated_stream_fails_cleanly() {
        let delta = DeltaCoords {
            add: Coords { x: vec![1, 2], y: vec![3, 4] },
            sub: Coords::default(),
        };
        let mut packed = pack(&delta);
        packed.truncate(packed.len() - 1);
        assert!(unpack(&packed).is_none());
    }
}
