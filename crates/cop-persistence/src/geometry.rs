//! OGC Well-Known Binary encoding for point geometries.
//!
//! Points are written as 2D little-endian WKB without an embedded SRID; the
//! store assigns the reference system with `ST_SetSRID`. Axis order is
//! `x = longitude`, `y = latitude`.

use cop_domain::GeoPoint;

use crate::error::{PersistenceError, Result};

/// Encoded size of a 2D point: byte order, geometry type, two doubles.
pub const WKB_POINT_LEN: usize = 1 + 4 + 8 + 8;

const BYTE_ORDER_BIG_ENDIAN: u8 = 0;
const BYTE_ORDER_LITTLE_ENDIAN: u8 = 1;
const GEOMETRY_TYPE_POINT: u32 = 1;

/// Encode a point as little-endian WKB.
#[must_use]
pub fn encode_point(point: &GeoPoint) -> Vec<u8> {
    let mut buf = Vec::with_capacity(WKB_POINT_LEN);
    buf.push(BYTE_ORDER_LITTLE_ENDIAN);
    buf.extend_from_slice(&GEOMETRY_TYPE_POINT.to_le_bytes());
    buf.extend_from_slice(&point.longitude.to_le_bytes());
    buf.extend_from_slice(&point.latitude.to_le_bytes());
    buf
}

/// Decode a 2D WKB point in either byte order.
///
/// # Errors
///
/// Returns [`PersistenceError::Encoding`] for truncated input, an unknown byte
/// order marker or a geometry type other than Point.
pub fn decode_point(bytes: &[u8]) -> Result<GeoPoint> {
    if bytes.len() != WKB_POINT_LEN {
        return Err(PersistenceError::Encoding(format!(
            "expected {WKB_POINT_LEN} bytes, got {}",
            bytes.len()
        )));
    }

    let little_endian = match bytes[0] {
        BYTE_ORDER_LITTLE_ENDIAN => true,
        BYTE_ORDER_BIG_ENDIAN => false,
        other => {
            return Err(PersistenceError::Encoding(format!(
                "unknown byte order marker {other}"
            )));
        }
    };

    let word = |range: std::ops::Range<usize>| -> [u8; 8] {
        let mut out = [0u8; 8];
        out.copy_from_slice(&bytes[range]);
        out
    };
    let mut type_bytes = [0u8; 4];
    type_bytes.copy_from_slice(&bytes[1..5]);

    let (geometry_type, x, y) = if little_endian {
        (
            u32::from_le_bytes(type_bytes),
            f64::from_le_bytes(word(5..13)),
            f64::from_le_bytes(word(13..21)),
        )
    } else {
        (
            u32::from_be_bytes(type_bytes),
            f64::from_be_bytes(word(5..13)),
            f64::from_be_bytes(word(13..21)),
        )
    };

    if geometry_type != GEOMETRY_TYPE_POINT {
        return Err(PersistenceError::Encoding(format!(
            "geometry type {geometry_type} is not a point"
        )));
    }

    Ok(GeoPoint::new(y, x))
}
