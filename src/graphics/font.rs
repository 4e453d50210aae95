//! Consumes an externally supplied raw font blob: 256 glyphs, 16 rows
//! each, 1 bit per pixel, preceded by a 4-byte header the firmware bridge
//! fills in (format version, reserved).

pub const GLYPH_WIDTH: usize = 8;
pub const GLYPH_HEIGHT: usize = 16;
const HEADER_LEN: usize = 4;
const GLYPH_COUNT: usize = 256;
pub const BLOB_LEN: usize = HEADER_LEN + GLYPH_COUNT * GLYPH_HEIGHT;

pub struct FontBlob<'a> {
    data: &'a [u8],
}

impl<'a> FontBlob<'a> {
    /// Wraps a blob already known to be `BLOB_LEN` bytes.
    pub fn new(data: &'a [u8]) -> Option<FontBlob<'a>> {
        if data.len() < BLOB_LEN {
            None
        } else {
            Some(FontBlob { data })
        }
    }

    /// Returns the 16 row bytes for `ch`, each bit MSB-first one column.
    pub fn glyph_rows(&self, ch: u8) -> &[u8] {
        let start = HEADER_LEN + ch as usize * GLYPH_HEIGHT;
        &self.data[start..start + GLYPH_HEIGHT]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_blobs() {
        assert!(FontBlob::new(&[0u8; 10]).is_none());
    }

    #[test]
    fn glyph_rows_are_within_bounds() {
        let data = [0u8; BLOB_LEN];
        let font = FontBlob::new(&data).unwrap();
        let rows = font.glyph_rows(b'A');
        assert_eq!(rows.len(), GLYPH_HEIGHT);
    }
}
