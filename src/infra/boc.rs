//! Minimal bag-of-cells reader
//!
//! Signed messages travel as serialized BoC. The portal only needs the root
//! cell's leading 64-bit field (the query id), so this reader locates the root
//! cell and exposes its data bits without building the full cell graph.

use super::{PortalError, Result};

const BOC_MAGIC: [u8; 4] = [0xb5, 0xee, 0x9c, 0x72];

/// Data section of the root cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootCell {
    pub data: Vec<u8>,
    pub bit_len: usize,
    pub refs: usize,
}

impl RootCell {
    /// Leading unsigned 64-bit big-endian field.
    pub fn load_u64(&self) -> Result<u64> {
        if self.bit_len < 64 {
            return Err(malformed(format!(
                "root cell holds {} bits, need 64",
                self.bit_len
            )));
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.data[..8]);
        Ok(u64::from_be_bytes(buf))
    }
}

fn malformed(msg: impl Into<String>) -> PortalError {
    PortalError::MalformedPayload(msg.into())
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| malformed("unexpected end of bag of cells"))?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn uint(&mut self, width: usize) -> Result<usize> {
        let bytes = self.take(width)?;
        Ok(bytes.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize))
    }
}

/// Parse a serialized BoC and return its first root cell.
pub fn parse_root(bytes: &[u8]) -> Result<RootCell> {
    let mut r = Reader { bytes, pos: 0 };

    if r.take(4)? != BOC_MAGIC {
        return Err(malformed("bad bag of cells magic"));
    }

    let flags = r.u8()?;
    let has_idx = flags & 0x80 != 0;
    let ref_size = (flags & 0x07) as usize;
    if ref_size == 0 || ref_size > 4 {
        return Err(malformed(format!("invalid reference size {ref_size}")));
    }
    let off_size = r.u8()? as usize;
    if off_size == 0 || off_size > 8 {
        return Err(malformed(format!("invalid offset size {off_size}")));
    }

    let cells = r.uint(ref_size)?;
    let roots = r.uint(ref_size)?;
    let _absent = r.uint(ref_size)?;
    let _total_size = r.uint(off_size)?;
    if roots == 0 {
        return Err(malformed("bag of cells has no root"));
    }

    let root_index = r.uint(ref_size)?;
    r.take((roots - 1) * ref_size)?;
    if root_index >= cells {
        return Err(malformed(format!(
            "root index {root_index} out of {cells} cells"
        )));
    }
    if has_idx {
        r.take(cells * off_size)?;
    }

    for index in 0..=root_index {
        let d1 = r.u8()?;
        let d2 = r.u8()? as usize;
        let ref_count = (d1 & 0x07) as usize;
        if ref_count > 4 {
            return Err(malformed(format!("cell {index} has {ref_count} refs")));
        }
        if d1 & 0x10 != 0 {
            let level_mask = d1 >> 5;
            let hash_count = level_mask.count_ones() as usize + 1;
            r.take(hash_count * (32 + 2))?;
        }

        let data_len = d2.div_ceil(2);
        let data = r.take(data_len)?;
        r.take(ref_count * ref_size)?;

        if index == root_index {
            let bit_len = if d2 % 2 == 0 {
                data_len * 8
            } else {
                let last = data[data_len - 1];
                if last == 0 {
                    return Err(malformed("missing completion tag"));
                }
                (data_len - 1) * 8 + 7 - last.trailing_zeros() as usize
            };
            return Ok(RootCell {
                data: data.to_vec(),
                bit_len,
                refs: ref_count,
            });
        }
    }

    Err(malformed("root cell not found"))
}

/// Leading 64-bit field of the root cell of a serialized BoC.
pub fn read_query_id(bytes: &[u8]) -> Result<u64> {
    parse_root(bytes)?.load_u64()
}

/// Serialize one byte-aligned, ref-free cell as a minimal BoC.
pub fn encode_single_cell(data: &[u8]) -> Vec<u8> {
    let cell_len = 2 + data.len();
    let off_size = if cell_len <= 0xff { 1 } else { 2 };

    let mut out = Vec::with_capacity(10 + cell_len);
    out.extend_from_slice(&BOC_MAGIC);
    out.push(0x01);
    out.push(off_size as u8);
    out.push(1); // cells
    out.push(1); // roots
    out.push(0); // absent
    out.extend_from_slice(&cell_len.to_be_bytes()[8 - off_size..]);
    out.push(0); // root index
    out.push(0); // d1: ordinary, no refs
    out.push((data.len() * 2) as u8);
    out.extend_from_slice(data);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_id_from_single_cell() {
        let mut data = 0x0123_4567_89ab_cdefu64.to_be_bytes().to_vec();
        data.extend_from_slice(&[0xaa; 4]);
        let boc = encode_single_cell(&data);

        let root = parse_root(&boc).unwrap();
        assert_eq!(root.bit_len, 96);
        assert_eq!(root.refs, 0);
        assert_eq!(read_query_id(&boc).unwrap(), 0x0123_4567_89ab_cdef);
    }

    #[test]
    fn test_root_after_other_cell() {
        // two cells, root is the second one and references the first
        let boc = vec![
            0xb5, 0xee, 0x9c, 0x72, // magic
            0x01, 0x01, // ref size 1, offset size 1
            0x02, 0x01, 0x00, // cells, roots, absent
            0x0e, // total cell bytes
            0x01, // root index
            0x00, 0x02, 0xff, // cell 0: one data byte
            0x01, 0x10, 0, 0, 0, 0, 0, 0, 0, 0x2a, 0x00, // cell 1: 64 bits, ref to 0
        ];
        let root = parse_root(&boc).unwrap();
        assert_eq!(root.refs, 1);
        assert_eq!(root.load_u64().unwrap(), 42);
    }

    #[test]
    fn test_partial_byte_bit_len() {
        // 4 bits 1010 followed by completion tag 1 → 0b1010_1000
        let boc = vec![
            0xb5, 0xee, 0x9c, 0x72, 0x01, 0x01, 0x01, 0x01, 0x00, 0x03, 0x00, 0x00, 0x01, 0xa8,
        ];
        let root = parse_root(&boc).unwrap();
        assert_eq!(root.bit_len, 4);
        assert!(matches!(
            root.load_u64(),
            Err(PortalError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_root(&[]).is_err());
        assert!(parse_root(&[0, 1, 2, 3, 4, 5]).is_err());
        let mut truncated = encode_single_cell(&[1, 2, 3, 4, 5, 6, 7, 8]);
        truncated.truncate(truncated.len() - 3);
        assert!(parse_root(&truncated).is_err());
    }
}
