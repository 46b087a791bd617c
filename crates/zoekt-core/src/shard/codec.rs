// Copyright 2025 HyperZoekt Project
// Derived from sourcegraph/zoekt (https://github.com/sourcegraph/zoekt)
// Copyright 2016 Google Inc. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Byte-level helpers shared by the shard writer and reader.

use crate::error::ShardError;

// LEB128-style unsigned varint for u32.
pub(crate) fn write_var_u32(buf: &mut Vec<u8>, mut v: u32) {
    while v >= 0x80 {
        buf.push((v as u8 & 0x7F) | 0x80);
        v >>= 7;
    }
    buf.push(v as u8);
}

/// Decode a varint at `*off`, advancing it.
pub(crate) fn read_var_u32(data: &[u8], off: &mut usize) -> Result<u32, &'static str> {
    let mut shift = 0u32;
    let mut out: u32 = 0;
    loop {
        let b = *data.get(*off).ok_or("unexpected EOF while reading varint")?;
        *off += 1;
        out |= ((b & 0x7F) as u32) << shift;
        if (b & 0x80) == 0 {
            return Ok(out);
        }
        shift += 7;
        if shift >= 35 {
            return Err("varint too long");
        }
    }
}

pub(crate) fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

/// Length-prefixed (u16) string.
pub(crate) fn put_str(buf: &mut Vec<u8>, s: &str) -> Option<()> {
    let b = s.as_bytes();
    let len = u16::try_from(b.len()).ok()?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(b);
    Some(())
}

/// Cursor over a section already read from the index file. Every accessor is
/// bounds-checked and reports the shard name on failure.
pub(crate) struct Cursor<'a> {
    name: &'a str,
    data: &'a [u8],
    off: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(name: &'a str, data: &'a [u8]) -> Self {
        Self { name, data, off: 0 }
    }

    pub(crate) fn at(name: &'a str, data: &'a [u8], off: usize) -> Self {
        Self { name, data, off }
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8], ShardError> {
        let end = self.off.checked_add(n).filter(|e| *e <= self.data.len());
        match end {
            Some(end) => {
                let s = &self.data[self.off..end];
                self.off = end;
                Ok(s)
            }
            None => Err(ShardError::corrupt(
                self.name,
                format!("truncated while reading {} (off={})", what, self.off),
            )),
        }
    }

    pub(crate) fn u16(&mut self, what: &str) -> Result<u16, ShardError> {
        let b = self.take(2, what)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32(&mut self, what: &str) -> Result<u32, ShardError> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn bytes(&mut self, n: usize, what: &str) -> Result<&'a [u8], ShardError> {
        self.take(n, what)
    }

    pub(crate) fn str(&mut self, what: &str) -> Result<String, ShardError> {
        let n = self.u16(what)? as usize;
        let b = self.take(n, what)?;
        std::str::from_utf8(b)
            .map(str::to_string)
            .map_err(|_| ShardError::corrupt(self.name, format!("{} not valid UTF-8", what)))
    }

    pub(crate) fn var_u32(&mut self, what: &str) -> Result<u32, ShardError> {
        read_var_u32(self.data, &mut self.off)
            .map_err(|e| ShardError::corrupt(self.name, format!("{}: {}", what, e)))
    }

    pub(crate) fn offset(&self) -> usize {
        self.off
    }
}

pub(crate) fn intersect_sorted(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut i = 0;
    let mut j = 0;
    let mut out = Vec::new();
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
        }
    }
    out
}

pub(crate) fn union_sorted(left: &[u32], right: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(left.len() + right.len());
    let mut i = 0usize;
    let mut j = 0usize;
    while i < left.len() && j < right.len() {
        match left[i].cmp(&right[j]) {
            std::cmp::Ordering::Less => {
                out.push(left[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(right[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(left[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&left[i..]);
    out.extend_from_slice(&right[j..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_u32_boundaries() {
        let mut buf = vec![];
        for v in [0u32, 1, 127, 128, 300, u32::MAX] {
            write_var_u32(&mut buf, v);
        }
        let mut off = 0;
        for v in [0u32, 1, 127, 128, 300, u32::MAX] {
            assert_eq!(read_var_u32(&buf, &mut off).unwrap(), v);
        }
        assert_eq!(off, buf.len());
        assert!(read_var_u32(&buf, &mut off).is_err());
    }

    #[test]
    fn unterminated_varint_is_rejected() {
        let buf = [0xFFu8; 6];
        let mut off = 0;
        assert_eq!(read_var_u32(&buf, &mut off), Err("varint too long"));
    }

    #[test]
    fn cursor_reports_truncation() {
        let data = [3u8, 0, b'a', b'b'];
        let mut c = Cursor::new("t", &data);
        let err = c.str("repo name").unwrap_err();
        assert!(err.to_string().contains("truncated while reading repo name"));
    }

    #[test]
    fn sorted_set_ops() {
        assert_eq!(intersect_sorted(&[1, 3, 5, 7], &[3, 4, 5]), vec![3, 5]);
        assert_eq!(union_sorted(&[1, 5], &[2, 5, 9]), vec![1, 2, 5, 9]);
    }
}
