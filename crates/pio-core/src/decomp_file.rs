//! Decomposition file format (C13): dump and read back an IODesc's
//! global shape and compute-map, for debugging and decomposition reuse
//! across runs.
//!
//! Reference: spec.md §4.13 (decomposition file), `PIOc_write_nc_decomp`
//! / `PIOc_read_nc_decomp` in the original. That implementation writes
//! the decomposition as a tiny netCDF file; this crate has no netCDF
//! dependency (out of scope per spec's component table), so two
//! self-contained formats stand in: a human-readable text dump and a
//! length-prefixed binary variant. This substitution is recorded in
//! DESIGN.md.

use std::io::{self, BufRead, Read, Write};

use crate::elem_type::ElemType;
use crate::error::PioError;

/// One rank's contribution to a decomposition file: its compute-map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecompTask {
    pub rank: i32,
    pub map: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecompFile {
    pub gdims: Vec<usize>,
    pub elem_type: ElemType,
    pub tasks: Vec<DecompTask>,
}

/// Write the text dump format: one header line, then one line per task.
pub fn write_text<W: Write>(mut w: W, decomp: &DecompFile) -> io::Result<()> {
    writeln!(
        w,
        "pio-decomp 1 {} {} {}",
        decomp.elem_type.tag(),
        decomp.gdims.len(),
        decomp.gdims.iter().map(usize::to_string).collect::<Vec<_>>().join(",")
    )?;
    for task in &decomp.tasks {
        writeln!(
            w,
            "{} {}",
            task.rank,
            task.map.iter().map(i64::to_string).collect::<Vec<_>>().join(",")
        )?;
    }
    Ok(())
}

/// Parse the text dump format written by [`write_text`].
pub fn read_text<R: BufRead>(r: R) -> Result<DecompFile, PioError> {
    let mut lines = r.lines();
    let header = lines.next().ok_or(PioError::InvalidArgument)?.map_err(|_| PioError::InvalidArgument)?;
    let mut parts = header.split_whitespace();
    if parts.next() != Some("pio-decomp") || parts.next() != Some("1") {
        return Err(PioError::InvalidArgument);
    }
    let elem_type = ElemType::from_tag(parts.next().ok_or(PioError::InvalidArgument)?)?;
    let _ndims: usize = parts.next().ok_or(PioError::InvalidArgument)?.parse().map_err(|_| PioError::InvalidArgument)?;
    let gdims: Vec<usize> = parts
        .next()
        .ok_or(PioError::InvalidArgument)?
        .split(',')
        .map(|s| s.parse().map_err(|_| PioError::InvalidArgument))
        .collect::<Result<_, _>>()?;

    let mut tasks = Vec::new();
    for line in lines {
        let line = line.map_err(|_| PioError::InvalidArgument)?;
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.splitn(2, ' ');
        let rank: i32 = fields.next().ok_or(PioError::InvalidArgument)?.parse().map_err(|_| PioError::InvalidArgument)?;
        let map: Vec<i64> = fields
            .next()
            .unwrap_or("")
            .split(',')
            .filter(|s| !s.is_empty())
            .map(|s| s.parse().map_err(|_| PioError::InvalidArgument))
            .collect::<Result<_, _>>()?;
        tasks.push(DecompTask { rank, map });
    }

    Ok(DecompFile { gdims, elem_type, tasks })
}

/// Write the binary variant: a compact length-prefixed little-endian
/// layout, used when the decomposition file is large enough that text
/// parsing overhead matters.
pub fn write_binary<W: Write>(mut w: W, decomp: &DecompFile) -> io::Result<()> {
    w.write_all(b"PIOD")?;
    w.write_all(&1u32.to_le_bytes())?;
    w.write_all(decomp.elem_type.tag().as_bytes())?;
    w.write_all(b"\0")?;
    w.write_all(&(decomp.gdims.len() as u32).to_le_bytes())?;
    for &d in &decomp.gdims {
        w.write_all(&(d as u64).to_le_bytes())?;
    }
    w.write_all(&(decomp.tasks.len() as u32).to_le_bytes())?;
    for task in &decomp.tasks {
        w.write_all(&task.rank.to_le_bytes())?;
        w.write_all(&(task.map.len() as u32).to_le_bytes())?;
        for &v in &task.map {
            w.write_all(&v.to_le_bytes())?;
        }
    }
    Ok(())
}

pub fn read_binary<R: Read>(mut r: R) -> Result<DecompFile, PioError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic).map_err(|_| PioError::InvalidArgument)?;
    if &magic != b"PIOD" {
        return Err(PioError::InvalidArgument);
    }
    let mut buf4 = [0u8; 4];
    r.read_exact(&mut buf4).map_err(|_| PioError::InvalidArgument)?;
    let _version = u32::from_le_bytes(buf4);

    let mut tag = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        r.read_exact(&mut byte).map_err(|_| PioError::InvalidArgument)?;
        if byte[0] == 0 {
            break;
        }
        tag.push(byte[0]);
    }
    let elem_type = ElemType::from_tag(std::str::from_utf8(&tag).map_err(|_| PioError::InvalidArgument)?)?;

    r.read_exact(&mut buf4).map_err(|_| PioError::InvalidArgument)?;
    let ndims = u32::from_le_bytes(buf4) as usize;
    let mut gdims = Vec::with_capacity(ndims);
    for _ in 0..ndims {
        let mut buf8 = [0u8; 8];
        r.read_exact(&mut buf8).map_err(|_| PioError::InvalidArgument)?;
        gdims.push(u64::from_le_bytes(buf8) as usize);
    }

    r.read_exact(&mut buf4).map_err(|_| PioError::InvalidArgument)?;
    let ntasks = u32::from_le_bytes(buf4) as usize;
    let mut tasks = Vec::with_capacity(ntasks);
    for _ in 0..ntasks {
        r.read_exact(&mut buf4).map_err(|_| PioError::InvalidArgument)?;
        let rank = i32::from_le_bytes(buf4);
        r.read_exact(&mut buf4).map_err(|_| PioError::InvalidArgument)?;
        let maplen = u32::from_le_bytes(buf4) as usize;
        let mut map = Vec::with_capacity(maplen);
        for _ in 0..maplen {
            let mut buf8 = [0u8; 8];
            r.read_exact(&mut buf8).map_err(|_| PioError::InvalidArgument)?;
            map.push(i64::from_le_bytes(buf8));
        }
        tasks.push(DecompTask { rank, map });
    }

    Ok(DecompFile { gdims, elem_type, tasks })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DecompFile {
        DecompFile {
            gdims: vec![4, 2],
            elem_type: ElemType::I32,
            tasks: vec![
                DecompTask { rank: 0, map: vec![1, 2, 0, 4] },
                DecompTask { rank: 1, map: vec![5, 6, 7, 8] },
            ],
        }
    }

    #[test]
    fn text_round_trip() {
        let decomp = sample();
        let mut buf = Vec::new();
        write_text(&mut buf, &decomp).unwrap();
        let back = read_text(io::Cursor::new(buf)).unwrap();
        assert_eq!(back, decomp);
    }

    #[test]
    fn binary_round_trip() {
        let decomp = sample();
        let mut buf = Vec::new();
        write_binary(&mut buf, &decomp).unwrap();
        let back = read_binary(io::Cursor::new(buf)).unwrap();
        assert_eq!(back, decomp);
    }

    #[test]
    fn text_rejects_bad_header() {
        let back = read_text(io::Cursor::new(b"not-a-decomp-file\n".to_vec()));
        assert_eq!(back, Err(PioError::InvalidArgument));
    }

    #[test]
    fn binary_rejects_bad_magic() {
        let back = read_binary(io::Cursor::new(b"NOPE".to_vec()));
        assert_eq!(back, Err(PioError::InvalidArgument));
    }
}
