//! Compressed Sparse Row (CSR) format for binary incidence matrices.

use std::io::{Cursor, Read, Write};

use anyhow::{ensure, Context, Result};

use crate::assemble::Incidence;

const MAGIC: &[u8; 4] = b"CSRB";

/// Write an incidence matrix to CSR binary bytes.
pub fn write_incidence_bytes(incidence: &Incidence) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_binary_csr(&mut out, incidence)?;
    Ok(out)
}

/// Read an incidence matrix from CSR binary bytes.
pub fn read_incidence_bytes(bytes: &[u8]) -> Result<Incidence> {
    let mut reader = Cursor::new(bytes);
    read_binary_csr(&mut reader)
}

fn write_binary_csr<W: Write>(writer: &mut W, incidence: &Incidence) -> Result<()> {
    let (rows, cols) = incidence.shape();

    // Prefix sums
    let mut indptr: Vec<u64> = Vec::with_capacity(rows + 1);
    indptr.push(0);
    let mut nnz: u64 = 0;
    for row in incidence.rows() {
        nnz += row.len() as u64;
        indptr.push(nnz);
    }

    // Header
    writer.write_all(MAGIC)
        .context("[io::csr] Failed to write magic bytes")?;
    for (value, what) in [(rows as u64, "row count"), (cols as u64, "column count"), (nnz, "nnz")] {
        writer.write_all(&value.to_le_bytes())
            .with_context(|| format!("[io::csr] Failed to write {what}"))?;
    }

    for &o in &indptr {
        writer.write_all(&o.to_le_bytes())
            .context("[io::csr] Failed to write indptr")?;
    }

    // indices (flattened)
    for row in incidence.rows() {
        for &j in row {
            writer.write_all(&j.to_le_bytes())
                .context("[io::csr] Failed to write indices")?;
        }
    }

    Ok(())
}

fn read_binary_csr<R: Read>(reader: &mut R) -> Result<Incidence> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)
        .context("[io::csr] Failed to read magic bytes")?;
    ensure!(&magic == MAGIC, "[io::csr] Invalid CSR magic: expected 'CSRB'");

    let mut read_u64 = |what: &str| -> Result<u64> {
        let mut b8 = [0u8; 8];
        reader.read_exact(&mut b8)
            .with_context(|| format!("[io::csr] Failed to read {what}"))?;
        Ok(u64::from_le_bytes(b8))
    };
    let n = read_u64("row count")? as usize;
    let cols = read_u64("column count")? as usize;
    let nnz = read_u64("nnz")? as usize;

    let indptr = (0..=n)
        .map(|_| read_u64("indptr"))
        .collect::<Result<Vec<_>>>()?;
    ensure!(indptr[n] as usize == nnz, "[io::csr] nnz mismatch: header {} vs indptr {}", nnz, indptr[n]);
    ensure!(indptr.windows(2).all(|w| w[0] <= w[1]), "[io::csr] indptr is not monotone");

    let mut indices = vec![0u32; nnz];
    for x in &mut indices {
        let mut b4 = [0u8; 4];
        reader.read_exact(&mut b4)
            .context("[io::csr] Failed to read indices")?;
        *x = u32::from_le_bytes(b4);
    }

    let rows = indptr.windows(2)
        .map(|w| indices[w[0] as usize..w[1] as usize].to_vec())
        .collect();
    Ok(Incidence::from_rows(cols, rows)?)
}
