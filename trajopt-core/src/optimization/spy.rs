//! ASCII pictures of sparsity patterns.
//!
//! Each picture is a header line `rows cols nnz` followed by one text line
//! per matrix row, `*` marking a structural nonzero and `.` an empty slot.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;

/// Write the pattern of a `rows x cols` matrix with the given entries.
pub fn write_pattern<W: Write>(
    out: &mut W,
    rows: usize,
    cols: usize,
    entries: impl IntoIterator<Item = (usize, usize)>,
) -> std::io::Result<()> {
    let set: HashSet<(usize, usize)> = entries.into_iter().collect();
    writeln!(out, "{} {} {}", rows, cols, set.len())?;
    let mut line = String::with_capacity(cols);
    for r in 0..rows {
        line.clear();
        for c in 0..cols {
            line.push(if set.contains(&(r, c)) { '*' } else { '.' });
        }
        writeln!(out, "{}", line)?;
    }
    Ok(())
}

/// Patterns written at solve entry.
pub(crate) struct SpyPatterns<'a> {
    pub n: usize,
    pub m_eq: usize,
    pub m_ineq: usize,
    pub hessian: &'a [(usize, usize)],
    pub eq_jacobian: &'a [(usize, usize)],
    pub ineq_jacobian: &'a [(usize, usize)],
    /// Upper triangle of the KKT matrix in natural order
    pub kkt: &'a [(usize, usize)],
}

pub(crate) fn write_all(dir: &Path, p: &SpyPatterns<'_>) -> Result<()> {
    fs::create_dir_all(dir)?;
    let dim = p.n + p.m_eq + p.m_ineq;

    let write = |name: &str, rows: usize, cols: usize, entries: Vec<(usize, usize)>| -> Result<()> {
        let mut out = BufWriter::new(File::create(dir.join(name))?);
        write_pattern(&mut out, rows, cols, entries)?;
        out.flush()?;
        Ok(())
    };

    let mirrored = |entries: &[(usize, usize)]| -> Vec<(usize, usize)> {
        entries.iter().flat_map(|&(r, c)| [(r, c), (c, r)]).collect()
    };

    write("H.spy", p.n, p.n, mirrored(p.hessian))?;
    write("A_e.spy", p.m_eq, p.n, p.eq_jacobian.to_vec())?;
    write("A_i.spy", p.m_ineq, p.n, p.ineq_jacobian.to_vec())?;
    write("KKT.spy", dim, dim, mirrored(p.kkt))?;
    log::info!("wrote sparsity patterns to {}", dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_picture() {
        let mut buf = Vec::new();
        write_pattern(&mut buf, 2, 3, vec![(0, 0), (1, 2), (0, 0)]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "2 3 2\n*..\n..*\n");
    }

    #[test]
    fn test_write_all_creates_files() {
        let dir = std::env::temp_dir().join(format!("trajopt-spy-{}", std::process::id()));
        let patterns = SpyPatterns {
            n: 2,
            m_eq: 1,
            m_ineq: 0,
            hessian: &[(0, 0), (1, 0)],
            eq_jacobian: &[(0, 1)],
            ineq_jacobian: &[],
            kkt: &[(0, 0), (0, 1), (1, 1), (1, 2), (2, 2)],
        };
        write_all(&dir, &patterns).unwrap();
        let h = std::fs::read_to_string(dir.join("H.spy")).unwrap();
        assert_eq!(h, "2 2 3\n**\n*.\n");
        assert!(dir.join("KKT.spy").exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
