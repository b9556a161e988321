//! Flat-file grid exporters.
//!
//! - Matrix text: one line per row, north row first, samples west to east
//! - ELV: the binary elevation grid read by WinProm

use std::io::Write;

use crate::error::Result;
use crate::grid::HeightGrid;

/// Grid type code for a regular (equatorial) grid in ELV headers.
const ELV_GRID_TYPE: i32 = 2;

/// Write the grid as a whitespace-separated matrix.
///
/// No-data cells are written as the no-data value.
pub fn write_matrix<W: Write>(grid: &HeightGrid, writer: &mut W) -> Result<()> {
    let (cols, rows) = grid.size();

    for row in (0..rows).rev() {
        let mut line = String::with_capacity(cols * 8);
        for col in 0..cols {
            if col > 0 {
                line.push(' ');
            }
            line.push_str(&grid.value(col, row).to_string());
        }
        line.push('\n');
        writer.write_all(line.as_bytes())?;
    }

    writer.flush()?;
    Ok(())
}

/// Clamp a height to the `i16` range.
fn to_i16(v: f64) -> i16 {
    v.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// Write the grid in the ELV format.
///
/// Header fields are little-endian `i32` except the default height, an
/// `i16` holding the no-data value. Samples follow row by row from south to
/// north, west to east, as `i16` decimeters. No-data cells are written as the
/// default height.
pub fn write_elv<W: Write>(grid: &HeightGrid, writer: &mut W) -> Result<()> {
    let (cols, rows) = grid.size();
    let [min_x, min_y] = grid.origin();
    let [res_x, res_y] = grid.resolution();
    let default = to_i16(grid.no_data() as f64);

    let mut buf = Vec::with_capacity(46 + cols * rows * 2);
    for v in [
        min_y as i32,
        min_y as i32 + rows as i32 - 1,
        min_x as i32,
        min_x as i32 + cols as i32 - 1,
    ] {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    buf.extend_from_slice(&default.to_le_bytes());
    // both dimensions must be zero for WinProm to accept the file
    for v in [
        0,
        0,
        ELV_GRID_TYPE,
        res_y as i32,
        res_x as i32,
        rows as i32,
        cols as i32,
    ] {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    for row in 0..rows {
        for col in 0..cols {
            let h = grid.value(col, row);
            let v = if grid.is_valid(h) {
                to_i16(10.0 * h as f64)
            } else {
                default
            };
            buf.extend_from_slice(&v.to_le_bytes());
        }
    }

    writer.write_all(&buf)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> HeightGrid {
        // 3 cols x 2 rows; row 0 is the southern row
        HeightGrid::new(
            vec![1.0, 2.5, -9999.0, 4.0, 5.0, 6.25],
            3,
            2,
            [420000.0, 4480000.0],
            [5.0, 5.0],
            -9999.0,
        )
        .unwrap()
    }

    #[test]
    fn test_matrix_north_row_first() {
        let mut buf = Vec::new();
        write_matrix(&grid(), &mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "4 5 6.25\n1 2.5 -9999\n");
    }

    #[test]
    fn test_elv_layout() {
        let mut buf = Vec::new();
        write_elv(&grid(), &mut buf).unwrap();

        assert_eq!(buf.len(), 4 * 4 + 2 + 7 * 4 + 6 * 2);

        let long = |offset: usize| i32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap());
        let short = |offset: usize| i16::from_le_bytes(buf[offset..offset + 2].try_into().unwrap());

        assert_eq!(long(0), 4480000);
        assert_eq!(long(4), 4480001);
        assert_eq!(long(8), 420000);
        assert_eq!(long(12), 420002);
        assert_eq!(short(16), -9999);
        assert_eq!(long(18), 0);
        assert_eq!(long(22), 0);
        assert_eq!(long(26), 2);
        assert_eq!(long(30), 5);
        assert_eq!(long(34), 5);
        assert_eq!(long(38), 2);
        assert_eq!(long(42), 3);

        let samples: Vec<i16> = (0..6).map(|n| short(46 + 2 * n)).collect();
        assert_eq!(samples, vec![10, 25, -9999, 40, 50, 63]);
    }

    #[test]
    fn test_elv_clamps_heights() {
        let g = HeightGrid::new(vec![5000.0, -4000.0], 2, 1, [0.0, 0.0], [1.0, 1.0], -9999.0).unwrap();
        let mut buf = Vec::new();
        write_elv(&g, &mut buf).unwrap();

        let samples = &buf[46..];
        assert_eq!(&samples[0..2], &i16::MAX.to_le_bytes());
        assert_eq!(&samples[2..4], &i16::MIN.to_le_bytes());
    }
}
