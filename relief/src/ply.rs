//! Binary PLY reading and writing.
//!
//! Only the layout used for surface meshes is supported:
//!
//! ```text
//! ply
//! format binary_little_endian 1.0
//! element vertex <N>
//! property float x
//! property float y
//! property float z
//! element face <M>
//! property list uint8 int32 vertex_index
//! end_header
//! ```
//!
//! followed by `N` vertices of three little-endian `f32`, then `M` faces, each
//! a `u8` vertex count and that many little-endian `i32` indices.

use std::io::{BufRead, Read, Write};

use crate::error::{ReliefError, Result};
use crate::mesh::SurfaceMesh;

/// A polygon mesh as stored in a PLY file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlyMesh {
    pub vertices: Vec<[f32; 3]>,
    pub faces: Vec<Vec<u32>>,
}

impl PlyMesh {
    /// Convert to a triangle mesh.
    ///
    /// # Errors
    ///
    /// Returns [`ReliefError::InvalidMesh`] if a face is not a triangle or
    /// references a missing vertex.
    pub fn into_surface_mesh(self) -> Result<SurfaceMesh> {
        let count = self.vertices.len();
        let mut triangles = Vec::with_capacity(self.faces.len());

        for (n, face) in self.faces.into_iter().enumerate() {
            let triangle: [u32; 3] = face.try_into().map_err(|face: Vec<u32>| ReliefError::InvalidMesh {
                reason: format!("face {} has {} vertices", n, face.len()),
            })?;
            if let Some(&bad) = triangle.iter().find(|&&v| v as usize >= count) {
                return Err(ReliefError::InvalidMesh {
                    reason: format!("face {} references vertex {} of {}", n, bad, count),
                });
            }
            triangles.push(triangle);
        }

        Ok(SurfaceMesh {
            vertices: self.vertices,
            triangles,
        })
    }
}

/// Write a surface mesh as binary PLY.
pub fn write_ply<W: Write>(writer: &mut W, mesh: &SurfaceMesh) -> Result<()> {
    write!(
        writer,
        "ply\n\
         format binary_little_endian 1.0\n\
         element vertex {}\n\
         property float x\n\
         property float y\n\
         property float z\n\
         element face {}\n\
         property list uint8 int32 vertex_index\n\
         end_header\n",
        mesh.vertices.len(),
        mesh.triangles.len()
    )?;

    for vertex in &mesh.vertices {
        for c in vertex {
            writer.write_all(&c.to_le_bytes())?;
        }
    }

    for triangle in &mesh.triangles {
        writer.write_all(&[3u8])?;
        for &v in triangle {
            writer.write_all(&(v as i32).to_le_bytes())?;
        }
    }

    writer.flush()?;
    Ok(())
}

fn invalid(reason: impl Into<String>) -> ReliefError {
    ReliefError::InvalidMesh {
        reason: reason.into(),
    }
}

/// Read the next header line, without its line terminator.
fn header_line<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(invalid("unexpected end of header"));
    }
    Ok(line.trim_end().to_string())
}

/// Parse an `element <name> <count>` line.
fn element_count(line: &str, name: &str) -> Result<usize> {
    match line.split_whitespace().collect::<Vec<_>>().as_slice() {
        ["element", n, count] if *n == name => count
            .parse()
            .map_err(|_| invalid(format!("invalid {} count '{}'", name, count))),
        _ => Err(invalid(format!("expected 'element {}', found '{}'", name, line))),
    }
}

/// Read a binary PLY mesh.
///
/// Faces may have any number of vertices.
///
/// # Errors
///
/// Returns [`ReliefError::InvalidMesh`] for an unsupported header and
/// [`ReliefError::Io`] for truncated data.
pub fn read_ply<R: BufRead>(reader: &mut R) -> Result<PlyMesh> {
    if header_line(reader)? != "ply" {
        return Err(invalid("missing 'ply' tag"));
    }

    let format = header_line(reader)?;
    if format != "format binary_little_endian 1.0" {
        return Err(invalid(format!("unsupported format '{}'", format)));
    }

    let mut vertex_count = None;
    let mut face_count = None;
    loop {
        let line = header_line(reader)?;
        if line == "end_header" {
            break;
        } else if line.starts_with("element vertex") {
            vertex_count = Some(element_count(&line, "vertex")?);
        } else if line.starts_with("element face") {
            face_count = Some(element_count(&line, "face")?);
        } else if !line.starts_with("property") && !line.starts_with("comment") {
            return Err(invalid(format!("unexpected header line '{}'", line)));
        }
    }

    let vertex_count = vertex_count.ok_or_else(|| invalid("missing vertex element"))?;
    let face_count = face_count.unwrap_or(0);

    let mut vertices = Vec::with_capacity(vertex_count);
    let mut buf = [0u8; 12];
    for _ in 0..vertex_count {
        reader.read_exact(&mut buf)?;
        vertices.push([
            f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            f32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            f32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
        ]);
    }

    let mut faces = Vec::with_capacity(face_count);
    for n in 0..face_count {
        let mut size = [0u8; 1];
        reader.read_exact(&mut size)?;

        let mut face = Vec::with_capacity(size[0] as usize);
        let mut index = [0u8; 4];
        for _ in 0..size[0] {
            reader.read_exact(&mut index)?;
            let v = i32::from_le_bytes(index);
            let v = u32::try_from(v)
                .map_err(|_| invalid(format!("face {} has negative index {}", n, v)))?;
            face.push(v);
        }
        faces.push(face);
    }

    Ok(PlyMesh { vertices, faces })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_mesh() -> SurfaceMesh {
        SurfaceMesh {
            vertices: vec![
                [0.0, 0.0, 1.5],
                [0.0, 5.0, 3.0],
                [2.0, 0.0, -2.0],
                [2.0, 5.0, 4.0],
            ],
            triangles: vec![[0, 2, 1], [1, 2, 3]],
        }
    }

    #[test]
    fn test_write_layout() {
        let mut buf = Vec::new();
        write_ply(&mut buf, &sample_mesh()).unwrap();

        let header = "ply\nformat binary_little_endian 1.0\nelement vertex 4\n\
                      property float x\nproperty float y\nproperty float z\n\
                      element face 2\nproperty list uint8 int32 vertex_index\nend_header\n";
        assert!(buf.starts_with(header.as_bytes()));
        assert_eq!(buf.len(), header.len() + 4 * 12 + 2 * (1 + 3 * 4));

        let faces = &buf[header.len() + 4 * 12..];
        assert_eq!(faces[0], 3);
        assert_eq!(&faces[1..5], &0i32.to_le_bytes());
        assert_eq!(&faces[5..9], &2i32.to_le_bytes());
    }

    #[test]
    fn test_read_written_mesh() {
        let mesh = sample_mesh();
        let mut buf = Vec::new();
        write_ply(&mut buf, &mesh).unwrap();

        let ply = read_ply(&mut Cursor::new(buf)).unwrap();
        assert_eq!(ply.faces, vec![vec![0, 2, 1], vec![1, 2, 3]]);
        assert_eq!(ply.into_surface_mesh().unwrap(), mesh);
    }

    #[test]
    fn test_read_polygon_faces() {
        let mut buf = b"ply\nformat binary_little_endian 1.0\ncomment quad\nelement vertex 4\n\
                        property float x\nproperty float y\nproperty float z\nelement face 1\n\
                        property list uint8 int32 vertex_index\nend_header\n"
            .to_vec();
        buf.extend(std::iter::repeat(0u8).take(4 * 12));
        buf.push(4);
        for v in [0i32, 1, 3, 2] {
            buf.extend_from_slice(&v.to_le_bytes());
        }

        let ply = read_ply(&mut Cursor::new(buf)).unwrap();
        assert_eq!(ply.faces, vec![vec![0, 1, 3, 2]]);

        let err = ply.into_surface_mesh().unwrap_err();
        assert!(err.to_string().contains("4 vertices"));
    }

    #[test]
    fn test_out_of_range_index() {
        let ply = PlyMesh {
            vertices: vec![[0.0; 3]; 3],
            faces: vec![vec![0, 1, 3]],
        };
        assert!(matches!(ply.into_surface_mesh(), Err(ReliefError::InvalidMesh { .. })));
    }

    #[test]
    fn test_unsupported_format() {
        let text = "ply\nformat ascii 1.0\nelement vertex 0\nend_header\n";
        let err = read_ply(&mut Cursor::new(text)).unwrap_err();
        assert!(err.to_string().contains("ascii"));
    }

    #[test]
    fn test_truncated_body() {
        let mut buf = Vec::new();
        write_ply(&mut buf, &sample_mesh()).unwrap();
        buf.truncate(buf.len() - 3);

        assert!(matches!(read_ply(&mut Cursor::new(buf)), Err(ReliefError::Io(_))));
    }
}
