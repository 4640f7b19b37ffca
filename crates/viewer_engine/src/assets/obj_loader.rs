//! OBJ file loader for 3D models
//!
//! Parses the subset of Wavefront OBJ the viewer needs (positions,
//! texture coordinates, normals, triangulated faces) and builds an
//! indexed [`Mesh`], deduplicating structurally identical vertices.

use crate::assets::AssetError;
use crate::render::{Mesh, Vertex};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Loader producing deduplicated, indexed meshes from OBJ files
pub struct ObjLoader;

/// Structural identity of a vertex, keyed on exact bit patterns.
///
/// `f32` is neither `Eq` nor `Hash`, but the dedup the index buffer needs
/// is exact structural equality, so the float bits are the right key:
/// two vertices collapse iff every attribute is bitwise identical.
#[derive(PartialEq, Eq, Hash)]
struct VertexKey([u32; 11]);

impl VertexKey {
    fn new(vertex: &Vertex) -> Self {
        let v = vertex;
        Self([
            v.position[0].to_bits(),
            v.position[1].to_bits(),
            v.position[2].to_bits(),
            v.color[0].to_bits(),
            v.color[1].to_bits(),
            v.color[2].to_bits(),
            v.tex_coord[0].to_bits(),
            v.tex_coord[1].to_bits(),
            v.normal[0].to_bits(),
            v.normal[1].to_bits(),
            v.normal[2].to_bits(),
        ])
    }
}

impl ObjLoader {
    /// Load an OBJ file and return a mesh
    pub fn load_obj<P: AsRef<Path>>(path: P) -> Result<Mesh, AssetError> {
        let path_ref = path.as_ref();
        log::debug!("Loading OBJ model from: {:?}", path_ref);

        let file = File::open(path_ref)?;
        let mesh = Self::parse(BufReader::new(file))?;

        log::info!(
            "Loaded model {:?}: {} unique vertices, {} indices",
            path_ref,
            mesh.vertices.len(),
            mesh.indices.len()
        );
        Ok(mesh)
    }

    /// Parse OBJ text from any reader
    pub fn parse<R: BufRead>(reader: R) -> Result<Mesh, AssetError> {
        let mut positions: Vec<[f32; 3]> = Vec::new();
        let mut tex_coords: Vec<[f32; 2]> = Vec::new();
        let mut normals: Vec<[f32; 3]> = Vec::new();

        let mut unique_vertices: HashMap<VertexKey, u32> = HashMap::new();
        let mut vertices: Vec<Vertex> = Vec::new();
        let mut indices: Vec<u32> = Vec::new();

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let parts: Vec<&str> = line.split_whitespace().collect();
            match parts[0] {
                "v" => positions.push(Self::parse_vec3(&parts, "vertex position")?),
                "vt" => {
                    if parts.len() < 3 {
                        return Err(AssetError::InvalidFormat(
                            "Texture coordinate needs two components".to_string(),
                        ));
                    }
                    let u = Self::parse_float(parts[1], "tex coord u")?;
                    let v = Self::parse_float(parts[2], "tex coord v")?;
                    // V = 0 at the bottom; the image loader flips its rows
                    // to the same convention
                    tex_coords.push([u, v]);
                }
                "vn" => normals.push(Self::parse_vec3(&parts, "vertex normal")?),
                "f" => {
                    if parts.len() < 4 {
                        return Err(AssetError::InvalidFormat(
                            "Face needs at least three vertices".to_string(),
                        ));
                    }
                    // Triangle-fan split handles quads and larger convex faces
                    let corners: Vec<Vertex> = parts[1..]
                        .iter()
                        .map(|spec| Self::resolve_corner(spec, &positions, &tex_coords, &normals))
                        .collect::<Result<_, _>>()?;

                    for tri in 1..corners.len() - 1 {
                        for &corner in &[corners[0], corners[tri], corners[tri + 1]] {
                            let key = VertexKey::new(&corner);
                            let index = *unique_vertices.entry(key).or_insert_with(|| {
                                vertices.push(corner);
                                (vertices.len() - 1) as u32
                            });
                            indices.push(index);
                        }
                    }
                }
                // Ignore groups, materials, smoothing, object names
                _ => {}
            }
        }

        if vertices.is_empty() || indices.is_empty() {
            return Err(AssetError::InvalidFormat(
                "OBJ contains no renderable faces".to_string(),
            ));
        }

        Ok(Mesh { vertices, indices })
    }

    /// Resolve one `v/vt/vn` face corner into a full vertex
    fn resolve_corner(
        spec: &str,
        positions: &[[f32; 3]],
        tex_coords: &[[f32; 2]],
        normals: &[[f32; 3]],
    ) -> Result<Vertex, AssetError> {
        let mut fields = spec.split('/');

        let pos_idx = Self::parse_index(fields.next(), positions.len(), "position")?
            .ok_or_else(|| AssetError::InvalidFormat("Face corner missing position".to_string()))?;
        let tex_idx = Self::parse_index(fields.next(), tex_coords.len(), "tex coord")?;
        let normal_idx = Self::parse_index(fields.next(), normals.len(), "normal")?;

        Ok(Vertex {
            position: positions[pos_idx],
            color: [1.0, 1.0, 1.0],
            tex_coord: tex_idx.map(|i| tex_coords[i]).unwrap_or([0.0, 0.0]),
            normal: normal_idx.map(|i| normals[i]).unwrap_or([0.0, 0.0, 0.0]),
        })
    }

    /// Parse a 1-based OBJ index field; empty or absent fields are `None`
    fn parse_index(
        field: Option<&str>,
        len: usize,
        what: &str,
    ) -> Result<Option<usize>, AssetError> {
        let field = match field {
            Some(f) if !f.is_empty() => f,
            _ => return Ok(None),
        };

        let raw: i64 = field
            .parse()
            .map_err(|_| AssetError::InvalidFormat(format!("Invalid {} index: {}", what, field)))?;

        // Negative indices count back from the end of the list
        let resolved = if raw < 0 {
            len as i64 + raw
        } else {
            raw - 1
        };

        if resolved < 0 || resolved as usize >= len {
            return Err(AssetError::InvalidFormat(format!(
                "{} index {} out of bounds",
                what, raw
            )));
        }
        Ok(Some(resolved as usize))
    }

    fn parse_vec3(parts: &[&str], what: &str) -> Result<[f32; 3], AssetError> {
        if parts.len() < 4 {
            return Err(AssetError::InvalidFormat(format!(
                "{} needs three components",
                what
            )));
        }
        Ok([
            Self::parse_float(parts[1], what)?,
            Self::parse_float(parts[2], what)?,
            Self::parse_float(parts[3], what)?,
        ])
    }

    fn parse_float(field: &str, what: &str) -> Result<f32, AssetError> {
        field
            .parse()
            .map_err(|_| AssetError::InvalidFormat(format!("Invalid {}: {}", what, field)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const QUAD_OBJ: &str = "\
v -0.5 -0.5 0.0
v 0.5 -0.5 0.0
v 0.5 0.5 0.0
v -0.5 0.5 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
f 1/1 2/2 3/3
f 3/3 4/4 1/1
";

    #[test]
    fn test_quad_deduplicates_shared_corners() {
        let mesh = ObjLoader::parse(Cursor::new(QUAD_OBJ)).unwrap();
        // Two triangles sharing an edge: 4 unique vertices, 6 indices
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 2, 3, 0]);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let first = ObjLoader::parse(Cursor::new(QUAD_OBJ)).unwrap();
        let second = ObjLoader::parse(Cursor::new(QUAD_OBJ)).unwrap();
        assert_eq!(first.indices, second.indices);
        assert_eq!(first.vertices.len(), second.vertices.len());
        for (a, b) in first.vertices.iter().zip(second.vertices.iter()) {
            assert_eq!(a.position, b.position);
            assert_eq!(a.tex_coord, b.tex_coord);
        }
    }

    #[test]
    fn test_distinct_texcoords_stay_distinct() {
        // Same position referenced with two different texture coordinates
        // must produce two vertices
        let obj = "\
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
vt 0.0 0.0
vt 1.0 1.0
f 1/1 2/1 3/1
f 1/2 2/1 3/1
";
        let mesh = ObjLoader::parse(Cursor::new(obj)).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices.len(), 6);
    }

    #[test]
    fn test_tex_coords_pass_through_unchanged() {
        let mesh = ObjLoader::parse(Cursor::new(QUAD_OBJ)).unwrap();
        assert_eq!(mesh.vertices[0].tex_coord, [0.0, 0.0]);
        assert_eq!(mesh.vertices[2].tex_coord, [1.0, 1.0]);
    }

    #[test]
    fn test_quads_are_triangulated() {
        let obj = "\
v -0.5 -0.5 0.0
v 0.5 -0.5 0.0
v 0.5 0.5 0.0
v -0.5 0.5 0.0
f 1 2 3 4
";
        let mesh = ObjLoader::parse(Cursor::new(obj)).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn test_missing_faces_is_an_error() {
        let obj = "v 0.0 0.0 0.0\n";
        assert!(ObjLoader::parse(Cursor::new(obj)).is_err());
    }

    #[test]
    fn test_out_of_bounds_index_is_an_error() {
        let obj = "\
v 0.0 0.0 0.0
f 1 2 3
";
        assert!(ObjLoader::parse(Cursor::new(obj)).is_err());
    }
}
