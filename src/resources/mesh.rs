use std::io::{BufRead, BufReader, Cursor};

use anyhow::Context as _;
use cgmath::{InnerSpace, Vector2, Vector3};

use crate::{data_structures::mesh::MeshProvider, resources::load_string};

/// Indexed geometry read from a Wavefront OBJ file.
///
/// All objects in the file are merged into one mesh. Obj files carry no
/// tangents, so they are computed per triangle from the texture coordinates
/// and averaged per vertex.
#[derive(Clone, Debug, Default)]
pub struct ObjMesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub tex_coords: Vec<[f32; 2]>,
    pub normals: Vec<[f32; 3]>,
    pub s_tangents: Vec<[f32; 3]>,
    pub t_tangents: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

pub fn load_obj_mesh(file_name: &str) -> anyhow::Result<ObjMesh> {
    let obj_text = load_string(file_name)?;
    let mut obj_reader = BufReader::new(Cursor::new(obj_text));
    parse_obj(&mut obj_reader, file_name)
}

pub fn parse_obj(reader: &mut impl BufRead, name: &str) -> anyhow::Result<ObjMesh> {
    // Materials are not used, but a referenced mtl file must still resolve.
    let (models, _materials) = tobj::load_obj_buf(
        reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |p| match load_string(p) {
            Ok(mat_text) => tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mat_text))),
            Err(e) => {
                log::warn!("{:#}", e);
                Err(tobj::LoadError::OpenFileFailed)
            }
        },
    )
    .with_context(|| format!("Could not parse {name}"))?;

    let mut mesh = ObjMesh {
        name: name.to_string(),
        ..Default::default()
    };
    for model in &models {
        let m = &model.mesh;
        let base = mesh.positions.len() as u32;
        let count = m.positions.len() / 3;
        mesh.positions
            .extend(m.positions.chunks_exact(3).map(|p| [p[0], p[1], p[2]]));
        if !m.texcoords.is_empty() {
            mesh.tex_coords.extend((0..count).map(|i| {
                [
                    m.texcoords.get(i * 2).map_or(0.0, |f| *f),
                    1.0 - m.texcoords.get(i * 2 + 1).map_or(0.0, |f| *f),
                ]
            }));
        }
        if !m.normals.is_empty() {
            mesh.normals.extend((0..count).map(|i| {
                [
                    m.normals.get(i * 3).map_or(0.0, |f| *f),
                    m.normals.get(i * 3 + 1).map_or(0.0, |f| *f),
                    m.normals.get(i * 3 + 2).map_or(0.0, |f| *f),
                ]
            }));
        }
        mesh.indices.extend(m.indices.iter().map(|i| base + i));
    }

    // a stream only counts if every object supplied it
    if mesh.tex_coords.len() != mesh.positions.len() {
        mesh.tex_coords.clear();
    }
    if mesh.normals.len() != mesh.positions.len() {
        mesh.normals.clear();
    }
    if !mesh.tex_coords.is_empty() {
        let (s, t) = compute_tangents(&mesh.positions, &mesh.tex_coords, &mesh.indices);
        mesh.s_tangents = s;
        mesh.t_tangents = t;
    }
    log::info!(
        "Loaded {} with {} vertices and {} triangles",
        name,
        mesh.positions.len(),
        mesh.indices.len() / 3
    );
    Ok(mesh)
}

/// Per-vertex tangent and bitangent, averaged over the adjacent triangles.
pub fn compute_tangents(
    positions: &[[f32; 3]],
    tex_coords: &[[f32; 2]],
    indices: &[u32],
) -> (Vec<[f32; 3]>, Vec<[f32; 3]>) {
    let mut tangents = vec![Vector3::new(0.0, 0.0, 0.0); positions.len()];
    let mut bitangents = tangents.clone();
    let mut triangles_included = vec![0u32; positions.len()];

    for c in indices.chunks_exact(3) {
        let [a, b, d] = [c[0] as usize, c[1] as usize, c[2] as usize];
        if a.max(b).max(d) >= positions.len() {
            continue;
        }
        let pos0: Vector3<f32> = positions[a].into();
        let pos1: Vector3<f32> = positions[b].into();
        let pos2: Vector3<f32> = positions[d].into();
        let uv0: Vector2<f32> = tex_coords[a].into();
        let uv1: Vector2<f32> = tex_coords[b].into();
        let uv2: Vector2<f32> = tex_coords[d].into();

        let delta_pos1 = pos1 - pos0;
        let delta_pos2 = pos2 - pos0;
        let delta_uv1 = uv1 - uv0;
        let delta_uv2 = uv2 - uv0;

        //     delta_pos1 = delta_uv1.x * T + delta_uv1.y * B
        //     delta_pos2 = delta_uv2.x * T + delta_uv2.y * B
        let det = delta_uv1.x * delta_uv2.y - delta_uv1.y * delta_uv2.x;
        if det.abs() <= f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let tangent = (delta_pos1 * delta_uv2.y - delta_pos2 * delta_uv1.y) * r;
        // flipped for wgpu's top-left texture origin
        let bitangent = (delta_pos2 * delta_uv1.x - delta_pos1 * delta_uv2.x) * -r;

        for i in [a, b, d] {
            tangents[i] += tangent;
            bitangents[i] += bitangent;
            triangles_included[i] += 1;
        }
    }

    let average = |sum: Vector3<f32>, n: u32| -> [f32; 3] {
        if n == 0 || sum.magnitude2() == 0.0 {
            [0.0; 3]
        } else {
            (sum / n as f32).into()
        }
    };
    let s = tangents
        .iter()
        .zip(&triangles_included)
        .map(|(t, n)| average(*t, *n))
        .collect();
    let t = bitangents
        .iter()
        .zip(&triangles_included)
        .map(|(b, n)| average(*b, *n))
        .collect();
    (s, t)
}

impl MeshProvider for ObjMesh {
    fn supplies_vertices(&self) -> bool {
        !self.positions.is_empty()
    }
    fn supplies_tex_coords(&self) -> bool {
        !self.tex_coords.is_empty()
    }
    fn supplies_normals(&self) -> bool {
        !self.normals.is_empty()
    }
    fn supplies_tangents(&self) -> bool {
        !self.s_tangents.is_empty()
    }
    fn supplies_indices(&self) -> bool {
        !self.indices.is_empty()
    }

    fn indices(&self) -> Vec<u32> {
        self.indices.clone()
    }
    fn vertices(&self) -> Vec<[f32; 3]> {
        self.positions.clone()
    }
    fn tex_coords(&self) -> Vec<[f32; 2]> {
        self.tex_coords.clone()
    }
    fn normals(&self) -> Vec<[f32; 3]> {
        self.normals.clone()
    }
    fn s_tangents(&self) -> Vec<[f32; 3]> {
        self.s_tangents.clone()
    }
    fn t_tangents(&self) -> Vec<[f32; 3]> {
        self.t_tangents.clone()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::data_structures::mesh::{DrawCommand, GeometryData};

    const QUAD: &str = "\
o quad
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 1.0 1.0 0.0
v 0.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
vn 0.0 0.0 1.0
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    fn quad() -> ObjMesh {
        parse_obj(&mut BufReader::new(Cursor::new(QUAD)), "quad.obj").unwrap()
    }

    #[test]
    fn quads_are_triangulated() {
        let mesh = quad();
        assert_eq!(mesh.positions.len(), 4);
        assert_eq!(mesh.indices.len(), 6);
        assert!(mesh.supplies_indices());
        assert!(mesh.supplies_normals());
        assert!(mesh.supplies_tex_coords());
        assert_eq!(mesh.normals[0], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn texture_v_is_flipped() {
        let mesh = quad();
        assert_eq!(mesh.tex_coords[0], [0.0, 1.0]);
        assert_eq!(mesh.tex_coords[2], [1.0, 0.0]);
    }

    #[test]
    fn tangents_follow_texture_u() {
        let mesh = quad();
        assert!(mesh.supplies_tangents());
        for tangent in &mesh.s_tangents {
            assert_relative_eq!(tangent[0], 1.0, epsilon = 1e-5);
            assert_relative_eq!(tangent[1], 0.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn degenerate_uvs_leave_zero_tangents() {
        let positions = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let tex_coords = [[0.5, 0.5]; 3];
        let (s, t) = compute_tangents(&positions, &tex_coords, &[0, 1, 2]);
        assert_eq!(s, vec![[0.0; 3]; 3]);
        assert_eq!(t, vec![[0.0; 3]; 3]);
    }

    #[test]
    fn meshes_without_tex_coords_have_no_tangents() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let mesh = parse_obj(&mut BufReader::new(Cursor::new(obj)), "tri.obj").unwrap();
        assert!(!mesh.supplies_tex_coords());
        assert!(!mesh.supplies_tangents());
        assert!(!mesh.supplies_normals());
    }

    #[test]
    fn obj_meshes_draw_indexed() {
        let data = GeometryData::from_provider(&quad());
        assert_eq!(data.draw_command(), DrawCommand::Indexed { count: 6 });
        assert_eq!(data.vertex_len(), 4);
    }
}
