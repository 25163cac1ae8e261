use std::collections::HashMap;

use macroquad::math::{Vec2, Vec3};

/// Quad-faced mesh buffer shared by the subdivision cache and the panels.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuadMesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub quads: Vec<[u32; 4]>,
}

impl QuadMesh {
    /// Axis-aligned cube centred on the origin, outward winding.
    pub fn cube(half_extent: f32) -> Self {
        let positions = (0..8u32)
            .map(|corner| {
                let axis = |bit: u32| if corner & bit != 0 { half_extent } else { -half_extent };
                Vec3::new(axis(1), axis(2), axis(4))
            })
            .collect();
        let quads = vec![
            [0, 4, 6, 2],
            [1, 3, 7, 5],
            [0, 1, 5, 4],
            [2, 6, 7, 3],
            [0, 2, 3, 1],
            [4, 5, 7, 6],
        ];
        let mut mesh = Self {
            positions,
            normals: Vec::new(),
            quads,
        };
        mesh.recompute_normals();
        mesh
    }

    /// Flat square grid spanning `[-half_extent, half_extent]` along both
    /// axes around `center`. Faces wind towards `axis_u × axis_v`.
    pub fn grid(center: Vec3, axis_u: Vec3, axis_v: Vec3, half_extent: f32, segments: usize) -> Self {
        let segments = segments.max(1);
        let row = segments + 1;
        let step = 2.0 * half_extent / segments as f32;
        let mut positions = Vec::with_capacity(row * row);
        for j in 0..row {
            let v = -half_extent + j as f32 * step;
            for i in 0..row {
                let u = -half_extent + i as f32 * step;
                positions.push(center + axis_u * u + axis_v * v);
            }
        }
        let mut quads = Vec::with_capacity(segments * segments);
        for j in 0..segments {
            for i in 0..segments {
                let a = (j * row + i) as u32;
                let row = row as u32;
                quads.push([a, a + 1, a + row + 1, a + row]);
            }
        }
        let mut mesh = Self {
            positions,
            normals: Vec::new(),
            quads,
        };
        mesh.recompute_normals();
        mesh
    }

    pub fn face_count(&self) -> usize {
        self.quads.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Quadtree refinement: every quad becomes four, edge midpoints shared.
    pub fn subdivide(&self) -> Self {
        let mut positions = self.positions.clone();
        let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();
        let mut quads = Vec::with_capacity(self.quads.len() * 4);

        let mut midpoint = |a: u32, b: u32, positions: &mut Vec<Vec3>| -> u32 {
            let key = (a.min(b), a.max(b));
            *midpoints.entry(key).or_insert_with(|| {
                let mid = (positions[a as usize] + positions[b as usize]) * 0.5;
                positions.push(mid);
                (positions.len() - 1) as u32
            })
        };

        for &[a, b, c, d] in &self.quads {
            let ab = midpoint(a, b, &mut positions);
            let bc = midpoint(b, c, &mut positions);
            let cd = midpoint(c, d, &mut positions);
            let da = midpoint(d, a, &mut positions);
            let centre = (positions[a as usize]
                + positions[b as usize]
                + positions[c as usize]
                + positions[d as usize])
                * 0.25;
            positions.push(centre);
            let m = (positions.len() - 1) as u32;
            quads.push([a, ab, m, da]);
            quads.push([ab, b, bc, m]);
            quads.push([m, bc, c, cd]);
            quads.push([da, m, cd, d]);
        }

        let mut mesh = Self {
            positions,
            normals: Vec::new(),
            quads,
        };
        mesh.recompute_normals();
        mesh
    }

    /// Same topology with every vertex pushed onto a sphere of `radius`.
    pub fn spherified(&self, radius: f32) -> Self {
        let positions: Vec<Vec3> = self
            .positions
            .iter()
            .map(|p| p.normalize_or_zero() * radius)
            .collect();
        let normals = positions.iter().map(|p| p.normalize_or_zero()).collect();
        Self {
            positions,
            normals,
            quads: self.quads.clone(),
        }
    }

    pub fn recompute_normals(&mut self) {
        self.normals = vertex_normals(&self.positions, &self.quads);
    }
}

/// Area-weighted vertex normals from the quads' diagonal cross products.
pub fn vertex_normals(positions: &[Vec3], quads: &[[u32; 4]]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for &[a, b, c, d] in quads {
        let (pa, pb, pc, pd) = (
            positions[a as usize],
            positions[b as usize],
            positions[c as usize],
            positions[d as usize],
        );
        let face = (pc - pa).cross(pd - pb);
        for index in [a, b, c, d] {
            normals[index as usize] += face;
        }
    }
    for normal in &mut normals {
        *normal = normal.normalize_or_zero();
    }
    normals
}

pub fn ease_in_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) * 0.5
    }
}

/// Polar remap of a point in a centred square onto the inscribed circle:
/// the angle is kept, the radius becomes the point's Chebyshev distance.
pub fn square_to_circle(point: Vec2) -> Vec2 {
    let length = point.length();
    if length <= f32::EPSILON {
        return point;
    }
    let chebyshev = point.x.abs().max(point.y.abs());
    point * (chebyshev / length)
}
