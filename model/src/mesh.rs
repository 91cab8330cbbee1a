use glam::{Mat4, Vec3};

/// A triangle mesh with optional per-vertex normals.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    /// The vertex positions.
    pub positions: Vec<Vec3>,
    /// The vertex normals, either empty or one per position.
    pub normals: Vec<Vec3>,
    /// The vertex indices, three per triangle.
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Returns the number of triangles.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Returns true if the mesh has no triangles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Adds a flat triangle with the given normal.
    pub fn push_triangle(&mut self, vertices: [Vec3; 3], normal: Vec3) {
        #[allow(clippy::cast_possible_truncation)]
        let offset = self.positions.len() as u32;

        self.positions.extend(vertices);
        self.normals.extend([normal; 3]);
        self.indices.extend([offset, offset + 1, offset + 2]);
    }

    /// Appends another mesh.
    pub fn append(&mut self, other: &MeshData) {
        #[allow(clippy::cast_possible_truncation)]
        let offset = self.positions.len() as u32;

        if self.normals.len() == self.positions.len() && other.normals.len() == other.positions.len()
        {
            self.normals.extend_from_slice(&other.normals);
        } else {
            self.normals.clear();
        }
        self.positions.extend_from_slice(&other.positions);
        self.indices
            .extend(other.indices.iter().map(|index| index + offset));
    }

    /// Applies a transformation to all positions and normals.
    ///
    /// Mirroring transformations flip the winding order to keep the faces pointing outwards.
    pub fn transform(&mut self, transformation: Mat4) {
        for position in &mut self.positions {
            *position = transformation.transform_point3(*position);
        }

        let normal_matrix = transformation.inverse().transpose();
        for normal in &mut self.normals {
            *normal = normal_matrix.transform_vector3(*normal).normalize_or_zero();
        }

        if transformation.determinant() < 0.0 {
            for triangle in self.indices.chunks_exact_mut(3) {
                triangle.swap(1, 2);
            }
        }
    }

    /// Returns the bounds of all positions.
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(self.positions.iter().copied())
    }
}

/// Axis aligned bounded region given by two points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    /// Corner point with minimal coordinates.
    pub min: Vec3,
    /// Corner point with maximal coordinates.
    pub max: Vec3,
}

impl Bounds {
    /// Creates the smallest bounds containing all points, if there are any.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        points.into_iter().fold(None, |bounds: Option<Self>, point| {
            Some(match bounds {
                Some(Self { min, max }) => Self {
                    min: min.min(point),
                    max: max.max(point),
                },
                None => Self {
                    min: point,
                    max: point,
                },
            })
        })
    }

    /// Returns the size of the bounds.
    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Returns the center of the bounds.
    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) / 2.0
    }

    /// Returns the diameter of the bounds.
    #[must_use]
    pub fn diameter(&self) -> f32 {
        self.size().length()
    }

    /// Combines two bounds.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let min = self.min.min(other.min);
        let max = self.max.max(other.max);

        Self { min, max }
    }

    /// Returns the bounds of the transformed corners.
    #[must_use]
    pub fn transformed(&self, transformation: Mat4) -> Self {
        let Self { min, max } = *self;
        let corners = (0..8).map(|corner| {
            let select = |bit: u32, low: f32, high: f32| if corner & bit == 0 { low } else { high };
            transformation.transform_point3(Vec3::new(
                select(1, min.x, max.x),
                select(2, min.y, max.y),
                select(4, min.z, max.z),
            ))
        });

        Self::from_points(corners).unwrap_or(*self)
    }
}

#[cfg(test)]
mod tests {
    use glam::vec3;

    use super::*;

    #[test]
    fn bounds_of_points() {
        let bounds = Bounds::from_points([vec3(1.0, -1.0, 0.0), vec3(-1.0, 2.0, 0.5)])
            .expect("bounds should exist");

        assert_eq!(bounds.min, vec3(-1.0, -1.0, 0.0));
        assert_eq!(bounds.max, vec3(1.0, 2.0, 0.5));
        assert_eq!(bounds.center(), vec3(0.0, 0.5, 0.25));
        assert!(Bounds::from_points([]).is_none());
    }

    #[test]
    fn union_contains_both() {
        let a = Bounds {
            min: Vec3::ZERO,
            max: Vec3::ONE,
        };
        let b = Bounds {
            min: Vec3::splat(-1.0),
            max: Vec3::splat(0.5),
        };

        assert_eq!(
            a.union(&b),
            Bounds {
                min: Vec3::splat(-1.0),
                max: Vec3::ONE
            }
        );
    }

    #[test]
    fn mirroring_flips_winding() {
        let mut mesh = MeshData::default();
        mesh.push_triangle([Vec3::ZERO, Vec3::X, Vec3::Y], Vec3::Z);

        mesh.transform(Mat4::from_scale(vec3(1.0, 1.0, -1.0)));

        assert_eq!(mesh.indices, vec![0, 2, 1]);
        assert_eq!(mesh.normals[0], Vec3::NEG_Z);
    }

    #[test]
    fn append_offsets_indices() {
        let mut mesh = MeshData::default();
        mesh.push_triangle([Vec3::ZERO, Vec3::X, Vec3::Y], Vec3::Z);
        let other = mesh.clone();

        mesh.append(&other);

        assert_eq!(mesh.indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(mesh.normals.len(), 6);
    }
}
