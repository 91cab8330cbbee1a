use catalog::PlateOutline;
use earcutr::earcut;
use glam::{vec2, vec3, Mat4, Vec2, Vec3};

use crate::{mesh::MeshData, Error};

/// The thickness of the switch plate.
pub const PLATE_DEPTH: f32 = 0.016;
/// The height of the switch plate above the origin.
pub const PLATE_HEIGHT: f32 = 0.1762;
/// The typing angle of the switch plate in degrees.
pub const PLATE_ANGLE: f32 = 6.0;

/// Returns the transformation of an extruded plate into the case frame.
#[must_use]
pub fn plate_transformation() -> Mat4 {
    Mat4::from_translation(vec3(0.0, PLATE_HEIGHT, 0.0))
        * Mat4::from_rotation_x((PLATE_ANGLE - 90.0).to_radians())
        * Mat4::from_scale(vec3(1.0, 1.0, -1.0))
}

/// Creates the plate mesh of the given outline.
///
/// # Errors
///
/// Returns [`Error::Triangulation`] if the outline cannot be triangulated.
pub fn plate_mesh(outline: &PlateOutline) -> Result<MeshData, Error> {
    let mut mesh = extrude(&outline.points, PLATE_DEPTH)?;
    mesh.transform(plate_transformation());

    Ok(mesh)
}

/// Extrudes a simple polygon along the Z-axis to a closed prism with flat shading.
///
/// # Errors
///
/// Returns [`Error::Triangulation`] if the polygon cannot be triangulated.
pub fn extrude(points: &[Vec2], depth: f32) -> Result<MeshData, Error> {
    let triangulation_error = || Error::Triangulation {
        points: points.len(),
    };

    if points.len() < 3 {
        return Err(triangulation_error());
    }

    let vertices: Vec<_> = points
        .iter()
        .flat_map(|point| [f64::from(point.x), f64::from(point.y)])
        .collect();
    let triangles = earcut(&vertices, &[], 2).map_err(|_| triangulation_error())?;
    if triangles.is_empty() {
        return Err(triangulation_error());
    }

    let mut mesh = MeshData::default();

    for triangle in triangles.chunks_exact(3) {
        let [a, b, c] = [points[triangle[0]], points[triangle[1]], points[triangle[2]]];
        let (b, c) = if (b - a).perp_dot(c - a) >= 0.0 {
            (b, c)
        } else {
            (c, b)
        };

        mesh.push_triangle([a.extend(depth), b.extend(depth), c.extend(depth)], Vec3::Z);
        mesh.push_triangle([a.extend(0.0), c.extend(0.0), b.extend(0.0)], Vec3::NEG_Z);
    }

    let counterclockwise = signed_area(points) >= 0.0;
    for (index, &start) in points.iter().enumerate() {
        let end = points[(index + 1) % points.len()];
        let (start, end) = if counterclockwise {
            (start, end)
        } else {
            (end, start)
        };
        let edge = end - start;
        let normal = vec2(edge.y, -edge.x).normalize_or_zero().extend(0.0);

        let [bottom_start, bottom_end] = [start.extend(0.0), end.extend(0.0)];
        let [top_start, top_end] = [start.extend(depth), end.extend(depth)];

        mesh.push_triangle([bottom_start, bottom_end, top_end], normal);
        mesh.push_triangle([bottom_start, top_end, top_start], normal);
    }

    Ok(mesh)
}

/// Returns the signed area of a polygon, positive for counterclockwise order.
fn signed_area(points: &[Vec2]) -> f32 {
    let doubled: f32 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.perp_dot(*b))
        .sum();

    doubled / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Vec2> {
        vec![
            vec2(0.0, 0.0),
            vec2(1.0, 0.0),
            vec2(1.0, 1.0),
            vec2(0.0, 1.0),
        ]
    }

    #[test]
    fn extrudes_closed_prism() {
        let mesh = extrude(&square(), 0.5).expect("square should be extrudable");

        // Two caps of two triangles each and four sides of two triangles each
        assert_eq!(mesh.triangle_count(), 12);
        assert_eq!(mesh.positions.len(), mesh.normals.len());

        let bounds = mesh.bounds().expect("mesh should not be empty");
        assert_eq!(bounds.min, Vec3::ZERO);
        assert_eq!(bounds.max, vec3(1.0, 1.0, 0.5));
    }

    #[test]
    fn faces_point_outwards_for_both_orientations() {
        let mut clockwise = square();
        clockwise.reverse();

        for points in [square(), clockwise] {
            let mesh = extrude(&points, 0.5).expect("square should be extrudable");
            let center = vec3(0.5, 0.5, 0.25);

            for triangle in mesh.indices.chunks_exact(3) {
                let [a, b, c] = [0, 1, 2].map(|i| mesh.positions[triangle[i] as usize]);
                let face_normal = (b - a).cross(c - a);
                let outwards = (a + b + c) / 3.0 - center;

                assert!(face_normal.dot(outwards) > 0.0);
                assert!(face_normal.dot(mesh.normals[triangle[0] as usize]) > 0.0);
            }
        }
    }

    #[test]
    fn rejects_degenerate_outline() {
        assert!(matches!(
            extrude(&[vec2(0.0, 0.0), vec2(1.0, 0.0)], 0.5),
            Err(Error::Triangulation { points: 2 })
        ));
    }

    #[test]
    fn plate_is_tilted_and_raised() {
        let outline = PlateOutline { points: square() };
        let mesh = plate_mesh(&outline).expect("square should be extrudable");
        let bounds = mesh.bounds().expect("mesh should not be empty");

        assert!((bounds.max.x - 1.0).abs() < 1e-6);
        assert!(bounds.min.y > PLATE_HEIGHT - 2.0 * PLATE_DEPTH);
        assert!(bounds.max.y > PLATE_HEIGHT);
    }
}
