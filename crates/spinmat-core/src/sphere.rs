//! Spherical geometry utilities for spin surrogates.
//! All operations on the unit sphere using f64 precision.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A point in 3-D Cartesian coordinates (unit sphere or millimetre space).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn axis(self, dim: usize) -> f64 {
        match dim {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// Squared Euclidean (chord) distance. Monotone in great-circle distance
    /// for unit vectors, so nearest-neighbour queries can use it directly.
    #[inline]
    pub fn distance_sq(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }
}

/// Proper rotation of R³, stored row-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    m: [[f64; 3]; 3],
}

impl Rotation {
    /// Uniformly distributed random rotation (Shoemake's unit quaternion method).
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let u1: f64 = rng.gen();
        let u2: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
        let u3: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
        let a = (1.0 - u1).sqrt();
        let b = u1.sqrt();
        Self::from_quaternion(b * u3.cos(), a * u2.sin(), a * u2.cos(), b * u3.sin())
    }

    /// Rotation matrix of the unit quaternion `w + xi + yj + zk`.
    pub fn from_quaternion(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self {
            m: [
                [1.0 - 2.0 * (y * y + z * z), 2.0 * (x * y - w * z), 2.0 * (x * z + w * y)],
                [2.0 * (x * y + w * z), 1.0 - 2.0 * (x * x + z * z), 2.0 * (y * z - w * x)],
                [2.0 * (x * z - w * y), 2.0 * (y * z + w * x), 1.0 - 2.0 * (x * x + y * y)],
            ],
        }
    }

    pub fn apply(&self, v: Vec3) -> Vec3 {
        let m = &self.m;
        Vec3 {
            x: m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z,
            y: m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z,
            z: m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z,
        }
    }

    /// The inverse rotation.
    pub fn transpose(&self) -> Self {
        let m = &self.m;
        Self {
            m: [
                [m[0][0], m[1][0], m[2][0]],
                [m[0][1], m[1][1], m[2][1]],
                [m[0][2], m[1][2], m[2][2]],
            ],
        }
    }

    /// Conjugate by the reflection across the midsagittal (x = 0) plane:
    /// `F R F` with `F = diag(-1, 1, 1)`. Still a proper rotation.
    pub fn mirrored(&self) -> Self {
        let mut m = self.m;
        m[0][1] = -m[0][1];
        m[0][2] = -m[0][2];
        m[1][0] = -m[1][0];
        m[2][0] = -m[2][0];
        Self { m }
    }
}

/// `n` near-uniform points on the unit sphere (Fibonacci lattice).
pub fn fibonacci_sphere(n: usize) -> Vec<Vec3> {
    let golden = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
    (0..n)
        .map(|i| {
            let z = 1.0 - 2.0 * (i as f64 + 0.5) / n as f64;
            let r = (1.0 - z * z).max(0.0).sqrt();
            let theta = golden * i as f64;
            Vec3::new(r * theta.cos(), r * theta.sin(), z)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn latlon(lat_deg: f64, lon_deg: f64) -> Vec3 {
        let (lat, lon) = (lat_deg.to_radians(), lon_deg.to_radians());
        Vec3::new(lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin())
    }

    fn dot(a: Vec3, b: Vec3) -> f64 {
        a.x * b.x + a.y * b.y + a.z * b.z
    }

    fn great_circle(a: Vec3, b: Vec3) -> f64 {
        dot(a, b).clamp(-1.0, 1.0).acos()
    }

    fn determinant(r: &Rotation) -> f64 {
        let m = &r.m;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    #[test]
    fn random_rotation_is_proper() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let r = Rotation::random(&mut rng);
            assert_abs_diff_eq!(determinant(&r), 1.0, epsilon = 1e-9);
            assert_abs_diff_eq!(determinant(&r.mirrored()), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn rotation_preserves_angles() {
        let mut rng = StdRng::seed_from_u64(11);
        let r = Rotation::random(&mut rng);
        let a = latlon(10.0, 20.0);
        let b = latlon(-35.0, 140.0);
        let before = great_circle(a, b);
        let after = great_circle(r.apply(a), r.apply(b));
        assert_abs_diff_eq!(before, after, epsilon = 1e-12);
        assert_abs_diff_eq!(r.apply(a).distance_sq(Vec3::new(0.0, 0.0, 0.0)), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn transpose_inverts() {
        let mut rng = StdRng::seed_from_u64(3);
        let r = Rotation::random(&mut rng);
        let p = latlon(45.0, -70.0);
        let back = r.transpose().apply(r.apply(p));
        assert!(back.distance_sq(p) < 1e-20, "R^T R p should return p, got {back:?}");
    }

    #[test]
    fn mirrored_rotation_commutes_with_reflection() {
        // F (F R F) p == R (F p): rotating the mirror image is the mirror of the rotation.
        let mut rng = StdRng::seed_from_u64(5);
        let r = Rotation::random(&mut rng);
        let flip = |v: Vec3| Vec3::new(-v.x, v.y, v.z);
        let p = latlon(12.0, 33.0);
        let lhs = flip(r.mirrored().apply(p));
        let rhs = r.apply(flip(p));
        assert!(lhs.distance_sq(rhs) < 1e-20);
    }

    #[test]
    fn fibonacci_points_are_unit_and_distinct() {
        let pts = fibonacci_sphere(200);
        assert_eq!(pts.len(), 200);
        for p in &pts {
            assert_abs_diff_eq!(dot(*p, *p), 1.0, epsilon = 1e-12);
        }
        assert!(pts[0].distance_sq(pts[1]) > 1e-6);
    }

    #[test]
    fn unit_quaternion_is_identity() {
        let p = Vec3::new(0.2, -0.3, 0.9);
        assert_eq!(Rotation::from_quaternion(1.0, 0.0, 0.0, 0.0).apply(p), p);
    }
}
