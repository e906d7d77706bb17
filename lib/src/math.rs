//! Vector, matrix and quaternion algebra.
//!
//! Vectors are 4-wide (`w = 1` for points, `w = 0` for directions) and
//! matrices are 4×4, row-major when indexed as `m[(row, col)]`. A
//! quaternion overlays a vector: `(x, y, z)` is the vector part and `w`
//! the scalar part, which is exactly nalgebra's `Quaternion::coords`
//! layout.
//!
//! All angles are radians unless the function name says otherwise.

use std::f64::consts;

use nalgebra::{Matrix3, Matrix4, Quaternion, Vector3, Vector4};

use crate::error::{PhysicsError, Result};

pub type Vector = Vector4<f64>;
pub type Matrix = Matrix4<f64>;
pub type Quat = Quaternion<f64>;

/// Relative threshold below which a determinant counts as zero.
const SINGULAR_EPSILON: f64 = 1e-12;

pub fn vector(x: f64, y: f64, z: f64, w: f64) -> Vector {
    Vector::new(x, y, z, w)
}

/// Lift a 3-vector into a homogeneous point (`w = 1`).
pub fn point(v: &Vector3<f64>) -> Vector {
    Vector::new(v.x, v.y, v.z, 1.0)
}

/// Lift a 3-vector into a homogeneous direction (`w = 0`).
pub fn direction(v: &Vector3<f64>) -> Vector {
    Vector::new(v.x, v.y, v.z, 0.0)
}

pub fn xyz(v: &Vector) -> Vector3<f64> {
    Vector3::new(v.x, v.y, v.z)
}

/// Four-component dot product.
pub fn dot(a: &Vector, b: &Vector) -> f64 {
    a.x * b.x + a.y * b.y + a.z * b.z + a.w * b.w
}

/// Cross product of the `(x, y, z)` parts; the result is a direction.
pub fn cross(a: &Vector, b: &Vector) -> Vector {
    Vector::new(
        a.y * b.z - a.z * b.y,
        a.z * b.x - a.x * b.z,
        a.x * b.y - a.y * b.x,
        0.0,
    )
}

/// Euclidean length, scaled by the largest component so that tiny and
/// huge vectors neither underflow nor overflow when squared.
pub fn length(v: &Vector) -> f64 {
    let amax = v.amax();
    if amax == 0.0 || !amax.is_finite() {
        return amax;
    }
    let u = v / amax;
    amax * dot(&u, &u).sqrt()
}

/// Scale `v` to unit length.
///
/// A zero-length or non-finite vector has no direction; instead of
/// producing NaNs this fails with [`PhysicsError::ZeroLengthVector`].
pub fn normalize(v: &Vector) -> Result<Vector> {
    let amax = v.amax();
    if amax == 0.0 || !amax.is_finite() {
        return Err(PhysicsError::ZeroLengthVector);
    }
    let u = v / amax;
    Ok(u / dot(&u, &u).sqrt())
}

/// Same policy as [`normalize`], for the 3-vectors used by body state.
pub fn normalize3(v: &Vector3<f64>) -> Result<Vector3<f64>> {
    normalize(&direction(v)).map(|n| xyz(&n))
}

/// Determinant of the 3×3 minor left after deleting `row` and `col`,
/// evaluated with Sarrus' rule.
pub fn subdeterminant3(m: &Matrix, row: usize, col: usize) -> f64 {
    let mut minor = Matrix3::zeros();
    let mut i1 = 0;
    for i0 in (0..4).filter(|&i| i != row) {
        let mut j1 = 0;
        for j0 in (0..4).filter(|&j| j != col) {
            minor[(i1, j1)] = m[(i0, j0)];
            j1 += 1;
        }
        i1 += 1;
    }

    let mut acc = 0.0;
    for i in 0..3 {
        acc += minor[(0, i % 3)] * minor[(1, (1 + i) % 3)] * minor[(2, (2 + i) % 3)];
        acc -= minor[(2, i % 3)] * minor[(1, (1 + i) % 3)] * minor[(0, (2 + i) % 3)];
    }
    acc
}

fn cofactor_sign(row: usize, col: usize) -> f64 {
    if (row + col) % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}

/// Determinant by cofactor expansion along the first row.
pub fn determinant(m: &Matrix) -> f64 {
    (0..4)
        .map(|col| cofactor_sign(0, col) * m[(0, col)] * subdeterminant3(m, 0, col))
        .sum()
}

/// The adjugate (transposed cofactor matrix).
pub fn adjugate(m: &Matrix) -> Matrix {
    let mut adj = Matrix::zeros();
    for i in 0..4 {
        for j in 0..4 {
            adj[(j, i)] = cofactor_sign(i, j) * subdeterminant3(m, i, j);
        }
    }
    adj
}

/// Inverse via `adj(M) / det(M)`.
///
/// Fails with [`PhysicsError::SingularMatrix`] when the determinant is
/// zero relative to the magnitude of the entries.
///
/// The test runs on `M / max|mᵢⱼ|`, so uniformly tiny or huge matrices
/// are judged by their conditioning rather than their magnitude.
pub fn inverse(m: &Matrix) -> Result<Matrix> {
    let amax = m.amax();
    if amax == 0.0 || !amax.is_finite() {
        return Err(PhysicsError::SingularMatrix {
            determinant: determinant(m),
        });
    }
    let scaled = m / amax;
    let det = determinant(&scaled);
    if !det.is_finite() || det.abs() <= SINGULAR_EPSILON {
        return Err(PhysicsError::SingularMatrix {
            determinant: determinant(m),
        });
    }
    Ok(adjugate(&scaled) / det / amax)
}

pub fn transpose(m: &Matrix) -> Matrix {
    m.transpose()
}

/// Homogeneous rotation matrix for the quaternion `q`.
///
/// For unit `q` the result is orthonormal, so its transpose is its
/// inverse, and `M * v` rotates `v` the same way `q v q*` does.
pub fn quat_to_matrix(q: &Quat) -> Matrix {
    let (x, y, z, w) = (q.i, q.j, q.k, q.w);
    let (xx, yy, zz) = (x * x, y * y, z * z);
    let (xy, xz, yz) = (x * y, x * z, y * z);
    let (wx, wy, wz) = (w * x, w * y, w * z);

    Matrix::new(
        1.0 - 2.0 * (yy + zz),
        2.0 * (xy - wz),
        2.0 * (xz + wy),
        0.0,
        2.0 * (xy + wz),
        1.0 - 2.0 * (xx + zz),
        2.0 * (yz - wx),
        0.0,
        2.0 * (xz - wy),
        2.0 * (yz + wx),
        1.0 - 2.0 * (xx + yy),
        0.0,
        0.0,
        0.0,
        0.0,
        1.0,
    )
}

/// The upper-left 3×3 block of [`quat_to_matrix`].
pub fn quat_to_matrix3(q: &Quat) -> Matrix3<f64> {
    quat_to_matrix(q).fixed_view::<3, 3>(0, 0).into_owned()
}

/// Unit quaternion rotating by `angle` around `axis`.
pub fn quat_rotation(axis: &Vector3<f64>, angle: f64) -> Result<Quat> {
    let axis = normalize3(axis)?;
    let half = angle / 2.0;
    let s = libm::sin(half);
    Ok(Quat::new(libm::cos(half), axis.x * s, axis.y * s, axis.z * s))
}

/// Re-normalise an orientation quaternion.
///
/// A zero quaternion carries no orientation at all and is replaced by
/// the identity.
pub fn quat_normalize(q: &Quat) -> Quat {
    let n = q.norm();
    if n == 0.0 || !n.is_finite() {
        Quat::identity()
    } else {
        q / n
    }
}

/// Rotate the 3-vector `v` by the orientation `q`.
pub fn rotate(q: &Quat, v: &Vector3<f64>) -> Vector3<f64> {
    xyz(&(quat_to_matrix(q) * direction(v)))
}

pub fn rotation_x(a: f64) -> Matrix {
    let (s, c) = (libm::sin(a), libm::cos(a));
    Matrix::new(
        1.0, 0.0, 0.0, 0.0, //
        0.0, c, -s, 0.0, //
        0.0, s, c, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    )
}

pub fn rotation_y(a: f64) -> Matrix {
    let (s, c) = (libm::sin(a), libm::cos(a));
    Matrix::new(
        c, 0.0, s, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        -s, 0.0, c, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    )
}

pub fn rotation_z(a: f64) -> Matrix {
    let (s, c) = (libm::sin(a), libm::cos(a));
    Matrix::new(
        c, -s, 0.0, 0.0, //
        s, c, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    )
}

pub fn translation(t: &Vector3<f64>) -> Matrix {
    let mut m = Matrix::identity();
    m[(0, 3)] = t.x;
    m[(1, 3)] = t.y;
    m[(2, 3)] = t.z;
    m
}

pub fn deg_to_rad(deg: f64) -> f64 {
    deg * consts::PI / 180.0
}

pub fn rad_to_deg(rad: f64) -> f64 {
    rad * 180.0 / consts::PI
}

pub fn vector_approx_eq(a: &Vector, b: &Vector, tol: f64) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= tol)
}

pub fn matrix_approx_eq(a: &Matrix, b: &Matrix, tol: f64) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= tol)
}
