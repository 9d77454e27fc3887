//! Unit-sphere geometry for geographic coordinates.
//!
//! Points are plain `[f64; 3]` Cartesian vectors. Geographic input uses the
//! usual convention: longitude east of Greenwich and latitude north of the
//! equator, both in degrees.
//!
//! - x = cos(lat) * cos(lon)
//! - y = cos(lat) * sin(lon)
//! - z = sin(lat)

/// A Cartesian vector in R^3.
pub type Vec3 = [f64; 3];

/// Norms below this are treated as a zero vector.
pub const NORM_EPSILON: f64 = 1e-12;

/// Converts longitude/latitude in degrees to a unit vector.
pub fn geographic_to_cartesian(longitude: f64, latitude: f64) -> Vec3 {
    let (sin_lat, cos_lat) = latitude.to_radians().sin_cos();
    let (sin_lon, cos_lon) = longitude.to_radians().sin_cos();
    [cos_lat * cos_lon, cos_lat * sin_lon, sin_lat]
}

/// Converts a (not necessarily unit) vector back to `(longitude, latitude)`
/// in degrees. Returns `None` for a zero vector.
pub fn cartesian_to_geographic(v: &Vec3) -> Option<(f64, f64)> {
    let u = normalized(v)?;
    let latitude = u[2].clamp(-1.0, 1.0).asin().to_degrees();
    let longitude = u[1].atan2(u[0]).to_degrees();
    Some((longitude, latitude))
}

#[inline]
pub fn dot(a: &Vec3, b: &Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn norm(v: &Vec3) -> f64 {
    dot(v, v).sqrt()
}

/// `y += a * x`
#[inline]
pub fn axpy(a: f64, x: &Vec3, y: &mut Vec3) {
    y[0] += a * x[0];
    y[1] += a * x[1];
    y[2] += a * x[2];
}

/// Unit vector in the direction of `v`, or `None` when `v` is (numerically) zero.
pub fn normalized(v: &Vec3) -> Option<Vec3> {
    let n = norm(v);
    if n < NORM_EPSILON {
        return None;
    }
    Some([v[0] / n, v[1] / n, v[2] / n])
}

/// Reciprocal norm, or 0.0 for a zero vector.
#[inline]
pub fn inverse_norm(v: &Vec3) -> f64 {
    let n = norm(v);
    if n < NORM_EPSILON {
        0.0
    } else {
        1.0 / n
    }
}
