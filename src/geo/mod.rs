use crate::models::agent::Location;

const EARTH_RADIUS_KM: f64 = 6_371.0;

// WGS-84 ellipsoid.
const SEMI_MAJOR_M: f64 = 6_378_137.0;
const FLATTENING: f64 = 1.0 / 298.257_223_563;
const SEMI_MINOR_M: f64 = 6_356_752.314_245;

const VINCENTY_MAX_ITERATIONS: u32 = 100;
const VINCENTY_TOLERANCE: f64 = 1e-12;

pub fn haversine_km(a: &Location, b: &Location) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Inverse Vincenty distance on the WGS-84 ellipsoid.
///
/// Returns `None` when the iteration does not converge, which happens for
/// nearly antipodal points.
pub fn vincenty_km(a: &Location, b: &Location) -> Option<f64> {
    let f = FLATTENING;
    let l = (b.lng - a.lng).to_radians();

    let u1 = ((1.0 - f) * a.lat.to_radians().tan()).atan();
    let u2 = ((1.0 - f) * b.lat.to_radians().tan()).atan();
    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();

    let mut lambda = l;
    let mut converged = false;
    let (mut sin_sigma, mut cos_sigma, mut sigma) = (0.0, 0.0, 0.0);
    let (mut cos_sq_alpha, mut cos_2sigma_m) = (0.0, 0.0);

    for _ in 0..VINCENTY_MAX_ITERATIONS {
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        let cross = cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda;
        sin_sigma = ((cos_u2 * sin_lambda).powi(2) + cross * cross).sqrt();

        if sin_sigma == 0.0 {
            return Some(0.0);
        }

        cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        sigma = sin_sigma.atan2(cos_sigma);
        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;

        // Both points on the equator.
        cos_2sigma_m = if cos_sq_alpha == 0.0 {
            0.0
        } else {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
        };

        let c = f / 16.0 * cos_sq_alpha * (4.0 + f * (4.0 - 3.0 * cos_sq_alpha));
        let previous = lambda;
        lambda = l
            + (1.0 - c)
                * f
                * sin_alpha
                * (sigma
                    + c * sin_sigma
                        * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))));

        if (lambda - previous).abs() <= VINCENTY_TOLERANCE {
            converged = true;
            break;
        }
    }

    if !converged {
        return None;
    }

    let a2 = SEMI_MAJOR_M * SEMI_MAJOR_M;
    let b2 = SEMI_MINOR_M * SEMI_MINOR_M;
    let u_sq = cos_sq_alpha * (a2 - b2) / b2;
    let big_a =
        1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
    let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
    let delta_sigma = big_b
        * sin_sigma
        * (cos_2sigma_m
            + big_b / 4.0
                * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))
                    - big_b / 6.0
                        * cos_2sigma_m
                        * (-3.0 + 4.0 * sin_sigma.powi(2))
                        * (-3.0 + 4.0 * cos_2sigma_m.powi(2))));

    Some(SEMI_MINOR_M * big_a * (sigma - delta_sigma) / 1000.0)
}

/// Ellipsoidal distance, falling back to the spherical one when Vincenty
/// fails to converge.
pub fn distance_km(a: &Location, b: &Location) -> f64 {
    vincenty_km(a, b).unwrap_or_else(|| haversine_km(a, b))
}
