//! EOS-80 seawater conversions.
//!
//! Depth/pressure conversions, PSS-78 practical salinity from conductivity,
//! and two empirical sound speed equations. Temperatures passed in are
//! ITS-90; the UNESCO algorithms are defined on IPTS-68 and convert
//! internally.

use crate::constants::{STANDARD_CONDUCTIVITY_MS_CM, T68_FACTOR};

/// Convert an ITS-90 temperature to IPTS-68
pub fn t68_from_t90(t90: f64) -> f64 {
    t90 * T68_FACTOR
}

/// Convert an IPTS-68 temperature to ITS-90
pub fn t90_from_t68(t68: f64) -> f64 {
    t68 / T68_FACTOR
}

/// Depth in metres from pressure in dbar (Fofonoff & Millard 1983).
pub fn depth_from_pressure(pressure_dbar: f64, latitude: f64) -> f64 {
    let x = latitude.to_radians().sin().powi(2);
    let p = pressure_dbar;
    let gravity = 9.780318 * (1.0 + (5.2788e-3 + 2.36e-5 * x) * x) + 1.092e-6 * p;
    ((((-1.82e-15 * p + 2.279e-10) * p - 2.2512e-5) * p + 9.72659) * p) / gravity
}

/// Pressure in dbar from depth in metres (Saunders 1981).
pub fn pressure_from_depth(depth_m: f64, latitude: f64) -> f64 {
    let x = latitude.abs().to_radians().sin();
    let c1 = 5.92e-3 + x * x * 5.25e-3;
    let radicand = (1.0 - c1).powi(2) - 8.84e-6 * depth_m;
    ((1.0 - c1) - radicand.max(0.0).sqrt()) / 4.42e-6
}

/// Practical salinity (PSS-78) from conductivity in mS/cm.
pub fn salinity_from_conductivity(conductivity_ms_cm: f64, temperature_c: f64, pressure_dbar: f64) -> f64 {
    const A: [f64; 6] = [0.0080, -0.1692, 25.3851, 14.0941, -7.0261, 2.7081];
    const B: [f64; 6] = [0.0005, -0.0056, -0.0066, -0.0375, 0.0636, -0.0144];
    const K: f64 = 0.0162;

    let t = t68_from_t90(temperature_c);
    let p = pressure_dbar;
    let r = conductivity_ms_cm / STANDARD_CONDUCTIVITY_MS_CM;

    let rt_ratio = 0.6766097 + t * (2.00564e-2 + t * (1.104259e-4 + t * (-6.9698e-7 + t * 1.0031e-9)));
    let rp = 1.0
        + p * (2.070e-5 + p * (-6.370e-10 + p * 3.989e-15))
            / (1.0 + t * (3.426e-2 + t * 4.464e-4) + r * (4.215e-1 + t * -3.107e-3));
    let rt = (r / (rp * rt_ratio)).max(0.0);

    let root = rt.sqrt();
    let mut powers = [1.0; 6];
    for i in 1..6 {
        powers[i] = powers[i - 1] * root;
    }
    let sum_a: f64 = A.iter().zip(powers.iter()).map(|(a, p)| a * p).sum();
    let sum_b: f64 = B.iter().zip(powers.iter()).map(|(b, p)| b * p).sum();

    let dt = t - 15.0;
    sum_a + dt / (1.0 + K * dt) * sum_b
}

/// Sound speed in m/s, UNESCO 1983 (Chen & Millero 1977).
pub fn sound_speed_unesco(salinity_psu: f64, temperature_c: f64, pressure_dbar: f64) -> f64 {
    let s = salinity_psu;
    let t = t68_from_t90(temperature_c);
    // UNESCO coefficients expect bar
    let p = pressure_dbar / 10.0;
    let sr = s.abs().sqrt();

    let c3 = (-2.3643e-12 * t + 3.8504e-10) * t - 9.7729e-9;
    let c2 = (((1.0405e-12 * t - 2.5335e-10) * t + 2.5974e-8) * t - 1.7107e-6) * t + 3.1260e-5;
    let c1 = ((((-6.1185e-10 * t + 1.3621e-7) * t - 8.1788e-6) * t + 6.8982e-4) * t) + 0.153563;
    let c0 = (((((3.1464e-9 * t - 1.47800e-6) * t + 3.3420e-4) * t - 5.80852e-2) * t + 5.03711) * t)
        + 1402.388;
    let cw = ((c3 * p + c2) * p + c1) * p + c0;

    let a3 = (-3.389e-13 * t + 6.649e-12) * t + 1.100e-10;
    let a2 = ((7.988e-12 * t - 1.6002e-10) * t + 9.1041e-9) * t - 3.9064e-7;
    let a1 = (((-2.0122e-10 * t + 1.0507e-8) * t - 6.4885e-8) * t - 1.2580e-5) * t + 9.4742e-5;
    let a0 = (((-3.21e-8 * t + 2.006e-6) * t + 7.164e-5) * t - 1.262e-2) * t + 1.389;
    let a = ((a3 * p + a2) * p + a1) * p + a0;

    let b = (-1.922e-2 - 4.42e-5 * t) + (7.3637e-5 + 1.7945e-7 * t) * p;
    let d = 1.727e-3 - 7.9836e-6 * p;

    cw + (a + b * sr + d * s) * s
}

/// Sound speed in m/s, Mackenzie 1981 nine-term equation on depth.
pub fn sound_speed_mackenzie(salinity_psu: f64, temperature_c: f64, depth_m: f64) -> f64 {
    let t = temperature_c;
    let ds = salinity_psu - 35.0;
    let d = depth_m;
    1448.96 + 4.591 * t - 5.304e-2 * t.powi(2) + 2.374e-4 * t.powi(3) + 1.340 * ds + 1.630e-2 * d
        + 1.675e-7 * d.powi(2)
        - 1.025e-2 * t * ds
        - 7.139e-13 * t * d.powi(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() < tolerance,
            "expected {} within {} of {}",
            actual,
            tolerance,
            expected
        );
    }

    #[test]
    fn test_depth_check_value() {
        // UNESCO Tech. Paper 44 check value
        assert_close(depth_from_pressure(10_000.0, 30.0), 9712.653, 1e-3);
        assert_eq!(depth_from_pressure(0.0, 45.0), 0.0);
    }

    #[test]
    fn test_pressure_check_value() {
        // Saunders 1981 check value
        assert_close(pressure_from_depth(7321.45, 30.0), 7500.0, 0.01);
        assert_eq!(pressure_from_depth(0.0, 10.0), 0.0);
    }

    #[test]
    fn test_depth_pressure_inverse() {
        let pressure = pressure_from_depth(1000.0, 45.0);
        assert_close(depth_from_pressure(pressure, 45.0), 1000.0, 0.5);
    }

    #[test]
    fn test_salinity_check_values() {
        // R = 1 at 15 degC (IPTS-68), surface
        assert_close(
            salinity_from_conductivity(STANDARD_CONDUCTIVITY_MS_CM, t90_from_t68(15.0), 0.0),
            35.0,
            1e-4,
        );
        // UNESCO check value: R = 1.888091, T68 = 40, p = 10000
        assert_close(
            salinity_from_conductivity(
                STANDARD_CONDUCTIVITY_MS_CM * 1.888091,
                t90_from_t68(40.0),
                10_000.0,
            ),
            40.0,
            1e-4,
        );
    }

    #[test]
    fn test_unesco_sound_speed_check_value() {
        // UNESCO Tech. Paper 44 check value: S=40, T68=40, P=1000 bar
        assert_close(
            sound_speed_unesco(40.0, t90_from_t68(40.0), 10_000.0),
            1731.995,
            1e-3,
        );
        assert_close(sound_speed_unesco(35.0, 0.0, 0.0), 1449.14, 0.01);
    }

    #[test]
    fn test_mackenzie_sound_speed() {
        assert_close(sound_speed_mackenzie(35.0, 0.0, 0.0), 1448.96, 1e-9);
        assert_close(sound_speed_mackenzie(35.0, 10.0, 1000.0), 1506.2638, 1e-3);
    }

    #[test]
    fn test_formulas_agree_near_surface() {
        let unesco = sound_speed_unesco(35.0, 10.0, pressure_from_depth(1000.0, 45.0));
        let mackenzie = sound_speed_mackenzie(35.0, 10.0, 1000.0);
        assert_close(unesco, mackenzie, 1.0);
    }
}
