use ndarray::{Array1, ArrayView1};

pub struct SpectralHelper;

impl SpectralHelper {
    /// Absorbed power per bin, `a_i · S_i · Δν_i` (W/m²).
    pub fn contributions(
        psd: ArrayView1<f64>,
        absorption: ArrayView1<f64>,
        widths: ArrayView1<f64>,
    ) -> Array1<f64> {
        &(&psd * &absorption) * &widths
    }

    /// Band-integrated absorbed power, `Σ a_i · S_i · Δν_i` (W/m²).
    pub fn integrate(
        psd: ArrayView1<f64>,
        absorption: ArrayView1<f64>,
        widths: ArrayView1<f64>,
    ) -> f64 {
        (&psd * &absorption).dot(&widths)
    }

    /// Linear interpolation of PSD between two bin centres.
    pub fn interpolate(left: (f64, f64), right: (f64, f64), frequency_hz: f64) -> f64 {
        let (x0, y0) = left;
        let (x1, y1) = right;
        if x1 == x0 {
            return 0.5 * (y0 + y1);
        }
        let t = ((frequency_hz - x0) / (x1 - x0)).clamp(0.0, 1.0);
        y0 + t * (y1 - y0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn integrate_matches_elementwise_sum() {
        let psd = array![1.0e-12, 2.0e-12, 4.0e-12];
        let absorption = array![0.01, 0.01, 0.02];
        let widths = array![1.0e6, 2.0e6, 1.0e6];
        let total = SpectralHelper::integrate(psd.view(), absorption.view(), widths.view());
        let parts = SpectralHelper::contributions(psd.view(), absorption.view(), widths.view());
        assert!((total - parts.sum()).abs() < 1e-24);
        assert!((total - (1.0e-8 + 4.0e-8 + 8.0e-8)).abs() < 1e-20);
    }

    #[test]
    fn interpolation_is_linear_between_centres() {
        let value = SpectralHelper::interpolate((0.0, 1.0), (10.0, 3.0), 5.0);
        assert!((value - 2.0).abs() < 1e-12);
    }
}
