//! Statistical power of the two-sample t-test via the noncentral t distribution.

use statrs::distribution::{ContinuousCDF, Normal, StudentsT};
use statrs::function::beta::beta_reg;
use statrs::function::gamma::ln_gamma;

const NCT_MAX_ITER: usize = 1000;
const NCT_ERR_MAX: f64 = 1e-12;

pub struct PowerAnalysis;

impl PowerAnalysis {
    /// Power of a two-sided independent two-sample t-test.
    ///
    /// `effect_size` is Cohen's d, `nobs1` the size of the first sample and
    /// `ratio` the size ratio `nobs2 / nobs1`.
    pub fn ttest_ind_power(effect_size: f64, nobs1: f64, alpha: f64, ratio: f64) -> Option<f64> {
        if !effect_size.is_finite() || nobs1 <= 0.0 || ratio <= 0.0 || !(0.0..1.0).contains(&alpha)
        {
            return None;
        }

        let nobs2 = nobs1 * ratio;
        let df = nobs1 + nobs2 - 2.0;
        if df <= 0.0 {
            return None;
        }
        let ncp = effect_size * (nobs1 * nobs2 / (nobs1 + nobs2)).sqrt();

        let crit = StudentsT::new(0.0, 1.0, df).ok()?.inverse_cdf(1.0 - alpha / 2.0);

        let upper = 1.0 - Self::noncentral_t_cdf(crit, df, ncp);
        let lower = Self::noncentral_t_cdf(-crit, df, ncp);
        Some((upper + lower).clamp(0.0, 1.0))
    }

    /// CDF of the noncentral t distribution (Lenth's AS 243 series).
    pub fn noncentral_t_cdf(t: f64, df: f64, ncp: f64) -> f64 {
        let std_normal = match Normal::new(0.0, 1.0) {
            Ok(n) => n,
            Err(_) => return f64::NAN,
        };

        let (tt, del, negdel) = if t >= 0.0 { (t, ncp, false) } else { (-t, -ncp, true) };

        let x2 = tt * tt;
        let rxb_base = df / (x2 + df);
        let x = x2 / (x2 + df);

        let mut tnc = 0.0;
        if x > 0.0 {
            let lambda = del * del;
            let mut p = 0.5 * (-0.5 * lambda).exp();
            if p > 0.0 {
                let mut q = (2.0 / std::f64::consts::PI).sqrt() * p * del;
                let mut s = 0.5 - p;
                if s < 1e-7 {
                    s = -0.5 * (-0.5 * lambda).exp_m1();
                }
                let mut a = 0.5;
                let b = 0.5 * df;
                let rxb = rxb_base.powf(b);
                let albeta = std::f64::consts::PI.sqrt().ln() + ln_gamma(b) - ln_gamma(0.5 + b);
                let mut xodd = beta_reg(a, b, x);
                let mut godd = 2.0 * rxb * (a * x.ln() - albeta).exp();
                let bx = b * x;
                let mut xeven = if bx < f64::EPSILON { bx } else { 1.0 - rxb };
                let mut geven = bx * rxb;
                tnc = p * xodd + q * xeven;

                for it in 1..=NCT_MAX_ITER {
                    a += 1.0;
                    xodd -= godd;
                    xeven -= geven;
                    godd *= x * (a + b - 1.0) / a;
                    geven *= x * (a + b - 0.5) / (a + 0.5);
                    p *= lambda / (2 * it) as f64;
                    q *= lambda / (2 * it + 1) as f64;
                    tnc += p * xodd + q * xeven;
                    s -= p;
                    if s < -1e-10 || (s <= 0.0 && it > 1) {
                        break;
                    }
                    let errbd = 2.0 * s * (xodd - godd);
                    if errbd.abs() < NCT_ERR_MAX {
                        break;
                    }
                }
            }
        }

        tnc += std_normal.cdf(-del);
        let tnc = tnc.min(1.0);
        if negdel {
            1.0 - tnc
        } else {
            tnc
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_ncp_matches_central_t() {
        let central = StudentsT::new(0.0, 1.0, 7.0).unwrap();
        for &t in &[-2.5, -0.3, 0.0, 0.8, 1.9, 3.2] {
            let a = PowerAnalysis::noncentral_t_cdf(t, 7.0, 0.0);
            let b = central.cdf(t);
            assert!((a - b).abs() < 1e-9, "t = {t}: {a} vs {b}");
        }
    }

    #[test]
    fn noncentral_shifts_mass_right() {
        let c0 = PowerAnalysis::noncentral_t_cdf(1.0, 10.0, 0.0);
        let c1 = PowerAnalysis::noncentral_t_cdf(1.0, 10.0, 1.5);
        assert!(c1 < c0);
        // At t = ncp the cdf is close to one half for large df
        let mid = PowerAnalysis::noncentral_t_cdf(2.0, 500.0, 2.0);
        assert!((mid - 0.5).abs() < 0.05, "mid = {mid}");
    }

    #[test]
    fn power_reference_value() {
        // statsmodels TTestIndPower().power(0.5, 20, 0.05) = 0.337939
        let p = PowerAnalysis::ttest_ind_power(0.5, 20.0, 0.05, 1.0).unwrap();
        assert!((p - 0.3379).abs() < 2e-3, "power = {p}");
    }

    #[test]
    fn power_grows_with_effect_and_sample() {
        let small = PowerAnalysis::ttest_ind_power(0.2, 30.0, 0.05, 1.0).unwrap();
        let large = PowerAnalysis::ttest_ind_power(0.8, 30.0, 0.05, 1.0).unwrap();
        let more = PowerAnalysis::ttest_ind_power(0.2, 300.0, 0.05, 1.0).unwrap();
        assert!(small < large);
        assert!(small < more);
        // No effect: power equals alpha
        let null = PowerAnalysis::ttest_ind_power(0.0, 30.0, 0.05, 1.0).unwrap();
        assert!((null - 0.05).abs() < 1e-4, "null = {null}");
    }

    #[test]
    fn power_rejects_bad_input() {
        assert!(PowerAnalysis::ttest_ind_power(f64::INFINITY, 10.0, 0.05, 1.0).is_none());
        assert!(PowerAnalysis::ttest_ind_power(0.5, 1.0, 0.05, 1.0).is_none());
        assert!(PowerAnalysis::ttest_ind_power(0.5, 10.0, 1.5, 1.0).is_none());
    }
}
