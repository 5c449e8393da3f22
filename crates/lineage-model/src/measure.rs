//! Per-type measurement distributions.
//!
//! Each phenotype measurement carries one continuous law per cell type,
//! drawn from a closed set of families. A law answers three questions about
//! an observed value: its density, its CDF and its survival probability.
//! Which of the three enters the likelihood is decided by the
//! [`EstimatePolicy`] together with the node's censoring status.

use std::str::FromStr;

use statrs::distribution::{Beta, Continuous, ContinuousCDF, Gamma, LogNormal, Normal, Weibull};

use crate::error::{Error, Result};

/// Tag set of the supported continuous families.
///
/// Gamma is parameterized by (mean, shape) and Weibull either by
/// (scale, shape) or by (median, shape); both are reparameterized to the
/// conventional forms at construction time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Family {
    Normal,
    LogNormal,
    GammaMeanShape,
    Beta,
    WeibullScaleShape,
    WeibullMedianShape,
}

impl Family {
    fn name(self) -> &'static str {
        match self {
            Family::Normal => "normal",
            Family::LogNormal => "lognormal",
            Family::GammaMeanShape => "gamma",
            Family::Beta => "beta",
            Family::WeibullScaleShape => "weibull",
            Family::WeibullMedianShape => "weibull-median",
        }
    }
}

impl FromStr for Family {
    type Err = Error;

    fn from_str(tag: &str) -> Result<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "normal" => Ok(Family::Normal),
            "lognormal" | "log-normal" => Ok(Family::LogNormal),
            "gamma" => Ok(Family::GammaMeanShape),
            "beta" => Ok(Family::Beta),
            "weibull" => Ok(Family::WeibullScaleShape),
            "weibull-median" => Ok(Family::WeibullMedianShape),
            _ => Err(Error::UnknownFamily(tag.to_owned())),
        }
    }
}

/// Rule converting a possibly-censored measurement summary into a density,
/// survival or CDF evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EstimatePolicy {
    /// Always the density; a mean summary is unaffected by truncation.
    Mean,
    /// Density when fully observed; survival when the true maximum may
    /// exceed the observed one.
    Max,
    /// Density when fully observed; CDF when the true minimum may fall
    /// below the observed one.
    Min,
}

impl FromStr for EstimatePolicy {
    type Err = Error;

    fn from_str(tag: &str) -> Result<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "mean" => Ok(EstimatePolicy::Mean),
            "max" => Ok(EstimatePolicy::Max),
            "min" => Ok(EstimatePolicy::Min),
            _ => Err(Error::UnknownPolicy(tag.to_owned())),
        }
    }
}

/// One concrete distribution with support guards.
///
/// Evaluation outside the family's support returns 0 (density), 0 or 1
/// (CDF) instead of failing; parameter validation happens once, here, so
/// evaluation never errors.
#[derive(Clone, Debug)]
pub struct Measure {
    dist: Dist,
}

#[derive(Clone, Debug)]
enum Dist {
    Normal(Normal),
    LogNormal(LogNormal),
    Gamma(Gamma),
    Beta(Beta),
    Weibull(Weibull),
}

fn ensure_positive(family: Family, parameter: &'static str, value: f64) -> Result<()> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(Error::NonPositiveParameter {
            family: family.name(),
            parameter,
            value,
        })
    }
}

impl Measure {
    /// Build a distribution from a family tag and its two parameters.
    ///
    /// Parameter meaning per family: Normal(mean, sigma),
    /// LogNormal(location, scale), Gamma(mean, shape), Beta(alpha, beta),
    /// Weibull(scale, shape) and Weibull(median, shape).
    pub fn new(family: Family, p1: f64, p2: f64) -> Result<Self> {
        let invalid = || Error::InvalidParameters {
            family: family.name(),
            p1,
            p2,
        };

        let dist = match family {
            Family::Normal => {
                ensure_positive(family, "sigma", p2)?;
                Dist::Normal(Normal::new(p1, p2).map_err(|_| invalid())?)
            }
            Family::LogNormal => {
                ensure_positive(family, "scale", p2)?;
                Dist::LogNormal(LogNormal::new(p1, p2).map_err(|_| invalid())?)
            }
            Family::GammaMeanShape => {
                ensure_positive(family, "mean", p1)?;
                ensure_positive(family, "shape", p2)?;
                // statrs parameterizes Gamma by (shape, rate); mean = shape / rate.
                Dist::Gamma(Gamma::new(p2, p2 / p1).map_err(|_| invalid())?)
            }
            Family::Beta => {
                ensure_positive(family, "alpha", p1)?;
                ensure_positive(family, "beta", p2)?;
                Dist::Beta(Beta::new(p1, p2).map_err(|_| invalid())?)
            }
            Family::WeibullScaleShape => {
                ensure_positive(family, "scale", p1)?;
                ensure_positive(family, "shape", p2)?;
                Dist::Weibull(Weibull::new(p2, p1).map_err(|_| invalid())?)
            }
            Family::WeibullMedianShape => {
                ensure_positive(family, "median", p1)?;
                ensure_positive(family, "shape", p2)?;
                // The median of Weibull(scale, shape) is scale * ln(2)^(1/shape).
                let scale = p1 / std::f64::consts::LN_2.powf(1.0 / p2);
                Dist::Weibull(Weibull::new(p2, scale).map_err(|_| invalid())?)
            }
        };

        Ok(Self { dist })
    }

    /// Probability density at `x`; 0 outside the support.
    pub fn density(&self, x: f64) -> f64 {
        match &self.dist {
            Dist::Normal(d) => d.pdf(x),
            Dist::LogNormal(d) => {
                if x > 0.0 {
                    d.pdf(x)
                } else {
                    0.0
                }
            }
            Dist::Gamma(d) => {
                if x >= 0.0 {
                    d.pdf(x)
                } else {
                    0.0
                }
            }
            Dist::Beta(d) => {
                if (0.0..=1.0).contains(&x) {
                    d.pdf(x)
                } else {
                    0.0
                }
            }
            Dist::Weibull(d) => {
                if x >= 0.0 {
                    d.pdf(x)
                } else {
                    0.0
                }
            }
        }
    }

    /// Cumulative probability of `x`; clamps to 0 and 1 outside the support.
    pub fn cdf(&self, x: f64) -> f64 {
        match &self.dist {
            Dist::Normal(d) => d.cdf(x),
            Dist::LogNormal(d) => {
                if x > 0.0 {
                    d.cdf(x)
                } else {
                    0.0
                }
            }
            Dist::Gamma(d) => {
                if x >= 0.0 {
                    d.cdf(x)
                } else {
                    0.0
                }
            }
            Dist::Beta(d) => {
                if x < 0.0 {
                    0.0
                } else if x > 1.0 {
                    1.0
                } else {
                    d.cdf(x)
                }
            }
            Dist::Weibull(d) => {
                if x >= 0.0 {
                    d.cdf(x)
                } else {
                    0.0
                }
            }
        }
    }

    /// Right-tail probability of `x`.
    pub fn survival(&self, x: f64) -> f64 {
        1.0 - self.cdf(x)
    }
}

/// The law of one measurement under one cell type: a distribution plus an
/// optional point mass at zero.
#[derive(Clone, Debug)]
pub struct TypeLaw {
    measure: Measure,
    zero_inflation: Option<f64>,
}

impl TypeLaw {
    pub fn new(family: Family, p1: f64, p2: f64) -> Result<Self> {
        Ok(Self {
            measure: Measure::new(family, p1, p2)?,
            zero_inflation: None,
        })
    }

    /// Mix in a point mass at exactly zero with weight `weight`.
    pub fn zero_inflated(family: Family, p1: f64, p2: f64, weight: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&weight) {
            return Err(Error::ZeroInflationWeight(weight));
        }
        Ok(Self {
            measure: Measure::new(family, p1, p2)?,
            zero_inflation: Some(weight),
        })
    }

    pub fn measure(&self) -> &Measure {
        &self.measure
    }

    /// Likelihood factor for an observed value.
    ///
    /// `censored` marks right-truncated summaries: incompletely observed
    /// nodes and nodes whose fate was never observed. A zero-inflated law
    /// returns its weight exactly at 0 and scales everything else by the
    /// complementary weight.
    pub fn probability(&self, x: f64, censored: bool, policy: EstimatePolicy) -> f64 {
        match self.zero_inflation {
            Some(weight) if x == 0.0 => weight,
            Some(weight) => (1.0 - weight) * self.evaluate(x, censored, policy),
            None => self.evaluate(x, censored, policy),
        }
    }

    fn evaluate(&self, x: f64, censored: bool, policy: EstimatePolicy) -> f64 {
        match policy {
            EstimatePolicy::Mean => self.measure.density(x),
            EstimatePolicy::Max if censored => self.measure.survival(x),
            EstimatePolicy::Min if censored => self.measure.cdf(x),
            EstimatePolicy::Max | EstimatePolicy::Min => self.measure.density(x),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    const TOL: f64 = 1e-12;

    #[test]
    fn family_tags_round_trip() {
        for tag in ["normal", "lognormal", "gamma", "beta", "weibull", "weibull-median"] {
            assert_eq!(tag.parse::<Family>().unwrap().name(), tag);
        }
        assert!(matches!(
            "cauchy".parse::<Family>(),
            Err(Error::UnknownFamily(_))
        ));
        assert!(matches!(
            "median".parse::<EstimatePolicy>(),
            Err(Error::UnknownPolicy(_))
        ));
    }

    #[test]
    fn rejects_non_positive_parameters() {
        assert!(Measure::new(Family::Normal, 0.0, 0.0).is_err());
        assert!(Measure::new(Family::GammaMeanShape, -1.0, 2.0).is_err());
        assert!(Measure::new(Family::Beta, 1.0, 0.0).is_err());
        assert!(Measure::new(Family::WeibullMedianShape, 3.0, -0.5).is_err());
    }

    #[test]
    fn normal_density_value() {
        let m = Measure::new(Family::Normal, 0.5, 1.0).unwrap();
        // exp(-0.125) / sqrt(2 pi)
        assert!((m.density(1.0) - 0.352_065_326_764_299_5).abs() < TOL);
    }

    #[test]
    fn support_guards() {
        let gamma = Measure::new(Family::GammaMeanShape, 2.0, 3.0).unwrap();
        assert_eq!(gamma.density(-1.0), 0.0);
        assert_eq!(gamma.cdf(-1.0), 0.0);
        assert_eq!(gamma.survival(-1.0), 1.0);

        let beta = Measure::new(Family::Beta, 2.0, 2.0).unwrap();
        assert_eq!(beta.density(1.5), 0.0);
        assert_eq!(beta.cdf(1.5), 1.0);
        assert_eq!(beta.cdf(-0.5), 0.0);

        let lognormal = Measure::new(Family::LogNormal, 0.0, 1.0).unwrap();
        assert_eq!(lognormal.density(0.0), 0.0);
        assert_eq!(lognormal.density(-2.0), 0.0);
    }

    #[test]
    fn weibull_median_reparameterization() {
        for shape in [0.7, 1.0, 2.5] {
            let m = Measure::new(Family::WeibullMedianShape, 4.2, shape).unwrap();
            assert!((m.cdf(4.2) - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn gamma_mean_reparameterization() {
        // Gamma(mean, shape) with shape = 1 is Exponential(rate = 1 / mean).
        let m = Measure::new(Family::GammaMeanShape, 2.0, 1.0).unwrap();
        let rate: f64 = 0.5;
        assert!((m.density(1.0) - rate * (-rate).exp()).abs() < TOL);
        assert!((m.cdf(1.0) - (1.0 - (-rate).exp())).abs() < TOL);
    }

    #[test]
    fn zero_inflation_law() {
        let law = TypeLaw::zero_inflated(Family::Normal, 0.0, 1.0, 0.3).unwrap();
        let plain = TypeLaw::new(Family::Normal, 0.0, 1.0).unwrap();

        assert_eq!(law.probability(0.0, false, EstimatePolicy::Mean), 0.3);
        let x = 1.25;
        let expected = 0.7 * plain.probability(x, false, EstimatePolicy::Mean);
        assert!((law.probability(x, false, EstimatePolicy::Mean) - expected).abs() < TOL);

        assert!(TypeLaw::zero_inflated(Family::Normal, 0.0, 1.0, 1.5).is_err());
    }

    #[test]
    fn policy_selects_tail() {
        let law = TypeLaw::new(Family::Normal, 0.0, 1.0).unwrap();
        let x = 0.4;

        let density = law.measure().density(x);
        let cdf = law.measure().cdf(x);
        let survival = law.measure().survival(x);

        assert_eq!(law.probability(x, false, EstimatePolicy::Max), density);
        assert_eq!(law.probability(x, false, EstimatePolicy::Min), density);
        assert_eq!(law.probability(x, true, EstimatePolicy::Mean), density);
        assert_eq!(law.probability(x, true, EstimatePolicy::Max), survival);
        assert_eq!(law.probability(x, true, EstimatePolicy::Min), cdf);
    }
}
