//! Core traits for hetstat
//!
//! The second-stage estimators only need predictions from some fitted
//! regression model. These traits keep `hs-inference` independent of any
//! particular learner: anything that can be fit on (X, y) and then predict
//! on new rows can serve as an ML proxy.

use crate::Result;
use crate::types::Features;

/// A regression learner that can be trained on (X, y).
///
/// `fit` takes `&self` and returns a fresh [`Predictor`], so one learner can
/// be shared across parallel sample splits.
pub trait Learner: Send + Sync {
    /// Learner name (e.g., "linear", "knn").
    fn name(&self) -> &str;

    /// Fit on rows of `x` with targets `y`.
    fn fit(&self, x: &Features, y: &[f64]) -> Result<Box<dyn Predictor>>;
}

/// A fitted model.
pub trait Predictor: Send + Sync {
    /// Predict one value per row of `x`.
    fn predict(&self, x: &Features) -> Result<Vec<f64>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConstLearner;
    struct ConstPredictor(f64);

    impl Learner for ConstLearner {
        fn name(&self) -> &str {
            "const"
        }

        fn fit(&self, _x: &Features, y: &[f64]) -> Result<Box<dyn Predictor>> {
            Ok(Box::new(ConstPredictor(y.first().copied().unwrap_or(0.0))))
        }
    }

    impl Predictor for ConstPredictor {
        fn predict(&self, x: &Features) -> Result<Vec<f64>> {
            Ok(vec![self.0; x.n_rows()])
        }
    }

    #[test]
    fn test_learner_trait() {
        let learner = ConstLearner;
        assert_eq!(learner.name(), "const");

        let x = Features::from_rows(vec![vec![0.0], vec![1.0], vec![2.0]]).unwrap();
        let fitted = learner.fit(&x, &[7.0, 8.0, 9.0]).unwrap();
        assert_eq!(fitted.predict(&x).unwrap(), vec![7.0; 3]);
    }

    #[test]
    fn test_learner_is_object_safe() {
        let boxed: Box<dyn Learner> = Box::new(ConstLearner);
        assert_eq!(boxed.name(), "const");
    }
}
