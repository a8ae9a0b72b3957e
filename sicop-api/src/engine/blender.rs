//! Model price bounding and neighbour blending

use sicop_common::{Error, Result};

/// Clamp-then-blend policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceBlender {
    min: f64,
    max: f64,
    model_weight: f64,
}

/// Result of one blend
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendedPrice {
    /// Model output clamped to the dataset price range
    pub model_price: f64,
    /// Mean price of the neighbours, if there were any
    pub neighbor_mean: Option<f64>,
    pub adjusted: f64,
}

impl PriceBlender {
    /// `min..=max` is the observed dataset price range; neighbours get `1 - model_weight`
    pub fn new(min: f64, max: f64, model_weight: f64) -> Result<Self> {
        if !(min.is_finite() && max.is_finite()) || min > max {
            return Err(Error::Dataset(format!(
                "Invalid price range [{}, {}]",
                min, max
            )));
        }
        if !(0.0..=1.0).contains(&model_weight) {
            return Err(Error::Config(format!(
                "model weight must be within [0, 1] (got {})",
                model_weight
            )));
        }
        Ok(Self {
            min,
            max,
            model_weight,
        })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn model_weight(&self) -> f64 {
        self.model_weight
    }

    /// Bound a model prediction to the dataset price range
    pub fn clamp(&self, raw: f64) -> f64 {
        raw.clamp(self.min, self.max)
    }

    /// Clamp the model price, then mix it with the mean neighbour price
    ///
    /// Without neighbours the adjusted price is the clamped model price.
    pub fn blend(&self, raw_model_price: f64, neighbor_prices: &[f64]) -> BlendedPrice {
        let model_price = self.clamp(raw_model_price);
        let neighbor_mean = (!neighbor_prices.is_empty())
            .then(|| neighbor_prices.iter().sum::<f64>() / neighbor_prices.len() as f64);

        let adjusted = match neighbor_mean {
            Some(mean) => self.model_weight * model_price + (1.0 - self.model_weight) * mean,
            None => model_price,
        };

        BlendedPrice {
            model_price,
            neighbor_mean,
            adjusted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn blender() -> PriceBlender {
        PriceBlender::new(1000.0, 20000.0, 0.3).unwrap()
    }

    #[test]
    fn test_clamp_bounds() {
        let b = blender();
        assert_eq!(b.clamp(500.0), 1000.0);
        assert_eq!(b.clamp(25000.0), 20000.0);
        assert_eq!(b.clamp(7500.0), 7500.0);
    }

    #[test]
    fn test_blend_law() {
        let b = blender();
        let result = b.blend(10000.0, &[4000.0, 6000.0]);

        assert_eq!(result.model_price, 10000.0);
        assert_eq!(result.neighbor_mean, Some(5000.0));
        assert!((result.adjusted - (0.3 * 10000.0 + 0.7 * 5000.0)).abs() < 1e-9);
    }

    #[test]
    fn test_blend_uses_clamped_price() {
        let b = blender();
        let result = b.blend(1e9, &[10000.0]);
        assert!((result.adjusted - (0.3 * 20000.0 + 0.7 * 10000.0)).abs() < 1e-9);
    }

    #[test]
    fn test_no_neighbors() {
        let b = blender();
        let result = b.blend(-50.0, &[]);
        assert_eq!(result.neighbor_mean, None);
        assert_eq!(result.adjusted, 1000.0);
    }

    #[test]
    fn test_invalid_construction() {
        assert!(PriceBlender::new(10.0, 5.0, 0.3).is_err());
        assert!(PriceBlender::new(1.0, 5.0, 1.3).is_err());
        assert!(PriceBlender::new(f64::NAN, 5.0, 0.3).is_err());
    }

    proptest! {
        #[test]
        fn clamped_price_stays_in_range(raw in -1e12f64..1e12f64) {
            let b = blender();
            let price = b.clamp(raw);
            prop_assert!((1000.0..=20000.0).contains(&price));
        }

        #[test]
        fn adjusted_price_between_inputs(
            raw in -1e6f64..1e6f64,
            prices in proptest::collection::vec(1000.0f64..20000.0, 1..8),
        ) {
            let b = blender();
            let result = b.blend(raw, &prices);
            let mean = result.neighbor_mean.unwrap();
            let lo = result.model_price.min(mean) - 1e-6;
            let hi = result.model_price.max(mean) + 1e-6;
            prop_assert!(result.adjusted >= lo && result.adjusted <= hi);
        }
    }
}
