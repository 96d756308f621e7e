//! Derived-quantity corrections built from the map operators

use tracing::debug;

use super::{MapMeta, MapValue};
use crate::error::MapError;

/// Datamodel property that supports the instrumental broadening correction
pub const STELLAR_SIGMA: &str = "stellar_sigma";

/// Release whose datamodel lacks the instrumental dispersion map
const UNCORRECTABLE_RELEASE: &str = "MPL-4";

impl MapValue {
    /// Correct stellar velocity dispersion for instrumental broadening
    ///
    /// Computes `(sigma^2 - sigmacorr^2)^0.5` through the map operators, so the
    /// uncertainty, mask and unit propagate like any other expression. Pixels where the
    /// correction exceeds the measurement come out as NaN.
    ///
    /// # Arguments
    ///
    /// * `sigmacorr` - Instrumental dispersion map (`stellar_sigmacorr`) of the same galaxy
    ///
    /// # Errors
    ///
    /// - `MapError::CorrectionUnsupported` if this map is not `stellar_sigma`
    /// - `MapError::CorrectionUnsupported` for release MPL-4
    /// - `MapError::ShapeMismatch` if the two maps differ in shape
    pub fn inst_sigma_correction(&self, sigmacorr: &MapValue) -> Result<MapValue, MapError> {
        let meta = match &self.meta {
            Some(meta) if meta.property_name == STELLAR_SIGMA => meta,
            other => {
                let name = other
                    .as_ref()
                    .map_or_else(|| "unnamed map".to_string(), MapMeta::full_name);
                return Err(MapError::CorrectionUnsupported(format!(
                    "Cannot correct {name} for instrumental broadening."
                )));
            }
        };

        if meta.release == UNCORRECTABLE_RELEASE {
            return Err(MapError::CorrectionUnsupported(format!(
                "Instrumental broadening correction not implemented for {UNCORRECTABLE_RELEASE}."
            )));
        }

        debug!("Applying instrumental broadening correction ({})", meta.release);
        let corrected = self.powf(2.0).checked_sub(&sigmacorr.powf(2.0))?.powf(0.5);
        Ok(corrected.with_meta(meta.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::Unit;
    use approx::assert_relative_eq;

    fn sigma_maps(release: &str) -> (MapValue, MapValue) {
        let sigma = MapValue::from_rows(
            &[vec![50.0, 30.0]],
            Some(&[vec![0.04, 0.01]]),
            &[vec![0, 0]],
            Some(Unit::km_per_s()),
        )
        .unwrap()
        .with_meta(MapMeta::new(STELLAR_SIGMA, None, release));
        let corr = MapValue::from_rows(
            &[vec![40.0, 40.0]],
            Some(&[vec![1.0, 1.0]]),
            &[vec![0, 1]],
            Some(Unit::km_per_s()),
        )
        .unwrap()
        .with_meta(MapMeta::new("stellar_sigmacorr", None, release));
        (sigma, corr)
    }

    #[test]
    fn test_correction_matches_operator_expression() {
        let (sigma, corr) = sigma_maps("MPL-5");
        let actual = sigma.inst_sigma_correction(&corr).unwrap();
        let expected = (&sigma.powf(2.0) - &corr.powf(2.0)).unwrap().powf(0.5);

        assert_relative_eq!(actual.value()[(0, 0)], 30.0, max_relative = 1e-12);
        assert!(actual.value()[(0, 1)].is_nan());
        assert_relative_eq!(
            actual.ivar().unwrap()[(0, 0)],
            expected.ivar().unwrap()[(0, 0)],
            max_relative = 1e-12
        );
        assert_eq!(actual.mask(), expected.mask());
        assert_eq!(actual.unit(), Some(&Unit::km_per_s()));
        assert_eq!(actual.meta().unwrap().property_name, STELLAR_SIGMA);
    }

    #[test]
    fn test_correction_rejected_for_mpl4() {
        let (sigma, corr) = sigma_maps("MPL-4");
        let err = sigma.inst_sigma_correction(&corr).unwrap_err();
        assert!(err
            .to_string()
            .contains("Instrumental broadening correction not implemented for MPL-4."));
    }

    #[test]
    fn test_correction_rejected_for_other_properties() {
        let (_, corr) = sigma_maps("MPL-5");
        let ha = MapValue::from_rows(&[vec![1.0, 2.0]], None, &[vec![0, 0]], None)
            .unwrap()
            .with_meta(MapMeta::new("emline_gflux", Some("ha_6564"), "MPL-5"));
        let err = ha.inst_sigma_correction(&corr).unwrap_err();
        assert!(err
            .to_string()
            .contains("Cannot correct emline_gflux_ha_6564 for instrumental broadening."));

        let unnamed = MapValue::from_rows(&[vec![1.0, 2.0]], None, &[vec![0, 0]], None).unwrap();
        assert!(matches!(
            unnamed.inst_sigma_correction(&corr),
            Err(MapError::CorrectionUnsupported(_))
        ));
    }
}
