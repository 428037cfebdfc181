//! Binned chi-square test statistic over smeared model densities.

use crate::data_rep::DataRepresentation;
use crate::density::BinnedDensity;
use crate::systematic::SystematicSet;
use ns_core::traits::check_parameter_count;
use ns_core::{Error, Fittable, Result};

/// Pearson chi-square between binned data and a sum of normalised model densities.
///
/// The model is `Σ_k norm_k · R · pdf_k`, where `R` is the combined response of the
/// systematic set. Parameters are the normalisations followed by the systematic
/// parameters. Every evaluation rebuilds the systematics from the current parameters.
#[derive(Debug, Clone)]
pub struct ChiSquare {
    pdfs: Vec<BinnedDensity>,
    normalisations: Vec<f64>,
    systematics: SystematicSet,
    events: Vec<Vec<f64>>,
    event_rep: DataRepresentation,
    data_pdf: Option<BinnedDensity>,
}

impl ChiSquare {
    /// Statistic over model densities sharing one binning. Normalisations start at 1.
    pub fn new(pdfs: Vec<BinnedDensity>, mut systematics: SystematicSet) -> Result<Self> {
        let Some(first) = pdfs.first() else {
            return Err(Error::Validation("ChiSquare requires at least one model density".into()));
        };
        if let Some(other) = pdfs.iter().find(|p| p.axes() != first.axes()) {
            return Err(Error::Dimension(format!(
                "ChiSquare model densities must share a binning: {} bins vs {} bins",
                first.n_bins(),
                other.n_bins()
            )));
        }
        systematics.configure(first.axes(), first.data_rep());
        let normalisations = vec![1.0; pdfs.len()];
        Ok(Self {
            pdfs,
            normalisations,
            systematics,
            events: Vec::new(),
            event_rep: DataRepresentation::default(),
            data_pdf: None,
        })
    }

    /// Raw data records, each labelled by `event_rep`.
    pub fn set_data(&mut self, events: Vec<Vec<f64>>, event_rep: DataRepresentation) {
        self.events = events;
        self.event_rep = event_rep;
        self.data_pdf = None;
    }

    /// Per-density normalisations.
    pub fn set_normalisations(&mut self, normalisations: &[f64]) -> Result<()> {
        check_parameter_count("ChiSquare normalisations", self.pdfs.len(), normalisations.len())?;
        self.normalisations.copy_from_slice(normalisations);
        Ok(())
    }

    /// The systematic chain.
    pub fn systematics(&self) -> &SystematicSet {
        &self.systematics
    }

    /// Data binned like the model (filled once, on first evaluation).
    pub fn data_pdf(&self) -> Option<&BinnedDensity> {
        self.data_pdf.as_ref()
    }

    fn bin_data(&mut self) -> Result<()> {
        let mut data = self.pdfs[0].clone();
        data.empty();
        for event in &self.events {
            data.fill_event(event, &self.event_rep, 1.0)?;
        }
        log::debug!("ChiSquare: binned {} events ({} in range)", self.events.len(), data.integral());
        self.data_pdf = Some(data);
        Ok(())
    }

    /// Expected content per bin for the current parameters.
    pub fn expected(&mut self) -> Result<Vec<f64>> {
        self.systematics.construct_all()?;
        let mut expected = vec![0.0; self.pdfs[0].n_bins()];
        for (pdf, norm) in self.pdfs.iter().zip(&self.normalisations) {
            let smeared = self.systematics.apply(pdf)?;
            for (e, c) in expected.iter_mut().zip(smeared.bin_contents()) {
                *e += norm * c;
            }
        }
        Ok(expected)
    }

    /// `Σ (data_i − expected_i)² / expected_i` over bins with positive expectation.
    pub fn evaluate(&mut self) -> Result<f64> {
        if self.data_pdf.is_none() {
            self.bin_data()?;
        }
        let expected = self.expected()?;
        let data = self
            .data_pdf
            .as_ref()
            .ok_or_else(|| Error::Logic("ChiSquare data were not binned".into()))?;

        let mut chi_square = 0.0;
        let mut skipped = 0usize;
        for (d, e) in data.bin_contents().iter().zip(&expected) {
            if *e > 0.0 {
                let deviation = d - e;
                chi_square += deviation * deviation / e;
            } else {
                skipped += 1;
            }
        }
        if skipped > 0 {
            log::debug!("ChiSquare: skipped {skipped} bins with non-positive expectation");
        }
        Ok(chi_square)
    }
}

impl Fittable for ChiSquare {
    fn make_fittable(&mut self) {
        self.systematics.make_fittable();
    }

    fn parameter_names(&self) -> Vec<String> {
        (0..self.pdfs.len())
            .map(|i| format!("norm_{i}"))
            .chain(self.systematics.parameter_names())
            .collect()
    }

    fn parameters(&self) -> Vec<f64> {
        self.normalisations.iter().copied().chain(self.systematics.parameters()).collect()
    }

    fn parameter_count(&self) -> usize {
        self.pdfs.len() + self.systematics.parameter_count()
    }

    /// Normalisations are written only once the systematic set accepted its parameters.
    fn set_parameters(&mut self, params: &[f64]) -> Result<()> {
        check_parameter_count("ChiSquare", self.parameter_count(), params.len())?;
        let (norms, sys) = params.split_at(self.pdfs.len());
        self.systematics.set_parameters(sys)?;
        self.normalisations.copy_from_slice(norms);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::{AxisCollection, BinAxis};
    use crate::convolution::Convolution;
    use approx::assert_relative_eq;
    use ns_prob::GaussianKernel;

    fn axes() -> AxisCollection {
        AxisCollection::from_axes([BinAxis::uniform("energy", 0.0, 4.0, 4).unwrap()]).unwrap()
    }

    fn events() -> (Vec<Vec<f64>>, DataRepresentation) {
        let rep = DataRepresentation::new(["time", "energy"]).unwrap();
        let evs = vec![
            vec![0.0, 0.5],
            vec![1.0, 1.5],
            vec![2.0, 1.2],
            vec![3.0, 2.5],
            vec![4.0, 3.9],
            vec![5.0, 9.0],
        ];
        (evs, rep)
    }

    #[test]
    fn test_exact_model_gives_zero() {
        let pdf = BinnedDensity::with_contents(axes(), vec![1.0, 2.0, 1.0, 1.0]).unwrap();
        let mut chi = ChiSquare::new(vec![pdf], SystematicSet::new()).unwrap();
        let (evs, rep) = events();
        chi.set_data(evs, rep);
        assert_relative_eq!(chi.evaluate().unwrap(), 0.0, epsilon = 1e-12);
        assert_eq!(chi.data_pdf().unwrap().bin_contents(), &[1.0, 2.0, 1.0, 1.0]);
    }

    #[test]
    fn test_normalisation_and_parameters() {
        let pdf = BinnedDensity::with_contents(axes(), vec![0.25; 4]).unwrap();
        let mut set = SystematicSet::new();
        let mut conv = Convolution::new();
        conv.set_function(&GaussianKernel::centred(1, 0.01).unwrap());
        set.push(conv);
        let mut chi = ChiSquare::new(vec![pdf], set).unwrap();
        let (evs, rep) = events();
        chi.set_data(evs, rep);

        assert_eq!(chi.parameter_names(), vec!["norm_0", "Convolution : mean_0", "Convolution : sigma_0"]);
        chi.set_parameters(&[4.0, 0.0, 0.01]).unwrap();
        // Expected 1 per bin, data (1, 2, 1, 1).
        assert_relative_eq!(chi.evaluate().unwrap(), 1.0, epsilon = 1e-9);

        let err = chi.set_parameters(&[1.0, 0.0, 0.1, 3.0]).unwrap_err();
        assert!(matches!(err, Error::ParameterCount(_)));
        let err = chi.set_parameters(&[1.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(chi.parameters(), vec![4.0, 0.0, 0.01]);
    }

    #[test]
    fn test_models_must_share_binning() {
        let a = BinnedDensity::new(axes());
        let b = BinnedDensity::new(
            AxisCollection::from_axes([BinAxis::uniform("energy", 0.0, 4.0, 2).unwrap()]).unwrap(),
        );
        assert!(matches!(ChiSquare::new(vec![a, b], SystematicSet::new()), Err(Error::Dimension(_))));
        assert!(ChiSquare::new(vec![], SystematicSet::new()).is_err());
    }
}
