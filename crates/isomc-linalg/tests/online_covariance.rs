use isomc_linalg::{describe, RunningMoments};
use nalgebra::DMatrix;
use proptest::prelude::*;

fn two_pass_covariance(samples: &[Vec<f64>]) -> DMatrix<f64> {
    let n = samples.len();
    let d = samples[0].len();
    let mut mean = vec![0.0; d];
    for sample in samples {
        for (m, v) in mean.iter_mut().zip(sample) {
            *m += v / n as f64;
        }
    }
    let mut covariance = DMatrix::zeros(d, d);
    for sample in samples {
        for i in 0..d {
            for j in 0..d {
                covariance[(i, j)] += (sample[i] - mean[i]) * (sample[j] - mean[j]);
            }
        }
    }
    covariance / (n - 1) as f64
}

proptest! {
    #[test]
    fn online_covariance_matches_two_pass(
        samples in prop::collection::vec(prop::collection::vec(-1.0e3f64..1.0e3, 3), 2..40)
    ) {
        let mut moments = RunningMoments::new(3);
        for sample in &samples {
            moments.update(sample).unwrap();
        }
        let expected = two_pass_covariance(&samples);
        let scale = expected.amax().max(1.0);
        prop_assert!((moments.covariance() - &expected).amax() / scale < 1e-9);
        prop_assert_eq!(moments.count(), samples.len());
    }

    #[test]
    fn running_variance_agrees_with_describe(
        values in prop::collection::vec(-50.0f64..50.0, 2..60)
    ) {
        let mut moments = RunningMoments::new(1);
        for value in &values {
            moments.update(&[*value]).unwrap();
        }
        let summary = describe(&values).unwrap();
        prop_assert!((moments.mean()[0] - summary.mean).abs() < 1e-9);
        prop_assert!((moments.variance(0).sqrt() - summary.std_dev).abs() < 1e-7);
    }
}
