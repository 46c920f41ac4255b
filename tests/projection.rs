//! End-to-end tests for the projection pipeline on synthetic ensembles.
//!
//! These exercise the composed stages: skill clipping, distribution fitting,
//! quantile sampling, thermal-expansion projection, and the correlated
//! combination, including the reproducibility and chunk-invariance
//! guarantees the downstream framework relies on.

use approx::assert_relative_eq;
use ndarray::{Array2, Array3};
use sterodynamics::ensemble::{clip_by_skill, fit_expansion_distribution, EnsembleMember};
use sterodynamics::ocean_dynamics::{Location, OceanDynamicsEnsemble};
use sterodynamics::pipeline::{run_projection, ProjectionInputs};
use sterodynamics::thermal::OhcSamples;
use sterodynamics::{ProjectionConfig, SterodynError};

fn member_table(values: &[(&str, f64)]) -> Vec<EnsembleMember> {
    values
        .iter()
        .map(|(model, value)| EnsembleMember::new(*model, *value))
        .collect()
}

fn synthetic_inputs(nsamps: usize) -> ProjectionInputs {
    let rmses = member_table(&[("m1", 1.0), ("m2", 2.0), ("m3", 3.0)]);
    let expcoefs = member_table(&[("m1", 0.1), ("m2", 0.2), ("m3", 0.3)]);

    // Heat-content trajectories covering the base year and the target grid.
    let ohc_years = vec![2000, 2010, 2020, 2030, 2040];
    let ohc = OhcSamples::new(
        ohc_years.clone(),
        Array2::from_shape_fn((nsamps, ohc_years.len()), |(i, j)| {
            10.0 * j as f64 + 0.05 * i as f64
        }),
    )
    .unwrap();

    // Four-model ocean-dynamics ensemble over two sites, with per-model
    // spread and a component tracking zostoga so the correlation is real.
    let od_years = vec![2010, 2020, 2030, 2040];
    let models = vec![
        "gcm-a".to_string(),
        "gcm-b".to_string(),
        "gcm-c".to_string(),
        "gcm-d".to_string(),
    ];
    let locations = vec![
        Location {
            id: 12,
            lat: 40.7,
            lon: -74.0,
        },
        Location {
            id: 161,
            lat: -33.9,
            lon: 151.2,
        },
    ];
    let zostoga = Array2::from_shape_fn((od_years.len(), models.len()), |(y, m)| {
        2.0 * y as f64 + 0.5 * m as f64
    });
    let zos = Array3::from_shape_fn(
        (od_years.len(), models.len(), locations.len()),
        |(y, m, l)| 0.8 * zostoga[[y, m]] + (l as f64 + 1.0) * (m as f64 - 1.5),
    );

    ProjectionInputs {
        rmses,
        expcoefs,
        ohc,
        ocean_dynamics: OceanDynamicsEnsemble::new(od_years, models, locations, zos, zostoga)
            .unwrap(),
    }
}

fn small_config(nsamps: usize) -> ProjectionConfig {
    ProjectionConfig {
        pb_clip: 0.67,
        pyear_start: 2020,
        pyear_end: 2040,
        pyear_step: 10,
        nsamps,
        seed: 1234,
        chunksize: 50,
        ..Default::default()
    }
}

#[test]
fn three_model_round_trip_through_the_fitter() {
    // RMSEs [1, 2, 3] with clip probability 0.67 retain the two best-ranked
    // models, so the fitted distribution uses {0.1, 0.2} only.
    let rmses = member_table(&[("m1", 1.0), ("m2", 2.0), ("m3", 3.0)]);
    let expcoefs = member_table(&[("m1", 0.1), ("m2", 0.2), ("m3", 0.3)]);

    let clipped = clip_by_skill(&rmses, 0.67).unwrap();
    assert_eq!(clipped.models, vec!["m1", "m2"]);

    let fit = fit_expansion_distribution(&expcoefs, &clipped).unwrap();
    assert_relative_eq!(fit.mean, 0.15, epsilon = 1e-12);
    assert_relative_eq!(fit.std, 0.05, epsilon = 1e-12);
}

#[test]
fn pipeline_produces_the_full_sample_grid() {
    let outputs = run_projection(&small_config(24), &synthetic_inputs(24)).unwrap();

    assert_eq!(outputs.joint.samples.dim(), (24, 3, 2));
    assert_eq!(outputs.joint.years, vec![2020, 2030, 2040]);
    assert_eq!(outputs.thermal_expansion.samples.dim(), (24, 3));
    assert_eq!(outputs.joint.attrs.units, "mm");
    assert_eq!(outputs.joint.attrs.scenario, "ssp585");

    // Location metadata travels with the samples.
    assert_eq!(outputs.joint.locations[0].id, 12);
    assert_relative_eq!(outputs.joint.locations[1].lat, -33.9);
}

#[test]
fn identical_seeds_reproduce_bit_identical_projections() {
    let inputs = synthetic_inputs(24);
    let a = run_projection(&small_config(24), &inputs).unwrap();
    let b = run_projection(&small_config(24), &inputs).unwrap();

    assert_eq!(a.joint.samples, b.joint.samples);
    assert_eq!(a.thermal_expansion.samples, b.thermal_expansion.samples);
}

#[test]
fn different_seeds_shuffle_the_samples() {
    let inputs = synthetic_inputs(24);
    let a = run_projection(&small_config(24), &inputs).unwrap();

    let mut reseeded = small_config(24);
    reseeded.seed = 9999;
    let b = run_projection(&reseeded, &inputs).unwrap();

    assert_ne!(a.joint.samples, b.joint.samples);
}

#[test]
fn chunk_size_is_invisible_in_the_output() {
    let inputs = synthetic_inputs(24);

    let mut config = small_config(24);
    config.chunksize = 1;
    let by_one = run_projection(&config, &inputs).unwrap();

    config.chunksize = 2;
    let by_two = run_projection(&config, &inputs).unwrap();

    config.chunksize = 1000;
    let all_at_once = run_projection(&config, &inputs).unwrap();

    assert_eq!(by_one.joint.samples, by_two.joint.samples);
    assert_eq!(by_one.joint.samples, all_at_once.joint.samples);
}

#[test]
fn degenerate_clip_is_surfaced_not_defaulted() {
    // Clipping down to a single model leaves the coefficient spread
    // undefined; the pipeline must fail rather than project with std = 0.
    let mut config = small_config(24);
    config.pb_clip = 0.34;

    let result = run_projection(&config, &synthetic_inputs(24));
    assert!(matches!(
        result,
        Err(SterodynError::DegenerateDistribution(_))
    ));
}

#[test]
fn target_years_missing_from_the_fit_are_rejected() {
    let mut config = small_config(24);
    config.pyear_end = 2100;

    let result = run_projection(&config, &synthetic_inputs(24));
    assert!(matches!(result, Err(SterodynError::DataShape(_))));
}

#[test]
fn disabling_correlation_still_projects() {
    let mut config = small_config(24);
    config.correlation = false;

    let outputs = run_projection(&config, &synthetic_inputs(24)).unwrap();
    assert_eq!(outputs.joint.samples.dim(), (24, 3, 2));
}
