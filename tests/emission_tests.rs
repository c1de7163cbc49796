use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use genplanck::absorption::IdealSqrtAbsorption;
use genplanck::builder::{build_model, energy_grid};
use genplanck::convolution::{ConvolutionEngine, ConvolutionStrategy};
use genplanck::error::ModelError;
use genplanck::fit::{self, FitOptions};
use genplanck::model::Model;
use genplanck::params::Parameter;
use genplanck::planck::{GeneralizedPlanck, PlanckParams};
use genplanck::reflectance::{Polarization, Reflectance};
use genplanck::refr_index::ConstantIndex;
use genplanck::settings;
use genplanck::urbach::UrbachTail;
use ndarray::Array1;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn gaas_edge() -> IdealSqrtAbsorption {
    IdealSqrtAbsorption::new(1.42, 1.6, 14800.0).unwrap()
}

fn air_gaas() -> Arc<Reflectance> {
    Arc::new(
        Reflectance::new(
            0.0,
            Polarization::None,
            Arc::new(ConstantIndex::real(1.0).unwrap()),
            Arc::new(ConstantIndex::real(3.6).unwrap()),
        )
        .unwrap(),
    )
}

fn planck(params: PlanckParams, strategy: ConvolutionStrategy) -> GeneralizedPlanck {
    GeneralizedPlanck::new(
        params,
        air_gaas(),
        Arc::new(gaas_edge()),
        Arc::new(UrbachTail::new(0.015).unwrap()),
        strategy,
    )
    .unwrap()
}

/// Composite Simpson rule of `f` over `[a, b]` with `n` (even) intervals.
fn simpson(f: impl Fn(f64) -> f64, a: f64, b: f64, n: usize) -> f64 {
    let h = (b - a) / n as f64;
    let inner: f64 = (1..n)
        .map(|i| {
            let w = if i % 2 == 1 { 4.0 } else { 2.0 };
            w * f(a + i as f64 * h)
        })
        .sum();
    (f(a) + f(b) + inner) * h / 3.0
}

#[test]
fn tailed_absorption_matches_direct_quadrature() {
    let edge = gaas_edge();
    let tail = UrbachTail::new(0.015).unwrap();
    let e = 1.52;

    // x = Eg + u^2 removes the square-root edge; the kernel cusp sits at u = sqrt(E - Eg)
    let integrand = |u: f64| edge.absorption(1.42 + u * u) * tail.value(e - 1.42 - u * u) * 2.0 * u;
    let cusp = (e - 1.42f64).sqrt();
    let end = (e - 1.42 + 40.0 * 0.015f64).sqrt();
    let direct = simpson(integrand, 0.0, cusp, 20_000) + simpson(integrand, cusp, end, 20_000);

    let closed = edge.convolution_with_tail(e, &tail);
    assert!((closed - direct).abs() / direct < 1e-4, "{} vs {}", closed, direct);

    let numerical = ConvolutionStrategy::numerical();
    let engine = ConvolutionEngine::new(&edge, &tail, &numerical).unwrap();
    let value = engine.alpha(e).unwrap();
    assert!((value - direct).abs() / direct < 1e-4, "{} vs {}", value, direct);
}

#[test]
fn analytical_and_numerical_emission_agree() {
    let params = PlanckParams::default();
    let analytical = planck(params, ConvolutionStrategy::Analytical);
    let numerical = planck(params, ConvolutionStrategy::numerical());
    let grid = Array1::linspace(1.3, 1.6, 61);
    let a = analytical.emission_grid(&grid).unwrap();
    let n = numerical.emission_grid(&grid).unwrap();
    let peak = n.iter().cloned().fold(0.0f64, f64::max);
    for ((e, x), y) in grid.iter().zip(a.iter()).zip(n.iter()) {
        assert!((x - y).abs() <= 1e-4 * y.abs().max(1e-6 * peak), "E = {}: {} vs {}", e, x, y);
    }
}

#[test]
fn analytical_strategy_needs_a_closed_form() {
    #[derive(Debug)]
    struct Step;
    impl genplanck::absorption::AbsorptionModel for Step {
        fn label(&self) -> &str {
            "step"
        }
        fn absorption(&self, e: f64) -> f64 {
            if e > 1.0 {
                1.0
            } else {
                0.0
            }
        }
        fn onset(&self) -> Option<f64> {
            Some(1.0)
        }
    }
    let tail = UrbachTail::new(0.01).unwrap();
    let err = ConvolutionEngine::new(&Step, &tail, &ConvolutionStrategy::Analytical).unwrap_err();
    assert!(matches!(err, ModelError::UnsupportedCombination { .. }));
    assert!(ConvolutionEngine::new(&Step, &tail, &ConvolutionStrategy::numerical()).is_ok());
}

#[test]
fn polarization_strings() {
    assert_eq!("S".parse::<Polarization>().unwrap(), Polarization::S);
    assert_eq!("unpolarized".parse::<Polarization>().unwrap(), Polarization::Unpolarized);
    assert!(matches!(
        "circular".parse::<Polarization>(),
        Err(ModelError::InvalidPolarization(_))
    ));
}

#[test]
fn fit_recovers_gap_and_tail_width() {
    init_logging();
    let truth = PlanckParams {
        eg: 1.42,
        g: 0.01,
        p: 0.8,
        t: 300.0,
        d: 150.0,
        efv: 0.0,
        efc: 0.1,
    };
    let energies = Array1::linspace(1.3, 1.6, 301);
    let data = planck(truth, ConvolutionStrategy::Analytical)
        .emission_grid(&energies)
        .unwrap();

    let start = planck(
        PlanckParams { eg: 1.39, ..truth },
        ConvolutionStrategy::Analytical,
    );
    let parameters = vec![
        Parameter::new("Eg", 1.39).with_bounds(Some(1.3), Some(1.5)).unwrap(),
        Parameter::new("g", 0.01).with_bounds(Some(0.001), Some(0.05)).unwrap(),
        Parameter::fixed("p", 0.8),
        Parameter::fixed("T", 300.0),
        Parameter::fixed("d", 150.0),
        Parameter::fixed("Efv", 0.0),
        Parameter::fixed("Efc", 0.1),
    ];
    let mut model = Model::new();
    model.add_with("planck", Box::new(start), parameters).unwrap();

    let report =
        fit::levenberg_marquardt(&mut model, &energies, &data, None, &FitOptions::default())
            .unwrap();
    assert_eq!(report.names, vec!["planck.Eg", "planck.g"]);
    assert!((report.values[0] - 1.42).abs() < 1e-3, "{:?}", report);
    assert!((report.values[1] - 0.01).abs() < 1e-3, "{:?}", report);
    assert!((model.parameter("planck", "Eg").unwrap().value - 1.42).abs() < 1e-3);
}

#[test]
fn builds_model_from_config_with_index_table() {
    init_logging();
    let dir = std::env::temp_dir().join(format!("genplanck-config-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let table: String = (0..=10)
        .map(|i| format!("{:.1} 3.6 0.0\n", 1.0 + 0.1 * i as f64))
        .collect();
    fs::write(dir.join("gaas_nk.txt"), format!("# E n k\n{}", table)).unwrap();
    let config = dir.join("config.toml");
    fs::write(
        &config,
        r#"
        [grid]
        start = 1.3
        stop = 1.6
        points = 31

        [refractive_index.air]
        n = 1.0

        [refractive_index.gaas]
        file = "gaas_nk.txt"
        units = "ev"

        [reflectance.gaas]
        n1 = "air"
        n2 = "gaas"
        pol = "none"

        [tail.gaas]
        g = 0.015

        [absorption.gaas]
        eg = 1.42
        e0 = 1.6
        a0 = 14800.0

        [[components]]
        id_name = "GeneralizedPlanck"
        name = "planck"
        kwargs = { reflectance = "gaas", absorption = "gaas", tail = "gaas", analytical = false }

        [components.parameters]
        Eg = [1.42, 1.3, 1.5, true]
        g = [0.015, false, 0.05, true]
        "#,
    )
    .unwrap();

    let settings = settings::load_config_from(&config).unwrap();
    let model = build_model(&settings, &dir).unwrap();
    let eg = model.parameter("planck", "Eg").unwrap();
    assert!(eg.free);
    assert_eq!(eg.bound, Some((1.3, 1.5)));
    let g = model.parameter("planck", "g").unwrap();
    assert_eq!(g.upper(), 0.05);
    assert_eq!(g.lower(), f64::NEG_INFINITY);

    let energies = energy_grid(&settings.grid);
    let tabulated = model.evaluate_grid(&energies).unwrap();
    let constant = planck(
        PlanckParams {
            g: 0.015,
            ..PlanckParams::default()
        },
        ConvolutionStrategy::numerical(),
    )
    .emission_grid(&energies)
    .unwrap();
    for (a, b) in tabulated.iter().zip(constant.iter()) {
        assert!((a - b).abs() <= 1e-9 * b.abs(), "{} vs {}", a, b);
    }

    // the table does not cover a wider grid
    let mut wide = settings.clone();
    wide.grid.stop = 2.5;
    assert!(build_model(&wide, &dir).is_err());
    let _ = fs::remove_dir_all(PathBuf::from(&dir));
}
