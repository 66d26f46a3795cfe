use proptest::prelude::*;
use std::fs;
use std::io::Write;

use flowcurve::bucket::Layout;
use flowcurve::driver::{evaluate, replay, ReplayOptions};
use flowcurve::light_part::LightPart;
use flowcurve::logger::{ReportLogger, CSV_HEADER};
use flowcurve::metrics::{are, cosine_similarity};
use flowcurve::persist_cms::{PerWindow, PersistCmsScheme};
use flowcurve::synthetic::{generate, TrafficProfile};
use flowcurve::wavelet::{Haar, WaveletScheme};
use flowcurve::{read_config, Algorithm, FlowKey, Query, Scheme, SchemeConfig, Sketch, TimeRange};

const WINDOW_US: u64 = 100;

fn query_for(key: FlowKey, windows: u64) -> Query {
    let mut query = Query::new();
    query.insert(key, TimeRange::new(0, windows * WINDOW_US));
    query
}

fn values(points: &[(u64, f64)]) -> Vec<f64> {
    points.iter().map(|&(_, v)| v).collect()
}

fn feed<S: Scheme>(scheme: &mut S, key: &FlowKey, curve: &[u32]) {
    for (w, &c) in curve.iter().enumerate() {
        if c > 0 {
            scheme.count(key, w as u64 * WINDOW_US, c);
        }
    }
}

/// Wavelet and PersistCMS schemes squeezed to a single light column over a
/// 16-window horizon, so every pair of flows collides in every row.
fn single_column_schemes() -> (WaveletScheme, PersistCmsScheme) {
    let layout = Layout { total_windows: 16, levels: 3, top_k: 14, frame: 16 };
    let haar_budget = LightPart::<Haar>::footprint(3, 1, &layout);
    let cms_layout = Layout { top_k: 16, ..layout };
    let cms_budget = LightPart::<PerWindow>::footprint(3, 1, &cms_layout);

    let wavelet_cfg = SchemeConfig::new(Algorithm::Wavelet, haar_budget, WINDOW_US, 14)
        .with_total_windows(16)
        .with_levels(3)
        .with_heavy_share(0.0)
        .with_fourier_frame(16);
    let cms_cfg = SchemeConfig::new(Algorithm::PersistCms, cms_budget, WINDOW_US, 16)
        .with_total_windows(16)
        .with_levels(3)
        .with_fourier_frame(16);

    let wavelet = WaveletScheme::new(&wavelet_cfg).unwrap();
    let cms = PersistCmsScheme::new(&cms_cfg).unwrap();
    assert_eq!(wavelet.light().width(), 1);
    assert_eq!(cms.light().width(), 1);
    (wavelet, cms)
}

/// Nonzero Haar details of `curve` (length 64) over three levels.
fn nonzero_details(curve: &[u32]) -> usize {
    let mut n = 0;
    for level in 0..3 {
        let half = 1usize << level;
        for block in curve.chunks(2 * half) {
            let first: i64 = block[..half].iter().map(|&c| i64::from(c)).sum();
            let second: i64 = block[half..].iter().map(|&c| i64::from(c)).sum();
            if first != second {
                n += 1;
            }
        }
    }
    n
}

#[test]
fn two_spike_curve_reconstructs_exactly() {
    let cfg = SchemeConfig::new(Algorithm::Wavelet, 64 * 1024, WINDOW_US, 4)
        .with_total_windows(8)
        .with_levels(3);
    let mut scheme = WaveletScheme::new(&cfg).unwrap();
    let key = FlowKey::from_flow_id(42);
    let curve = [0, 0, 5, 0, 0, 0, 5, 0];
    feed(&mut scheme, &key, &curve);

    let out = scheme.rebuild(&query_for(key, 8));
    assert_eq!(scheme.top_k(), 4);
    assert_eq!(values(&out[&key]), vec![0.0, 0.0, 5.0, 0.0, 0.0, 0.0, 5.0, 0.0]);
    let stamps: Vec<u64> = out[&key].iter().map(|&(t, _)| t).collect();
    assert_eq!(stamps, (0..8).map(|w| w * WINDOW_US).collect::<Vec<_>>());
}

#[test]
fn larger_k_never_raises_are() {
    let curve = [8u32, 0, 5, 5];
    let truth: Vec<f64> = curve.iter().map(|&c| f64::from(c)).collect();
    let key = FlowKey::from_flow_id(3);

    let mut errors = Vec::new();
    for k in 0..=3 {
        let cfg = SchemeConfig::new(Algorithm::Wavelet, 64 * 1024, WINDOW_US, k)
            .with_total_windows(4)
            .with_levels(2);
        let mut scheme = WaveletScheme::new(&cfg).unwrap();
        feed(&mut scheme, &key, &curve);
        let out = scheme.rebuild(&query_for(key, 4));
        errors.push(are(&truth, &values(&out[&key])));
    }

    assert!((errors[0] - 0.2125).abs() < 1e-12);
    assert!((errors[1] - 0.0875).abs() < 1e-12);
    assert_eq!(errors[2], 0.0);
    assert!(errors.windows(2).all(|pair| pair[1] <= pair[0]));
}

#[test]
fn single_window_flow_is_trivial_for_every_scheme() {
    for algorithm in Algorithm::ALL {
        let cfg = SchemeConfig::new(algorithm, 256 * 1024, WINDOW_US, 64).with_total_windows(64);
        let mut sketch = Sketch::from_config(&cfg).unwrap();
        let key = FlowKey::from_flow_id(7);
        sketch.count(&key, 37 * WINDOW_US + 12, 9);

        let mut query = Query::new();
        query.insert(key, TimeRange::new(37 * WINDOW_US, 38 * WINDOW_US));
        let out = sketch.rebuild(&query);
        let rebuilt = values(&out[&key]);
        assert_eq!(rebuilt.len(), 1);
        assert!(are(&[9.0], &rebuilt) < 1e-9, "{}: {:?}", algorithm, rebuilt);
        assert!((cosine_similarity(&[9.0], &rebuilt) - 1.0).abs() < 1e-9);
    }
}

#[test]
fn flush_is_idempotent_for_every_scheme() {
    let truth = generate(&TrafficProfile {
        flows: 40,
        windows: 128,
        window_us: WINDOW_US,
        ..TrafficProfile::default()
    });
    let query: Query = truth
        .flows()
        .filter_map(|key| truth.active_range(key).map(|r| (*key, r)))
        .collect();

    for algorithm in Algorithm::ALL {
        let cfg = SchemeConfig::new(algorithm, 32 * 1024, WINDOW_US, 16).with_total_windows(128);
        let mut sketch = Sketch::from_config(&cfg).unwrap();
        replay(&mut sketch, &truth, ReplayOptions::default());
        sketch.flush();
        let first = sketch.rebuild(&query);
        sketch.flush();
        sketch.flush();
        let second = sketch.rebuild(&query);
        assert_eq!(first, second, "{}", algorithm);
    }
}

#[test]
fn shared_cells_keep_flows_that_start_earlier_or_later() {
    let (mut wavelet, mut cms) = single_column_schemes();
    let a = FlowKey::from_flow_id(10);
    let b = FlowKey::from_flow_id(20);

    // b's window precedes a's, but both lie in the same epoch
    let schemes: [&mut dyn Scheme; 2] = [&mut wavelet, &mut cms];
    for scheme in schemes {
        scheme.count(&a, 5 * WINDOW_US, 4);
        scheme.count(&b, 2 * WINDOW_US, 7);
    }
    let mut query = query_for(a, 16);
    query.insert(b, TimeRange::new(0, 16 * WINDOW_US));
    for out in [wavelet.rebuild(&query), cms.rebuild(&query)] {
        assert!(values(&out[&b])[2] >= 7.0);
        assert!(values(&out[&a])[5] >= 4.0);
    }
    assert_eq!(wavelet.stats().late_events, 0);
    assert_eq!(cms.stats().late_events, 0);

    // a flow arriving past the horizon rolls the cells instead of vanishing
    let (mut wavelet, mut cms) = single_column_schemes();
    let schemes: [&mut dyn Scheme; 2] = [&mut wavelet, &mut cms];
    for scheme in schemes {
        scheme.count(&a, 0, 1);
        scheme.count(&b, 20 * WINDOW_US, 9);
    }
    let mut query = Query::new();
    query.insert(b, TimeRange::new(16 * WINDOW_US, 32 * WINDOW_US));
    for out in [wavelet.rebuild(&query), cms.rebuild(&query)] {
        assert!(values(&out[&b])[4] >= 9.0);
    }
    assert_eq!(cms.stats().rolled_buckets, 3);
    assert_eq!(cms.stats().light_updates, 2);
}

#[test]
fn config_file_round_trip() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"algorithm":"wavesketch-ideal","memory_kb":128,"window_us":50,"top_k":24,"total_windows":256,"seed":9}}"#
    )
    .unwrap();

    let cfg = read_config(file.path()).unwrap();
    assert_eq!(cfg.algorithm, Algorithm::Wavelet);
    assert_eq!(cfg.memory_budget().unwrap(), 128 * 1024);
    assert_eq!(cfg.levels(), 5);

    let sketch = Sketch::from_config(&cfg).unwrap();
    assert_eq!(sketch.algorithm(), Algorithm::Wavelet);
    assert_eq!(sketch.window_us(), 50);
    assert_eq!(sketch.top_k(), 24);
}

#[test]
fn invalid_config_file_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"algorithm":"fourier","memory_kb":8,"window_us":0}}"#).unwrap();
    assert!(read_config(file.path()).is_err());
    assert!(read_config("/nonexistent/flowcurve.json").is_err());
}

#[test]
fn report_csv_has_header_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.csv");
    let truth = generate(&TrafficProfile {
        flows: 10,
        windows: 64,
        window_us: WINDOW_US,
        ..TrafficProfile::default()
    });
    let cfg = SchemeConfig::new(Algorithm::OmniWindow, 64 * 1024, WINDOW_US, 8).with_total_windows(64);
    let mut sketch = Sketch::from_config(&cfg).unwrap();
    let reports = evaluate(&mut sketch, &truth, ReplayOptions::default());

    ReportLogger::new(&path).unwrap().log_reports(&reports).unwrap();
    ReportLogger::new(&path).unwrap().log_reports(&reports).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], CSV_HEADER);
    assert_eq!(lines.len(), 1 + 2 * reports.len());
    assert!(lines[1].contains(",omniwindow,64,"));
    assert_eq!(lines.iter().filter(|l| **l == CSV_HEADER).count(), 1);
}

proptest! {
    #[test]
    fn full_k_wavelet_round_trips(curve in prop::collection::vec(0u32..1000, 1..=64)) {
        let cfg = SchemeConfig::new(Algorithm::Wavelet, 256 * 1024, WINDOW_US, 1 << 10)
            .with_total_windows(64)
            .with_levels(3);
        let mut scheme = WaveletScheme::new(&cfg).unwrap();
        let key = FlowKey::from_flow_id(1);
        feed(&mut scheme, &key, &curve);

        let out = scheme.rebuild(&query_for(key, curve.len() as u64));
        for (got, &want) in values(&out[&key]).iter().zip(&curve) {
            prop_assert!((got - f64::from(want)).abs() < 1e-9);
        }
    }

    #[test]
    fn sparse_curve_round_trips_with_k_equal_to_its_details(
        first in 1u32..50,
        rest in prop::collection::vec(prop_oneof![4 => Just(0u32), 1 => 1u32..50], 63),
    ) {
        let mut curve = vec![first];
        curve.extend(rest);
        let n = nonzero_details(&curve);

        let cfg = SchemeConfig::new(Algorithm::Wavelet, 256 * 1024, WINDOW_US, n)
            .with_total_windows(64)
            .with_levels(3);
        let mut scheme = WaveletScheme::new(&cfg).unwrap();
        prop_assert_eq!(scheme.top_k(), n);
        let key = FlowKey::from_flow_id(1);
        feed(&mut scheme, &key, &curve);

        let out = scheme.rebuild(&query_for(key, 64));
        for (got, &want) in values(&out[&key]).iter().zip(&curve) {
            prop_assert_eq!(*got, f64::from(want));
        }
    }

    #[test]
    fn footprint_never_exceeds_budget(
        algorithm in prop::sample::select(Algorithm::ALL.to_vec()),
        budget in 2048usize..(1 << 20),
        top_k in 0usize..256,
        heavy_share in 0.0f64..=1.0,
    ) {
        let cfg = SchemeConfig::new(algorithm, budget, WINDOW_US, top_k)
            .with_total_windows(128)
            .with_heavy_share(heavy_share);
        if let Ok(mut sketch) = Sketch::from_config(&cfg) {
            let usage = sketch.memory_usage();
            prop_assert!(usage <= budget);
            for t in 0..2000u64 {
                sketch.count(&FlowKey::from_flow_id(t % 97), t * 7, 1);
            }
            sketch.flush();
            prop_assert_eq!(sketch.memory_usage(), usage);
            prop_assert!(sketch.top_k() <= top_k);
        }
    }

    #[test]
    fn colliding_flows_never_underestimate(
        a in prop::collection::vec(0u32..500, 16),
        b in prop::collection::vec(0u32..500, 16),
        epoch in 0u64..4,
        b_first in any::<bool>(),
    ) {
        let (mut wavelet, mut cms) = single_column_schemes();
        let ka = FlowKey::from_flow_id(10);
        let kb = FlowKey::from_flow_id(20);
        let base = epoch * 16;

        // wavelet: both flows interleaved in time order
        for w in 0..16usize {
            let t = (base + w as u64) * WINDOW_US;
            for (key, c) in [(ka, a[w]), (kb, b[w])] {
                if c > 0 {
                    wavelet.count(&key, t, c);
                }
            }
        }
        // persist-cms: one whole flow after the other
        let order = if b_first { [(kb, &b), (ka, &a)] } else { [(ka, &a), (kb, &b)] };
        for (key, curve) in order {
            for (w, &c) in curve.iter().enumerate() {
                if c > 0 {
                    cms.count(&key, (base + w as u64) * WINDOW_US, c);
                }
            }
        }
        prop_assert_eq!(cms.stats().late_events, 0);

        let range = TimeRange::new(base * WINDOW_US, (base + 16) * WINDOW_US);
        let mut query = Query::new();
        query.insert(ka, range);
        query.insert(kb, range);
        for out in [wavelet.rebuild(&query), cms.rebuild(&query)] {
            let ea = values(&out[&ka]);
            let eb = values(&out[&kb]);
            for w in 0..16 {
                let floor = f64::from(a[w].max(b[w]));
                prop_assert!(ea[w] + 1e-9 >= floor);
                prop_assert!(eb[w] + 1e-9 >= floor);
            }
        }
    }
}
