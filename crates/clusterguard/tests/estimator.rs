mod common;

use clusterguard::{Algorithm, Error, ErrorKind, Estimator, ValidationError};
use common::ScriptedEngine;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::tempdir;

type Guarded = Estimator<ScriptedEngine>;

fn estimator(algorithm: Algorithm, overrides: &[(&str, Value)]) -> Guarded {
    Guarded::new(algorithm, overrides.iter().cloned()).unwrap()
}

fn grid(n_samples: usize, n_features: usize) -> Vec<Vec<f64>> {
    (0..n_samples)
        .map(|i| {
            (0..n_features)
                .map(|j| (i * n_features + j) as f64 / 10.0)
                .collect()
        })
        .collect()
}

fn classified(err: Error) -> clusterguard::ClassifiedError {
    match err {
        Error::Classified(e) => e,
        other => panic!("expected a classified error, got {:?}", other),
    }
}

#[test]
fn test_neighbors_adjusted_for_small_dataset() {
    let mut umap = estimator(Algorithm::Umap, &[("n_neighbors", json!(15))]);

    let embedding = umap.fit_transform(&grid(10, 3)).unwrap();

    assert_eq!(embedding.len(), 10);
    assert!(embedding.iter().all(|row| row.len() == 2));
    assert_eq!(umap.configuration().n_neighbors, Some(2));

    let change = umap.last_adjustments().get("n_neighbors").unwrap();
    assert_eq!((change.old_value, change.new_value), (15, 2));

    let mapping = common::constructed().pop().unwrap();
    assert_eq!(mapping.get("n_neighbors"), Some(&json!(2)));
}

#[test]
fn test_adjustment_persists_and_is_not_repeated() {
    let mut umap = estimator(Algorithm::Umap, &[]);
    umap.fit_transform(&grid(10, 3)).unwrap();
    assert_eq!(umap.last_adjustments().len(), 1);

    umap.fit_transform(&grid(10, 3)).unwrap();
    assert!(umap.last_adjustments().is_empty());
    assert_eq!(umap.configuration().n_neighbors, Some(2));
}

#[test]
fn test_mapping_is_superset_of_parameters() {
    let mut umap = estimator(Algorithm::Umap, &[("random_seed", json!(42))]);
    umap.fit_transform(&grid(30, 4)).unwrap();

    let mapping = common::constructed().pop().unwrap();
    assert_eq!(mapping.get("algorithm"), Some(&json!("umap")));
    assert_eq!(mapping.get("random_seed"), Some(&json!(42)));
    for key in ["nb_grad_batch", "ef_construction", "n_clusters", "min_cluster_size"] {
        assert!(mapping.contains_key(key), "missing {}", key);
    }
}

#[test]
fn test_isolated_point_is_classified() {
    let mut umap = estimator(Algorithm::Umap, &[]);
    common::fail_next("thread 'main' panicked: isolated point at layer 0, cannot continue");

    let err = classified(umap.fit_transform(&grid(30, 4)).unwrap_err());

    assert_eq!(err.kind(), ErrorKind::IsolatedPoint);
    assert_eq!(err.algorithm(), Algorithm::Umap);
    assert!(err.message().contains("30 samples"));
    assert!(err.message().contains("4 features"));
    assert!(!umap.is_fitted());
}

#[test]
fn test_convergence_failure_reports_value_range() {
    let mut tsne = estimator(Algorithm::Tsne, &[]);
    let mut data = grid(40, 2);
    data[3][1] = 5000.0;
    common::fail_next("assertion failed: box_size < 1e10");

    let err = classified(tsne.fit_transform(&data).unwrap_err());

    assert_eq!(err.kind(), ErrorKind::Convergence);
    assert_eq!(err.stats().max, Some(5000.0));
    assert!(err.message().contains("Value range: 5000"));
}

#[test]
fn test_engine_panic_is_classified() {
    let mut umap = estimator(Algorithm::Umap, &[]);
    common::panic_next("assertion failed: box_size < 1e10");

    let err = classified(umap.fit_transform(&grid(30, 2)).unwrap_err());

    assert_eq!(err.kind(), ErrorKind::Convergence);
    assert!(err.message().contains("30 samples x 2 features"));
    assert_eq!(
        err.raw_message().as_deref(),
        Some("assertion failed: box_size < 1e10")
    );
    assert!(!umap.is_fitted());
}

#[test]
fn test_panic_during_transform_keeps_model() {
    let mut umap = estimator(Algorithm::Umap, &[]);
    umap.fit_transform(&grid(20, 3)).unwrap();

    common::panic_next("graph is not connected");
    let err = umap.transform(&grid(4, 3)).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::IsolatedPoint));

    assert_eq!(umap.transform(&grid(4, 3)).unwrap().len(), 4);
}

#[test]
fn test_unrecognized_failure_keeps_engine_text() {
    let mut umap = estimator(Algorithm::Umap, &[]);
    common::fail_next("Embedding failed");

    let err = umap.fit_transform(&grid(30, 4)).unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::Engine));
    let err = classified(err);
    assert_eq!(err.raw_message().as_deref(), Some("Embedding failed"));
    assert!(err.message().contains("Embedding failed"));
}

#[test]
fn test_ragged_rows_rejected_before_engine() {
    let mut umap = estimator(Algorithm::Umap, &[]);

    let err = umap
        .fit_transform(&vec![vec![1.0, 2.0], vec![3.0, 4.0, 5.0]])
        .unwrap_err();

    match err {
        Error::Validation(e) => assert_eq!(
            e,
            ValidationError::InconsistentRowLength {
                row: 1,
                expected: 2,
                found: 3
            }
        ),
        other => panic!("expected validation error, got {:?}", other),
    }
    assert!(common::constructed().is_empty());
    assert_eq!(common::calls(), 0);
}

#[test]
fn test_nan_rejected_for_projection() {
    let mut umap = estimator(Algorithm::Umap, &[]);

    let err = umap
        .fit_transform(&vec![vec![1.0, f64::NAN], vec![3.0, 4.0]])
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Validation(ValidationError::NonFiniteElement { row: 0, col: 1, .. })
    ));
    assert_eq!(common::calls(), 0);
}

#[test]
fn test_clustering_accepts_non_finite_values() {
    let mut hdbscan = estimator(Algorithm::Hdbscan, &[]);
    let mut data = grid(12, 2);
    data[5][0] = f64::INFINITY;

    let labels = hdbscan.fit_predict(&data).unwrap();
    assert_eq!(labels.len(), 12);
}

#[test]
fn test_json_rows_with_strings_rejected() {
    let mut pca = estimator(Algorithm::Pca, &[]);

    let err = pca
        .fit_transform(&json!([[1.0, 2.0], [3.0, "four"]]))
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Validation(ValidationError::NonNumericElement { row: 1, col: 1 })
    ));
}

#[test]
fn test_json_rows_accepted() {
    let mut pca = estimator(Algorithm::Pca, &[]);
    let embedding = pca
        .fit_transform(&json!([[1, 2], [3, 4], [5, 6.5]]))
        .unwrap();
    assert_eq!(embedding.len(), 3);
}

#[test]
fn test_kmeans_too_many_clusters_rejected_before_engine() {
    let mut kmeans = estimator(Algorithm::KMeans, &[("n_clusters", json!(8))]);

    let err = classified(kmeans.fit_predict(&grid(5, 2)).unwrap_err());

    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    assert!(err.message().contains("n_clusters (8)"));
    assert!(err.message().contains("5 samples"));
    assert!(err.raw_message().is_none());
    assert!(common::constructed().is_empty());
}

#[test]
fn test_pca_components_bounded_by_features() {
    let mut pca = estimator(Algorithm::Pca, &[("n_components", json!(3))]);
    let err = pca.fit_transform(&grid(10, 2)).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::InvalidParameter));
    assert_eq!(common::calls(), 0);
}

#[test]
fn test_hdbscan_sizes_clamped() {
    let mut hdbscan = estimator(Algorithm::Hdbscan, &[]);

    hdbscan.fit_predict(&grid(4, 2)).unwrap();

    assert_eq!(hdbscan.configuration().min_samples, 3);
    assert_eq!(hdbscan.configuration().min_cluster_size, 4);
    assert_eq!(hdbscan.last_adjustments().len(), 2);
}

#[test]
fn test_kmeans_predict_after_fit() {
    let mut kmeans = estimator(Algorithm::KMeans, &[("n_clusters", json!(3))]);
    let labels = kmeans.fit_predict(&grid(9, 2)).unwrap();
    assert_eq!(labels, vec![0, 1, 2, 0, 1, 2, 0, 1, 2]);

    let labels = kmeans.predict(&grid(2, 2)).unwrap();
    assert_eq!(labels.len(), 2);
}

#[test]
fn test_transform_before_fit() {
    let umap = estimator(Algorithm::Umap, &[]);
    let err = umap.transform(&grid(3, 2)).unwrap_err();
    assert!(matches!(
        err,
        Error::NotFitted {
            algorithm: Algorithm::Umap,
            hint: "fit_transform"
        }
    ));
    assert!(err.to_string().contains("not fitted"));
}

#[test]
fn test_tsne_has_no_transform() {
    let mut tsne = estimator(Algorithm::Tsne, &[]);
    tsne.fit_transform(&grid(40, 3)).unwrap();

    let err = tsne.transform(&grid(3, 3)).unwrap_err();
    assert!(matches!(
        err,
        Error::Unsupported {
            algorithm: Algorithm::Tsne,
            operation: "transform",
            ..
        }
    ));
    assert!(err.to_string().contains("re-fit"));
}

#[test]
fn test_wrong_entry_point_for_algorithm_family() {
    let mut umap = estimator(Algorithm::Umap, &[]);
    assert!(matches!(
        umap.fit_predict(&grid(20, 2)),
        Err(Error::Unsupported { operation: "fit_predict", .. })
    ));

    let mut kmeans = estimator(Algorithm::KMeans, &[]);
    assert!(matches!(
        kmeans.fit_transform(&grid(20, 2)),
        Err(Error::Unsupported { operation: "fit_transform", .. })
    ));
    assert!(common::constructed().is_empty());
}

#[test]
fn test_transform_checks_feature_count() {
    let mut umap = estimator(Algorithm::Umap, &[]);
    umap.fit_transform(&grid(20, 3)).unwrap();

    let err = umap.transform(&grid(5, 4)).unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::FeatureCountMismatch {
            expected: 3,
            found: 4
        })
    ));
}

#[test]
fn test_failed_refit_keeps_previous_model() {
    let mut umap = estimator(Algorithm::Umap, &[]);
    umap.fit_transform(&grid(20, 3)).unwrap();

    common::fail_next("graph not connected");
    assert!(umap.fit_transform(&grid(20, 3)).is_err());

    assert!(umap.is_fitted());
    assert_eq!(umap.transform(&grid(2, 3)).unwrap().len(), 2);
}

#[test]
fn test_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("umap.model");

    let mut umap = estimator(Algorithm::Umap, &[("n_components", json!(3))]);
    umap.fit_transform(&grid(20, 4)).unwrap();
    umap.save(&path).unwrap();
    assert!(path.exists());

    let loaded = Guarded::load(Algorithm::Umap, &path, Vec::<(&str, Value)>::new()).unwrap();
    assert!(loaded.is_fitted());

    let embedding = loaded.transform(&grid(5, 4)).unwrap();
    assert_eq!(embedding.len(), 5);
    assert!(embedding.iter().all(|row| row.len() == 3));
}

#[test]
fn test_save_requires_fit() {
    let dir = tempdir().unwrap();
    let umap = estimator(Algorithm::Umap, &[]);
    assert!(matches!(
        umap.save(dir.path().join("never.model")),
        Err(Error::NotFitted { .. })
    ));
}

#[test]
fn test_load_missing_file_is_classified() {
    let dir = tempdir().unwrap();
    let result = Guarded::load(
        Algorithm::Umap,
        dir.path().join("missing.model"),
        Vec::<(&str, Value)>::new(),
    );
    let err = classified(result.err().unwrap());
    assert_eq!(err.kind(), ErrorKind::Engine);
    assert!(err.message().contains("no dataset involved"));
    assert!(!err.message().contains("0 samples"));
}

#[test]
fn test_unknown_override_dropped() {
    let umap = estimator(Algorithm::Umap, &[("not_a_parameter", json!(1))]);
    assert_eq!(umap.configuration().get("not_a_parameter"), None);
}

#[test]
fn test_wrong_type_override_rejected() {
    let result = Guarded::new(Algorithm::Umap, [("n_neighbors", json!("many"))]);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_verbose_instance_still_guarded() {
    let mut umap = estimator(Algorithm::Umap, &[("verbose", json!(true))]);
    common::fail_next("disconnected graph");

    let err = umap.fit_transform(&grid(30, 2)).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::IsolatedPoint));
}
