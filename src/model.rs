//! Fitted scaler and K-Means model artifacts, and the segment predictor built on them

use std::fs;
use std::path::Path;

use ndarray::{Array1, Array2, ArrayView1};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::segment::{ClusterId, LabelMapping, RfmRecord, Segment, N_FEATURES};

/// Deterministic feature transform fixed at training time.
pub trait FeatureScaler {
    fn transform(&self, features: ArrayView1<f64>) -> Array1<f64>;
}

/// Cluster assignment model fixed at training time.
pub trait ClusterModel {
    /// Assign a scaled feature vector to a cluster.
    fn predict(&self, features: ArrayView1<f64>) -> ClusterId;

    /// Number of clusters the model can emit (`0..n_clusters`).
    fn n_clusters(&self) -> usize;
}

/// Standardization parameters: `(x - mean) / scale` per feature.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

#[derive(Debug, Deserialize)]
struct ScalerParams {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Build from per-feature means and scales; every scale must be non-zero.
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        if mean.len() != N_FEATURES || scale.len() != N_FEATURES {
            return Err(Error::Configuration(format!(
                "scaler must have {N_FEATURES} means and scales, got {} and {}",
                mean.len(),
                scale.len()
            )));
        }
        if mean.iter().chain(&scale).any(|v| !v.is_finite()) {
            return Err(Error::Configuration(
                "scaler parameters must be finite".to_string(),
            ));
        }
        if scale.iter().any(|&s| s == 0.0) {
            return Err(Error::Configuration(
                "scaler scale must be non-zero for every feature".to_string(),
            ));
        }

        Ok(Self {
            mean: Array1::from(mean),
            scale: Array1::from(scale),
        })
    }

    /// Load parameters from a JSON artifact: `{"mean": [..], "scale": [..]}`.
    pub fn load(path: &Path) -> Result<Self> {
        let params: ScalerParams = read_json(path)?;
        Self::new(params.mean, params.scale)
    }

    /// Per-feature means, in model order.
    pub fn mean(&self) -> ArrayView1<'_, f64> {
        self.mean.view()
    }

    /// Per-feature scales, in model order.
    pub fn scale(&self) -> ArrayView1<'_, f64> {
        self.scale.view()
    }
}

impl FeatureScaler for StandardScaler {
    fn transform(&self, features: ArrayView1<f64>) -> Array1<f64> {
        (&features - &self.mean) / &self.scale
    }
}

/// Fitted K-Means model, reduced to what inference needs: the centroids.
///
/// Cluster ids are centroid row indices.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansModel {
    /// Cluster centroids in scaled space, shape `(n_clusters, 3)`.
    pub centroids: Array2<f64>,
}

#[derive(Debug, Deserialize)]
struct KMeansParams {
    centroids: Vec<Vec<f64>>,
}

impl KMeansModel {
    /// Build from a non-empty `(n_clusters, 3)` matrix of finite centroids.
    pub fn new(centroids: Array2<f64>) -> Result<Self> {
        if centroids.nrows() == 0 {
            return Err(Error::Configuration(
                "clustering model has no centroids".to_string(),
            ));
        }
        if centroids.ncols() != N_FEATURES {
            return Err(Error::Configuration(format!(
                "centroids must have {N_FEATURES} dimensions, got {}",
                centroids.ncols()
            )));
        }
        if centroids.iter().any(|v| !v.is_finite()) {
            return Err(Error::Configuration(
                "centroids must be finite".to_string(),
            ));
        }
        Ok(Self { centroids })
    }

    /// Load centroids from a JSON artifact: `{"centroids": [[r, f, m], ...]}`.
    pub fn load(path: &Path) -> Result<Self> {
        let params: KMeansParams = read_json(path)?;
        let n_clusters = params.centroids.len();
        if let Some(row) = params.centroids.iter().find(|row| row.len() != N_FEATURES) {
            return Err(Error::Configuration(format!(
                "centroid in `{}` has {} dimensions, expected {N_FEATURES}",
                path.display(),
                row.len()
            )));
        }

        let flat: Vec<f64> = params.centroids.into_iter().flatten().collect();
        let centroids = Array2::from_shape_vec((n_clusters, N_FEATURES), flat)
            .map_err(|e| Error::Configuration(format!("invalid centroid matrix: {e}")))?;
        Self::new(centroids)
    }
}

impl ClusterModel for KMeansModel {
    fn predict(&self, features: ArrayView1<f64>) -> ClusterId {
        // Find nearest centroid; exact ties keep the lower index
        let mut min_distance = f64::INFINITY;
        let mut closest_cluster = 0;

        for (cluster_idx, centroid) in self.centroids.outer_iter().enumerate() {
            let distance: f64 = features
                .iter()
                .zip(centroid.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum();

            if distance < min_distance {
                min_distance = distance;
                closest_cluster = cluster_idx;
            }
        }

        closest_cluster
    }

    fn n_clusters(&self) -> usize {
        self.centroids.nrows()
    }
}

/// Maps raw RFM values to a segment: scale, assign a cluster, resolve its label.
#[derive(Debug, Clone)]
pub struct SegmentPredictor<S = StandardScaler, M = KMeansModel> {
    scaler: S,
    model: M,
    labels: LabelMapping,
}

impl<S: FeatureScaler, M: ClusterModel> SegmentPredictor<S, M> {
    /// Fails if some cluster the model can emit has no label.
    pub fn new(scaler: S, model: M, labels: LabelMapping) -> Result<Self> {
        if model.n_clusters() != labels.len() {
            return Err(Error::Configuration(format!(
                "clustering model has {} clusters but the RFM history labels {}",
                model.n_clusters(),
                labels.len()
            )));
        }
        if let Some(cluster) = (0..model.n_clusters()).find(|&c| labels.get(c).is_none()) {
            return Err(Error::Configuration(format!(
                "cluster {cluster} of the clustering model does not appear in the RFM history"
            )));
        }

        Ok(Self {
            scaler,
            model,
            labels,
        })
    }

    /// Build without checking model/label agreement.
    ///
    /// Every prediction still verifies the assigned cluster has a label.
    pub fn new_unchecked(scaler: S, model: M, labels: LabelMapping) -> Self {
        Self {
            scaler,
            model,
            labels,
        }
    }

    /// Segment label of every cluster.
    pub fn labels(&self) -> &LabelMapping {
        &self.labels
    }

    /// Cluster assignment for a validated record.
    pub fn assign(&self, rfm: &RfmRecord) -> ClusterId {
        let raw = Array1::from(rfm.features().to_vec());
        let scaled = self.scaler.transform(raw.view());
        self.model.predict(scaled.view())
    }

    /// Segment of a validated record.
    pub fn predict(&self, rfm: &RfmRecord) -> Result<Segment> {
        let cluster = self.assign(rfm);
        let segment = self
            .labels
            .get(cluster)
            .ok_or(Error::UnknownCluster { cluster })?;
        tracing::debug!(
            recency = rfm.recency,
            frequency = rfm.frequency,
            monetary = rfm.monetary,
            cluster,
            %segment,
            "predicted segment"
        );
        Ok(segment)
    }

    /// Validate raw inputs and predict their segment.
    pub fn predict_segment(&self, recency: f64, frequency: u32, monetary: f64) -> Result<Segment> {
        let rfm = RfmRecord::new(recency, frequency, monetary)?;
        self.predict(&rfm)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })
}
