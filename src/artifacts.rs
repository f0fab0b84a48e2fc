//! Process-wide read-only inference state.
//!
//! Everything is loaded once at startup and never mutated afterwards, so a
//! shared `&Artifacts` can serve any number of requests, on any number of
//! threads, without locking. Loading fails fast: either every artifact is
//! present and consistent, or no `Artifacts` value exists.

use crate::config::ArtifactPaths;
use crate::data::{
    load_product_catalog, load_rfm_history, load_similarity_matrix, ProductCatalog, RfmRequest,
};
use crate::error::Result;
use crate::model::{KMeansModel, SegmentPredictor, StandardScaler};
use crate::recommend::{Recommendation, SimilarityMatrix};
use crate::segment::{build_label_mapping, cluster_profiles, ClusterProfile, LabelMapping, Segment};

/// Fitted models, labels and lookup tables shared by every request.
#[derive(Debug, Clone)]
pub struct Artifacts {
    predictor: SegmentPredictor,
    similarity: SimilarityMatrix,
    catalog: Option<ProductCatalog>,
    profiles: Vec<ClusterProfile>,
}

impl Artifacts {
    /// Load and cross-check every artifact.
    pub fn load(paths: &ArtifactPaths) -> Result<Self> {
        let scaler = StandardScaler::load(&paths.scaler)?;
        let model = KMeansModel::load(&paths.model)?;
        tracing::info!(
            path = %paths.model.display(),
            clusters = model.centroids.nrows(),
            "loaded clustering model"
        );

        let history = load_rfm_history(&paths.rfm_history)?;
        let labels = build_label_mapping(&history)?;
        let profiles = cluster_profiles(&history);
        for (cluster, segment) in labels.iter() {
            tracing::debug!(cluster, %segment, "cluster label");
        }

        let predictor = SegmentPredictor::new(scaler, model, labels)?;
        let similarity = load_similarity_matrix(&paths.similarity)?;

        let catalog = paths
            .catalog
            .as_deref()
            .map(load_product_catalog)
            .transpose()?;
        if let Some(catalog) = &catalog {
            let uncovered = catalog.uncovered(&similarity).count();
            if uncovered > 0 {
                tracing::info!(
                    uncovered,
                    catalog = catalog.len(),
                    "catalog products without similarity data will get no recommendations"
                );
            }
        }

        Ok(Self {
            predictor,
            similarity,
            catalog,
            profiles,
        })
    }

    /// Assemble from already-built parts.
    pub fn from_parts(
        predictor: SegmentPredictor,
        similarity: SimilarityMatrix,
        catalog: Option<ProductCatalog>,
        profiles: Vec<ClusterProfile>,
    ) -> Self {
        Self {
            predictor,
            similarity,
            catalog,
            profiles,
        }
    }

    /// Validate one customer's RFM values and predict their segment.
    pub fn predict_segment(&self, recency: f64, frequency: u32, monetary: f64) -> Result<Segment> {
        self.predictor.predict_segment(recency, frequency, monetary)
    }

    /// Predict every request independently, keeping input order.
    ///
    /// A rejected row yields its own error and the rows after it are still
    /// predicted.
    pub fn predict_batch<I>(&self, requests: I) -> Vec<(String, Result<Segment>)>
    where
        I: IntoIterator<Item = RfmRequest>,
    {
        requests
            .into_iter()
            .map(|request| {
                let segment = request.rfm.and_then(|rfm| self.predictor.predict(&rfm));
                if let Err(err) = &segment {
                    tracing::warn!(key = %request.key, error = %err, "row rejected");
                }
                (request.key, segment)
            })
            .collect()
    }

    /// Top `top_n` product names similar to `product`, most similar first.
    pub fn recommend(&self, product: &str, top_n: usize) -> Result<Vec<String>> {
        self.similarity.recommend(product, top_n)
    }

    /// Like [`Artifacts::recommend`], with the similarity score of each product.
    pub fn recommend_with_scores(&self, product: &str, top_n: usize) -> Result<Vec<Recommendation>> {
        self.similarity.recommend_with_scores(product, top_n)
    }

    /// The scaler, clustering model and label mapping behind segment predictions.
    pub fn predictor(&self) -> &SegmentPredictor {
        &self.predictor
    }

    /// Segment label of every cluster.
    pub fn labels(&self) -> &LabelMapping {
        self.predictor.labels()
    }

    /// The product similarity matrix.
    pub fn similarity(&self) -> &SimilarityMatrix {
        &self.similarity
    }

    /// Product catalog, when one was configured.
    pub fn catalog(&self) -> Option<&ProductCatalog> {
        self.catalog.as_ref()
    }

    /// Per-cluster statistics of the RFM history, in ascending cluster id order.
    pub fn profiles(&self) -> &[ClusterProfile] {
        &self.profiles
    }
}
