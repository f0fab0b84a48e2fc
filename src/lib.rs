//! Shopper Spectrum: customer segmentation and product recommendations from pre-trained artifacts
//!
//! Customers are segmented from their RFM (Recency, Frequency, Monetary) metrics with a
//! fitted scaler and K-Means centroids; products are recommended from a precomputed
//! item-item similarity matrix. Training happens offline, this crate only runs inference.

pub mod artifacts;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod model;
pub mod recommend;
pub mod segment;

// Re-export public items for easier access
pub use artifacts::Artifacts;
pub use cli::{Args, Command};
pub use config::{AppConfig, ArtifactPaths};
pub use data::{
    load_product_catalog, load_rfm_history, load_rfm_requests, load_similarity_matrix,
    ProductCatalog, RfmRequest,
};
pub use error::{Error, Result};
pub use model::{ClusterModel, FeatureScaler, KMeansModel, SegmentPredictor, StandardScaler};
pub use recommend::{Recommendation, SimilarityMatrix, DEFAULT_TOP_N};
pub use segment::{
    build_label_mapping, cluster_profiles, ClusterId, ClusterProfile, ClusteredRecord,
    LabelMapping, RfmRecord, Segment,
};
