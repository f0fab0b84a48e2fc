//! Customer segments and the cluster-to-segment label mapping.
//!
//! A clustering model only knows opaque cluster ids. Business users think in
//! segments. The bridge is the historical RFM dataset: every customer in it is
//! tagged with the cluster the model assigned, so clusters can be ranked by how
//! much their customers spend on average and labelled down a fixed ladder:
//!
//! ```text
//! rank 0 (highest mean monetary) -> High-Value
//! rank 1                         -> Regular
//! rank 2                         -> Occasional
//! rank 3 (lowest mean monetary)  -> At-Risk
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Opaque cluster identifier produced by the clustering model.
pub type ClusterId = usize;

/// Number of RFM features fed to the scaler and the clustering model.
pub const N_FEATURES: usize = 3;

/// Human-readable customer segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    HighValue,
    Regular,
    Occasional,
    AtRisk,
}

impl Segment {
    /// Default label ladder, best customers first.
    pub const ALL: [Segment; 4] = [
        Segment::HighValue,
        Segment::Regular,
        Segment::Occasional,
        Segment::AtRisk,
    ];

    /// Display name of the segment.
    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::HighValue => "High-Value",
            Segment::Regular => "Regular",
            Segment::Occasional => "Occasional",
            Segment::AtRisk => "At-Risk",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One customer's aggregate purchase behaviour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RfmRecord {
    /// Days since the last purchase.
    pub recency: f64,
    /// Number of purchases.
    pub frequency: u32,
    /// Total amount spent.
    pub monetary: f64,
}

impl RfmRecord {
    /// Validate and build a record.
    pub fn new(recency: f64, frequency: u32, monetary: f64) -> Result<Self> {
        if !recency.is_finite() || recency < 0.0 {
            return Err(Error::invalid(
                "recency",
                format!("must be a finite number of days >= 0, got {recency}"),
            ));
        }
        if frequency < 1 {
            return Err(Error::invalid("frequency", "must be at least 1"));
        }
        if !monetary.is_finite() || monetary <= 0.0 {
            return Err(Error::invalid(
                "monetary",
                format!("must be a finite amount > 0, got {monetary}"),
            ));
        }
        Ok(Self {
            recency,
            frequency,
            monetary,
        })
    }

    /// Feature vector in model order.
    pub fn features(&self) -> [f64; N_FEATURES] {
        [self.recency, f64::from(self.frequency), self.monetary]
    }
}

impl FromStr for RfmRecord {
    type Err = Error;

    /// Parse `"recency,frequency,monetary"`, e.g. `"30,10,500.0"`.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != N_FEATURES {
            return Err(Error::invalid(
                "rfm",
                format!("expected 'recency,frequency,monetary', got '{s}'"),
            ));
        }

        let recency: f64 = parts[0]
            .parse()
            .map_err(|_| Error::invalid("recency", format!("not a number: '{}'", parts[0])))?;
        let frequency: u32 = parts[1].parse().map_err(|_| {
            Error::invalid(
                "frequency",
                format!("not a whole number of purchases: '{}'", parts[1]),
            )
        })?;
        let monetary: f64 = parts[2]
            .parse()
            .map_err(|_| Error::invalid("monetary", format!("not a number: '{}'", parts[2])))?;

        Self::new(recency, frequency, monetary)
    }
}

/// A historical record tagged with the cluster the offline fit assigned it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusteredRecord {
    pub rfm: RfmRecord,
    pub cluster: ClusterId,
}

/// Size and mean RFM values of one cluster in the historical dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterProfile {
    pub cluster: ClusterId,
    pub size: usize,
    pub mean_recency: f64,
    pub mean_frequency: f64,
    pub mean_monetary: f64,
}

/// Per-cluster statistics, in ascending cluster id order.
pub fn cluster_profiles(records: &[ClusteredRecord]) -> Vec<ClusterProfile> {
    // (count, sum recency, sum frequency, sum monetary)
    let mut sums: BTreeMap<ClusterId, (usize, f64, f64, f64)> = BTreeMap::new();
    for record in records {
        let entry = sums.entry(record.cluster).or_insert((0, 0.0, 0.0, 0.0));
        entry.0 += 1;
        entry.1 += record.rfm.recency;
        entry.2 += f64::from(record.rfm.frequency);
        entry.3 += record.rfm.monetary;
    }

    sums.into_iter()
        .map(|(cluster, (size, recency, frequency, monetary))| {
            let n = size as f64;
            ClusterProfile {
                cluster,
                size,
                mean_recency: recency / n,
                mean_frequency: frequency / n,
                mean_monetary: monetary / n,
            }
        })
        .collect()
}

/// Fixed mapping from cluster id to segment, built once per process.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMapping {
    /// Clusters in rank order (highest mean monetary first).
    ranked: Vec<(ClusterId, Segment)>,
    by_cluster: BTreeMap<ClusterId, Segment>,
}

impl LabelMapping {
    /// Rank clusters by descending mean monetary value and assign `ladder` positionally.
    ///
    /// The number of distinct clusters in `records` must equal `ladder.len()`.
    /// Clusters with equal means keep ascending id order.
    pub fn build(records: &[ClusteredRecord], ladder: &[Segment]) -> Result<Self> {
        if ladder.is_empty() {
            return Err(Error::Configuration(
                "segment ladder must name at least one segment".to_string(),
            ));
        }
        if records.is_empty() {
            return Err(Error::Configuration(
                "cannot derive segment labels from an empty RFM history".to_string(),
            ));
        }

        let mut profiles = cluster_profiles(records);
        if profiles.len() != ladder.len() {
            return Err(Error::Configuration(format!(
                "RFM history contains {} distinct clusters, expected {}",
                profiles.len(),
                ladder.len()
            )));
        }

        profiles.sort_by(|a, b| b.mean_monetary.total_cmp(&a.mean_monetary));

        let ranked: Vec<(ClusterId, Segment)> = profiles
            .iter()
            .zip(ladder.iter().copied())
            .map(|(profile, segment)| (profile.cluster, segment))
            .collect();
        let by_cluster = ranked.iter().copied().collect();

        Ok(Self { ranked, by_cluster })
    }

    /// Segment of `cluster`, if it was labelled.
    pub fn get(&self, cluster: ClusterId) -> Option<Segment> {
        self.by_cluster.get(&cluster).copied()
    }

    /// Cluster carrying `segment`, if any.
    pub fn cluster_for(&self, segment: Segment) -> Option<ClusterId> {
        self.ranked
            .iter()
            .find(|(_, s)| *s == segment)
            .map(|(cluster, _)| *cluster)
    }

    /// `(cluster, segment)` pairs, highest mean monetary first.
    pub fn iter(&self) -> impl Iterator<Item = (ClusterId, Segment)> + '_ {
        self.ranked.iter().copied()
    }

    /// Number of labelled clusters.
    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    /// True when no cluster is labelled.
    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }
}

/// Build the mapping with the default four-segment ladder.
pub fn build_label_mapping(records: &[ClusteredRecord]) -> Result<LabelMapping> {
    LabelMapping::build(records, &Segment::ALL)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(cluster: ClusterId, monetary: f64) -> ClusteredRecord {
        ClusteredRecord {
            rfm: RfmRecord::new(10.0, 2, monetary).unwrap(),
            cluster,
        }
    }

    /// Two records per cluster averaging to the requested means.
    fn history(means: &[(ClusterId, f64)]) -> Vec<ClusteredRecord> {
        means
            .iter()
            .flat_map(|&(cluster, mean)| [record(cluster, mean * 0.5), record(cluster, mean * 1.5)])
            .collect()
    }

    #[test]
    fn test_ranks_clusters_by_mean_monetary() {
        let records = history(&[(0, 50.0), (1, 500.0), (2, 200.0), (3, 20.0)]);
        let mapping = build_label_mapping(&records).unwrap();

        assert_eq!(mapping.get(1), Some(Segment::HighValue));
        assert_eq!(mapping.get(2), Some(Segment::Regular));
        assert_eq!(mapping.get(0), Some(Segment::Occasional));
        assert_eq!(mapping.get(3), Some(Segment::AtRisk));
        assert_eq!(mapping.get(4), None);

        let ranked: Vec<ClusterId> = mapping.iter().map(|(c, _)| c).collect();
        assert_eq!(ranked, vec![1, 2, 0, 3]);
        assert_eq!(mapping.cluster_for(Segment::AtRisk), Some(3));
    }

    #[test]
    fn test_rejects_wrong_cluster_count() {
        let three = history(&[(0, 50.0), (1, 500.0), (2, 200.0)]);
        assert!(matches!(
            build_label_mapping(&three),
            Err(Error::Configuration(_))
        ));

        let five = history(&[(0, 1.0), (1, 2.0), (2, 3.0), (3, 4.0), (4, 5.0)]);
        assert!(matches!(
            build_label_mapping(&five),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_rejects_empty_inputs() {
        assert!(build_label_mapping(&[]).is_err());
        let records = history(&[(0, 10.0)]);
        assert!(LabelMapping::build(&records, &[]).is_err());
    }

    #[test]
    fn test_custom_ladder() {
        let records = history(&[(7, 30.0), (3, 300.0)]);
        let mapping =
            LabelMapping::build(&records, &[Segment::HighValue, Segment::AtRisk]).unwrap();
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.get(3), Some(Segment::HighValue));
        assert_eq!(mapping.get(7), Some(Segment::AtRisk));
    }

    #[test]
    fn test_tied_means_keep_cluster_order() {
        let records = history(&[(2, 100.0), (0, 100.0), (1, 900.0), (3, 10.0)]);
        let mapping = build_label_mapping(&records).unwrap();
        assert_eq!(mapping.get(0), Some(Segment::Regular));
        assert_eq!(mapping.get(2), Some(Segment::Occasional));
    }

    #[test]
    fn test_cluster_profiles() {
        let records = vec![
            ClusteredRecord {
                rfm: RfmRecord::new(10.0, 1, 100.0).unwrap(),
                cluster: 1,
            },
            ClusteredRecord {
                rfm: RfmRecord::new(30.0, 3, 300.0).unwrap(),
                cluster: 1,
            },
            ClusteredRecord {
                rfm: RfmRecord::new(5.0, 8, 40.0).unwrap(),
                cluster: 0,
            },
        ];

        let profiles = cluster_profiles(&records);
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].cluster, 0);
        assert_eq!(profiles[0].size, 1);
        assert_eq!(profiles[1].size, 2);
        assert!((profiles[1].mean_recency - 20.0).abs() < 1e-12);
        assert!((profiles[1].mean_frequency - 2.0).abs() < 1e-12);
        assert!((profiles[1].mean_monetary - 200.0).abs() < 1e-12);
    }

    #[test]
    fn test_parse_rfm_values() {
        let rfm: RfmRecord = "30,10,500.0".parse().unwrap();
        assert_eq!(rfm, RfmRecord::new(30.0, 10, 500.0).unwrap());

        let spaced: RfmRecord = " 0 , 1 , 1.5 ".parse().unwrap();
        assert_eq!(spaced.features(), [0.0, 1.0, 1.5]);

        assert!("invalid".parse::<RfmRecord>().is_err());
        assert!("30,2.5,500".parse::<RfmRecord>().is_err());
        assert!("30,10".parse::<RfmRecord>().is_err());
    }

    #[test]
    fn test_rfm_validation() {
        assert!(RfmRecord::new(0.0, 1, 0.01).is_ok());
        assert!(RfmRecord::new(-1.0, 1, 10.0).is_err());
        assert!(RfmRecord::new(1.0, 0, 10.0).is_err());
        assert!(RfmRecord::new(1.0, 1, 0.0).is_err());
        assert!(RfmRecord::new(f64::NAN, 1, 10.0).is_err());
        assert!(RfmRecord::new(1.0, 1, f64::INFINITY).is_err());
    }

    #[test]
    fn test_segment_display() {
        let names: Vec<String> = Segment::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(names, ["High-Value", "Regular", "Occasional", "At-Risk"]);
    }
}
