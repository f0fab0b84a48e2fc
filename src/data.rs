//! Loading the tabular artifacts (RFM history, similarity matrix, product catalog) with Polars

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use ndarray::Array2;
use polars::prelude::*;

use crate::error::{Error, Result};
use crate::recommend::SimilarityMatrix;
use crate::segment::{ClusteredRecord, RfmRecord};

/// Deduplicated, sorted product names offered for recommendation lookups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductCatalog {
    products: Vec<String>,
}

impl ProductCatalog {
    /// Build from raw names, dropping duplicates.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let unique: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        Self {
            products: unique.into_iter().collect(),
        }
    }

    /// Product names in sorted order.
    pub fn products(&self) -> &[String] {
        &self.products
    }

    /// Number of distinct products.
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// True when the catalog has no products.
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Case-insensitive substring search, in catalog order.
    pub fn search<'a>(&'a self, query: &str) -> impl Iterator<Item = &'a String> + 'a {
        let needle = query.to_lowercase();
        self.products
            .iter()
            .filter(move |p| p.to_lowercase().contains(&needle))
    }

    /// Catalog products that have no row in the similarity matrix.
    pub fn uncovered<'a>(
        &'a self,
        matrix: &'a SimilarityMatrix,
    ) -> impl Iterator<Item = &'a String> + 'a {
        self.products.iter().filter(move |p| !matrix.contains(p))
    }
}

/// One row of a batch prediction file, validated independently of the others.
#[derive(Debug)]
pub struct RfmRequest {
    /// `CustomerID` when present, otherwise the 1-based row number.
    pub key: String,
    pub rfm: Result<RfmRecord>,
}

/// Read a CSV file with a header row.
///
/// Column types are inferred from every row, not a leading sample, so a late
/// decimal or alphanumeric value widens the column instead of failing the read.
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    read_csv_with(path, csv_options())
}

fn csv_options() -> CsvReadOptions {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
}

fn read_csv_with(path: &Path, options: CsvReadOptions) -> Result<DataFrame> {
    options
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|source| dataset_error(path, source))
}

/// Load the historical RFM dataset with the cluster assigned to every customer.
///
/// Required columns: `Recency`, `Frequency`, `Monetary`, `Cluster`.
pub fn load_rfm_history(path: &Path) -> Result<Vec<ClusteredRecord>> {
    let df = read_csv(path)?;
    let rows = rfm_rows(&df).map_err(|source| dataset_error(path, source))?;
    let clusters = df
        .column("Cluster")
        .and_then(f64_values)
        .map_err(|source| dataset_error(path, source))?;

    let mut records = Vec::with_capacity(df.height());
    for (row, ((recency, frequency, monetary), cluster)) in rows.into_iter().zip(clusters).enumerate()
    {
        let invalid = |e: Error| {
            Error::Configuration(format!("{} row {}: {e}", path.display(), row + 1))
        };
        let rfm = to_rfm(recency, frequency, monetary).map_err(invalid)?;
        let cluster = cluster.and_then(to_cluster).ok_or_else(|| {
            invalid(Error::invalid("Cluster", "must be a non-negative integer"))
        })?;
        records.push(ClusteredRecord { rfm, cluster });
    }

    tracing::info!(path = %path.display(), customers = records.len(), "loaded RFM history");
    Ok(records)
}

/// Load a square similarity matrix.
///
/// The first column holds the row keys; every other header is a product key in
/// the same order. Empty cells become NaN.
pub fn load_similarity_matrix(path: &Path) -> Result<SimilarityMatrix> {
    let df = read_csv(path)?;
    let columns = df.get_columns();
    let Some((key_column, score_columns)) = columns.split_first() else {
        return Err(Error::Configuration(format!(
            "similarity matrix `{}` has no columns",
            path.display()
        )));
    };

    let keys: Vec<String> = str_values(key_column)
        .map_err(|source| dataset_error(path, source))?
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect();
    let products: Vec<String> = score_columns.iter().map(|c| c.name().to_string()).collect();

    if keys != products {
        return Err(Error::Configuration(format!(
            "similarity matrix `{}` is not square: row keys differ from column headers",
            path.display()
        )));
    }

    let values = score_columns
        .iter()
        .map(f64_values)
        .collect::<PolarsResult<Vec<_>>>()
        .map_err(|source| dataset_error(path, source))?;

    let n = products.len();
    let scores = Array2::from_shape_fn((n, n), |(row, col)| values[col][row].unwrap_or(f64::NAN));

    let matrix = SimilarityMatrix::new(products, scores)?;
    tracing::info!(path = %path.display(), products = matrix.len(), "loaded similarity matrix");
    Ok(matrix)
}

/// Load product names from the `Description` column of the transactional dataset.
///
/// Only `Description` is parsed; the other transaction columns are skipped.
pub fn load_product_catalog(path: &Path) -> Result<ProductCatalog> {
    let options =
        csv_options().with_columns(Some(Arc::from([PlSmallStr::from_static("Description")])));
    let df = read_csv_with(path, options)?;
    let descriptions = df
        .column("Description")
        .and_then(str_values)
        .map_err(|source| dataset_error(path, source))?;

    let catalog = ProductCatalog::from_names(descriptions.into_iter().flatten());
    tracing::info!(path = %path.display(), products = catalog.len(), "loaded product catalog");
    Ok(catalog)
}

/// Load a batch of RFM inputs. Invalid rows are kept as per-row errors.
///
/// Required columns: `Recency`, `Frequency`, `Monetary`; optional `CustomerID`.
pub fn load_rfm_requests(path: &Path) -> Result<Vec<RfmRequest>> {
    let df = read_csv(path)?;
    let rows = rfm_rows(&df).map_err(|source| dataset_error(path, source))?;
    let ids = match df.column("CustomerID") {
        Ok(column) => Some(str_values(column).map_err(|source| dataset_error(path, source))?),
        Err(_) => None,
    };

    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(row, (recency, frequency, monetary))| {
            let key = ids
                .as_ref()
                .and_then(|ids| ids[row].clone())
                .unwrap_or_else(|| (row + 1).to_string());
            RfmRequest {
                key,
                rfm: to_rfm(recency, frequency, monetary),
            }
        })
        .collect())
}

type RawRfm = (Option<f64>, Option<f64>, Option<f64>);

fn rfm_rows(df: &DataFrame) -> PolarsResult<Vec<RawRfm>> {
    let recency = df.column("Recency").and_then(f64_values)?;
    let frequency = df.column("Frequency").and_then(f64_values)?;
    let monetary = df.column("Monetary").and_then(f64_values)?;

    Ok(recency
        .into_iter()
        .zip(frequency)
        .zip(monetary)
        .map(|((r, f), m)| (r, f, m))
        .collect())
}

fn to_rfm(recency: Option<f64>, frequency: Option<f64>, monetary: Option<f64>) -> Result<RfmRecord> {
    let recency = recency.ok_or_else(|| Error::invalid("recency", "missing value"))?;
    let frequency = frequency.ok_or_else(|| Error::invalid("frequency", "missing value"))?;
    let monetary = monetary.ok_or_else(|| Error::invalid("monetary", "missing value"))?;

    if !frequency.is_finite()
        || frequency.fract() != 0.0
        || frequency < 0.0
        || frequency > f64::from(u32::MAX)
    {
        return Err(Error::invalid(
            "frequency",
            format!("must be a whole number of purchases, got {frequency}"),
        ));
    }

    RfmRecord::new(recency, frequency as u32, monetary)
}

fn f64_values(column: &Column) -> PolarsResult<Vec<Option<f64>>> {
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

fn to_cluster(value: f64) -> Option<usize> {
    if value.is_finite() && value.fract() == 0.0 && value >= 0.0 && value <= usize::MAX as f64 {
        Some(value as usize)
    } else {
        None
    }
}

fn str_values(column: &Column) -> PolarsResult<Vec<Option<String>>> {
    let series = column.as_materialized_series().cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect())
}

fn dataset_error(path: &Path, source: PolarsError) -> Error {
    Error::Dataset {
        path: path.to_path_buf(),
        source,
    }
}
