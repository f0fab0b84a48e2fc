//! Item-based product recommendations from a precomputed similarity matrix.

use std::collections::HashMap;

use ndarray::Array2;

use crate::error::{Error, Result};

/// Number of recommendations returned when the caller does not ask for a count.
pub const DEFAULT_TOP_N: usize = 5;

/// A recommended product and its similarity to the queried one.
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    /// Product key.
    pub product: String,
    /// Similarity to the queried product.
    pub score: f64,
}

/// Square product-by-product similarity table.
///
/// Rows and columns share one key order. Symmetry is assumed, not checked.
#[derive(Debug, Clone)]
pub struct SimilarityMatrix {
    products: Vec<String>,
    index: HashMap<String, usize>,
    scores: Array2<f64>,
}

impl SimilarityMatrix {
    /// Build from product keys and an `n x n` score matrix in the same order.
    ///
    /// Fails on a shape mismatch or a duplicated key.
    pub fn new(products: Vec<String>, scores: Array2<f64>) -> Result<Self> {
        let n = products.len();
        if scores.nrows() != n || scores.ncols() != n {
            return Err(Error::Configuration(format!(
                "similarity matrix for {n} products has shape {:?}",
                scores.shape()
            )));
        }

        let mut index = HashMap::with_capacity(n);
        for (i, product) in products.iter().enumerate() {
            if index.insert(product.clone(), i).is_some() {
                return Err(Error::Configuration(format!(
                    "product `{product}` appears twice in the similarity matrix"
                )));
            }
        }

        Ok(Self {
            products,
            index,
            scores,
        })
    }

    /// Number of products.
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// True when the matrix has no products.
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// True if `product` has a row in the matrix.
    pub fn contains(&self, product: &str) -> bool {
        self.index.contains_key(product)
    }

    /// Product keys in matrix order.
    pub fn products(&self) -> &[String] {
        &self.products
    }

    /// Similarity of `a` to `b`, if both are known.
    pub fn score(&self, a: &str, b: &str) -> Option<f64> {
        let i = *self.index.get(a)?;
        let j = *self.index.get(b)?;
        Some(self.scores[[i, j]])
    }

    /// Top `top_n` neighbours of `product` with their scores, most similar first.
    ///
    /// Unknown products yield an empty list. The product itself and neighbours
    /// with a NaN score are never returned. Equal scores keep matrix order, which
    /// callers should treat as unspecified.
    pub fn recommend_with_scores(&self, product: &str, top_n: usize) -> Result<Vec<Recommendation>> {
        if top_n < 1 {
            return Err(Error::invalid("top_n", "must be at least 1"));
        }

        let Some(&target) = self.index.get(product) else {
            tracing::debug!(product, "product not in similarity matrix");
            return Ok(Vec::new());
        };

        let mut neighbours: Vec<(usize, f64)> = self
            .scores
            .column(target)
            .iter()
            .copied()
            .enumerate()
            .filter(|&(i, score)| i != target && !score.is_nan())
            .collect();

        // stable: ties stay in column order
        neighbours.sort_by(|a, b| b.1.total_cmp(&a.1));
        neighbours.truncate(top_n);

        Ok(neighbours
            .into_iter()
            .map(|(i, score)| Recommendation {
                product: self.products[i].clone(),
                score,
            })
            .collect())
    }

    /// Top `top_n` neighbour names of `product`, most similar first.
    pub fn recommend(&self, product: &str, top_n: usize) -> Result<Vec<String>> {
        Ok(self
            .recommend_with_scores(product, top_n)?
            .into_iter()
            .map(|r| r.product)
            .collect())
    }
}
