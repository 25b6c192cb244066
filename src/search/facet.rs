// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Facet aggregation.
//!
//! Each facet field becomes one FT.AGGREGATE pipeline counting documents per
//! distinct value:
//!
//! ```text
//! FT.AGGREGATE idx "<query>"
//!   GROUPBY 1 @city_tag REDUCE COUNT 0 AS count
//!   SORTBY 2 @count DESC
//!   LIMIT 0 100
//! ```
//!
//! Replies are projected into a [`FacetResult`] per field, then shaped into a
//! flat grid (`value (count)` cells) or a parent/child tree with synthetic ids.

use serde::Serialize;

use crate::error::DocResult;
use crate::schema::field_codec::{FieldCodec, VariantRole};
use crate::schema::SchemaItem;
use crate::storage::command::AggregateReply;

const COUNT_PROPERTY: &str = "count";
const TREE_ROOT_LABEL: &str = "Facets";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetValue {
    pub value: String,
    pub count: u64,
}

/// Counts of one facet field, descending by count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetResult {
    pub field_name: String,
    pub field_title: String,
    pub values: Vec<FacetValue>,
}

impl FacetResult {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.values.iter().map(|v| v.count).sum()
    }
}

/// Flat presentation row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetRow {
    pub field_name: String,
    pub field_title: String,
    /// `value (count)` cells.
    pub values: Vec<String>,
}

/// Tree presentation node. The root has no parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetTreeNode {
    pub id: u64,
    pub parent_id: Option<u64>,
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FacetPresentation {
    #[default]
    Flat,
    Tree,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FacetGrid {
    Flat(Vec<FacetRow>),
    Tree(Vec<FacetTreeNode>),
}

/// Facet counts plus their presentation grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetReport {
    pub facets: Vec<FacetResult>,
    pub grid: FacetGrid,
}

/// Alias a facet groups on: the exact variant, or the numeric one.
pub fn facet_alias(codec: &FieldCodec, item: &SchemaItem) -> DocResult<Option<String>> {
    match codec.alias_for(item, VariantRole::Exact)? {
        Some(alias) => Ok(Some(alias)),
        None => codec.alias_for(item, VariantRole::Numeric),
    }
}

/// FT.AGGREGATE arguments (query first) counting values of `alias`.
#[must_use]
pub fn aggregate_args(query: &str, alias: &str, limit: usize) -> Vec<String> {
    vec![
        query.to_string(),
        "GROUPBY".to_string(),
        "1".to_string(),
        format!("@{}", alias),
        "REDUCE".to_string(),
        "COUNT".to_string(),
        "0".to_string(),
        "AS".to_string(),
        COUNT_PROPERTY.to_string(),
        "SORTBY".to_string(),
        "2".to_string(),
        format!("@{}", COUNT_PROPERTY),
        "DESC".to_string(),
        "LIMIT".to_string(),
        "0".to_string(),
        limit.to_string(),
    ]
}

/// Project one aggregation reply; rows with a zero or missing count are dropped.
#[must_use]
pub fn project_facet(item: &SchemaItem, alias: &str, reply: &AggregateReply) -> FacetResult {
    let mut values: Vec<FacetValue> = reply
        .rows
        .iter()
        .filter_map(|row| {
            let value = row.iter().find(|(k, _)| k == alias).map(|(_, v)| v.clone())?;
            let count = row
                .iter()
                .find(|(k, _)| k == COUNT_PROPERTY)
                .and_then(|(_, c)| c.trim().parse::<u64>().ok())
                .unwrap_or(0);
            (count > 0).then_some(FacetValue { value, count })
        })
        .collect();
    values.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));

    FacetResult {
        field_name: item.name.clone(),
        field_title: item.display_title().to_string(),
        values,
    }
}

/// Shape facet results for presentation.
#[must_use]
pub fn build_report(facets: Vec<FacetResult>, presentation: FacetPresentation) -> FacetReport {
    let grid = match presentation {
        FacetPresentation::Flat => FacetGrid::Flat(
            facets
                .iter()
                .map(|f| FacetRow {
                    field_name: f.field_name.clone(),
                    field_title: f.field_title.clone(),
                    values: f
                        .values
                        .iter()
                        .map(|v| format!("{} ({})", v.value, v.count))
                        .collect(),
                })
                .collect(),
        ),
        FacetPresentation::Tree => {
            let mut next_id = 1u64;
            let root_id = next_id;
            let mut nodes = vec![FacetTreeNode {
                id: root_id,
                parent_id: None,
                label: TREE_ROOT_LABEL.to_string(),
                count: facets.iter().map(FacetResult::total).sum(),
            }];
            for facet in &facets {
                next_id += 1;
                let field_id = next_id;
                nodes.push(FacetTreeNode {
                    id: field_id,
                    parent_id: Some(root_id),
                    label: facet.field_title.clone(),
                    count: facet.total(),
                });
                for value in &facet.values {
                    next_id += 1;
                    nodes.push(FacetTreeNode {
                        id: next_id,
                        parent_id: Some(field_id),
                        label: value.value.clone(),
                        count: value.count,
                    });
                }
            }
            FacetGrid::Tree(nodes)
        }
    };
    FacetReport { facets, grid }
}
