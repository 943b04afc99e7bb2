//! XGBoost JSON and UBJSON model support.
//!
//! Parses the document written by `Booster.save_model`, either as JSON text
//! (`*.json`) or as UBJSON (`*.ubj` and, since XGBoost 2.0, any file name
//! without an extension such as `xgboost-model`), and evaluates it the
//! way XGBoost's CPU predictor does: features are compared in single
//! precision, leaf values are summed onto the margin base score and the
//! objective's inverse link is applied last.
//!
//! Only single-output regression-style models are accepted. Multi-class and
//! multi-target models, categorical splits and the legacy binary encoding
//! are rejected at load time.

use crate::error::{EvalError, Result};
use crate::models::predictor::{Prediction, Predictor};
use crate::models::ubjson::{self, UbjsonError};
use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

// =============================================================================
// Foreign JSON types
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
struct XgbModel {
    learner: Learner,
}

#[derive(Debug, Clone, Deserialize)]
struct Learner {
    learner_model_param: LearnerModelParam,
    gradient_booster: GradientBooster,
    objective: ObjectiveName,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
struct LearnerModelParam {
    #[serde(deserialize_with = "deserialize_base_score")]
    base_score: f32,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    num_class: i64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    num_feature: i64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default = "default_num_target")]
    num_target: i64,
}

fn default_num_target() -> i64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
struct ObjectiveName {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
enum GradientBooster {
    Gbtree {
        model: ModelTrees,
    },
    Gblinear {
        model: LinearWeights,
    },
    Dart {
        gbtree: DartTrees,
        weight_drop: Vec<f32>,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct DartTrees {
    model: ModelTrees,
}

#[derive(Debug, Clone, Deserialize)]
struct ModelTrees {
    trees: Vec<XgbTree>,
    #[serde(default)]
    tree_info: Vec<i32>,
}

#[derive(Debug, Clone, Deserialize)]
struct LinearWeights {
    weights: Vec<f32>,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
struct TreeParam {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    num_nodes: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct XgbTree {
    tree_param: TreeParam,
    left_children: Vec<i32>,
    right_children: Vec<i32>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f32>,
    #[serde(deserialize_with = "deserialize_flags")]
    default_left: Vec<bool>,
    #[serde(default)]
    split_type: Vec<i32>,
}

/// `base_score` appears as a number, a string (`"5E-1"`) or, since XGBoost
/// 3.0, a bracketed vector (`"[5E-1]"`).
fn deserialize_base_score<'de, D>(deserializer: D) -> std::result::Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as SerdeError;

    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .map(|f| f as f32)
            .ok_or_else(|| SerdeError::custom("invalid base_score")),
        Value::String(s) => {
            let t = s.trim().trim_start_matches('[').trim_end_matches(']');
            let first = t.split(',').next().unwrap_or_default().trim();
            first
                .parse::<f32>()
                .map_err(|_| SerdeError::custom(format!("cannot parse base_score '{s}'")))
        }
        Value::Array(values) => match values.as_slice() {
            [Value::Number(n)] => n
                .as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| SerdeError::custom("invalid base_score")),
            _ => Err(SerdeError::custom("base_score must hold exactly one number")),
        },
        _ => Err(SerdeError::custom("base_score must be a number or string")),
    }
}

/// `default_left` is written as 0/1 integers by the JSON writer and as
/// booleans by some converters.
fn deserialize_flags<'de, D>(deserializer: D) -> std::result::Result<Vec<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as SerdeError;

    Vec::<Value>::deserialize(deserializer)?
        .into_iter()
        .map(|v| match v {
            Value::Bool(b) => Ok(b),
            Value::Number(n) => Ok(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
            other => Err(SerdeError::custom(format!("invalid flag value {other}"))),
        })
        .collect()
}

// =============================================================================
// Load errors
// =============================================================================

/// Reasons an XGBoost model document cannot be turned into a predictor
#[derive(Debug, Error)]
pub enum XgbModelError {
    #[error("unrecognized model encoding; expected JSON or UBJSON (the legacy binary format is not supported)")]
    UnsupportedEncoding,
    #[error("malformed UBJSON model: {0}")]
    Ubjson(#[from] UbjsonError),
    #[error("malformed model document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported objective '{0}'")]
    UnsupportedObjective(String),
    #[error("multi-output models are not supported (num_class={num_class}, num_target={num_target})")]
    MultiOutput { num_class: i64, num_target: i64 },
    #[error("invalid feature count {0}")]
    FeatureCount(i64),
    #[error("tree {tree} has no nodes")]
    EmptyTree { tree: usize },
    #[error("tree {tree}: '{field}' has {len} entries for {num_nodes} nodes")]
    ArrayLength {
        tree: usize,
        field: &'static str,
        len: usize,
        num_nodes: usize,
    },
    #[error("tree {tree}: node {node} references invalid child {child}")]
    InvalidChild { tree: usize, node: usize, child: i32 },
    #[error("tree {tree}: node {node} splits on feature {feature} but the model has {num_features}")]
    InvalidFeature {
        tree: usize,
        node: usize,
        feature: i64,
        num_features: usize,
    },
    #[error("tree {tree}: node {node} uses a categorical split")]
    CategoricalSplit { tree: usize, node: usize },
    #[error("tree {tree} belongs to output group {group}; only single-output models are supported")]
    TreeGroup { tree: usize, group: i32 },
    #[error("dart model has {weights} drop weights for {trees} trees")]
    DartWeights { weights: usize, trees: usize },
    #[error("gblinear weights length {actual} doesn't match num_feature + 1 = {expected}")]
    LinearWeights { expected: usize, actual: usize },
}

// =============================================================================
// Native representation
// =============================================================================

/// Inverse link applied to the summed margin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Identity,
    Sigmoid,
    Exp,
}

impl Link {
    fn for_objective(objective: &str) -> std::result::Result<Self, XgbModelError> {
        match objective {
            "reg:squarederror" | "reg:linear" | "reg:squaredlogerror" | "reg:pseudohubererror"
            | "reg:absoluteerror" | "reg:quantileerror" => Ok(Link::Identity),
            "reg:logistic" | "binary:logistic" => Ok(Link::Sigmoid),
            "count:poisson" | "reg:gamma" | "reg:tweedie" => Ok(Link::Exp),
            other => Err(XgbModelError::UnsupportedObjective(other.to_string())),
        }
    }

    /// Map a base score from output space into margin space
    fn to_margin(self, base_score: f32) -> f32 {
        match self {
            Link::Identity => base_score,
            Link::Sigmoid => {
                let p = base_score.clamp(1e-7, 1.0 - 1e-7);
                (p / (1.0 - p)).ln()
            }
            Link::Exp => base_score.max(1e-7).ln(),
        }
    }

    fn apply(self, margin: f32) -> f32 {
        match self {
            Link::Identity => margin,
            Link::Sigmoid => 1.0 / (1.0 + (-margin).exp()),
            Link::Exp => margin.exp(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Split {
        feature: usize,
        threshold: f32,
        default_left: bool,
        left: usize,
        right: usize,
    },
    Leaf(f32),
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn compile(
        tree_idx: usize,
        tree: &XgbTree,
        num_features: usize,
    ) -> std::result::Result<Self, XgbModelError> {
        let num_nodes = usize::try_from(tree.tree_param.num_nodes).unwrap_or(0);
        if num_nodes == 0 {
            return Err(XgbModelError::EmptyTree { tree: tree_idx });
        }

        let lengths = [
            ("left_children", tree.left_children.len()),
            ("right_children", tree.right_children.len()),
            ("split_indices", tree.split_indices.len()),
            ("split_conditions", tree.split_conditions.len()),
            ("default_left", tree.default_left.len()),
        ];
        for (field, len) in lengths {
            if len < num_nodes {
                return Err(XgbModelError::ArrayLength {
                    tree: tree_idx,
                    field,
                    len,
                    num_nodes,
                });
            }
        }

        let mut nodes = Vec::with_capacity(num_nodes);
        for node in 0..num_nodes {
            let left = tree.left_children[node];
            if left == -1 {
                nodes.push(Node::Leaf(tree.split_conditions[node]));
                continue;
            }

            if tree.split_type.get(node).copied().unwrap_or(0) != 0 {
                return Err(XgbModelError::CategoricalSplit {
                    tree: tree_idx,
                    node,
                });
            }

            let right = tree.right_children[node];
            // Children are always allocated after their parent, which also
            // rules out cycles during traversal.
            let child_index = |child: i32| -> std::result::Result<usize, XgbModelError> {
                match usize::try_from(child) {
                    Ok(c) if c > node && c < num_nodes => Ok(c),
                    _ => Err(XgbModelError::InvalidChild {
                        tree: tree_idx,
                        node,
                        child,
                    }),
                }
            };
            let left = child_index(left)?;
            let right = child_index(right)?;

            let feature = tree.split_indices[node];
            let feature = match usize::try_from(feature) {
                Ok(f) if f < num_features => f,
                _ => {
                    return Err(XgbModelError::InvalidFeature {
                        tree: tree_idx,
                        node,
                        feature,
                        num_features,
                    })
                }
            };

            nodes.push(Node::Split {
                feature,
                threshold: tree.split_conditions[node],
                default_left: tree.default_left[node],
                left,
                right,
            });
        }

        Ok(Self { nodes })
    }

    fn leaf_value(&self, row: ArrayView1<'_, f64>) -> f32 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf(value) => return value,
                Node::Split {
                    feature,
                    threshold,
                    default_left,
                    left,
                    right,
                } => {
                    let value = row[feature] as f32;
                    let go_left = if value.is_nan() {
                        default_left
                    } else {
                        value < threshold
                    };
                    idx = if go_left { left } else { right };
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
enum Booster {
    Trees {
        trees: Vec<Tree>,
        /// DART drop weights, one per tree
        weights: Option<Vec<f32>>,
    },
    Linear {
        weights: Vec<f32>,
        bias: f32,
    },
}

/// Predictor backed by a parsed XGBoost JSON model
#[derive(Debug, Clone)]
pub struct XgboostPredictor {
    booster: Booster,
    num_features: usize,
    base_margin: f32,
    link: Link,
    objective: String,
}

impl XgboostPredictor {
    /// Read and compile a model file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| EvalError::io(path, e))?;
        let predictor =
            Self::from_slice(&bytes).map_err(|e| EvalError::model_load(path, e.to_string()))?;

        info!(
            path = %path.display(),
            objective = %predictor.objective,
            features = predictor.num_features,
            trees = predictor.num_trees(),
            "XGBoost model loaded"
        );
        Ok(predictor)
    }

    /// Parse and compile a JSON or UBJSON model document
    pub fn from_slice(bytes: &[u8]) -> std::result::Result<Self, XgbModelError> {
        let model: XgbModel = if ubjson::is_object(bytes) {
            serde_json::from_value(ubjson::from_slice(bytes)?)?
        } else {
            let first = bytes.iter().find(|b| !b.is_ascii_whitespace());
            if first != Some(&b'{') {
                return Err(XgbModelError::UnsupportedEncoding);
            }
            serde_json::from_slice(bytes)?
        };
        Self::compile(model.learner)
    }

    fn compile(learner: Learner) -> std::result::Result<Self, XgbModelError> {
        let param = &learner.learner_model_param;
        if param.num_class > 1 || param.num_target > 1 {
            return Err(XgbModelError::MultiOutput {
                num_class: param.num_class,
                num_target: param.num_target,
            });
        }
        let num_features = usize::try_from(param.num_feature)
            .ok()
            .filter(|&n| n > 0)
            .ok_or(XgbModelError::FeatureCount(param.num_feature))?;

        let link = Link::for_objective(&learner.objective.name)?;
        let base_margin = link.to_margin(param.base_score);

        let booster = match learner.gradient_booster {
            GradientBooster::Gbtree { model } => Booster::Trees {
                trees: compile_trees(&model, num_features)?,
                weights: None,
            },
            GradientBooster::Dart {
                gbtree,
                weight_drop,
            } => {
                let trees = compile_trees(&gbtree.model, num_features)?;
                if weight_drop.len() != trees.len() {
                    return Err(XgbModelError::DartWeights {
                        weights: weight_drop.len(),
                        trees: trees.len(),
                    });
                }
                Booster::Trees {
                    trees,
                    weights: Some(weight_drop),
                }
            }
            GradientBooster::Gblinear { model } => {
                let expected = num_features + 1;
                if model.weights.len() != expected {
                    return Err(XgbModelError::LinearWeights {
                        expected,
                        actual: model.weights.len(),
                    });
                }
                let mut weights = model.weights;
                let bias = weights.pop().unwrap_or(0.0);
                Booster::Linear { weights, bias }
            }
        };

        debug!(
            objective = %learner.objective.name,
            link = ?link,
            base_margin,
            "Compiled XGBoost model"
        );

        Ok(Self {
            booster,
            num_features,
            base_margin,
            link,
            objective: learner.objective.name,
        })
    }

    pub fn link(&self) -> Link {
        self.link
    }

    /// Number of trees, zero for linear boosters
    pub fn num_trees(&self) -> usize {
        match &self.booster {
            Booster::Trees { trees, .. } => trees.len(),
            Booster::Linear { .. } => 0,
        }
    }

    fn margin(&self, row: ArrayView1<'_, f64>) -> f32 {
        match &self.booster {
            Booster::Trees { trees, weights } => {
                let mut margin = self.base_margin;
                for (i, tree) in trees.iter().enumerate() {
                    let weight = weights.as_ref().map_or(1.0, |w| w[i]);
                    margin += weight * tree.leaf_value(row);
                }
                margin
            }
            Booster::Linear { weights, bias } => {
                let mut margin = self.base_margin + bias;
                for (w, &x) in weights.iter().zip(row.iter()) {
                    let x = x as f32;
                    if !x.is_nan() {
                        margin += w * x;
                    }
                }
                margin
            }
        }
    }
}

fn compile_trees(
    model: &ModelTrees,
    num_features: usize,
) -> std::result::Result<Vec<Tree>, XgbModelError> {
    if let Some((tree, &group)) = model.tree_info.iter().enumerate().find(|&(_, &g)| g != 0) {
        return Err(XgbModelError::TreeGroup { tree, group });
    }
    model
        .trees
        .iter()
        .enumerate()
        .map(|(i, tree)| Tree::compile(i, tree, num_features))
        .collect()
}

impl Predictor for XgboostPredictor {
    fn name(&self) -> &str {
        "xgboost"
    }

    fn num_features(&self) -> usize {
        self.num_features
    }

    fn predict_rows(&self, features: ArrayView2<'_, f64>) -> Result<Prediction> {
        Ok(features
            .rows()
            .into_iter()
            .map(|row| self.link.apply(self.margin(row)) as f64)
            .collect())
    }
}
