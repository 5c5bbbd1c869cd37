//! Product records and mesh-visibility customization.
//!
//! A product may carry a table of parameters. For every selectable value a
//! parameter lists node names to hide and to show. Applying a selection looks
//! the directive up and toggles the first node with each name in the current
//! model.
//!
//! Mismatches between rule tables and assets are expected (assets get swapped
//! without their tables being updated), so unknown parameters, unknown values
//! and missing nodes never fail. They show up in the returned [`RuleOutcome`].

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer, de::Error as _};

use crate::data_structures::scene_graph::SceneNode;

/// One entry of the product catalogue, as far as the viewer is concerned.
#[derive(Clone, Debug, Deserialize)]
pub struct Product {
    #[serde(deserialize_with = "scalar_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub filename: String,
    #[serde(default)]
    pub customization: Option<Customization>,
}

impl Product {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The rule table, if customization is present and enabled.
    pub fn rules(&self) -> Option<&RuleTable> {
        self.customization
            .as_ref()
            .filter(|c| c.enabled)
            .map(|c| &c.parameters)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Customization {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub parameters: RuleTable,
}

/// Parameter id -> definition. Ordered so defaults are applied deterministically.
pub type RuleTable = BTreeMap<String, ParameterDefinition>;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ParameterDefinition {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub options: Vec<ParameterOption>,
    #[serde(default, deserialize_with = "optional_scalar_string")]
    pub default: Option<String>,
    #[serde(default)]
    pub visibility_rules: HashMap<String, VisibilityDirective>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ParameterOption {
    #[serde(deserialize_with = "scalar_string")]
    pub value: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct VisibilityDirective {
    #[serde(default)]
    pub hide: Vec<String>,
    #[serde(default)]
    pub show: Vec<String>,
}

/// Catalogues write option values as strings, numbers or booleans; rules key them as strings.
fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => Err(D::Error::custom(format!("expected a scalar, found {other}"))),
    }
}

fn optional_scalar_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s)),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        serde_json::Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(D::Error::custom(format!("expected a scalar, found {other}"))),
    }
}

/// What a rule application did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleOutcome {
    /// False when the table has no directive for the parameter/value pair.
    pub matched: bool,
    pub hidden: Vec<String>,
    pub shown: Vec<String>,
    /// Node names the directive mentions but the model does not contain.
    pub missing: Vec<String>,
}

/// Looks up the directive for `parameter_id` = `selected_value`.
pub fn directive<'a>(
    rules: &'a RuleTable,
    parameter_id: &str,
    selected_value: &str,
) -> Option<&'a VisibilityDirective> {
    rules
        .get(parameter_id)?
        .visibility_rules
        .get(selected_value)
}

/**
 * Applies one customization event to `model`.
 *
 * Hides are applied before shows, so a node named in both ends up visible.
 */
pub fn apply_rule(
    model: &mut SceneNode,
    rules: &RuleTable,
    parameter_id: &str,
    selected_value: &str,
) -> RuleOutcome {
    let Some(rule) = directive(rules, parameter_id, selected_value) else {
        log::debug!("no visibility rule for {parameter_id}={selected_value}");
        return RuleOutcome::default();
    };
    let mut outcome = RuleOutcome {
        matched: true,
        ..Default::default()
    };
    for (names, visible) in [(&rule.hide, false), (&rule.show, true)] {
        for name in names {
            match model.find_by_name_mut(name) {
                Some(node) => {
                    node.visible = visible;
                    if visible {
                        outcome.shown.push(name.clone());
                    } else {
                        outcome.hidden.push(name.clone());
                    }
                }
                None => {
                    log::info!(
                        "customization {parameter_id}={selected_value} targets missing node {name}"
                    );
                    outcome.missing.push(name.clone());
                }
            }
        }
    }
    outcome
}

/// Applies the `default` value of every parameter that declares one.
pub fn apply_defaults(model: &mut SceneNode, rules: &RuleTable) -> Vec<RuleOutcome> {
    rules
        .iter()
        .filter_map(|(id, definition)| {
            let value = definition.default.as_deref()?;
            Some(apply_rule(model, rules, id, value))
        })
        .collect()
}
