//! Attribute schemas and the provider seam the model validates against.

use crate::error::AttributeViolation;
use capstan_domain::{AddressPattern, Attributes, ModelType, ModelValue, PathAddress};
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Runtime impact of changing an attribute on a live resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestartPolicy {
    /// Model-only change.
    #[default]
    None,
    /// The resource's service must restart to pick up the value.
    ResourceServices,
    /// Takes effect only after the whole container reloads.
    Reload,
}

type Predicate = Arc<dyn Fn(&ModelValue) -> Result<(), String> + Send + Sync>;

/// Value constraint checked after type validation.
#[derive(Clone)]
pub enum Constraint {
    /// Inclusive bounds for `INT`/`LONG` values.
    Range { min: i64, max: i64 },
    /// Enumeration of accepted strings.
    OneOf(Vec<String>),
    /// Inclusive bounds on string length or list size.
    Length { min: usize, max: usize },
    Custom(Predicate),
}

impl Debug for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Range { min, max } => write!(f, "Range({min}..={max})"),
            Self::OneOf(values) => f.debug_tuple("OneOf").field(values).finish(),
            Self::Length { min, max } => write!(f, "Length({min}..={max})"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl Constraint {
    fn check(&self, value: &ModelValue) -> Result<(), String> {
        match self {
            Self::Range { min, max } => match value.as_i64() {
                Some(v) if (*min..=*max).contains(&v) => Ok(()),
                Some(v) => Err(format!("{v} is outside {min}..={max}")),
                None => Ok(()),
            },
            Self::OneOf(allowed) => match value.as_str() {
                Some(v) if allowed.iter().any(|a| a == v) => Ok(()),
                Some(v) => Err(format!("'{v}' is not one of {allowed:?}")),
                None => Ok(()),
            },
            Self::Length { min, max } => {
                let len = match value {
                    ModelValue::String(s) => s.chars().count(),
                    ModelValue::List(items) => items.len(),
                    _ => return Ok(()),
                };
                if (*min..=*max).contains(&len) {
                    Ok(())
                } else {
                    Err(format!("length {len} is outside {min}..={max}"))
                }
            },
            Self::Custom(predicate) => predicate(value),
        }
    }
}

/// Declared shape of one attribute.
#[derive(Debug, Clone)]
pub struct AttributeDefinition {
    name: String,
    ty: ModelType,
    required: bool,
    default: Option<ModelValue>,
    constraints: Vec<Constraint>,
    restart: RestartPolicy,
    element: Option<Box<AttributeDefinition>>,
    fields: Vec<AttributeDefinition>,
    capability_reference: Option<String>,
}

impl AttributeDefinition {
    pub fn new(name: impl Into<String>, ty: ModelType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            default: None,
            constraints: Vec::new(),
            restart: RestartPolicy::None,
            element: None,
            fields: Vec::new(),
            capability_reference: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ModelType::String)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, ModelType::Int)
    }

    pub fn long(name: impl Into<String>) -> Self {
        Self::new(name, ModelType::Long)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ModelType::Boolean)
    }

    /// List whose items follow `element`; the element's name is only used in messages.
    pub fn list(name: impl Into<String>, element: Self) -> Self {
        let mut definition = Self::new(name, ModelType::List);
        definition.element = Some(Box::new(element));
        definition
    }

    /// Object with exactly the given fields.
    pub fn object(name: impl Into<String>, fields: impl IntoIterator<Item = Self>) -> Self {
        let mut definition = Self::new(name, ModelType::Object);
        definition.fields = fields.into_iter().collect();
        definition
    }

    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<ModelValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub fn range(mut self, min: i64, max: i64) -> Self {
        self.constraints.push(Constraint::Range { min, max });
        self
    }

    #[must_use]
    pub fn one_of<S: Into<String>>(mut self, allowed: impl IntoIterator<Item = S>) -> Self {
        self.constraints.push(Constraint::OneOf(allowed.into_iter().map(Into::into).collect()));
        self
    }

    #[must_use]
    pub fn length(mut self, min: usize, max: usize) -> Self {
        self.constraints.push(Constraint::Length { min, max });
        self
    }

    #[must_use]
    pub fn validator<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ModelValue) -> Result<(), String> + Send + Sync + 'static,
    {
        self.constraints.push(Constraint::Custom(Arc::new(predicate)));
        self
    }

    #[must_use]
    pub const fn restart(mut self, policy: RestartPolicy) -> Self {
        self.restart = policy;
        self
    }

    /// Marks the value as the name of a dynamic capability under `base`.
    #[must_use]
    pub fn references(mut self, base: impl Into<String>) -> Self {
        self.capability_reference = Some(base.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn model_type(&self) -> ModelType {
        self.ty
    }

    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    #[must_use]
    pub const fn default(&self) -> Option<&ModelValue> {
        self.default.as_ref()
    }

    #[must_use]
    pub const fn restart_policy(&self) -> RestartPolicy {
        self.restart
    }

    #[must_use]
    pub fn capability_reference(&self) -> Option<&str> {
        self.capability_reference.as_deref()
    }

    /// Type-checks and normalizes `value`.
    ///
    /// `INT` values widen to `LONG`; `LONG` values that fit narrow to `INT`. Object values
    /// drop undefined fields.
    pub fn validate(&self, value: &ModelValue) -> Result<ModelValue, AttributeViolation> {
        let violation = |reason: String| AttributeViolation::new(self.name.clone(), reason);

        if !value.is_defined() {
            return if self.required {
                Err(violation("required attribute is undefined".to_owned()))
            } else {
                Ok(ModelValue::Undefined)
            };
        }

        let normalized = match (self.ty, value) {
            (ModelType::Long, ModelValue::Int(i)) => ModelValue::Long(i64::from(*i)),
            (ModelType::Int, ModelValue::Long(l)) => i32::try_from(*l)
                .map(ModelValue::Int)
                .map_err(|_| violation(format!("{l} does not fit in INT")))?,
            (ModelType::List, ModelValue::List(items)) => ModelValue::List(self.validate_items(items)?),
            (ModelType::Object, ModelValue::Object(map)) => {
                ModelValue::Object(self.validate_fields(map)?)
            },
            (expected, other) if other.model_type() == Some(expected) => other.clone(),
            (expected, other) => {
                let found = other.model_type().map_or_else(|| "UNDEFINED".to_owned(), |t| t.to_string());
                return Err(violation(format!("expected {expected}, found {found}")));
            },
        };

        for constraint in &self.constraints {
            constraint.check(&normalized).map_err(violation)?;
        }
        Ok(normalized)
    }

    fn validate_items(&self, items: &[ModelValue]) -> Result<Vec<ModelValue>, AttributeViolation> {
        let Some(element) = &self.element else {
            return Ok(items.to_vec());
        };
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                element.validate(item).map_err(|v| AttributeViolation {
                    attribute: format!("{}[{i}]", self.name),
                    reason: v.reason,
                })
            })
            .collect()
    }

    fn validate_fields(
        &self,
        map: &BTreeMap<String, ModelValue>,
    ) -> Result<BTreeMap<String, ModelValue>, AttributeViolation> {
        if self.fields.is_empty() {
            return Ok(map.clone());
        }
        if let Some(unknown) = map.keys().find(|key| !self.fields.iter().any(|f| &f.name == *key)) {
            return Err(AttributeViolation::new(
                format!("{}.{unknown}", self.name),
                "unknown field",
            ));
        }

        let mut normalized = BTreeMap::new();
        for field in &self.fields {
            let value = map.get(&field.name).unwrap_or(&ModelValue::Undefined);
            let value = field.validate(value).map_err(|v| v.nested_in(&self.name))?;
            if value.is_defined() {
                normalized.insert(field.name.clone(), value);
            }
        }
        Ok(normalized)
    }
}

/// Attribute layout of one resource type.
#[derive(Debug, Clone, Default)]
pub struct ResourceSchema {
    attributes: Vec<AttributeDefinition>,
}

impl ResourceSchema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn attribute(mut self, definition: AttributeDefinition) -> Self {
        self.attributes.push(definition);
        self
    }

    #[must_use]
    pub fn attributes(&self) -> &[AttributeDefinition] {
        &self.attributes
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Validates a full attribute map for an add. Undefined entries are dropped and every
    /// required attribute must be present.
    pub fn validate_add(&self, attributes: &Attributes) -> Result<Attributes, AttributeViolation> {
        if let Some(unknown) = attributes.keys().find(|name| self.get(name).is_none()) {
            return Err(AttributeViolation::new(unknown.clone(), "unknown attribute"));
        }

        let mut normalized = Attributes::new();
        for definition in &self.attributes {
            let value = attributes.get(&definition.name).unwrap_or(&ModelValue::Undefined);
            let value = definition.validate(value)?;
            if value.is_defined() {
                normalized.insert(definition.name.clone(), value);
            }
        }
        Ok(normalized)
    }

    /// Validates a single attribute write.
    pub fn validate_write(&self, name: &str, value: &ModelValue) -> Result<ModelValue, AttributeViolation> {
        self.get(name)
            .ok_or_else(|| AttributeViolation::new(name, "unknown attribute"))?
            .validate(value)
    }

    /// Stored value, else the declared default, else undefined.
    #[must_use]
    pub fn resolve(&self, attributes: &Attributes, name: &str) -> ModelValue {
        attributes
            .get(name)
            .cloned()
            .or_else(|| self.get(name).and_then(|d| d.default.clone()))
            .unwrap_or_default()
    }
}

/// Supplies the schema for a resource address. Consulted on every add and write.
pub trait SchemaProvider: Send + Sync {
    fn schema_for(&self, address: &PathAddress) -> Option<Arc<ResourceSchema>>;
}

/// Lookup table keyed by address patterns; the most specific matching pattern wins.
#[derive(Debug, Clone)]
pub struct PatternTable<T> {
    entries: Vec<(AddressPattern, T)>,
}

impl<T> Default for PatternTable<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T> PatternTable<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` under `pattern`, returning the value it replaced.
    pub fn insert(&mut self, pattern: AddressPattern, value: T) -> Option<T> {
        if let Some(slot) = self.entries.iter_mut().find(|(p, _)| *p == pattern) {
            return Some(std::mem::replace(&mut slot.1, value));
        }
        self.entries.push((pattern, value));
        None
    }

    #[must_use]
    pub fn lookup(&self, address: &PathAddress) -> Option<&T> {
        self.entries
            .iter()
            .filter(|(pattern, _)| pattern.matches(address))
            .max_by_key(|(pattern, _)| pattern.specificity())
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AddressPattern, &T)> {
        self.entries.iter().map(|(p, v)| (p, v))
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }
}

impl SchemaProvider for PatternTable<Arc<ResourceSchema>> {
    fn schema_for(&self, address: &PathAddress) -> Option<Arc<ResourceSchema>> {
        self.lookup(address).cloned()
    }
}
