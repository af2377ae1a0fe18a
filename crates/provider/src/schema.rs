//! Resource schemas
//!
//! A small declarative schema model. It renders into the protocol's
//! `Schema` message and drives config validation, state conformance and the
//! computed/unknown handling done at plan time.

use serde_json::json;

use crate::diagnostics::{AttrPath, Diagnostics};
use crate::state::DynamicValue;
use crate::tfplugin6 as tf;

/// Attribute value type
#[derive(Debug, Clone, PartialEq)]
pub enum AttrType {
    String,
    Number,
    Bool,
    List(Box<AttrType>),
    Set(Box<AttrType>),
    Object(Vec<(String, AttrType)>),
}

impl AttrType {
    /// cty JSON type notation
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AttrType::String => json!("string"),
            AttrType::Number => json!("number"),
            AttrType::Bool => json!("bool"),
            AttrType::List(inner) => json!(["list", inner.to_json()]),
            AttrType::Set(inner) => json!(["set", inner.to_json()]),
            AttrType::Object(fields) => {
                let fields: serde_json::Map<String, serde_json::Value> = fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.to_json()))
                    .collect();
                json!(["object", fields])
            }
        }
    }

    /// Fill missing object attributes with null
    fn conform(&self, value: DynamicValue) -> DynamicValue {
        match (self, value) {
            (AttrType::Object(fields), DynamicValue::Map(mut map)) => {
                let mut out = std::collections::HashMap::with_capacity(fields.len());
                for (name, ty) in fields {
                    let v = map.remove(name).unwrap_or_default();
                    out.insert(name.clone(), ty.conform(v));
                }
                DynamicValue::Map(out)
            }
            (AttrType::List(inner) | AttrType::Set(inner), DynamicValue::List(items)) => {
                DynamicValue::List(items.into_iter().map(|v| inner.conform(v)).collect())
            }
            (_, v) => v,
        }
    }
}

/// Config value constraint
#[derive(Debug, Clone, PartialEq)]
pub enum Validator {
    OneOf(&'static [&'static str]),
    LengthBetween(usize, usize),
    IntBetween(i64, i64),
}

impl Validator {
    /// Error message when `value` violates the constraint. Lists and sets are
    /// checked element by element; null and unknown always pass.
    pub fn check(&self, value: &DynamicValue) -> Option<String> {
        match value {
            DynamicValue::List(items) => items.iter().find_map(|v| self.check(v)),
            DynamicValue::String(s) => match self {
                Validator::OneOf(allowed) if !allowed.contains(&s.as_str()) => Some(format!(
                    "expected one of [{}], got \"{}\"",
                    allowed.join(", "),
                    s
                )),
                Validator::LengthBetween(min, max) => {
                    let len = s.chars().count();
                    (len < *min || len > *max).then(|| {
                        format!("expected length between {} and {}, got {}", min, max, len)
                    })
                }
                _ => None,
            },
            DynamicValue::Number(n) => match self {
                Validator::IntBetween(min, max) => match n.as_i64() {
                    Some(i) if i >= *min && i <= *max => None,
                    Some(i) => Some(format!("expected value between {} and {}, got {}", min, max, i)),
                    None => Some(format!("expected a whole number, got {}", n)),
                },
                _ => None,
            },
            _ => None,
        }
    }
}

/// A schema attribute
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub ty: AttrType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    /// Changing the value replaces the resource
    pub force_new: bool,
    /// Computed value keeps its prior state across updates
    pub stable: bool,
    pub validators: Vec<Validator>,
}

impl Attribute {
    pub fn new(name: &str, ty: AttrType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            description: String::new(),
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            force_new: false,
            stable: false,
            validators: Vec::new(),
        }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, AttrType::String)
    }

    pub fn number(name: &str) -> Self {
        Self::new(name, AttrType::Number)
    }

    pub fn bool(name: &str) -> Self {
        Self::new(name, AttrType::Bool)
    }

    pub fn string_set(name: &str) -> Self {
        Self::new(name, AttrType::Set(Box::new(AttrType::String)))
    }

    pub fn string_list(name: &str) -> Self {
        Self::new(name, AttrType::List(Box::new(AttrType::String)))
    }

    /// The computed `id` attribute every resource carries
    pub fn id() -> Self {
        Self::string("id")
            .computed()
            .stable()
            .describe("Identifier of the resource in Terraform state.")
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn optional_computed(self) -> Self {
        self.optional().computed()
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn stable(mut self) -> Self {
        self.stable = true;
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn one_of(mut self, allowed: &'static [&'static str]) -> Self {
        self.validators.push(Validator::OneOf(allowed));
        self
    }

    pub fn length_between(mut self, min: usize, max: usize) -> Self {
        self.validators.push(Validator::LengthBetween(min, max));
        self
    }

    pub fn int_between(mut self, min: i64, max: i64) -> Self {
        self.validators.push(Validator::IntBetween(min, max));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nesting {
    /// Zero or one object
    Single,
    /// Ordered list of objects
    List,
}

/// A nested configuration block
#[derive(Debug, Clone, PartialEq)]
pub struct NestedBlock {
    pub name: String,
    pub block: Block,
    pub nesting: Nesting,
    pub min_items: i64,
    pub max_items: i64,
}

impl NestedBlock {
    pub fn single(name: &str, block: Block) -> Self {
        Self {
            name: name.to_string(),
            block,
            nesting: Nesting::Single,
            min_items: 0,
            max_items: 0,
        }
    }

    pub fn list(name: &str, block: Block) -> Self {
        Self {
            name: name.to_string(),
            block,
            nesting: Nesting::List,
            min_items: 0,
            max_items: 0,
        }
    }

    pub fn min_items(mut self, n: i64) -> Self {
        self.min_items = n;
        self
    }

    pub fn max_items(mut self, n: i64) -> Self {
        self.max_items = n;
        self
    }
}

/// A block of attributes and nested blocks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub description: String,
    pub attributes: Vec<Attribute>,
    pub blocks: Vec<NestedBlock>,
}

impl Block {
    pub fn new(description: &str) -> Self {
        Self {
            description: description.to_string(),
            ..Default::default()
        }
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn block(mut self, block: NestedBlock) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn get_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// The block seen as a single object type
    pub fn object_type(&self) -> AttrType {
        let mut fields: Vec<(String, AttrType)> = self
            .attributes
            .iter()
            .map(|a| (a.name.clone(), a.ty.clone()))
            .collect();
        for nested in &self.blocks {
            let ty = match nested.nesting {
                Nesting::Single => nested.block.object_type(),
                Nesting::List => AttrType::List(Box::new(nested.block.object_type())),
            };
            fields.push((nested.name.clone(), ty));
        }
        AttrType::Object(fields)
    }

    /// Read-only view for data sources: everything computed except `key`,
    /// which becomes the required lookup argument. Nested blocks turn into
    /// computed object attributes.
    pub fn computed_view(&self, key: Option<&str>) -> Block {
        let mut view = Block::new(&self.description);
        for attr in &self.attributes {
            let mut a = attr.clone();
            a.validators.clear();
            a.force_new = false;
            a.stable = false;
            if Some(attr.name.as_str()) == key {
                a.required = true;
                a.optional = false;
                a.computed = false;
            } else {
                a.required = false;
                a.optional = false;
                a.computed = true;
            }
            view.attributes.push(a);
        }
        for nested in &self.blocks {
            let ty = match nested.nesting {
                Nesting::Single => nested.block.object_type(),
                Nesting::List => AttrType::List(Box::new(nested.block.object_type())),
            };
            view.attributes.push(
                Attribute::new(&nested.name, ty)
                    .computed()
                    .describe(&nested.block.description),
            );
        }
        view
    }

    /// Run attribute validators over a config object
    pub fn validate(&self, value: &DynamicValue, path: &AttrPath, diags: &mut Diagnostics) {
        let map = match value {
            DynamicValue::Map(m) => m,
            _ => return,
        };

        for attr in &self.attributes {
            let v = match map.get(&attr.name) {
                Some(v) if !v.is_null() && !v.contains_unknown() => v,
                _ => continue,
            };
            let attr_path = if path.is_empty() {
                AttrPath::root(&attr.name)
            } else {
                path.attr(&attr.name)
            };
            for validator in &attr.validators {
                if let Some(msg) = validator.check(v) {
                    diags.attribute_error(
                        &attr_path,
                        "Invalid attribute value",
                        format!("{}: {}", attr_path, msg),
                    );
                }
            }
        }

        for nested in &self.blocks {
            let block_path = if path.is_empty() {
                AttrPath::root(&nested.name)
            } else {
                path.attr(&nested.name)
            };
            match (nested.nesting, map.get(&nested.name)) {
                (Nesting::Single, Some(v @ DynamicValue::Map(_))) => {
                    nested.block.validate(v, &block_path, diags)
                }
                (Nesting::List, Some(DynamicValue::List(items))) => {
                    let count = items.len() as i64;
                    if count < nested.min_items || (nested.max_items > 0 && count > nested.max_items) {
                        let bounds = if nested.max_items > 0 {
                            format!("between {} and {}", nested.min_items, nested.max_items)
                        } else {
                            format!("at least {}", nested.min_items)
                        };
                        diags.attribute_error(
                            &block_path,
                            "Invalid number of blocks",
                            format!("{} must have {} blocks, got {}", block_path, bounds, count),
                        );
                    }
                    for (i, item) in items.iter().enumerate() {
                        nested.block.validate(item, &block_path.index(i), diags);
                    }
                }
                _ => {}
            }
        }
    }

    /// Shape a value to exactly this block: every attribute present, nothing
    /// extra, list blocks never null
    pub fn conform(&self, value: DynamicValue) -> DynamicValue {
        let mut map = match value {
            DynamicValue::Map(m) => m,
            other => return other,
        };
        let mut out = std::collections::HashMap::new();

        for attr in &self.attributes {
            let v = map.remove(&attr.name).unwrap_or_default();
            out.insert(attr.name.clone(), attr.ty.conform(v));
        }

        for nested in &self.blocks {
            let v = map.remove(&nested.name).unwrap_or_default();
            let v = match (nested.nesting, v) {
                (Nesting::Single, v @ DynamicValue::Map(_)) => nested.block.conform(v),
                (Nesting::Single, other) => other,
                (Nesting::List, DynamicValue::List(items)) => DynamicValue::List(
                    items.into_iter().map(|i| nested.block.conform(i)).collect(),
                ),
                (Nesting::List, DynamicValue::Null) => DynamicValue::List(vec![]),
                (Nesting::List, other) => other,
            };
            out.insert(nested.name.clone(), v);
        }

        DynamicValue::Map(out)
    }

    /// Mark computed attributes left null in config as unknown, the way a
    /// plan for a new or changed object must. `stable` attributes keep a
    /// known planned value.
    pub fn mark_computed_unknown(&self, planned: &mut DynamicValue, config: &DynamicValue) {
        let planned_map = match planned.as_map_mut() {
            Some(m) => m,
            None => return,
        };

        for attr in self.attributes.iter().filter(|a| a.computed) {
            let configured = config.get(&attr.name).map_or(false, |v| !v.is_null());
            if configured {
                continue;
            }
            let has_value = planned_map.get(&attr.name).map_or(false, |v| !v.is_null());
            if attr.stable && has_value {
                continue;
            }
            planned_map.insert(attr.name.clone(), DynamicValue::Unknown);
        }

        for nested in &self.blocks {
            let config_value = config.get(&nested.name);
            match (planned_map.get_mut(&nested.name), config_value) {
                (Some(p @ DynamicValue::Map(_)), Some(c)) => {
                    nested.block.mark_computed_unknown(p, c)
                }
                (Some(DynamicValue::List(items)), Some(DynamicValue::List(configs))) => {
                    for (p, c) in items.iter_mut().zip(configs.iter()) {
                        nested.block.mark_computed_unknown(p, c);
                    }
                }
                _ => {}
            }
        }
    }

    /// Paths of `force_new` attributes whose value changes
    pub fn replace_paths(&self, prior: &DynamicValue, planned: &DynamicValue) -> Vec<AttrPath> {
        if prior.is_null() {
            return Vec::new();
        }
        self.attributes
            .iter()
            .filter(|a| a.force_new)
            .filter(|a| {
                let before = prior.get(&a.name).cloned().unwrap_or_default();
                let after = planned.get(&a.name).cloned().unwrap_or_default();
                before != after
            })
            .map(|a| AttrPath::root(&a.name))
            .collect()
    }
}

/// A versioned resource or data source schema
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub version: i64,
    pub block: Block,
}

impl Schema {
    pub fn new(block: Block) -> Self {
        Self { version: 0, block }
    }
}

impl From<&Attribute> for tf::schema::Attribute {
    fn from(a: &Attribute) -> Self {
        tf::schema::Attribute {
            name: a.name.clone(),
            r#type: a.ty.to_json().to_string().into_bytes(),
            description: a.description.clone(),
            required: a.required,
            optional: a.optional,
            computed: a.computed,
            sensitive: a.sensitive,
            description_kind: tf::StringKind::Plain as i32,
            deprecated: false,
        }
    }
}

impl From<&NestedBlock> for tf::schema::NestedBlock {
    fn from(b: &NestedBlock) -> Self {
        let nesting = match b.nesting {
            Nesting::Single => tf::schema::nested_block::NestingMode::Single,
            Nesting::List => tf::schema::nested_block::NestingMode::List,
        };
        tf::schema::NestedBlock {
            type_name: b.name.clone(),
            block: Some((&b.block).into()),
            nesting: nesting as i32,
            min_items: b.min_items,
            max_items: b.max_items,
        }
    }
}

impl From<&Block> for tf::schema::Block {
    fn from(b: &Block) -> Self {
        tf::schema::Block {
            version: 0,
            attributes: b.attributes.iter().map(Into::into).collect(),
            block_types: b.blocks.iter().map(Into::into).collect(),
            description: b.description.clone(),
            description_kind: tf::StringKind::Plain as i32,
            deprecated: false,
        }
    }
}

impl From<&Schema> for tf::Schema {
    fn from(s: &Schema) -> Self {
        let mut block: tf::schema::Block = (&s.block).into();
        block.version = s.version;
        tf::Schema {
            version: s.version,
            block: Some(block),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{int_value, make_state, string_value};

    fn sample() -> Block {
        Block::new("sample")
            .attribute(Attribute::id())
            .attribute(Attribute::string("primary_key").required().force_new())
            .attribute(
                Attribute::string("status")
                    .optional_computed()
                    .one_of(&["enable", "disable"]),
            )
            .attribute(Attribute::string("active_server").computed())
            .block(
                NestedBlock::list(
                    "overrides",
                    Block::new("override")
                        .attribute(Attribute::string("pop").required().length_between(1, 8))
                        .attribute(Attribute::number("ttl").optional_computed().int_between(1, 60)),
                )
                .max_items(2),
            )
    }

    #[test]
    fn test_type_notation() {
        assert_eq!(AttrType::String.to_json(), json!("string"));
        assert_eq!(
            Attribute::string_set("domains").ty.to_json(),
            json!(["set", "string"])
        );
        let obj = Block::new("")
            .attribute(Attribute::string("pop"))
            .object_type();
        assert_eq!(obj.to_json(), json!(["object", {"pop": "string"}]));
    }

    #[test]
    fn test_validators() {
        let one_of = Validator::OneOf(&["enable", "disable"]);
        assert!(one_of.check(&string_value("enable")).is_none());
        assert!(one_of.check(&string_value("on")).is_some());
        assert!(one_of.check(&DynamicValue::Unknown).is_none());

        let len = Validator::LengthBetween(1, 3);
        assert!(len.check(&string_value("")).is_some());
        assert!(len.check(&string_value("abcd")).is_some());
        assert!(len
            .check(&DynamicValue::List(vec![string_value("ab"), string_value("abcd")]))
            .is_some());

        let range = Validator::IntBetween(1, 60);
        assert!(range.check(&int_value(60)).is_none());
        assert!(range.check(&int_value(61)).is_some());
    }

    #[test]
    fn test_validate_reports_paths() {
        let config = make_state(vec![
            ("primary_key", string_value("a")),
            ("status", string_value("on")),
            (
                "overrides",
                DynamicValue::List(vec![
                    make_state(vec![("pop", string_value("fra1")), ("ttl", int_value(0))]),
                    make_state(vec![("pop", DynamicValue::Unknown), ("ttl", DynamicValue::Null)]),
                    make_state(vec![("pop", string_value("x")), ("ttl", DynamicValue::Null)]),
                ]),
            ),
        ]);
        let mut diags = Diagnostics::new();
        sample().validate(&config, &AttrPath::default(), &mut diags);

        let details: Vec<String> = diags.iter().map(|d| d.detail.clone()).collect();
        assert_eq!(details.len(), 3, "{:?}", details);
        assert!(details[0].starts_with("status:"));
        assert!(details.iter().any(|d| d.starts_with("overrides[0].ttl:")));
        assert!(details.iter().any(|d| d.contains("between 0 and 2 blocks")));
    }

    #[test]
    fn test_conform_fills_and_drops() {
        let value = make_state(vec![
            ("primary_key", string_value("a")),
            ("unexpected", string_value("x")),
        ]);
        let conformed = sample().conform(value);
        let map = conformed.as_map().unwrap();
        assert_eq!(map.len(), 5);
        assert!(map["status"].is_null());
        assert_eq!(map["overrides"], DynamicValue::List(vec![]));
        assert!(!map.contains_key("unexpected"));
    }

    #[test]
    fn test_mark_computed_unknown_on_create() {
        let config = make_state(vec![
            ("primary_key", string_value("a")),
            ("status", DynamicValue::Null),
            (
                "overrides",
                DynamicValue::List(vec![make_state(vec![
                    ("pop", string_value("fra1")),
                    ("ttl", DynamicValue::Null),
                ])]),
            ),
        ]);
        let mut planned = sample().conform(config.clone());
        sample().mark_computed_unknown(&mut planned, &config);

        assert!(planned.get("id").unwrap().is_unknown());
        assert!(planned.get("status").unwrap().is_unknown());
        assert!(planned.get("active_server").unwrap().is_unknown());
        assert_eq!(planned.get("primary_key"), Some(&string_value("a")));
        let first = &planned.get("overrides").unwrap().as_list().unwrap()[0];
        assert!(first.get("ttl").unwrap().is_unknown());
    }

    #[test]
    fn test_stable_attribute_keeps_prior_value() {
        let config = make_state(vec![("primary_key", string_value("a"))]);
        let mut planned = sample().conform(make_state(vec![
            ("id", string_value("a")),
            ("primary_key", string_value("a")),
            ("active_server", string_value("10.0.0.1")),
        ]));
        sample().mark_computed_unknown(&mut planned, &config);
        assert_eq!(planned.get("id"), Some(&string_value("a")));
        assert!(planned.get("active_server").unwrap().is_unknown());
    }

    #[test]
    fn test_replace_paths() {
        let prior = make_state(vec![("primary_key", string_value("a")), ("status", string_value("enable"))]);
        let planned = make_state(vec![("primary_key", string_value("b")), ("status", string_value("disable"))]);
        let paths = sample().replace_paths(&prior, &planned);
        assert_eq!(paths, vec![AttrPath::root("primary_key")]);
        assert!(sample().replace_paths(&DynamicValue::Null, &planned).is_empty());
    }

    #[test]
    fn test_computed_view() {
        let view = sample().computed_view(Some("primary_key"));
        let key = view.get_attribute("primary_key").unwrap();
        assert!(key.required && !key.computed);
        let status = view.get_attribute("status").unwrap();
        assert!(status.computed && !status.optional && status.validators.is_empty());
        let overrides = view.get_attribute("overrides").unwrap();
        assert!(overrides.computed);
        assert!(view.blocks.is_empty());
    }

    #[test]
    fn test_proto_rendering() {
        let schema: tf::Schema = (&Schema::new(sample())).into();
        let block = schema.block.unwrap();
        assert_eq!(block.attributes.len(), 4);
        assert_eq!(block.attributes[1].r#type, b"\"string\"".to_vec());
        assert_eq!(block.block_types[0].max_items, 2);
        assert_eq!(
            block.block_types[0].nesting,
            tf::schema::nested_block::NestingMode::List as i32
        );
    }
}
