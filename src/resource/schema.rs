use anyhow::{bail, Result};

use super::state::AttributeBag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    String,
    Bool,
    Int,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeMode {
    Required,
    Optional,
    /// Set by the resource, never by configuration
    Computed,
}

#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: &'static str,
    pub ty: AttributeType,
    pub mode: AttributeMode,
    pub sensitive: bool,
    pub default: Option<&'static str>,
    /// Inclusive bounds for Int attributes
    pub int_range: Option<(u64, u64)>,
    pub description: &'static str,
}

impl AttributeSchema {
    fn new(name: &'static str, ty: AttributeType, mode: AttributeMode) -> Self {
        Self {
            name,
            ty,
            mode,
            sensitive: false,
            default: None,
            int_range: None,
            description: "",
        }
    }

    pub fn required(name: &'static str, ty: AttributeType) -> Self {
        Self::new(name, ty, AttributeMode::Required)
    }

    pub fn optional(name: &'static str, ty: AttributeType) -> Self {
        Self::new(name, ty, AttributeMode::Optional)
    }

    pub fn computed(name: &'static str, ty: AttributeType) -> Self {
        Self::new(name, ty, AttributeMode::Computed)
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn default_value(mut self, value: &'static str) -> Self {
        self.default = Some(value);
        self
    }

    pub fn int_range(mut self, min: u64, max: u64) -> Self {
        self.int_range = Some((min, max));
        self
    }

    pub fn description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn is_input(&self) -> bool {
        self.mode != AttributeMode::Computed
    }

    /// Check a configured value and return its canonical string form
    fn canonicalize(&self, value: &str) -> Result<String> {
        match self.ty {
            AttributeType::String => {
                if self.mode == AttributeMode::Required && value.is_empty() {
                    bail!("Attribute '{}' must not be empty", self.name);
                }
                Ok(value.to_string())
            }
            AttributeType::Bool => match value.parse::<bool>() {
                Ok(b) => Ok(b.to_string()),
                Err(_) => bail!(
                    "Attribute '{}' expects true or false, got '{}'",
                    self.name,
                    value
                ),
            },
            AttributeType::Int => {
                let Ok(n) = value.parse::<u64>() else {
                    bail!(
                        "Attribute '{}' expects a non-negative integer, got '{}'",
                        self.name,
                        value
                    );
                };
                if let Some((min, max)) = self.int_range {
                    if n < min || n > max {
                        bail!(
                            "Attribute '{}' must be between {} and {}, got {}",
                            self.name,
                            min,
                            max,
                            n
                        );
                    }
                }
                Ok(n.to_string())
            }
        }
    }
}

/// Orchestrator-facing description of a resource type
///
/// Inputs are never updated in place: changing any of them replaces the
/// instance.
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub type_name: &'static str,
    pub attributes: Vec<AttributeSchema>,
}

impl ResourceSchema {
    pub fn attribute(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.iter().find(|attr| attr.name == name)
    }

    /// Attributes that come from configuration
    pub fn inputs(&self) -> impl Iterator<Item = &AttributeSchema> {
        self.attributes.iter().filter(|attr| attr.is_input())
    }

    pub fn is_sensitive(&self, name: &str) -> bool {
        self.attribute(name).is_some_and(|attr| attr.sensitive)
    }

    /// Validate a configuration and fill in defaults
    ///
    /// The result holds exactly the input attributes that have a value, in
    /// canonical form, so two equivalent configurations compare equal.
    pub fn normalize(&self, config: &AttributeBag) -> Result<AttributeBag> {
        for (name, _) in config.iter() {
            match self.attribute(name) {
                None => bail!(
                    "Unsupported attribute '{}' for resource type {}",
                    name,
                    self.type_name
                ),
                Some(attr) if !attr.is_input() => bail!(
                    "Attribute '{}' is computed and cannot be configured",
                    name
                ),
                Some(_) => {}
            }
        }

        let mut normalized = AttributeBag::new();
        for attr in self.inputs() {
            match (config.get(attr.name), attr.default) {
                (Some(value), _) => normalized.set(attr.name, attr.canonicalize(value)?),
                (None, Some(default)) => normalized.set(attr.name, default),
                (None, None) if attr.mode == AttributeMode::Required => {
                    bail!("Missing required attribute '{}'", attr.name)
                }
                (None, None) => {}
            }
        }

        Ok(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> ResourceSchema {
        ResourceSchema {
            type_name: "test_resource",
            attributes: vec![
                AttributeSchema::required("name", AttributeType::String),
                AttributeSchema::optional("enabled", AttributeType::Bool).default_value("false"),
                AttributeSchema::optional("ttl", AttributeType::Int).int_range(1, 100),
                AttributeSchema::computed("secret", AttributeType::String).sensitive(),
            ],
        }
    }

    #[test]
    fn test_normalize_applies_defaults() {
        let config = AttributeBag::new().with("name", "a");
        let normalized = schema().normalize(&config).unwrap();

        assert_eq!(normalized.get("enabled"), Some("false"));
        assert_eq!(normalized.get("ttl"), None);
        assert_eq!(normalized.len(), 2);
    }

    #[test]
    fn test_normalize_canonicalizes_ints() {
        let config = AttributeBag::new().with("name", "a").with("ttl", "042");
        let normalized = schema().normalize(&config).unwrap();
        assert_eq!(normalized.get("ttl"), Some("42"));
    }

    #[test]
    fn test_normalize_rejects_invalid_input() {
        let schema = schema();

        let missing = AttributeBag::new().with("enabled", "true");
        assert!(schema.normalize(&missing).is_err());

        let out_of_range = AttributeBag::new().with("name", "a").with("ttl", "101");
        let err = schema.normalize(&out_of_range).unwrap_err();
        assert!(err.to_string().contains("between 1 and 100"));

        let computed = AttributeBag::new().with("name", "a").with("secret", "x");
        assert!(schema.normalize(&computed).is_err());

        let unknown = AttributeBag::new().with("name", "a").with("color", "red");
        assert!(schema.normalize(&unknown).is_err());

        let bad_bool = AttributeBag::new().with("name", "a").with("enabled", "1");
        assert!(schema.normalize(&bad_bool).is_err());
    }

    #[test]
    fn test_sensitive_lookup() {
        let schema = schema();
        assert!(schema.is_sensitive("secret"));
        assert!(!schema.is_sensitive("name"));
        assert!(!schema.is_sensitive("nope"));
    }
}
