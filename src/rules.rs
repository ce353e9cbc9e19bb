//! Compiled rule registry.

use fanout_sink::KeyResolver;
use regex::Regex;
use sync_core::TableRef;
use transform::{ColumnFilter, RecordTransform};

use crate::config::{AppConfig, ConfigError, RuleConfig};

/// A configured rule with its table pattern compiled.
#[derive(Debug, Clone)]
pub struct SyncRule {
    pub name: String,
    pub pattern: Regex,
    pub config: RuleConfig,
}

impl SyncRule {
    pub fn compile(name: impl Into<String>, config: RuleConfig) -> Result<Self, ConfigError> {
        let name = name.into();
        let pattern = Regex::new(&config.table_regex).map_err(|source| {
            ConfigError::InvalidPattern {
                rule: name.clone(),
                pattern: config.table_regex.clone(),
                source,
            }
        })?;
        Ok(Self {
            name,
            pattern,
            config,
        })
    }

    /// Whether the pattern occurs anywhere in `schema.table`.
    pub fn matches(&self, table: &TableRef) -> bool {
        self.pattern.is_match(&table.qualified())
    }

    pub fn key_resolver(&self) -> KeyResolver {
        KeyResolver::new(self.config.custom_pk_column.clone())
    }

    pub fn transform(&self) -> RecordTransform {
        RecordTransform::new(
            ColumnFilter::new(
                self.config.include_column_names.clone(),
                self.config.exclude_column_names.clone(),
            ),
            self.config.field_name_format.clone(),
            self.config.serialization_format,
        )
    }
}

/// Every rule of the configuration, in name order. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<SyncRule>,
}

impl RuleSet {
    pub fn compile(config: &AppConfig) -> Result<Self, ConfigError> {
        let rules = config
            .rules
            .iter()
            .map(|(name, rule)| SyncRule::compile(name.clone(), rule.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn iter(&self) -> impl Iterator<Item = &SyncRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether any rule is interested in `table`.
    pub fn wants(&self, table: &TableRef) -> bool {
        self.rules.iter().any(|rule| rule.matches(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MATCH_ALL_TABLES;

    fn rule(pattern: &str) -> SyncRule {
        SyncRule::compile(
            "test",
            RuleConfig {
                table_regex: pattern.to_string(),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_match_all_pattern() {
        let all = rule(MATCH_ALL_TABLES);
        assert!(all.matches(&TableRef::new("shop", "orders")));
        assert!(all.matches(&TableRef::new("a", "b")));
    }

    #[test]
    fn test_match_is_unanchored() {
        let orders = rule("orders");
        assert!(orders.matches(&TableRef::new("shop", "orders")));
        assert!(orders.matches(&TableRef::new("shop", "orders_archive")));
        assert!(orders.matches(&TableRef::new("orders", "items")));
        assert!(!orders.matches(&TableRef::new("shop", "users")));
    }

    #[test]
    fn test_explicit_anchors_still_apply() {
        let anchored = rule(r"^shop\.orders$");
        assert!(anchored.matches(&TableRef::new("shop", "orders")));
        assert!(!anchored.matches(&TableRef::new("shop", "orders_archive")));
        assert!(!anchored.matches(&TableRef::new("old_shop", "orders")));

        let suffix = rule("orders$");
        assert!(suffix.matches(&TableRef::new("shop", "orders")));
        assert!(!suffix.matches(&TableRef::new("orders", "backup")));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = SyncRule::compile(
            "bad",
            RuleConfig {
                table_regex: "(".to_string(),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("bad"));
    }

    #[test]
    fn test_rule_set_is_in_name_order() {
        let config = AppConfig::from_yaml(
            r#"
rules:
  zeta: { tableRegex: "z\\." }
  alpha: { tableRegex: "a\\." }
"#,
        )
        .unwrap();
        let rules = RuleSet::compile(&config).unwrap();
        let names: Vec<_> = rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert!(rules.wants(&TableRef::new("a", "t")));
        assert!(!rules.wants(&TableRef::new("b", "t")));
    }
}
