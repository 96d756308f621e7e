//! Static table description and the parameter catalog built from it
//!
//! Each table becomes a [`FormSpec`] named `{Model}Form`. Every `schema.table.column`
//! path is indexed in a [`ParamLookup`] that resolves to the owning form.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use super::config::SurveyConfig;
use super::lookup::{FunctionLookup, LookupError, ParamLookup};
use super::validation::{SearchInput, ValidationError};

/// Path fragments that never become searchable parameters
const EXCLUDED_PATHS: [&str; 4] = ["pk", "mangadatadb.sample", "test_", "cube_header"];

/// Storage type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Integer,
    Float,
    Text,
    Boolean,
}

impl ColumnKind {
    /// Parse raw input as this column type
    pub fn parse(self, raw: &str) -> Option<FieldValue> {
        let raw = raw.trim();
        match self {
            ColumnKind::Integer => raw.parse().ok().map(FieldValue::Integer),
            ColumnKind::Float => raw.parse().ok().map(FieldValue::Float),
            ColumnKind::Text => Some(FieldValue::Text(raw.to_string())),
            ColumnKind::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" | "t" | "1" | "yes" => Some(FieldValue::Boolean(true)),
                "false" | "f" | "0" | "no" => Some(FieldValue::Boolean(false)),
                _ => None,
            },
        }
    }
}

/// A typed form field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

/// One table of the relational schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Database schema (e.g. `mangadatadb`)
    pub schema: String,
    pub table: String,
    /// Model name (e.g. `Cube`)
    pub model: String,
    pub columns: Vec<ColumnSpec>,
}

impl TableSchema {
    pub fn new(schema: &str, table: &str, model: &str) -> Self {
        Self {
            schema: schema.to_string(),
            table: table.to_string(),
            model: model.to_string(),
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, name: &str, kind: ColumnKind) -> Self {
        self.columns.push(ColumnSpec {
            name: name.to_string(),
            kind,
        });
        self
    }
}

/// Input-validation description of one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSpec {
    /// `{Model}Form`
    pub name: String,
    pub model: String,
    pub schema: String,
    pub table: String,
    pub columns: Vec<ColumnSpec>,
}

impl FormSpec {
    fn from_table(table: &TableSchema) -> Self {
        Self {
            name: format!("{}Form", table.model),
            model: table.model.clone(),
            schema: table.schema.clone(),
            table: table.table.clone(),
            columns: table.columns.clone(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Type-check raw `(field, value)` pairs against the form's columns
    ///
    /// # Errors
    ///
    /// Returns every unknown field and every value that does not parse as its column type
    pub fn validate(
        &self,
        fields: &[(&str, &str)],
    ) -> Result<Vec<(String, FieldValue)>, Vec<ValidationError>> {
        let mut values = Vec::with_capacity(fields.len());
        let mut errors = Vec::new();
        for &(field, raw) in fields {
            match self.column(field) {
                None => errors.push(ValidationError::UnknownField(field.to_string())),
                Some(spec) => match spec.kind.parse(raw) {
                    Some(value) => values.push((field.to_string(), value)),
                    None => errors.push(ValidationError::InvalidValue {
                        field: field.to_string(),
                        expected: spec.kind,
                        value: raw.to_string(),
                    }),
                },
            }
        }
        if errors.is_empty() {
            Ok(values)
        } else {
            Err(errors)
        }
    }
}

/// A lookup key resolved to its form and column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef<'a> {
    pub form: &'a FormSpec,
    pub column: &'a ColumnSpec,
}

/// Searchable parameters of a schema
#[derive(Debug, Clone)]
pub struct ParamCatalog {
    forms: FxHashMap<String, FormSpec>,
    /// Full path -> form name
    params: ParamLookup<String>,
    /// Model -> column names, including excluded columns
    tree: BTreeMap<String, Vec<String>>,
    functions: FunctionLookup,
}

impl ParamCatalog {
    pub fn build(tables: &[TableSchema], config: &SurveyConfig) -> Self {
        let mut forms = FxHashMap::default();
        let mut params = ParamLookup::new(config);
        let mut tree: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for table in tables {
            let form = FormSpec::from_table(table);
            for column in &table.columns {
                let path = format!("{}.{}.{}", table.schema, table.table, column.name);
                params.insert(&path, form.name.clone());
                tree.entry(table.model.clone())
                    .or_default()
                    .push(column.name.clone());
            }
            forms.insert(form.name.clone(), form);
        }

        let indexed = params.len();
        params.retain(|path| !EXCLUDED_PATHS.iter().any(|x| path.contains(x)));
        info!(
            "Built parameter catalog: {} forms, {} parameters ({} excluded)",
            forms.len(),
            params.len(),
            indexed - params.len()
        );

        Self {
            forms,
            params,
            tree,
            functions: FunctionLookup::default(),
        }
    }

    pub fn form(&self, name: &str) -> Option<&FormSpec> {
        self.forms.get(name)
    }

    /// Forms sorted by name
    pub fn forms(&self) -> Vec<&FormSpec> {
        let mut forms: Vec<&FormSpec> = self.forms.values().collect();
        forms.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        forms
    }

    pub fn params(&self) -> &ParamLookup<String> {
        &self.params
    }

    /// Model name -> column names
    pub fn param_tree(&self) -> &BTreeMap<String, Vec<String>> {
        &self.tree
    }

    pub fn functions(&self) -> &FunctionLookup {
        &self.functions
    }

    /// Searchable paths in the DAP junk tables, sorted
    pub fn dap_keys(&self) -> Vec<&str> {
        self.params
            .paths()
            .into_iter()
            .filter(|p| p.contains("mangadapdb.junk"))
            .collect()
    }

    /// Form owning the parameter `key`
    ///
    /// # Errors
    ///
    /// Returns `LookupError` if `key` matches no parameter or more than one
    pub fn lookup_form(&self, key: &str) -> Result<&FormSpec, LookupError> {
        let name = self.params.resolve(key)?;
        self.forms
            .get(name)
            .ok_or_else(|| LookupError::NotFound(key.to_string()))
    }

    /// Resolve keys to `(form, column)` pairs
    ///
    /// # Errors
    ///
    /// Returns the first `LookupError` among the keys
    pub fn map_to_column<'a>(&'a self, keys: &[&str]) -> Result<Vec<ColumnRef<'a>>, LookupError> {
        keys.iter()
            .map(|key| {
                let form = self.lookup_form(key)?;
                let expanded = self.params.shortcuts().expand(key);
                let column = expanded
                    .last()
                    .and_then(|name| form.column(name))
                    .ok_or_else(|| LookupError::NotFound((*key).to_string()))?;
                Ok(ColumnRef { form, column })
            })
            .collect()
    }

    /// Validate a search filter together with the parameters to return
    ///
    /// # Errors
    ///
    /// Returns the filter's violated rules, or a `Lookup` error per unresolvable parameter
    pub fn validate_search<'a>(
        &'a self,
        filter: &str,
        return_params: &[&str],
    ) -> Result<(SearchInput, Vec<ColumnRef<'a>>), Vec<ValidationError>> {
        let input = SearchInput::validate(filter)?;
        let mut columns = Vec::with_capacity(return_params.len());
        let mut errors = Vec::new();
        for key in return_params {
            match self.map_to_column(&[*key]) {
                Ok(mut found) => columns.append(&mut found),
                Err(e) => errors.push(e.into()),
            }
        }
        if errors.is_empty() {
            Ok((input, columns))
        } else {
            Err(errors)
        }
    }

    /// Refresh release-dependent shortcuts if `config` selects another release
    pub fn rebuild_if_stale(&mut self, config: &SurveyConfig) -> bool {
        self.params.rebuild_if_stale(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ParamCatalog {
        let tables = [
            TableSchema::new("mangadatadb", "cube", "Cube")
                .column("pk", ColumnKind::Integer)
                .column("ra", ColumnKind::Float)
                .column("plateifu", ColumnKind::Text),
            TableSchema::new("mangadatadb", "ifudesign", "IFUDesign")
                .column("name", ColumnKind::Text)
                .column("nfiber", ColumnKind::Integer),
            TableSchema::new("mangadapdb", "junk5", "Junk5")
                .column("emline_gflux_ha_6564", ColumnKind::Float),
            TableSchema::new("mangadatadb", "test_rss", "TestRss").column("x", ColumnKind::Float),
        ];
        ParamCatalog::build(&tables, &SurveyConfig::default())
    }

    #[test]
    fn test_build_forms_and_tree() {
        let catalog = catalog();
        assert_eq!(catalog.forms().len(), 4);
        assert_eq!(catalog.form("CubeForm").unwrap().table, "cube");
        assert_eq!(
            catalog.param_tree()["Cube"],
            vec!["pk".to_string(), "ra".to_string(), "plateifu".to_string()]
        );
    }

    #[test]
    fn test_excluded_paths_cleaned() {
        let catalog = catalog();
        let params = catalog.params();
        assert!(!params.contains_path("mangadatadb.cube.pk"));
        assert!(!params.contains_path("mangadatadb.test_rss.x"));
        assert!(params.contains_path("mangadatadb.cube.ra"));
        assert_eq!(params.len(), 5);
    }

    #[test]
    fn test_map_to_column() {
        let catalog = catalog();
        let refs = catalog.map_to_column(&["cube.ra", "ifu.name", "haflux"]).unwrap();
        assert_eq!(refs[0].form.name, "CubeForm");
        assert_eq!(refs[0].column.name, "ra");
        assert_eq!(refs[1].form.model, "IFUDesign");
        assert_eq!(refs[1].column.kind, ColumnKind::Text);
        assert_eq!(refs[2].column.name, "emline_gflux_ha_6564");

        let err = catalog.map_to_column(&["cube.dec"]).unwrap_err();
        assert_eq!(err, LookupError::NotFound("cube.dec".to_string()));
    }

    #[test]
    fn test_dap_keys() {
        assert_eq!(
            catalog().dap_keys(),
            vec!["mangadapdb.junk5.emline_gflux_ha_6564"]
        );
    }

    #[test]
    fn test_form_validation() {
        let catalog = catalog();
        let form = catalog.form("IFUDesignForm").unwrap();
        let values = form.validate(&[("nfiber", " 127 "), ("name", "12701")]).unwrap();
        assert_eq!(values[0].1, FieldValue::Integer(127));
        assert_eq!(values[1].1, FieldValue::Text("12701".to_string()));

        let errors = form.validate(&[("nfiber", "many"), ("ra", "1.0")]).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[1], ValidationError::UnknownField(ref f) if f == "ra"));
    }

    #[test]
    fn test_validate_search() {
        let catalog = catalog();
        let (input, columns) = catalog.validate_search("cube.ra > 10", &["plateifu"]).unwrap();
        assert_eq!(input.filter(), "cube.ra > 10");
        assert_eq!(columns[0].column.name, "plateifu");

        let errors = catalog.validate_search("cube.ra > 10", &["dec"]).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::Lookup(LookupError::NotFound("dec".to_string()))]
        );
        assert!(catalog.validate_search("ra", &[]).is_err());
    }

    #[test]
    fn test_functions_available() {
        assert_eq!(catalog().functions().get("NPERGOOD"), Ok("getPercent"));
    }
}
